//! Parsing of raw request buffers into a [`Request`].
//!
//! The parser is pure and synchronous: it expects one contiguous byte buffer
//! holding a complete HTTP/1.1 message (start line, headers, optional
//! fixed-length body). Reading a complete buffer off the socket is the
//! runtime's job.

use std::num::ParseIntError;

use memchr::memmem;
use thiserror::Error;

use crate::store::table::Table;

/// The header/body separator: the empty line after the last header.
const HEAD_SEPARATOR: &[u8] = b"\r\n\r\n";

/// Methods accepted in a request start line.
const VALID_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "DELETE", "OPTIONS", "TRACE", "PATCH",
];

/// Representation of a HTTP request with method, target URI, headers and body.
///
/// Immutable from a handler's perspective: handlers read the request and
/// mutate the response.
#[derive(Debug)]
pub struct Request {
    /// The method of the parsed request.
    pub method: String,
    /// The target URI, query string (if any) kept verbatim.
    pub uri: String,
    /// Header fields, keys lower-cased at parse time.
    pub headers: Table<String>,
    /// The request body; present only when `Content-Length` is positive.
    pub body: Option<Vec<u8>>,
}

/// Represents the kind of error that can occur while handling a request.
#[derive(Error, Debug)]
pub enum HttpError {
    /// The request contains an unsupported / invalid HTTP version.
    #[error("unsupported HTTP version: {0}")]
    UnsupportedVersion(String),

    /// The request contains an unsupported / invalid HTTP method.
    #[error("unsupported HTTP method: {0}")]
    InvalidMethod(String),

    /// The request line does not follow the RFC standard.
    #[error("request line is malformed")]
    MalformedRequestLine,

    /// A header does not follow the RFC standard.
    #[error("header is malformed")]
    MalformedHeader,

    /// The body is shorter than the `Content-Length` header declares.
    #[error("body length does not match header")]
    InvalidBodyLength,

    /// The buffer ended before the message did.
    #[error("unexpected end of input")]
    UnexpectedEOF,

    /// The request exceeds the maximum accepted size.
    #[error("request exceeds the maximum accepted size")]
    RequestTooLarge,

    /// A response carries a status code without a registered reason phrase.
    #[error("unknown status code: {0}")]
    UnknownStatusCode(u16),

    /// There was a generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// There was an error parsing a string to an integer.
    #[error("Parsing error: {0}")]
    ParseError(#[from] ParseIntError),
}

impl Request {
    /// Parses one complete request from `buffer`.
    ///
    /// # Errors
    ///
    /// Throws a `HttpError` when the buffer is structurally invalid:
    /// a start line without exactly three tokens, an unknown method, a
    /// version other than 1.1, a header without a colon or with an invalid
    /// field name, or a body shorter than its declared `Content-Length`.
    /// A buffer that ends before the empty line is [`HttpError::UnexpectedEOF`].
    pub fn parse(buffer: &[u8]) -> Result<Self, HttpError> {
        let head_end = memmem::find(buffer, HEAD_SEPARATOR).ok_or(HttpError::UnexpectedEOF)?;
        let head = String::from_utf8_lossy(&buffer[..head_end]);

        let mut lines = head.split("\r\n");
        let start_line = lines.next().ok_or(HttpError::MalformedRequestLine)?;
        let (method, uri) = parse_start_line(start_line)?;

        let mut headers = Table::new();
        for line in lines {
            let (key, value) = parse_header_line(line)?;
            headers.set(key, value);
        }

        let body = parse_body(buffer, head_end, &headers)?;

        Ok(Self {
            method,
            uri,
            headers,
            body,
        })
    }

    /// Retrieves a header value by its lower-cased name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Splits a start line into method and URI, validating both.
fn parse_start_line(line: &str) -> Result<(String, String), HttpError> {
    let parts: Vec<&str> = line.split(' ').collect();
    if parts.len() != 3 {
        return Err(HttpError::MalformedRequestLine);
    }

    let version = parts[2]
        .strip_prefix("HTTP/")
        .ok_or(HttpError::MalformedRequestLine)?;
    if version != "1.1" {
        return Err(HttpError::UnsupportedVersion(version.to_string()));
    }

    let method = parts[0];
    if !VALID_METHODS.contains(&method) {
        return Err(HttpError::InvalidMethod(method.to_string()));
    }

    if parts[1].is_empty() {
        return Err(HttpError::MalformedRequestLine);
    }

    Ok((method.to_string(), parts[1].to_string()))
}

/// Splits a header line at the first colon into a lower-cased key and a
/// trimmed value.
fn parse_header_line(line: &str) -> Result<(String, String), HttpError> {
    let (key, value) = line
        .trim()
        .split_once(':')
        .ok_or(HttpError::MalformedHeader)?;

    if key.is_empty() || key.contains(' ') || !key.chars().all(is_valid_field_char) {
        return Err(HttpError::MalformedHeader);
    }

    Ok((key.to_lowercase(), value.trim().to_string()))
}

/// Extracts the body declared by `Content-Length`, if any.
fn parse_body(
    buffer: &[u8],
    head_end: usize,
    headers: &Table<String>,
) -> Result<Option<Vec<u8>>, HttpError> {
    let Some(raw_length) = headers.get("content-length") else {
        return Ok(None);
    };

    let content_length: usize = raw_length.parse()?;
    if content_length == 0 {
        return Ok(None);
    }

    let body_start = head_end + HEAD_SEPARATOR.len();
    let available = buffer.len().saturating_sub(body_start);
    if available < content_length {
        return Err(HttpError::InvalidBodyLength);
    }

    Ok(Some(
        buffer[body_start..body_start + content_length].to_vec(),
    ))
}

/// Helper method to determine whether the passed character is valid according
/// to <https://www.rfc-editor.org/rfc/rfc9110#section-5.6.2>
const fn is_valid_field_char(c: char) -> bool {
    if c.is_ascii_alphanumeric() {
        return true;
    }

    matches!(
        c,
        '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~'
    )
}
