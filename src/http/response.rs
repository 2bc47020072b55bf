//! Accumulation and serialization of HTTP responses.
//!
//! A [`Response`] collects a status code, headers and a body through plain
//! mutators, then renders three byte sequences in wire order: the status
//! line, the header block and the body. All render buffers are owned by the
//! call, so responses on concurrent connections never alias.

use crate::http::request::HttpError;
use crate::http::status;
use crate::store::table::Table;

/// Representation of a HTTP response with status code, headers and body.
///
/// A fresh response starts at status 200 with no headers and an empty body.
#[derive(Debug)]
pub struct Response {
    status: u16,
    headers: Table<String>,
    body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// Creates an empty response with status 200.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Table::new(),
            body: Vec::new(),
        }
    }

    /// Sets the status code.
    pub fn set_status(&mut self, code: u16) {
        self.status = code;
    }

    /// The current status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Sets a header field, replacing any previous value for the same key.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.set(key, value.into());
    }

    /// Retrieves a header value by its exact key.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Sets the body bytes. `Content-Length` is derived from the body at
    /// render time, so the two cannot drift apart.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    /// The current body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Renders the status line, e.g. `HTTP/1.1 200 OK\r\n`.
    ///
    /// # Errors
    ///
    /// Throws [`HttpError::UnknownStatusCode`] when the status code has no
    /// registered reason phrase.
    pub fn render_start_line(&self) -> Result<String, HttpError> {
        let reason = status::reason_phrase(self.status)
            .ok_or(HttpError::UnknownStatusCode(self.status))?;
        Ok(format!("HTTP/1.1 {} {}\r\n", self.status, reason))
    }

    /// Renders the header block, terminated by the blank separator line.
    ///
    /// Two passes: the exact byte length is summed first, then the lines are
    /// written into a buffer of that size. A `Content-Length` computed from
    /// the body is appended unless the caller already set one (checked
    /// case-insensitively). Header order follows the table's bucket order
    /// and is not guaranteed stable.
    #[must_use]
    pub fn render_headers(&self) -> Vec<u8> {
        const CONTENT_LENGTH: &str = "Content-Length";

        let computed_length = if self.has_content_length() {
            None
        } else {
            Some(self.body.len().to_string())
        };

        let mut size = 2;
        for (key, value) in self.headers.iter() {
            size += key.len() + 2 + value.len() + 2;
        }
        if let Some(value) = &computed_length {
            size += CONTENT_LENGTH.len() + 2 + value.len() + 2;
        }

        let mut raw = Vec::with_capacity(size);
        for (key, value) in self.headers.iter() {
            raw.extend_from_slice(key.as_bytes());
            raw.extend_from_slice(b": ");
            raw.extend_from_slice(value.as_bytes());
            raw.extend_from_slice(b"\r\n");
        }
        if let Some(value) = &computed_length {
            raw.extend_from_slice(CONTENT_LENGTH.as_bytes());
            raw.extend_from_slice(b": ");
            raw.extend_from_slice(value.as_bytes());
            raw.extend_from_slice(b"\r\n");
        }
        raw.extend_from_slice(b"\r\n");

        debug_assert_eq!(raw.len(), size);
        raw
    }

    /// The body bytes, verbatim.
    #[must_use]
    pub fn render_body(&self) -> &[u8] {
        &self.body
    }

    /// Renders the complete wire form: status line, header block, body.
    ///
    /// # Errors
    ///
    /// Throws [`HttpError::UnknownStatusCode`] when the status line cannot
    /// be rendered.
    pub fn render(&self) -> Result<Vec<u8>, HttpError> {
        let start_line = self.render_start_line()?;
        let headers = self.render_headers();

        let mut raw = Vec::with_capacity(start_line.len() + headers.len() + self.body.len());
        raw.extend_from_slice(start_line.as_bytes());
        raw.extend_from_slice(&headers);
        raw.extend_from_slice(&self.body);
        Ok(raw)
    }

    fn has_content_length(&self) -> bool {
        self.headers
            .iter()
            .any(|(key, _)| key.eq_ignore_ascii_case("content-length"))
    }
}

/// Helper function to remove boilerplate for creating html responses with
/// associated headers.
#[must_use]
pub fn html_response(status: u16, html: &str) -> Response {
    let mut response = Response::new();
    response.set_status(status);
    response.set_header("Content-Type", "text/html");
    response.set_body(html);
    response
}

#[cfg(test)]
mod tests {
    use super::{Response, html_response};
    use crate::http::request::HttpError;

    fn rendered_headers(response: &Response) -> String {
        String::from_utf8(response.render_headers()).unwrap()
    }

    #[test]
    fn default_status_renders_ok_start_line() {
        let response = Response::new();
        assert_eq!(response.render_start_line().unwrap(), "HTTP/1.1 200 OK\r\n");
    }

    #[test]
    fn status_mutator_changes_the_start_line() {
        let mut response = Response::new();
        response.set_status(404);
        assert_eq!(
            response.render_start_line().unwrap(),
            "HTTP/1.1 404 Not Found\r\n"
        );
    }

    #[test]
    fn unknown_status_code_fails_to_render() {
        let mut response = Response::new();
        response.set_status(299);
        let result = response.render_start_line();

        assert!(
            matches!(result, Err(HttpError::UnknownStatusCode(299))),
            "Expected Err(HttpError::UnknownStatusCode), got {result:?}"
        );
    }

    #[test]
    fn header_block_is_terminated_by_a_blank_line() {
        let mut response = Response::new();
        response.set_header("Content-Type", "text/html");
        let headers = rendered_headers(&response);

        assert!(headers.contains("Content-Type: text/html\r\n"));
        assert!(headers.ends_with("\r\n\r\n"));
    }

    #[test]
    fn content_length_is_computed_from_the_body() {
        let mut response = Response::new();
        response.set_body("hello");
        let headers = rendered_headers(&response);

        assert!(headers.contains("Content-Length: 5\r\n"));
    }

    #[test]
    fn explicit_content_length_is_not_duplicated() {
        let mut response = Response::new();
        response.set_header("Content-Length", "5");
        response.set_body("hello");
        let headers = rendered_headers(&response);

        let occurrences = headers
            .lines()
            .filter(|line| line.to_ascii_lowercase().starts_with("content-length"))
            .count();
        assert_eq!(occurrences, 1);
    }

    #[test]
    fn empty_response_still_declares_a_zero_length_body() {
        let response = Response::new();
        assert!(rendered_headers(&response).contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn body_round_trips_through_render() {
        let mut response = Response::new();
        response.set_header("Content-Type", "text/plain");
        response.set_body("hello");
        let raw = String::from_utf8(response.render().unwrap()).unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(raw.contains("Content-Length: 5\r\n"));
        assert!(raw.ends_with("\r\n\r\nhello"));
        assert_eq!(response.render_body(), b"hello");
    }

    #[test]
    fn set_header_replaces_previous_value() {
        let mut response = Response::new();
        response.set_header("Content-Type", "text/plain");
        response.set_header("Content-Type", "application/json");
        assert_eq!(response.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn html_response_sets_status_type_and_body() {
        let response = html_response(404, "<h1>Not Found</h1>");
        assert_eq!(response.status(), 404);
        assert_eq!(response.header("Content-Type"), Some("text/html"));
        assert_eq!(response.body(), b"<h1>Not Found</h1>");
    }
}
