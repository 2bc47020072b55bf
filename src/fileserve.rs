//! Serving of static files from a configured root directory.
//!
//! A request URI is resolved against the root, the content type is looked up
//! from the file extension, and the file contents become the response body.
//! Anything that cannot be resolved — unknown extension, unreadable path,
//! empty file, traversal attempt — is simply "not served" and the caller
//! falls through to its 404 path.

use std::path::Path;

use crate::http::response::Response;

/// Extension used when the URI has no file extension.
const DEFAULT_EXTENSION: &str = "txt";

/// Extension to content-type mapping for the file types this server serves.
const CONTENT_TYPES: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("md", "text/markdown"),
    ("txt", "text/plain"),
    ("xml", "text/xml"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("bmp", "image/bmp"),
    ("gif", "image/gif"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("ico", "image/x-icon"),
    ("png", "image/png"),
    ("tiff", "image/tiff"),
    ("svg", "image/svg+xml"),
    ("mp4", "video/mp4"),
    ("mpeg", "video/mpeg"),
    ("ogg", "video/ogg"),
    ("quicktime", "video/quicktime"),
    ("ttf", "font/ttf"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
];

/// A file resolved from disk, ready to be turned into a response.
#[derive(Debug)]
pub struct StaticFile {
    /// The file contents, served verbatim as the body.
    pub contents: Vec<u8>,
    /// The content type derived from the file extension.
    pub content_type: &'static str,
}

impl StaticFile {
    /// Builds a 200 response carrying the file contents and content type.
    /// `Content-Length` is derived from the body at render time.
    #[must_use]
    pub fn into_response(self) -> Response {
        let mut response = Response::new();
        response.set_status(200);
        response.set_header("Content-Type", self.content_type);
        response.set_body(self.contents);
        response
    }
}

/// Resolves `uri` against `root` and reads the file.
///
/// Returns `None` when the file should not be served: the URI contains a
/// `..` segment, the extension is unknown, the file cannot be read, or the
/// file is empty.
#[must_use]
pub fn resolve(root: &Path, uri: &str) -> Option<StaticFile> {
    let path = match uri.split_once('?') {
        Some((path, _query)) => path,
        None => uri,
    };

    if path.split('/').any(|segment| segment == "..") {
        return None;
    }

    let content_type = content_type_for(file_extension(path))?;
    let contents = std::fs::read(root.join(path.trim_start_matches('/'))).ok()?;
    if contents.is_empty() {
        return None;
    }

    Some(StaticFile {
        contents,
        content_type,
    })
}

/// The extension after the final dot of the final path segment, or
/// [`DEFAULT_EXTENSION`] when there is none.
fn file_extension(path: &str) -> &str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((_, extension)) if !extension.is_empty() => extension,
        _ => DEFAULT_EXTENSION,
    }
}

/// Looks up the content type registered for `extension`.
fn content_type_for(extension: &str) -> Option<&'static str> {
    CONTENT_TYPES
        .iter()
        .find(|(candidate, _)| *candidate == extension)
        .map(|(_, content_type)| *content_type)
}
