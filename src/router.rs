//! Exact-match routing of parsed requests to handlers.
//!
//! Routes are registered once at startup; the finished table is shared
//! read-only across connections (wrap it in an `Arc`). Dispatch walks the
//! routes in registration order and stops at the first exact path match, so
//! for duplicate paths the earliest registration wins.

use std::fmt;

use crate::http::request::Request;
use crate::http::response::Response;
use crate::store::array::GrowArray;

/// A handler mutates a fresh response for a matched request.
pub type RouteAction = Box<dyn Fn(&Request, &mut Response) + Send + Sync>;

/// One registered path / handler pair.
struct Route {
    path: String,
    action: RouteAction,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// An ordered collection of routes.
#[derive(Debug)]
pub struct Router {
    routes: GrowArray<Route>,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: GrowArray::new(8),
        }
    }

    /// Appends a route for the literal `path`.
    ///
    /// Paths are matched by exact equality only; no trailing-slash or case
    /// normalization is performed.
    pub fn register<F>(&mut self, path: impl Into<String>, action: F)
    where
        F: Fn(&Request, &mut Response) + Send + Sync + 'static,
    {
        self.routes.push(Route {
            path: path.into(),
            action: Box::new(action),
        });
    }

    /// Dispatches `request` to the first route whose path equals the
    /// request URI with its query string stripped.
    ///
    /// On a match the handler mutates a fresh [`Response`], which is
    /// returned. `None` means no route matched; the caller decides the
    /// fallback (static files, 404).
    #[must_use]
    pub fn dispatch(&self, request: &Request) -> Option<Response> {
        let path = match request.uri.split_once('?') {
            Some((path, _query)) => path,
            None => request.uri.as_str(),
        };

        for route in self.routes.iter() {
            if route.path == path {
                let mut response = Response::new();
                (route.action)(request, &mut response);
                return Some(response);
            }
        }
        None
    }

    /// The number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no route has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Router;
    use crate::http::request::Request;

    fn request_for(uri: &str) -> Request {
        let raw = format!("GET {uri} HTTP/1.1\r\nHost: localhost:9090\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn dispatch_invokes_the_matching_handler() {
        let mut router = Router::new();
        router.register("/", |_request, response| {
            response.set_status(200);
            response.set_body("<h1>Hello World!</h1>");
        });

        let response = router.dispatch(&request_for("/")).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), b"<h1>Hello World!</h1>");
    }

    #[test]
    fn unregistered_path_returns_none() {
        let mut router = Router::new();
        router.register("/", |_request, _response| {});

        assert!(router.dispatch(&request_for("/missing")).is_none());
    }

    #[test]
    fn first_registration_wins_for_duplicate_paths() {
        let mut router = Router::new();
        router.register("/a", |_request, response| response.set_body("first"));
        router.register("/a", |_request, response| response.set_body("second"));

        let response = router.dispatch(&request_for("/a")).unwrap();
        assert_eq!(response.body(), b"first");
    }

    #[test]
    fn query_string_is_stripped_before_matching() {
        let mut router = Router::new();
        router.register("/search", |request, response| {
            response.set_body(request.uri.clone());
        });

        let response = router.dispatch(&request_for("/search?q=rust")).unwrap();
        assert_eq!(response.body(), b"/search?q=rust");
    }

    #[test]
    fn paths_are_not_normalized() {
        let mut router = Router::new();
        router.register("/a", |_request, _response| {});

        assert!(router.dispatch(&request_for("/a/")).is_none());
        assert!(router.dispatch(&request_for("/A")).is_none());
    }

    #[test]
    fn handler_reads_the_request_body() {
        let mut router = Router::new();
        router.register("/echo", |request, response| {
            response.set_body(request.body.clone().unwrap_or_default());
        });

        let raw = b"POST /echo HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello";
        let request = Request::parse(raw).unwrap();
        let response = router.dispatch(&request).unwrap();
        assert_eq!(response.body(), b"hello");
    }
}
