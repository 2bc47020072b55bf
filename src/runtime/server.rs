//! The accept loop: connections in, wire bytes out.
//!
//! One request is processed per connection (`Connection: close`); the
//! router and static-file root are shared read-only across the spawned
//! connection tasks. Every failure on the way to a response degrades to a
//! well-formed error response — a connection is never dropped without a
//! status line.

use std::{
    io,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use bytes::BytesMut;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time::{sleep, timeout},
};
use tracing::{debug, error, warn};

use crate::{
    conf::ServerConfig,
    fileserve,
    http::{
        request::{HttpError, Request},
        response::{Response, html_response},
        status,
    },
    router::Router,
};

/// Largest request (head plus body) accepted before answering 413.
pub const MAX_REQUEST_LEN: usize = 1_000_000;

/// How long a client may take to deliver its full request.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Value of the `Server` header on every response.
const SERVER_NAME: &str = concat!("tinyserve/", env!("CARGO_PKG_VERSION"));

/// A handle to a running server instance.
#[derive(Debug)]
pub struct Server {
    server_state: Arc<ServerState>,
}

/// Shared state of a running server: the listener, the closed flag, and the
/// read-only dispatch inputs.
#[derive(Debug)]
struct ServerState {
    listener: TcpListener,
    closed: AtomicBool,
    router: Arc<Router>,
    root: Option<PathBuf>,
}

impl Server {
    /// Stops accepting new connections.
    pub fn close(&self) {
        self.server_state.closed.store(true, Ordering::SeqCst);
    }

    /// The address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the local address cannot be determined.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.server_state.listener.local_addr()
    }
}

/// Binds the configured address and starts accepting connections.
///
/// # Errors
///
/// Returns an IO error when binding the TCP listener fails.
pub async fn serve(config: &ServerConfig, router: Arc<Router>) -> Result<Server, io::Error> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let state = Arc::new(ServerState {
        listener,
        closed: AtomicBool::new(false),
        router,
        root: config.root.clone(),
    });
    let state_for_task = Arc::clone(&state);
    let server = Server {
        server_state: state,
    };
    tokio::spawn(async move {
        state_for_task.listen().await;
    });
    Ok(server)
}

impl ServerState {
    /// Accepts connections until the server is closed, spawning one task
    /// per connection.
    async fn listen(self: Arc<Self>) {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                debug!("server closed, no longer accepting connections");
                return;
            }
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted connection");
                    let state = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = handle(stream, &state.router, state.root.as_deref()).await {
                            warn!("error handling connection: {e}");
                        }
                    });
                }
                Err(e) => {
                    if self.closed.load(Ordering::SeqCst) {
                        break;
                    }
                    error!("error accepting connection: {e}");
                    sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }
}

/// Processes one connection: read, parse, dispatch, write, close.
///
/// # Errors
///
/// Throws a `HttpError` only for IO failures while reading or writing; all
/// protocol-level failures are answered with an error response instead.
async fn handle(
    mut stream: TcpStream,
    router: &Router,
    root: Option<&Path>,
) -> Result<(), HttpError> {
    let mut response = match timeout(READ_TIMEOUT, read_request(&mut stream)).await {
        Ok(Ok(request)) => {
            debug!(method = %request.method, uri = %request.uri, "dispatching request");
            respond(router, root, &request)
        }
        Ok(Err(HttpError::RequestTooLarge)) => html_response(
            413,
            "<html><body><h1>Payload Too Large</h1></body></html>",
        ),
        Ok(Err(e)) => {
            warn!("rejecting request: {e}");
            html_response(400, "<html><body><h1>Bad Request</h1></body></html>")
        }
        Err(_elapsed) => html_response(
            408,
            "<html><body><h1>Request Timeout</h1></body></html>",
        ),
    };

    response.set_header("Server", SERVER_NAME);
    response.set_header("Connection", "close");

    // A handler that set a code outside the status table must still get a
    // status line onto the wire.
    if status::reason_phrase(response.status()).is_none() {
        error!(
            code = response.status(),
            "handler produced an unknown status code"
        );
        response = html_response(
            500,
            "<html><body><h1>Internal Server Error</h1></body></html>",
        );
        response.set_header("Server", SERVER_NAME);
        response.set_header("Connection", "close");
    }

    write_response(&mut stream, &response).await
}

/// Produces the response for a parsed request: router first, then static
/// files, then 404.
fn respond(router: &Router, root: Option<&Path>, request: &Request) -> Response {
    if let Some(response) = router.dispatch(request) {
        return response;
    }

    if let Some(root) = root
        && let Some(file) = fileserve::resolve(root, &request.uri)
    {
        return file.into_response();
    }

    html_response(404, "<html><body><h1>Not Found</h1></body></html>")
}

/// Reads from the stream until the buffer holds one complete request.
///
/// The buffer is re-parsed after every read: an incomplete head or body
/// keeps the loop reading, any other parse failure is final. EOF before the
/// message completes surfaces the pending parse error.
async fn read_request(stream: &mut TcpStream) -> Result<Request, HttpError> {
    let mut buffer = BytesMut::with_capacity(1024);

    loop {
        let read = stream.read_buf(&mut buffer).await?;

        if buffer.len() > MAX_REQUEST_LEN {
            return Err(HttpError::RequestTooLarge);
        }

        match Request::parse(&buffer) {
            Ok(request) => return Ok(request),
            Err(HttpError::UnexpectedEOF | HttpError::InvalidBodyLength) if read > 0 => {}
            Err(e) => return Err(e),
        }
    }
}

/// Writes the three response sections in wire order: status line, header
/// block, body.
async fn write_response(stream: &mut TcpStream, response: &Response) -> Result<(), HttpError> {
    let start_line = response.render_start_line()?;
    stream.write_all(start_line.as_bytes()).await?;
    stream.write_all(&response.render_headers()).await?;
    stream.write_all(response.render_body()).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, sync::Arc, time::Duration};

    use reqwest::Client;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::serve;
    use crate::{conf::ServerConfig, router::Router};

    fn test_config(root: Option<PathBuf>) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            root,
        }
    }

    fn test_router() -> Router {
        let mut router = Router::new();
        router.register("/", |_request, response| {
            response.set_status(200);
            response.set_header("Content-Type", "text/html");
            response.set_body("<h1>Hello World!</h1>");
        });
        router.register("/echo", |request, response| {
            response.set_status(200);
            response.set_header("Content-Type", "application/octet-stream");
            response.set_body(request.body.clone().unwrap_or_default());
        });
        router.register("/broken", |_request, response| {
            response.set_status(299);
        });
        router
    }

    fn test_client() -> Client {
        Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn registered_route_answers_ok() {
        let server = serve(&test_config(None), Arc::new(test_router()))
            .await
            .expect("Failed to start server");
        let port = server.local_addr().unwrap().port();

        let resp = test_client()
            .get(format!("http://127.0.0.1:{port}/"))
            .send()
            .await
            .expect("Request failed");

        assert!(resp.status().is_success());
        assert_eq!(resp.text().await.unwrap(), "<h1>Hello World!</h1>");
        server.close();
    }

    #[tokio::test]
    async fn unknown_path_answers_not_found() {
        let server = serve(&test_config(None), Arc::new(test_router()))
            .await
            .expect("Failed to start server");
        let port = server.local_addr().unwrap().port();

        let resp = test_client()
            .get(format!("http://127.0.0.1:{port}/missing"))
            .send()
            .await
            .expect("Request failed");

        assert_eq!(resp.status().as_u16(), 404);
        server.close();
    }

    #[tokio::test]
    async fn post_body_round_trips_through_the_echo_route() {
        let server = serve(&test_config(None), Arc::new(test_router()))
            .await
            .expect("Failed to start server");
        let port = server.local_addr().unwrap().port();

        let resp = test_client()
            .post(format!("http://127.0.0.1:{port}/echo"))
            .body("flavor: dark mode")
            .send()
            .await
            .expect("Request failed");

        assert!(resp.status().is_success());
        assert_eq!(resp.text().await.unwrap(), "flavor: dark mode");
        server.close();
    }

    #[tokio::test]
    async fn static_file_is_served_with_its_content_type() {
        let root = std::env::temp_dir().join("tinyserve-server-static");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("index.html"), "<h1>static</h1>").unwrap();

        let server = serve(&test_config(Some(root)), Arc::new(test_router()))
            .await
            .expect("Failed to start server");
        let port = server.local_addr().unwrap().port();

        let resp = test_client()
            .get(format!("http://127.0.0.1:{port}/index.html"))
            .send()
            .await
            .expect("Request failed");

        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/html"
        );
        assert_eq!(resp.text().await.unwrap(), "<h1>static</h1>");
        server.close();
    }

    #[tokio::test]
    async fn malformed_request_answers_bad_request() {
        let server = serve(&test_config(None), Arc::new(test_router()))
            .await
            .expect("Failed to start server");
        let port = server.local_addr().unwrap().port();

        let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .expect("Failed to connect");
        stream
            .write_all(b"BREW /coffee HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let raw = String::from_utf8_lossy(&raw);
        assert!(
            raw.starts_with("HTTP/1.1 400 Bad Request\r\n"),
            "unexpected response: {raw}"
        );
        server.close();
    }

    #[tokio::test]
    async fn unknown_handler_status_degrades_to_internal_server_error() {
        let server = serve(&test_config(None), Arc::new(test_router()))
            .await
            .expect("Failed to start server");
        let port = server.local_addr().unwrap().port();

        let resp = test_client()
            .get(format!("http://127.0.0.1:{port}/broken"))
            .send()
            .await
            .expect("Request failed");

        assert_eq!(resp.status().as_u16(), 500);
        server.close();
    }

    #[tokio::test]
    async fn server_works_concurrently() {
        const CONCURRENT_REQUESTS: usize = 20;

        let server = serve(&test_config(None), Arc::new(test_router()))
            .await
            .expect("Failed to start server");
        let port = server.local_addr().unwrap().port();
        let client = test_client();

        let tasks: Vec<_> = (0..CONCURRENT_REQUESTS)
            .map(|_| {
                let client = client.clone();
                let url = format!("http://127.0.0.1:{port}/");
                tokio::spawn(async move {
                    let resp = client.get(&url).send().await.expect("Request failed");
                    resp.status()
                })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;
        for status in results {
            assert!(status.unwrap().is_success());
        }
        server.close();
    }
}
