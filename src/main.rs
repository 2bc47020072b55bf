//! # tinyserve
//!
//! This binary crate provides a HTTP server built on top of the library in
//! this crate: routes are registered once at startup, unrouted requests fall
//! through to static files when a root directory is configured, and
//! everything else answers 404.
//!
//! Refer to the library documentation for the reusable components.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use tinyserve::{conf, router::Router, runtime::server::serve};

/// Registers the built-in demo routes.
fn build_router() -> Router {
    let mut router = Router::new();

    router.register("/", |_request, response| {
        response.set_status(200);
        response.set_header("Content-Type", "text/html");
        response.set_body("<h1>Hello World!</h1>");
    });

    router.register("/test", |_request, response| {
        response.set_status(200);
        response.set_header("Content-Type", "text/html");
        response.set_body("<h1>This is the test action</h1>");
    });

    router
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = conf::load()?;
    let router = Arc::new(build_router());

    let server = serve(&config, router).await?;
    info!(host = %config.host, port = server.local_addr()?.port(), root = ?config.root, "server running");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    server.close();
    Ok(())
}
