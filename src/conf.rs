//! Server configuration.
//!
//! Settings come from three layers, later ones overriding earlier ones:
//! built-in defaults, an optional `tinyserve.toml` next to the working
//! directory, and `TINYSERVE_*` environment variables (e.g.
//! `TINYSERVE_PORT=8080`).

use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Port the server binds when none is configured.
pub const DEFAULT_PORT: u16 = 9090;

/// Runtime settings for one server instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub host: String,
    /// Port the listener binds to. Port 0 asks the OS for a free port.
    pub port: u16,
    /// Directory static files are served from; `None` disables file serving.
    pub root: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            root: None,
        }
    }
}

/// Loads the configuration from file and environment over the defaults.
///
/// # Errors
///
/// Returns a `ConfigError` when a source cannot be read or a value cannot
/// be deserialized into [`ServerConfig`].
pub fn load() -> Result<ServerConfig, ConfigError> {
    Config::builder()
        .add_source(File::with_name("tinyserve").required(false))
        .add_source(Environment::with_prefix("TINYSERVE"))
        .build()?
        .try_deserialize()
}
