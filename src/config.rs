use std::env;
use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("SOCKET value {0:?} is not a valid listen address")]
    BadListenAddr(String),
}

const DEFAULT_ORIGINS: &[&str] = &["127.0.0.1", "file://", "localhost"];

/// Loads `.env` from the working directory into the process environment.
/// A missing file is not an error; deployments may set everything directly.
pub fn load_env_file() {
    let _ = dotenvy::dotenv();
}

/// Process configuration, read once from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Address the upgrade endpoint listens on (`SOCKET`).
    pub listen: SocketAddr,
    /// Base URL of the identity service (`API_BASE_URL`).
    pub api_base_url: String,
    /// Postgres connection string (`DB_SOURCE`).
    pub db_source: String,
    /// Origins allowed to open connections (`ALLOWED_ORIGINS`, comma
    /// separated; defaults to local development origins).
    pub allowed_origins: Vec<String>,
    /// Certificate and key paths; TLS is served when both `TLS_CERT` and
    /// `TLS_KEY` are set.
    pub tls: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_raw = require("SOCKET")?;
        let listen = listen_raw
            .parse()
            .map_err(|_| ConfigError::BadListenAddr(listen_raw))?;

        let allowed_origins = match env::var("ALLOWED_ORIGINS") {
            Ok(raw) => raw
                .split(',')
                .map(|entry| entry.trim().to_string())
                .filter(|entry| !entry.is_empty())
                .collect(),
            Err(_) => DEFAULT_ORIGINS.iter().map(|s| (*s).to_string()).collect(),
        };

        let tls = match (env::var("TLS_CERT"), env::var("TLS_KEY")) {
            (Ok(cert), Ok(key)) => Some((cert, key)),
            _ => None,
        };

        Ok(Self {
            listen,
            api_base_url: require("API_BASE_URL")?,
            db_source: require("DB_SOURCE")?,
            allowed_origins,
            tls,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}
