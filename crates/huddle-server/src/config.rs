use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use huddle_api::files::DEFAULT_MAX_UPLOAD_BYTES;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub storage_dir: PathBuf,
    pub public_url: String,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("HUDDLE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("HUDDLE_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let host = lookup("HUDDLE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("HUDDLE_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("HUDDLE_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("HUDDLE_HOST must be an IP address")?;

        let max_upload_bytes = match lookup("HUDDLE_MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .parse()
                .context("HUDDLE_MAX_UPLOAD_BYTES must be a byte count")?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            jwt_secret,
            db_path: lookup("HUDDLE_DB_PATH")
                .unwrap_or_else(|| "huddle.db".into())
                .into(),
            addr,
            storage_dir: lookup("HUDDLE_STORAGE_DIR")
                .unwrap_or_else(|| "./uploads".into())
                .into(),
            public_url: lookup("HUDDLE_PUBLIC_URL")
                .unwrap_or_else(|| "http://localhost:3000".into()),
            max_upload_bytes,
        })
    }
}
