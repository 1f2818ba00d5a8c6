use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

/// Runtime settings, read from `CUARK_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub session_ttl_days: i64,
    pub cookie_secure: bool,
    /// Allowed browser origin. `None` means permissive CORS.
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = env::var("CUARK_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env::var("CUARK_PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .context("CUARK_PORT must be a port number")?;
        let db_path = PathBuf::from(env::var("CUARK_DB_PATH").unwrap_or_else(|_| "cuark.db".into()));
        let session_ttl_days: i64 = env::var("CUARK_SESSION_TTL_DAYS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .context("CUARK_SESSION_TTL_DAYS must be a whole number of days")?;
        if session_ttl_days <= 0 {
            anyhow::bail!("CUARK_SESSION_TTL_DAYS must be positive");
        }
        let cookie_secure = env::var("CUARK_COOKIE_SECURE")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let cors_origin = env::var("CUARK_CORS_ORIGIN").ok().filter(|v| !v.is_empty());

        Ok(Self {
            host,
            port,
            db_path,
            session_ttl_days,
            cookie_secure,
            cors_origin,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
