use std::path::PathBuf;

use ksu_bridge_core::error::CoreError;
use ksu_bridge_core::HostConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for a bridge bound to the loopback
/// interface. Override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `127.0.0.1`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `300`). Does not apply to
    /// `POST /api/v1/exec`, which is bounded by `EXEC_TIMEOUT_SECS` instead.
    pub request_timeout_secs: u64,
    /// Directory holding the static web UI (default: `webroot`).
    pub webui_dir: PathBuf,
    /// Bearer token required on `/api/v1` routes when set.
    pub api_token: Option<String>,
    /// Settings for the local command-execution backend.
    pub host_runtime: HostConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `127.0.0.1`                |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `300`                      |
    /// | `WEBUI_DIR`            | `webroot`                  |
    /// | `API_TOKEN`            | unset                      |
    ///
    /// `HOST_SHELL` and `EXEC_TIMEOUT_SECS` are read by
    /// [`HostConfig::from_env`].
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".into());

        let port: u16 = parse_or(&lookup, "PORT", 3000)?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 300)?;

        let webui_dir = lookup("WEBUI_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("webroot"));

        let api_token = lookup("API_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let host_runtime = HostConfig::from_lookup(&lookup)?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            webui_dir,
            api_token,
            host_runtime,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, CoreError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            CoreError::Validation(format!(
                "{key} must be a valid {}, got '{raw}'",
                std::any::type_name::<T>()
            ))
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
