use std::time::Duration;

use crate::error::CoreError;

/// Default shell used to interpret `exec` command strings.
pub const DEFAULT_SHELL: &str = "sh";

/// Settings for [`LocalHost`](crate::local::LocalHost).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Shell invoked as `<shell> -c <command>` by `exec`.
    pub shell: String,
    /// Kill `exec` commands running longer than this (`None` disables).
    pub exec_timeout: Option<Duration>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            exec_timeout: None,
        }
    }
}

impl HostConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var             | Default            |
    /// |---------------------|--------------------|
    /// | `HOST_SHELL`        | `sh`               |
    /// | `EXEC_TIMEOUT_SECS` | unset (`0` = off)  |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let shell = lookup("HOST_SHELL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SHELL.to_string());

        let exec_timeout = match lookup("EXEC_TIMEOUT_SECS") {
            None => None,
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    CoreError::Validation(format!(
                        "EXEC_TIMEOUT_SECS must be a valid u64, got '{raw}'"
                    ))
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
        };

        Ok(Self {
            shell,
            exec_timeout,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
