//! Value types exchanged across the host command-execution boundary.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ProcessError;

/// Options shared by both execution modes.
///
/// `env` entries are layered on top of the host's inherited environment.
/// Keys are unique per invocation because this is a map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandOptions {
    /// Working directory for the child (host's current directory if `None`).
    pub cwd: Option<PathBuf>,
    /// Extra environment variables for the child.
    pub env: HashMap<String, String>,
}

impl CommandOptions {
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set one environment variable, replacing any earlier value for `key`.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Options for run-to-completion execution.
pub type ExecOptions = CommandOptions;

/// Options for run-streaming execution.
pub type SpawnOptions = CommandOptions;

/// Aggregated outcome of a run-to-completion command.
///
/// A non-zero `errno` is the only failure signal; callers must inspect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub errno: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.errno == 0
    }
}

/// One of the two independent output channels of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputChannel {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// An event observed on a [`ChildProcess`](crate::process::ChildProcess).
///
/// `Exit` and `Error` are terminal: exactly one of them is delivered per
/// process and nothing follows it.
#[derive(Debug)]
pub enum ProcessEvent {
    /// One line of output (terminator stripped) on `channel`.
    Data { channel: OutputChannel, data: String },
    /// The process ran and was reaped with this status code.
    Exit { code: i32 },
    /// The process could not be launched or supervised.
    Error { cause: ProcessError },
}

impl ProcessEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exit { .. } | Self::Error { .. })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
