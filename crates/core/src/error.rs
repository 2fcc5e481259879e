/// Domain errors raised outside the command-execution contract itself
/// (configuration and request validation, access control).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// Cause carried by the terminal `Error` event of a spawned process.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The host could not start the program at all (missing executable,
    /// bad working directory, permission denied).
    #[error("failed to launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process started but waiting on it failed.
    #[error("I/O error while supervising process: {0}")]
    Io(#[from] std::io::Error),

    /// The event source went away without reporting how the process ended.
    #[error("process supervisor stopped before reporting a result")]
    Abandoned,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
