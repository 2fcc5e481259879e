//! Lifecycle state of a spawned process and well-known exit codes.

use crate::types::ProcessEvent;

/// `errno` reported when the command could not be started at all.
pub const ERRNO_LAUNCH_FAILED: i32 = 127;

/// `errno` reported when a command exceeded the configured exec timeout.
pub const ERRNO_TIMED_OUT: i32 = 124;

/// `errno` reported when the outcome of a started command is unknown
/// (waiting on it failed, or it ended without a code or signal).
pub const ERRNO_UNKNOWN: i32 = -1;

/// Offset added to the signal number when a process is killed by a signal.
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// `Running -> {Exited(code) | Errored}`. Both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Exited(i32),
    Errored,
}

impl ProcessState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Apply an observed event. Terminal states never change.
    pub fn advance(self, event: &ProcessEvent) -> Self {
        match (self, event) {
            (Self::Running, ProcessEvent::Exit { code }) => Self::Exited(*code),
            (Self::Running, ProcessEvent::Error { .. }) => Self::Errored,
            (state, _) => state,
        }
    }
}

/// Translate a finished process's status into the `errno` convention.
pub fn exit_code(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return SIGNAL_EXIT_BASE + signal;
        }
    }
    ERRNO_UNKNOWN
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use crate::types::OutputChannel;

    #[test]
    fn running_to_exited() {
        let state = ProcessState::Running.advance(&ProcessEvent::Exit { code: 3 });
        assert_eq!(state, ProcessState::Exited(3));
        assert!(state.is_terminal());
    }

    #[test]
    fn running_to_errored() {
        let state = ProcessState::Running.advance(&ProcessEvent::Error {
            cause: ProcessError::Abandoned,
        });
        assert_eq!(state, ProcessState::Errored);
    }

    #[test]
    fn data_keeps_running() {
        let state = ProcessState::Running.advance(&ProcessEvent::Data {
            channel: OutputChannel::Stdout,
            data: "line".into(),
        });
        assert_eq!(state, ProcessState::Running);
        assert!(!state.is_terminal());
    }

    #[test]
    fn terminal_states_are_sticky() {
        let exited = ProcessState::Exited(0);
        assert_eq!(
            exited.advance(&ProcessEvent::Error {
                cause: ProcessError::Abandoned
            }),
            exited
        );
        assert_eq!(
            ProcessState::Errored.advance(&ProcessEvent::Exit { code: 0 }),
            ProcessState::Errored
        );
    }

    #[test]
    fn well_known_codes_are_distinct() {
        assert_ne!(ERRNO_LAUNCH_FAILED, ERRNO_TIMED_OUT);
        assert!(ERRNO_LAUNCH_FAILED < SIGNAL_EXIT_BASE);
    }

    #[cfg(unix)]
    #[test]
    fn signal_status_maps_above_base() {
        use std::os::unix::process::ExitStatusExt;
        // Raw wait status for "killed by SIGKILL (9)".
        let status = std::process::ExitStatus::from_raw(9);
        assert_eq!(exit_code(status), SIGNAL_EXIT_BASE + 9);
    }

    #[cfg(unix)]
    #[test]
    fn normal_status_passes_code_through() {
        use std::os::unix::process::ExitStatusExt;
        // Raw wait status for "exited with code 2".
        let status = std::process::ExitStatus::from_raw(2 << 8);
        assert_eq!(exit_code(status), 2);
    }
}
