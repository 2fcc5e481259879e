//! [`HostRuntime`] backed by processes on the local machine.
//!
//! `exec` runs `<shell> -c <command>`, captures both output streams in
//! full and folds every failure into `ExecResult::errno`. `spawn` starts the
//! program directly, forwards output line by line, and reports exactly one
//! terminal event once both pipes are drained and the child is reaped.
//!
//! `spawn` uses `tokio::spawn` and must be called from within a Tokio
//! runtime.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::config::HostConfig;
use crate::error::ProcessError;
use crate::host::{HostRuntime, PresentationSink};
use crate::process::{ChildProcess, OutputSender, ProcessEventSender};
use crate::status::{exit_code, ERRNO_LAUNCH_FAILED, ERRNO_TIMED_OUT, ERRNO_UNKNOWN};
use crate::types::{CommandOptions, ExecOptions, ExecResult, OutputChannel, SpawnOptions};

/// Maximum stdout or stderr size captured per stream by `exec` (10 MiB).
///
/// Output beyond the limit is discarded; the pipe is still drained so the
/// child never blocks on a full pipe.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Longest `spawn` output line delivered as a single `Data` event (1 MiB).
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// How long to wait for output readers after a timed-out child was killed.
const READER_GRACE: Duration = Duration::from_millis(200);

/// Host runtime that executes commands on this machine.
pub struct LocalHost<P> {
    config: HostConfig,
    presentation: P,
    full_screen: AtomicBool,
}

impl<P: PresentationSink> LocalHost<P> {
    pub fn new(config: HostConfig, presentation: P) -> Self {
        Self {
            config,
            presentation,
            full_screen: AtomicBool::new(false),
        }
    }

    /// Last full-screen state requested through this host.
    pub fn is_full_screen(&self) -> bool {
        self.full_screen.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<P: PresentationSink> HostRuntime for LocalHost<P> {
    async fn exec(&self, command: &str, options: ExecOptions) -> ExecResult {
        let mut cmd = Command::new(&self.config.shell);
        cmd.arg("-c").arg(command);
        apply_options(&mut cmd, &options);
        // `kill_on_drop(true)` ensures the child is killed if this future is
        // dropped mid-flight (e.g. the HTTP request is cancelled).
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout can take down background
        // descendants that inherited the pipes.
        #[cfg(unix)]
        cmd.process_group(0);

        let start = Instant::now();

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(command, shell = %self.config.shell, error = %e, "Failed to launch exec command");
                return ExecResult {
                    errno: ERRNO_LAUNCH_FAILED,
                    stdout: String::new(),
                    stderr: format!("failed to launch {}: {e}", self.config.shell),
                };
            }
        };

        let pid = child.id();
        tracing::debug!(command, ?pid, "Exec started");

        // Read both pipes in spawned tasks so we can still call `child.wait()`.
        let mut stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let mut stderr_task = tokio::spawn(read_stream(child.stderr.take()));

        // The deadline covers reaping the shell and reaching EOF on both
        // pipes; a descendant can hold a pipe open after the shell exits.
        let run = async {
            let status = child.wait().await;
            let stdout = collect_output(&mut stdout_task).await;
            let stderr = collect_output(&mut stderr_task).await;
            (status, stdout, stderr)
        };
        let finished = match self.config.exec_timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.ok(),
            None => Some(run.await),
        };

        let result = match finished {
            Some((Ok(status), stdout, stderr)) => ExecResult {
                errno: exit_code(status),
                stdout,
                stderr,
            },
            Some((Err(e), _, _)) => {
                tracing::error!(command, error = %e, "Failed waiting on exec command");
                ExecResult {
                    errno: ERRNO_UNKNOWN,
                    stdout: String::new(),
                    stderr: format!("failed waiting on command: {e}"),
                }
            }
            None => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                tracing::warn!(command, elapsed_ms, "Exec command timed out, killing");
                #[cfg(unix)]
                if let Some(pgid) = pid {
                    if let Err(e) = kill_process_group(pgid) {
                        tracing::warn!(command, pgid, error = %e, "Failed to kill process group");
                    }
                }
                // Reap the shell; it may already be gone.
                let _ = child.start_kill();
                let _ = child.wait().await;
                // Keep whatever output arrived within the grace period.
                let stdout = collect_output_within(stdout_task, READER_GRACE).await;
                let mut stderr = collect_output_within(stderr_task, READER_GRACE).await;
                stderr.push_str(&format!("command timed out after {elapsed_ms}ms\n"));
                ExecResult {
                    errno: ERRNO_TIMED_OUT,
                    stdout,
                    stderr,
                }
            }
        };

        tracing::debug!(
            command,
            errno = result.errno,
            duration_ms = start.elapsed().as_millis() as u64,
            "Exec finished"
        );
        result
    }

    fn spawn(&self, command: &str, args: &[String], options: SpawnOptions) -> ChildProcess {
        let mut cmd = Command::new(command);
        cmd.args(args);
        apply_options(&mut cmd, &options);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let (sender, handle) = ChildProcess::channel();

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                tracing::warn!(command, error = %source, "Failed to launch spawned process");
                sender.error(ProcessError::Launch {
                    command: command.to_string(),
                    source,
                });
                return handle;
            }
        };

        let pid = child.id();
        tracing::debug!(command, ?pid, "Process spawned");

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_lines(
                stdout,
                sender.output(OutputChannel::Stdout),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_lines(
                stderr,
                sender.output(OutputChannel::Stderr),
            )));
        }

        tokio::spawn(supervise(child, readers, sender, command.to_string()));

        handle.with_pid(pid)
    }

    fn full_screen(&self, enabled: bool) {
        self.full_screen.store(enabled, Ordering::Relaxed);
        self.presentation.full_screen(enabled);
    }

    fn toast(&self, message: &str) {
        self.presentation.toast(message);
    }
}

fn apply_options(cmd: &mut Command, options: &CommandOptions) {
    cmd.envs(&options.env);
    if let Some(dir) = &options.cwd {
        cmd.current_dir(dir);
    }
}

/// Send SIGKILL to every process in the group led by `pgid`.
#[cfg(unix)]
fn kill_process_group(pgid: u32) -> std::io::Result<()> {
    let pgid = libc::pid_t::try_from(pgid)
        .map_err(|_| std::io::Error::other(format!("pid {pgid} out of range")))?;
    // SAFETY: `killpg` only takes plain integers.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Wait for both output readers, reap the child, then send the single
/// terminal event.
async fn supervise(
    mut child: Child,
    readers: Vec<JoinHandle<()>>,
    sender: ProcessEventSender,
    command: String,
) {
    for reader in readers {
        if let Err(e) = reader.await {
            tracing::warn!(command = %command, error = %e, "Output reader task failed");
        }
    }

    match child.wait().await {
        Ok(status) => {
            let code = exit_code(status);
            tracing::debug!(command = %command, code, "Spawned process exited");
            sender.exit(code);
        }
        Err(e) => {
            tracing::error!(command = %command, error = %e, "Failed waiting on spawned process");
            sender.error(ProcessError::Io(e));
        }
    }
}

/// Forward `reader` to `out` one line at a time until end of file.
///
/// A line longer than [`MAX_LINE_BYTES`] is delivered in chunks of that size.
async fn forward_lines<R: AsyncRead + Unpin>(reader: R, out: OutputSender) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    // Set when the previous chunk was cut at the limit mid-line.
    let mut split = false;
    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut buf)
            .await;
        match read {
            Ok(0) => break,
            Ok(_) => {
                let terminated = buf.ends_with(b"\n");
                // The terminator of a line that was already flushed in full.
                let leftover = split && matches!(buf.as_slice(), b"\n" | b"\r\n");
                split = !terminated;
                if leftover {
                    continue;
                }
                // Keep draining after the handle is gone so the child never
                // blocks on a full pipe.
                out.send(decode_line(&buf));
            }
            Err(e) => {
                tracing::debug!(channel = %out.channel(), error = %e, "Output stream read error");
                break;
            }
        }
    }
}

/// Strip one trailing `\n` (and a preceding `\r`) and decode lossily.
fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

/// Read an entire output stream into a byte buffer, keeping at most
/// [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
        // Drain and discard anything past the cap.
        let _ = tokio::io::copy(&mut h, &mut tokio::io::sink()).await;
    }
    buf
}

async fn collect_output(task: &mut JoinHandle<Vec<u8>>) -> String {
    let bytes = task.await.unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

async fn collect_output_within(task: JoinHandle<Vec<u8>>, grace: Duration) -> String {
    let abort = task.abort_handle();
    match tokio::time::timeout(grace, task).await {
        Ok(joined) => String::from_utf8_lossy(&joined.unwrap_or_default()).into_owned(),
        Err(_) => {
            abort.abort();
            String::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use futures::StreamExt;

    use super::*;
    use crate::status::ProcessState;
    use crate::types::ProcessEvent;

    /// Presentation sink that remembers every request.
    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<String>>,
    }

    impl PresentationSink for RecordingSink {
        fn full_screen(&self, enabled: bool) {
            self.calls.lock().unwrap().push(format!("full_screen:{enabled}"));
        }

        fn toast(&self, message: &str) {
            self.calls.lock().unwrap().push(format!("toast:{message}"));
        }
    }

    fn host() -> LocalHost<RecordingSink> {
        LocalHost::new(HostConfig::default(), RecordingSink::default())
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Split collected events into (stdout lines, stderr lines, terminal).
    fn partition(events: Vec<ProcessEvent>) -> (Vec<String>, Vec<String>, Vec<ProcessEvent>) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut terminal = Vec::new();
        for event in events {
            match event {
                ProcessEvent::Data {
                    channel: OutputChannel::Stdout,
                    data,
                } => out.push(data),
                ProcessEvent::Data {
                    channel: OutputChannel::Stderr,
                    data,
                } => err.push(data),
                other => terminal.push(other),
            }
        }
        (out, err, terminal)
    }

    // -- exec ----------------------------------------------------------------

    #[tokio::test]
    async fn exec_echo_hi() {
        let result = host().exec("echo hi", ExecOptions::default()).await;
        assert_eq!(
            result,
            ExecResult {
                errno: 0,
                stdout: "hi\n".into(),
                stderr: String::new(),
            }
        );
    }

    #[tokio::test]
    async fn exec_false_reports_errno_one() {
        let result = host().exec("false", ExecOptions::default()).await;
        assert_eq!(result.errno, 1);
        assert_eq!(result.stdout, "");
        assert_eq!(result.stderr, "");
    }

    #[tokio::test]
    async fn exec_captures_stderr_and_exit_code() {
        let result = host()
            .exec("echo oops >&2; exit 42", ExecOptions::default())
            .await;
        assert_eq!(result.errno, 42);
        assert_eq!(result.stderr, "oops\n");
        assert!(!result.success());
    }

    #[tokio::test]
    async fn exec_unknown_command_is_in_band() {
        let result = host()
            .exec("definitely-not-a-real-command-xyz", ExecOptions::default())
            .await;
        assert_eq!(result.errno, ERRNO_LAUNCH_FAILED);
        assert!(!result.stderr.is_empty());
    }

    #[tokio::test]
    async fn exec_missing_shell_is_in_band() {
        let host = LocalHost::new(
            HostConfig {
                shell: "/nonexistent/shell".into(),
                exec_timeout: None,
            },
            RecordingSink::default(),
        );
        let result = host.exec("echo hi", ExecOptions::default()).await;
        assert_eq!(result.errno, ERRNO_LAUNCH_FAILED);
        assert!(result.stderr.contains("/nonexistent/shell"));
    }

    #[tokio::test]
    async fn exec_env_vars() {
        let options = ExecOptions::default().with_env("MY_VAR", "hello_world");
        let result = host().exec("echo $MY_VAR", options).await;
        assert_eq!(result.errno, 0);
        assert_eq!(result.stdout, "hello_world\n");
    }

    #[tokio::test]
    async fn exec_working_directory() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let options = ExecOptions::default().with_cwd(dir.path());
        let result = host().exec("pwd", options).await;
        assert_eq!(result.errno, 0);
        // The resolved path may differ due to symlinks, so canonicalize both.
        let expected = dir.path().canonicalize().expect("canonicalize dir");
        let actual = std::path::Path::new(result.stdout.trim())
            .canonicalize()
            .expect("canonicalize pwd");
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn exec_bad_working_directory_is_in_band() {
        let options = ExecOptions::default().with_cwd("/nonexistent/dir/for/exec");
        let result = host().exec("pwd", options).await;
        assert_eq!(result.errno, ERRNO_LAUNCH_FAILED);
    }

    #[tokio::test]
    async fn exec_timeout_kills_command() {
        let host = LocalHost::new(
            HostConfig {
                shell: "sh".into(),
                exec_timeout: Some(Duration::from_millis(200)),
            },
            RecordingSink::default(),
        );
        let start = Instant::now();
        let result = host.exec("exec sleep 30", ExecOptions::default()).await;
        assert_eq!(result.errno, ERRNO_TIMED_OUT);
        assert!(result.stderr.contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn exec_timeout_covers_descendants_holding_pipes() {
        let host = LocalHost::new(
            HostConfig {
                shell: "sh".into(),
                exec_timeout: Some(Duration::from_millis(500)),
            },
            RecordingSink::default(),
        );
        let start = Instant::now();
        // The shell exits at once; the background sleep keeps stdout open.
        let result = host.exec("sleep 4 & echo hi", ExecOptions::default()).await;
        assert_eq!(result.errno, ERRNO_TIMED_OUT);
        assert_eq!(result.stdout, "hi\n");
        assert!(result.stderr.contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exec_timeout_kills_background_descendants() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let marker = dir.path().join("survived");
        let host = LocalHost::new(
            HostConfig {
                shell: "sh".into(),
                exec_timeout: Some(Duration::from_millis(300)),
            },
            RecordingSink::default(),
        );
        let command = format!(
            "(sleep 1; touch {}) >/dev/null 2>&1 & sleep 30",
            marker.display()
        );
        let result = host.exec(&command, ExecOptions::default()).await;
        assert_eq!(result.errno, ERRNO_TIMED_OUT);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!marker.exists(), "background job outlived the timeout");
    }

    #[tokio::test]
    async fn exec_signal_maps_above_128() {
        let result = host().exec("kill -9 $$", ExecOptions::default()).await;
        assert_eq!(result.errno, 128 + 9);
    }

    #[tokio::test]
    async fn exec_lossy_utf8() {
        let result = host().exec(r"printf 'a\377b'", ExecOptions::default()).await;
        assert_eq!(result.errno, 0);
        assert_eq!(result.stdout, "a\u{FFFD}b");
    }

    #[tokio::test]
    async fn exec_does_not_block_other_tasks() {
        let host = std::sync::Arc::new(host());
        let slow = {
            let host = std::sync::Arc::clone(&host);
            tokio::spawn(async move { host.exec("sleep 1; echo slow", ExecOptions::default()).await })
        };
        let fast = host.exec("echo fast", ExecOptions::default()).await;
        assert_eq!(fast.stdout, "fast\n");
        assert!(!slow.is_finished());
        let slow = slow.await.expect("join");
        assert_eq!(slow.stdout, "slow\n");
    }

    // -- spawn ---------------------------------------------------------------

    #[tokio::test]
    async fn spawn_streams_lines_then_exits() {
        let child = host().spawn(
            "sh",
            &args(&["-c", "echo one; echo two; echo three"]),
            SpawnOptions::default(),
        );
        assert!(child.pid().is_some());

        let (out, err, terminal) = partition(child.collect().await);
        assert_eq!(out, vec!["one", "two", "three"]);
        assert!(err.is_empty());
        assert_eq!(terminal.len(), 1);
        assert_matches!(terminal[0], ProcessEvent::Exit { code: 0 });
    }

    #[tokio::test]
    async fn spawn_separates_channels_and_keeps_order() {
        let script = "for i in 1 2 3 4 5; do echo out$i; echo err$i >&2; done; exit 3";
        let child = host().spawn("sh", &args(&["-c", script]), SpawnOptions::default());

        let (out, err, terminal) = partition(child.collect().await);
        assert_eq!(out, vec!["out1", "out2", "out3", "out4", "out5"]);
        assert_eq!(err, vec!["err1", "err2", "err3", "err4", "err5"]);
        assert_eq!(terminal.len(), 1);
        assert_matches!(terminal[0], ProcessEvent::Exit { code: 3 });
    }

    #[tokio::test]
    async fn spawn_terminal_event_is_last() {
        let mut child = host().spawn("sh", &args(&["-c", "seq 1 200"]), SpawnOptions::default());

        let mut data = 0;
        let mut saw_terminal = false;
        while let Some(event) = child.next_event().await {
            assert!(!saw_terminal, "no event may follow the terminal event");
            if event.is_terminal() {
                saw_terminal = true;
            } else {
                data += 1;
            }
        }
        assert!(saw_terminal);
        assert_eq!(data, 200);
        assert_eq!(child.state(), ProcessState::Exited(0));
    }

    #[tokio::test]
    async fn spawn_missing_executable_defers_to_error_event() {
        let mut child = host().spawn(
            "/nonexistent/binary",
            &args(&["--flag"]),
            SpawnOptions::default(),
        );
        assert!(child.pid().is_none());
        assert_eq!(child.state(), ProcessState::Running);

        assert_matches!(
            child.next_event().await,
            Some(ProcessEvent::Error {
                cause: ProcessError::Launch { command, .. }
            }) if command == "/nonexistent/binary"
        );
        assert!(child.next_event().await.is_none());
        assert_eq!(child.state(), ProcessState::Errored);
    }

    #[tokio::test]
    async fn spawn_env_and_cwd() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let options = SpawnOptions::default()
            .with_cwd(dir.path())
            .with_env("GREETING", "hello");
        let child = host().spawn("sh", &args(&["-c", "echo $GREETING; pwd"]), options);

        let (out, _, terminal) = partition(child.collect().await);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], "hello");
        let expected = dir.path().canonicalize().expect("canonicalize dir");
        let actual = std::path::Path::new(&out[1])
            .canonicalize()
            .expect("canonicalize pwd");
        assert_eq!(actual, expected);
        assert_matches!(terminal[0], ProcessEvent::Exit { code: 0 });
    }

    #[tokio::test]
    async fn spawn_handles_missing_trailing_newline() {
        let child = host().spawn("printf", &args(&["a\\r\\nb"]), SpawnOptions::default());
        let (out, _, _) = partition(child.collect().await);
        assert_eq!(out, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn spawn_splits_overlong_lines() {
        let total = 2 * MAX_LINE_BYTES + 10;
        let script = format!("head -c {total} /dev/zero | tr '\\0' a");
        let child = host().spawn("sh", &args(&["-c", &script]), SpawnOptions::default());

        let (out, _, terminal) = partition(child.collect().await);
        let lengths: Vec<usize> = out.iter().map(String::len).collect();
        assert_eq!(lengths, vec![MAX_LINE_BYTES, MAX_LINE_BYTES, 10]);
        assert!(out.iter().all(|chunk| chunk.bytes().all(|b| b == b'a')));
        assert_matches!(terminal[0], ProcessEvent::Exit { code: 0 });
    }

    #[tokio::test]
    async fn spawn_line_at_limit_has_no_empty_tail() {
        let script = format!(
            "head -c {MAX_LINE_BYTES} /dev/zero | tr '\\0' a; echo; echo next"
        );
        let child = host().spawn("sh", &args(&["-c", &script]), SpawnOptions::default());

        let (out, _, _) = partition(child.collect().await);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), MAX_LINE_BYTES);
        assert_eq!(out[1], "next");
    }

    #[tokio::test]
    async fn dropping_handle_does_not_kill_process() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let marker = dir.path().join("done");
        let script = format!("sleep 0.2; touch {}", marker.display());
        let child = host().spawn("sh", &args(&["-c", &script]), SpawnOptions::default());
        drop(child);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(marker.exists());
    }

    // -- presentation --------------------------------------------------------

    #[test]
    fn presentation_requests_reach_sink() {
        let host = host();
        host.full_screen(true);
        host.toast("Saved");
        host.full_screen(false);

        assert!(!host.is_full_screen());
        let calls = host.presentation.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec!["full_screen:true", "toast:Saved", "full_screen:false"]
        );
    }

    #[test]
    fn full_screen_flag_tracks_last_request() {
        let host = host();
        assert!(!host.is_full_screen());
        host.full_screen(true);
        assert!(host.is_full_screen());
    }
}
