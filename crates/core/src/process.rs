//! Live handle for a streaming (spawned) process and the sender side that
//! feeds it.
//!
//! [`ChildProcess::channel`] returns a [`ProcessEventSender`] and the
//! matching handle. Any host adapter drives the handle through the sender:
//! data lines go through cloned [`OutputSender`]s, and the terminal event is
//! sent by consuming the `ProcessEventSender`. Dropping it without a terminal
//! event delivers [`ProcessError::Abandoned`], so every handle observes
//! exactly one terminal event.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::error::ProcessError;
use crate::status::ProcessState;
use crate::types::{OutputChannel, ProcessEvent};

/// Capability handle for a process started with `spawn`.
///
/// Events come out in the order they were sent, which preserves emission
/// order within each output channel. After the terminal event the handle
/// yields nothing further, even if a stray sender is still alive.
#[derive(Debug)]
pub struct ChildProcess {
    pid: Option<u32>,
    state: ProcessState,
    receiver: mpsc::UnboundedReceiver<ProcessEvent>,
}

impl ChildProcess {
    /// Create a connected sender/handle pair in the `Running` state.
    pub fn channel() -> (ProcessEventSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            pid: None,
            state: ProcessState::Running,
            receiver: rx,
        };
        (ProcessEventSender { tx: Some(tx) }, handle)
    }

    /// Record the OS process id, if the process was actually started.
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Wait for the next event. Returns `None` once the terminal event has
    /// been observed.
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    fn observe(&mut self, event: ProcessEvent) -> ProcessEvent {
        self.state = self.state.advance(&event);
        if event.is_terminal() {
            self.receiver.close();
        }
        event
    }
}

impl Stream for ChildProcess {
    type Item = ProcessEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.state.is_terminal() {
            return Poll::Ready(None);
        }
        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(event)) => Poll::Ready(Some(this.observe(event))),
            // Every sender is gone without a terminal event. The
            // `ProcessEventSender` drop guard makes this unreachable in
            // practice, but the handle still has to end in a terminal state.
            Poll::Ready(None) => Poll::Ready(Some(this.observe(ProcessEvent::Error {
                cause: ProcessError::Abandoned,
            }))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Owner of a process's terminal event.
#[derive(Debug)]
pub struct ProcessEventSender {
    tx: Option<mpsc::UnboundedSender<ProcessEvent>>,
}

impl ProcessEventSender {
    /// A data-only sender for one output channel.
    pub fn output(&self, channel: OutputChannel) -> OutputSender {
        OutputSender {
            tx: self.tx.clone(),
            channel,
        }
    }

    /// Report that the process was reaped with `code`.
    pub fn exit(mut self, code: i32) {
        self.finish(ProcessEvent::Exit { code });
    }

    /// Report that the process could not be launched or supervised.
    pub fn error(mut self, cause: ProcessError) {
        self.finish(ProcessEvent::Error { cause });
    }

    fn finish(&mut self, event: ProcessEvent) {
        if let Some(tx) = self.tx.take() {
            // The handle may already be gone; nobody is left to tell.
            let _ = tx.send(event);
        }
    }
}

impl Drop for ProcessEventSender {
    fn drop(&mut self) {
        self.finish(ProcessEvent::Error {
            cause: ProcessError::Abandoned,
        });
    }
}

/// Sends data events for a single output channel.
#[derive(Debug, Clone)]
pub struct OutputSender {
    tx: Option<mpsc::UnboundedSender<ProcessEvent>>,
    channel: OutputChannel,
}

impl OutputSender {
    pub fn channel(&self) -> OutputChannel {
        self.channel
    }

    /// Send one line. Returns `false` when the handle no longer listens.
    pub fn send(&self, data: impl Into<String>) -> bool {
        match &self.tx {
            Some(tx) => tx
                .send(ProcessEvent::Data {
                    channel: self.channel,
                    data: data.into(),
                })
                .is_ok(),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
