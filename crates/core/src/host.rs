//! The host capability surface a web front end depends on.
//!
//! Two failure channels are part of the contract: [`HostRuntime::exec`]
//! reports failure only through [`ExecResult::errno`], and
//! [`HostRuntime::spawn`] only through the terminal `Error` event of the
//! returned [`ChildProcess`]. Neither returns a `Result`.

use async_trait::async_trait;

use crate::process::ChildProcess;
use crate::types::{ExecOptions, ExecResult, SpawnOptions};

/// Privileged command execution plus presentation toggles.
#[async_trait]
pub trait HostRuntime: Send + Sync {
    /// Run `command` through the host shell and wait for it to finish.
    ///
    /// Suspends only the calling task and resolves exactly once.
    async fn exec(&self, command: &str, options: ExecOptions) -> ExecResult;

    /// Start `command` with `args` and return immediately.
    ///
    /// Launch failures are delivered as the handle's terminal `Error` event,
    /// never raised here.
    fn spawn(&self, command: &str, args: &[String], options: SpawnOptions) -> ChildProcess;

    /// Enter or leave full-screen presentation.
    fn full_screen(&self, enabled: bool);

    /// Show a transient notification.
    fn toast(&self, message: &str);
}

/// Receiver of presentation requests on behalf of a [`HostRuntime`].
pub trait PresentationSink: Send + Sync {
    fn full_screen(&self, enabled: bool);

    fn toast(&self, message: &str);
}

impl<T: PresentationSink + ?Sized> PresentationSink for std::sync::Arc<T> {
    fn full_screen(&self, enabled: bool) {
        (**self).full_screen(enabled);
    }

    fn toast(&self, message: &str) {
        (**self).toast(message);
    }
}
