//! Host command-execution domain logic.
//!
//! Defines the [`HostRuntime`](host::HostRuntime) capability a web front end
//! calls into (`exec`, `spawn`, full screen, toast), the value types that
//! cross that boundary, and [`LocalHost`](local::LocalHost), the adapter that
//! runs commands on this machine with `tokio::process`.

pub mod config;
pub mod error;
pub mod host;
pub mod local;
pub mod process;
pub mod status;
pub mod types;

pub use config::HostConfig;
pub use host::{HostRuntime, PresentationSink};
pub use local::LocalHost;
pub use process::{ChildProcess, OutputSender, ProcessEventSender};
pub use types::{CommandOptions, ExecOptions, ExecResult, OutputChannel, ProcessEvent, SpawnOptions};
