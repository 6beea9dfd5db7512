//! Bridge trait abstraction for pluggable device bridge backends

use anyhow::Result;
use async_trait::async_trait;

/// Outcome of a privilege elevation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevateResult {
    /// The device daemon already ran as root, connection untouched
    AlreadyRoot,
    /// The daemon restarted (or said something unexpected)
    Elevated,
    /// The bridge produced nothing or could not be run
    Failed,
}

/// Result of a passthrough invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassthroughOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
    /// Stdout followed by stderr
    pub output: String,
}

/// Blocking-from-the-caller operations of the device bridge tool
///
/// Calls for one device must only be awaited from that device's worker so
/// bridge output of different devices never interleaves within a command.
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Attach a network device, true on success
    async fn connect(&self, serial: &str) -> bool;

    /// Detach a network device, true on success
    async fn disconnect(&self, serial: &str) -> bool;

    /// Raw lines of the device listing
    async fn list_devices(&self) -> Result<Vec<String>>;

    /// Restart the device daemon as root
    async fn elevate(&self, serial: &str) -> ElevateResult;

    /// Run `args` against one device
    async fn run_passthrough(&self, serial: &str, args: &str) -> Result<PassthroughOutput>;
}
