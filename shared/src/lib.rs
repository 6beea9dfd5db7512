//! fleet-adb Shared Types
//!
//! This crate provides the device listing parser, command script types and
//! worker state machine shared by the fleet runner and its tests.

pub mod listing;
pub mod script;
pub mod state_machine;

pub use listing::{parse_listing, DeviceIdentity, ListingError};
pub use script::{read_lines, read_optional_lines, CommandKind, CommandLine, ScriptError};
pub use state_machine::{LinkAction, LinkState, WorkerPhase};

/// Default locations and names used when nothing is configured
pub mod defaults {
    /// Bridge tool looked up on `PATH`
    pub const BRIDGE_PROGRAM: &str = "adb";

    /// Optional allow-list of serials to connect before discovery
    pub const ALLOW_LIST_FILE: &str = "device.txt";

    /// Command script broadcast to every device
    pub const SCRIPT_FILE: &str = "command.txt";

    /// Root of the per-device output directories
    pub const OUTPUT_ROOT: &str = "output";
}

/// Text the bridge tool prints that the runner reacts to
pub mod markers {
    /// Prefix of a successful `connect`
    pub const CONNECTED: &str = "connected to";

    /// Prefix printed when `connect` targets an already attached device
    pub const ALREADY_CONNECTED: &str = "already connected to";

    /// Prefix of a successful `disconnect`
    pub const DISCONNECTED: &str = "disconnected";

    /// Exact line printed by `root` when no restart happens
    pub const ALREADY_ROOT: &str = "adbd is already running as root";

    /// Header line of `devices -l`
    pub const LISTING_HEADER: &str = "List of devices";

    /// Daemon status lines (`* daemon started successfully`)
    pub const DAEMON_STATUS: &str = "*";

    /// Device state reported for unreachable devices
    pub const OFFLINE: &str = "offline";

    /// Serial prefix of emulator instances
    pub const EMULATOR_PREFIX: &str = "emulator";
}

/// Placeholder tokens recognised in command lines
pub mod placeholders {
    /// Replaced with the full device serial
    pub const DEVICE: &str = "{device}";

    /// Replaced with the device's output directory, created on demand
    pub const OUTPUT_DEVICE: &str = "{output_device}";
}
