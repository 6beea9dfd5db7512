//! Run configuration

use fleet_shared::defaults;
use std::path::PathBuf;

/// Configuration for one fleet run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetConfig {
    /// Bridge executable, resolved on `PATH`
    pub bridge_program: String,
    /// Optional list of serials to connect before discovery
    pub allow_list: PathBuf,
    /// Command script broadcast to every device
    pub script: PathBuf,
    /// Root of the per-device `{output_device}` directories
    pub output_root: PathBuf,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            bridge_program: defaults::BRIDGE_PROGRAM.into(),
            allow_list: defaults::ALLOW_LIST_FILE.into(),
            script: defaults::SCRIPT_FILE.into(),
            output_root: defaults::OUTPUT_ROOT.into(),
        }
    }
}
