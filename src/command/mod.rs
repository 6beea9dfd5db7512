//! Command execution for a single device
//!
//! This module handles:
//! - Expanding `{device}` and `{output_device}` placeholders
//! - Dispatching control commands to their handlers
//! - Forwarding everything else to the bridge tool
//! - Classifying outcomes as completed, skipped, failed or fatal

mod executor;
pub mod handlers;

pub use executor::{CommandExecutor, CommandResult};
