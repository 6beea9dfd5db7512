//! Device bridge invocation
//!
//! This module handles:
//! - Locating the bridge tool on `PATH`
//! - Spawning one bridge process per request
//! - Classifying bridge output into success or failure

pub mod adb;
#[cfg(test)]
pub mod mock;
pub mod traits;

pub use adb::AdbBridge;
pub use traits::{Bridge, ElevateResult};
