//! Session orchestration
//!
//! This module handles:
//! - Connecting allow-listed network devices before the run
//! - Rediscovering the fleet once they are attached
//! - Broadcasting the command script and waiting for every device

mod orchestrator;

pub use orchestrator::SessionOrchestrator;
