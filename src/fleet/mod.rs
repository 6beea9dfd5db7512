//! Fleet-level fan-out and fan-in
//!
//! This module handles:
//! - Discovering attached devices through the bridge
//! - Deduplicating them by full and short serial
//! - Broadcasting script lines to every device worker
//! - Collecting worker results and aborting on the first fatal error

mod registry;

pub use registry::FleetRegistry;
