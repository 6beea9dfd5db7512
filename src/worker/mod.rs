//! Per-device workers
//!
//! Each discovered device gets one worker. A worker owns an ordered queue
//! and a dedicated task that drains it, so commands for one device never
//! overlap while different devices run in parallel.

mod device;

pub use device::DeviceWorker;
