//! Command handlers for different command kinds

mod link;
mod passthrough;
mod root;

pub use link::{handle_connect, handle_disconnect};
pub use passthrough::handle_passthrough;
pub use root::handle_root;

use crate::bridge::Bridge;
use std::sync::Arc;

/// Context passed to command handlers
#[derive(Clone)]
pub struct HandlerContext {
    pub serial: String,
    pub bridge: Arc<dyn Bridge>,
}
