//! Command executor - expands and dispatches one device's commands

use super::handlers::{self, HandlerContext};
use crate::bridge::Bridge;
use fleet_shared::{CommandKind, CommandLine, LinkState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Command ran successfully
    Completed { message: String },
    /// Nothing to do in the current link state
    Skipped { message: String },
    /// Command failed, the queue carries on
    Failed { message: String },
    /// Command failed and the whole run must stop
    Fatal { message: String },
}

/// Executes commands for a single device
///
/// Owned by the device's worker task, so the link state needs no locking.
pub struct CommandExecutor {
    ctx: HandlerContext,
    output_dir: PathBuf,
    link: LinkState,
}

impl CommandExecutor {
    /// Create a new command executor
    pub fn new(
        serial: impl Into<String>,
        auto_reconnect: bool,
        output_root: &Path,
        bridge: Arc<dyn Bridge>,
    ) -> Self {
        let serial = serial.into();
        Self {
            output_dir: output_root.join(&serial),
            ctx: HandlerContext { serial, bridge },
            link: LinkState::new(auto_reconnect),
        }
    }

    pub fn serial(&self) -> &str {
        &self.ctx.serial
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    /// Execute one command line
    pub async fn execute(&mut self, command: &CommandLine) -> CommandResult {
        let command = match self.expand(command).await {
            Ok(command) => command,
            Err(message) => {
                warn!("[{}] {}", self.ctx.serial, message);
                return CommandResult::Failed { message };
            }
        };

        info!("[{}] execute: {}", self.ctx.serial, command);

        let result = match command.kind() {
            CommandKind::Connect => handlers::handle_connect(&self.ctx, &mut self.link).await,
            CommandKind::Disconnect => {
                handlers::handle_disconnect(&self.ctx, &mut self.link).await
            }
            CommandKind::Root => handlers::handle_root(&self.ctx, &mut self.link).await,
            CommandKind::Passthrough => handlers::handle_passthrough(&self.ctx, &command).await,
        };

        match &result {
            CommandResult::Completed { message } => {
                debug!("[{}] completed: {}", self.ctx.serial, message)
            }
            CommandResult::Skipped { message } => {
                debug!("[{}] skipped: {}", self.ctx.serial, message)
            }
            CommandResult::Failed { message } => {
                warn!("[{}] {} failed: {}", self.ctx.serial, command, message)
            }
            CommandResult::Fatal { message } => error!("[{}] {}", self.ctx.serial, message),
        }

        result
    }

    /// Substitute placeholders, creating the output directory if referenced
    async fn expand(&self, command: &CommandLine) -> Result<CommandLine, String> {
        if command.uses_output_dir() {
            tokio::fs::create_dir_all(&self.output_dir)
                .await
                .map_err(|e| format!("cannot create {}: {}", self.output_dir.display(), e))?;
        }
        let output_dir = self.output_dir.to_string_lossy();
        Ok(command.expand(&self.ctx.serial, &output_dir))
    }
}
