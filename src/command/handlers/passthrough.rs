//! Passthrough command handler

use super::HandlerContext;
use crate::command::CommandResult;
use fleet_shared::CommandLine;
use tracing::info;

/// Forward a command to the bridge tool for this device
pub async fn handle_passthrough(ctx: &HandlerContext, command: &CommandLine) -> CommandResult {
    match ctx.bridge.run_passthrough(&ctx.serial, command.as_str()).await {
        Ok(output) => {
            for line in output.output.lines().filter(|l| !l.trim().is_empty()) {
                info!("[{}] {}", ctx.serial, line);
            }
            match output.code {
                Some(0) => CommandResult::Completed {
                    message: "exit 0".into(),
                },
                Some(code) => CommandResult::Failed {
                    message: format!("exit {}", code),
                },
                None => CommandResult::Failed {
                    message: "terminated by signal".into(),
                },
            }
        }
        Err(e) => CommandResult::Failed {
            message: format!("{:#}", e),
        },
    }
}
