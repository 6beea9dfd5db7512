//! Connect and disconnect command handlers

use super::HandlerContext;
use crate::command::CommandResult;
use fleet_shared::{LinkAction, LinkState};

/// Handle `connect`
///
/// A device that cannot be reattached cannot run anything that follows, so
/// failure is fatal for the whole run.
pub async fn handle_connect(ctx: &HandlerContext, link: &mut LinkState) -> CommandResult {
    if link.on_connect() == LinkAction::Skip {
        return CommandResult::Skipped {
            message: "already connected".into(),
        };
    }

    if ctx.bridge.connect(&ctx.serial).await {
        link.mark_connected();
        CommandResult::Completed {
            message: "connected".into(),
        }
    } else {
        CommandResult::Fatal {
            message: "connect fail".into(),
        }
    }
}

/// Handle `disconnect`
pub async fn handle_disconnect(ctx: &HandlerContext, link: &mut LinkState) -> CommandResult {
    if link.on_disconnect() == LinkAction::Skip {
        let message = if link.auto_reconnect() {
            "auto-reconnect device, not disconnecting"
        } else {
            "already disconnected"
        };
        return CommandResult::Skipped {
            message: message.into(),
        };
    }

    if ctx.bridge.disconnect(&ctx.serial).await {
        link.mark_disconnected();
        CommandResult::Completed {
            message: "disconnected".into(),
        }
    } else {
        CommandResult::Fatal {
            message: "disconnect fail".into(),
        }
    }
}
