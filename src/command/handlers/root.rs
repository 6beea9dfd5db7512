//! Root command handler

use super::HandlerContext;
use crate::bridge::ElevateResult;
use crate::command::CommandResult;
use fleet_shared::LinkState;

/// Handle `root`
///
/// Never fails the run. Unless the daemon was already root the link is
/// marked down and stays down until an explicit `connect`.
pub async fn handle_root(ctx: &HandlerContext, link: &mut LinkState) -> CommandResult {
    let result = ctx.bridge.elevate(&ctx.serial).await;
    link.on_elevated(result == ElevateResult::AlreadyRoot);

    CommandResult::Completed {
        message: match result {
            ElevateResult::AlreadyRoot => "already root".into(),
            ElevateResult::Elevated => "elevated, connection reset".into(),
            ElevateResult::Failed => "no response to root, connection reset".into(),
        },
    }
}
