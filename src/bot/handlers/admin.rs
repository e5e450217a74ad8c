//! Admin gate for review and payout commands.

use crate::{bot::Context, errors::Result};
use tracing::warn;

/// Returns `true` if the author is a configured admin. Otherwise replies with a refusal and
/// returns `false`, so callers can simply `return Ok(())`.
pub async fn ensure_admin(ctx: Context<'_>) -> Result<bool> {
    let user_id = ctx.author().id.to_string();
    if ctx.data().config.is_admin(&user_id) {
        return Ok(true);
    }

    warn!(%user_id, command = %ctx.command().name, "Non-admin tried an admin command");
    ctx.say("❌ This command is restricted to admins.").await?;
    Ok(false)
}
