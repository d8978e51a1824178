//! show command - print a redacted user record

use super::{CommandContext, CommandOutcome};
use anyhow::{Context, Result};

pub async fn execute(ctx: &CommandContext, uid: &str, json: bool) -> Result<CommandOutcome> {
    let Some(record) = ctx.store.load_user(uid).await? else {
        eprintln!("No such user: {}", uid);
        return Ok(CommandOutcome::Negative);
    };

    let redacted = record.redacted();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&redacted).context("failed to render record")?
        );
    } else {
        print!(
            "{}",
            serde_yaml::to_string(&redacted).context("failed to render record")?
        );
    }

    Ok(CommandOutcome::Success)
}
