//! find command - look up a uid by attribute value

use super::{CommandContext, CommandOutcome};
use anyhow::Result;
use keyward_core::USER_KIND;

pub async fn execute(ctx: &CommandContext, attribute: &str, value: &str) -> Result<CommandOutcome> {
    match ctx.store.find(USER_KIND, attribute, value).await? {
        Some(uid) => {
            println!("{}", uid);
            Ok(CommandOutcome::Success)
        }
        None => {
            eprintln!("No user with {} = {}", attribute, value);
            Ok(CommandOutcome::Negative)
        }
    }
}
