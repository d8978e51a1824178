//! verify command - check a user's password

use super::{read_password, CommandContext, CommandOutcome};
use anyhow::Result;
use keyward_auth::{CredentialVerifier, Credentials};

pub async fn execute(
    ctx: &CommandContext,
    identifier: &str,
    password_stdin: bool,
) -> Result<CommandOutcome> {
    let credentials = Credentials::password(read_password(password_stdin).await?);

    if ctx.verifier.verify(identifier, &credentials).await {
        println!("verified");
        Ok(CommandOutcome::Success)
    } else {
        // Same answer for every failure cause; the logs say which one.
        println!("rejected");
        Ok(CommandOutcome::Negative)
    }
}
