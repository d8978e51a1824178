//! hash-password command - produce a PHC hash for `password.password`

use super::{read_password, CommandOutcome};
use anyhow::{bail, Result};

pub async fn execute(password_stdin: bool) -> Result<CommandOutcome> {
    let password = read_password(password_stdin).await?;
    if password.is_empty() {
        bail!("refusing to hash an empty password");
    }

    println!("{}", keyward_crypto::hash_password(&password)?);
    Ok(CommandOutcome::Success)
}
