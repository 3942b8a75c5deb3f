//! Credential prompting for commands that require authentication.
//! Mirrors the original client's username/no-echo-password prompt.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Prompt for a username (echoed) and password (not echoed), returning
/// them in the order the wire protocol expects them appended to a
/// command line: `<...args> <username> <password>`.
pub async fn prompt(stdin: &mut BufReader<tokio::io::Stdin>) -> Result<(String, String)> {
    println!("Enter Username:");
    let mut username = String::new();
    stdin.read_line(&mut username).await.context("reading username")?;
    let username = username.trim().to_string();

    // `rpassword` reads directly from the controlling terminal, not
    // from our buffered stdin reader, so it coexists fine with the
    // async stdin loop above. It is a blocking call, so it runs on a
    // dedicated blocking thread rather than stalling the runtime.
    let password = tokio::task::spawn_blocking(|| rpassword::prompt_password("Enter Password: "))
        .await
        .context("password prompt task panicked")?
        .context("reading password")?;

    Ok((username, password))
}
