// ABOUTME: Runs external commands for process-based shippers.
// ABOUTME: Standard streams are forwarded; a non-zero exit becomes a ShipError.

use std::process::Stdio;

use tokio::process::Command;

use crate::engine::ShipError;

/// Build a `bash -c <script> -- <tag>` invocation.
///
/// Inside the script `$1` is the deploy tag; it is also exported as
/// `SHIPIT_VERSION`.
pub fn bash(script: &str, tag: &str) -> Command {
    let mut cmd = Command::new("bash");
    cmd.arg("-c")
        .arg(script)
        .arg("--")
        .arg(tag)
        .env("SHIPIT_VERSION", tag);
    cmd
}

/// Run `cmd` to completion with inherited stdio.
///
/// `shown` names the command in errors and logs.
pub async fn run(mut cmd: Command, shown: &str) -> Result<(), ShipError> {
    tracing::debug!(command = shown, "running command");

    let status = cmd
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|source| ShipError::Spawn {
            program: shown.to_string(),
            source,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(ShipError::CommandFailed {
            command: shown.to_string(),
            status,
        })
    }
}
