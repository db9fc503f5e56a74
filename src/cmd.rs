use std::io::Write;
use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::error::{ProvisionError, ProvisionResult};

/// Run a command and capture its output. Fails if the command
/// returns a non-zero exit code.
pub fn run(program: &str, args: &[&str]) -> ProvisionResult<String> {
    let output = spawn(program, args, None)?;
    finish(program, args, &output)
}

/// Run a command and report whether it exited successfully.
/// Only a failure to spawn the program is an error.
pub fn status(program: &str, args: &[&str]) -> ProvisionResult<bool> {
    let output = spawn(program, args, None)?;
    debug!(
        command = %format_command(program, args),
        status = %output.status,
        "status probe"
    );
    Ok(output.status.success())
}

/// Run a command that pipes its stdin from a byte slice.
pub fn run_with_stdin(
    program: &str,
    args: &[&str],
    stdin_data: &[u8],
) -> ProvisionResult<String> {
    let output = spawn(program, args, Some(stdin_data))?;
    finish(program, args, &output)
}

/// Check if a command exists on PATH.
#[must_use]
pub fn command_exists(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

/// Render a command line for logs and error messages.
#[must_use]
pub fn format_command(program: &str, args: &[&str]) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(args.iter().map(|a| (*a).to_string()));
    parts.join(" ")
}

fn spawn(program: &str, args: &[&str], stdin_data: Option<&[u8]>) -> ProvisionResult<Output> {
    debug!(command = %format_command(program, args), "spawning");

    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin_data.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProvisionError::CommandNotFound(program.to_string())
            } else {
                ProvisionError::Io(e)
            }
        })?;

    if let (Some(data), Some(stdin)) = (stdin_data, child.stdin.as_mut()) {
        stdin.write_all(data)?;
    }
    drop(child.stdin.take());

    Ok(child.wait_with_output()?)
}

fn finish(program: &str, args: &[&str], output: &Output) -> ProvisionResult<String> {
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let command = format_command(program, args);
    debug!(%command, status = %output.status, %stderr, "command failed");
    Err(ProvisionError::CommandFailed {
        command,
        status: output.status,
        stderr,
    })
}
