use std::time::Duration;

use crate::cmd;
use crate::error::{ProvisionError, ProvisionResult};
use crate::host::{Host, shell_quote};
use crate::retry::{self, RetryPolicy};

/// A remote VM reached over `ssh`.
pub struct SshHost {
    host: String,
    user: String,
    key: Option<String>,
    label: String,
}

impl SshHost {
    #[must_use]
    pub fn new(host: &str, user: &str) -> Self {
        Self {
            host: host.to_string(),
            user: user.to_string(),
            key: None,
            label: format!("{user}@{host}"),
        }
    }

    /// Parse a `user@host` target. The user defaults to `root`.
    pub fn parse(target: &str) -> ProvisionResult<Self> {
        let (user, host) = target.rsplit_once('@').unwrap_or(("root", target));
        if user.is_empty() || host.is_empty() {
            return Err(ProvisionError::Usage(format!(
                "invalid SSH target '{target}', expected user@host"
            )));
        }
        Ok(Self::new(host, user))
    }

    #[must_use]
    pub fn with_key(mut self, key_path: &str) -> Self {
        self.key = Some(key_path.to_string());
        self
    }

    /// Wait for SSH to become available on the remote host.
    pub fn wait_for_ready(&self, policy: RetryPolicy) -> ProvisionResult<()> {
        retry::poll(policy, &format!("SSH on {}", self.label), || {
            self.exec("true").is_ok()
        })
        .map(|_| ())
        .map_err(|e| {
            ProvisionError::SshFailed(format!(
                "SSH not ready after {} attempts on {}",
                e.attempts, self.host
            ))
        })
    }

    fn exec(&self, command: &str) -> ProvisionResult<String> {
        let args = self.build_ssh_args(command);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        cmd::run("ssh", &refs)
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", CONNECT_TIMEOUT.as_secs()),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ];
        if let Some(key) = &self.key {
            args.push("-i".to_string());
            args.push(key.clone());
        }
        args.push(self.destination());
        args.push(command.to_string());
        args
    }
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Join a program and its arguments into one remote command line.
#[must_use]
pub fn remote_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}

impl Host for SshHost {
    fn name(&self) -> &str {
        &self.label
    }

    fn run(&self, program: &str, args: &[&str]) -> ProvisionResult<String> {
        self.exec(&remote_command(program, args))
    }

    fn succeeds(&self, program: &str, args: &[&str]) -> ProvisionResult<bool> {
        let args = self.build_ssh_args(&remote_command(program, args));
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        cmd::status("ssh", &refs)
    }

    fn write_file(&self, path: &str, content: &str) -> ProvisionResult<()> {
        let command = format!("cat > {}", shell_quote(path));
        let args = self.build_ssh_args(&command);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        cmd::run_with_stdin("ssh", &refs, content.as_bytes())?;
        Ok(())
    }
}
