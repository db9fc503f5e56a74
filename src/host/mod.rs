pub mod local;
pub mod ssh;

use crate::error::ProvisionResult;

pub use local::LocalHost;
pub use ssh::SshHost;

/// A machine the provisioning steps act on.
///
/// Every mutation of package database, containers, nginx files and
/// certificates goes through this trait, so a step never touches
/// global state directly.
pub trait Host {
    /// Human readable name used in progress output.
    fn name(&self) -> &str;

    /// Run a program and capture its stdout. Fails on a non-zero
    /// exit code.
    fn run(&self, program: &str, args: &[&str]) -> ProvisionResult<String>;

    /// Run a program and report whether it exited successfully.
    fn succeeds(&self, program: &str, args: &[&str]) -> ProvisionResult<bool>;

    /// Write `content` to `path`, replacing any existing file.
    fn write_file(&self, path: &str, content: &str) -> ProvisionResult<()>;

    /// Whether `path` exists. Dangling symlinks count as existing.
    fn exists(&self, path: &str) -> ProvisionResult<bool> {
        self.succeeds("test", &["-e", path, "-o", "-L", path])
    }
}

/// Quote a single argument for a POSIX shell.
#[must_use]
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
