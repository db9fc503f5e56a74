use tracing::debug;

use crate::cmd;
use crate::error::ProvisionResult;
use crate::host::Host;

/// The machine `hostkit` itself runs on.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalHost;

impl LocalHost {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Host for LocalHost {
    fn name(&self) -> &'static str {
        "localhost"
    }

    fn run(&self, program: &str, args: &[&str]) -> ProvisionResult<String> {
        cmd::run(program, args)
    }

    fn succeeds(&self, program: &str, args: &[&str]) -> ProvisionResult<bool> {
        cmd::status(program, args)
    }

    fn write_file(&self, path: &str, content: &str) -> ProvisionResult<()> {
        debug!(path, bytes = content.len(), "writing file");
        std::fs::write(path, content)?;
        Ok(())
    }

    fn exists(&self, path: &str) -> ProvisionResult<bool> {
        Ok(std::fs::symlink_metadata(path).is_ok())
    }
}
