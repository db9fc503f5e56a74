use std::cell::Cell;

use tracing::info;

use crate::error::{ProvisionError, ProvisionResult};
use crate::host::Host;

/// Installs OS packages through `apt-get`, skipping those `dpkg`
/// already reports as installed.
pub struct PackageInstaller<'a> {
    host: &'a dyn Host,
    index_refreshed: Cell<bool>,
}

impl<'a> PackageInstaller<'a> {
    #[must_use]
    pub fn new(host: &'a dyn Host) -> Self {
        Self {
            host,
            index_refreshed: Cell::new(false),
        }
    }

    /// Whether `dpkg` reports `package` as installed.
    pub fn is_installed(&self, package: &str) -> ProvisionResult<bool> {
        self.host.succeeds("dpkg", &["-s", package])
    }

    /// Install `package` unless it is already present.
    pub fn ensure_installed(&self, package: &str) -> ProvisionResult<()> {
        if self.is_installed(package)? {
            eprintln!("✅ {package} already installed");
            return Ok(());
        }

        self.refresh_index(package)?;

        eprintln!("Installing {package}...");
        self.host
            .run(
                "env",
                &[
                    "DEBIAN_FRONTEND=noninteractive",
                    "apt-get",
                    "install",
                    "-y",
                    package,
                ],
            )
            .map_err(|e| install_error(package, &e))?;
        info!(package, "installed");
        eprintln!("✅ {package} installed");
        Ok(())
    }

    /// Install every package in order, stopping at the first
    /// failure.
    pub fn ensure_all<S: AsRef<str>>(&self, packages: &[S]) -> ProvisionResult<()> {
        for package in packages {
            self.ensure_installed(package.as_ref())?;
        }
        Ok(())
    }

    fn refresh_index(&self, package: &str) -> ProvisionResult<()> {
        if self.index_refreshed.get() {
            return Ok(());
        }
        eprintln!("Refreshing package index...");
        self.host
            .run("env", &["DEBIAN_FRONTEND=noninteractive", "apt-get", "update"])
            .map_err(|e| install_error(package, &e))?;
        self.index_refreshed.set(true);
        Ok(())
    }
}

fn install_error(package: &str, err: &ProvisionError) -> ProvisionError {
    ProvisionError::PackageInstall {
        package: package.to_string(),
        reason: err.reason(),
    }
}
