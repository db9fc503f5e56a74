//! Provision a single VM for one containerized application.
//!
//! hostkit installs the OS packages it needs, runs exactly one
//! application container, puts nginx in front of it with a
//! Let's Encrypt certificate, and then proves the result from the
//! outside: the HTTPS endpoint answers, and plain HTTP and the `www`
//! alias all redirect to `https://<apex>`.
//!
//! # Overview
//!
//! A run is described by a [`RunConfig`] and executed by a
//! [`Provisioner`], which calls the steps in a fixed order:
//!
//! 1. [`PackageInstaller`] - `dpkg`/`apt-get`, skipping installed
//!    packages
//! 2. [`ContainerRunner`] - stop and remove every running container,
//!    pull, start one container named `app` on port 7860
//! 3. [`ProxyConfigurator`] - stage, validate and activate the nginx
//!    site rendered by [`SiteTemplate`]
//! 4. [`CertificateProvisioner`] - `certbot certonly --nginx`, then
//!    the TLS site and a renewal timer check
//! 5. [`ReadinessVerifier`] - poll the HTTPS endpoint, then check the
//!    redirects once
//!
//! The first failing step aborts the run. Steps act on a [`Host`]
//! (this machine or a VM over SSH) and probe through an
//! [`HttpProbe`], so they can be exercised against fakes.
//!
//! # Example
//!
//! ```rust,no_run
//! use hostkit::{CurlProbe, LocalHost, Provisioner, RunConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = RunConfig::full(Some("registry/app:1.0"), Some("example.com"))?
//!         .email(Some("ops@example.com".into()));
//!
//!     let host = LocalHost::new();
//!     let probe = CurlProbe::new();
//!     Provisioner::new(&host, &probe).run(&config)?;
//!     Ok(())
//! }
//! ```
//!
//! From the command line:
//!
//! ```sh
//! # Full installer: flags, apex and www
//! hostkit install --image registry/app:1.0 --domain example.com
//!
//! # Simple installer: positional, apex only
//! hostkit simple registry/app:1.0 example.com
//!
//! # Preview the plan and generated nginx sites
//! hostkit install --domain example.com --dry-run
//!
//! # Provision a remote VM
//! hostkit install --image registry/app:1.0 --ssh root@203.0.113.7
//! ```

// Allow noisy pedantic lints that don't add value for a
// provisioning tool crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod certificate;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod container;
pub mod domain;
pub mod error;
pub mod host;
pub mod nginx;
pub mod packages;
pub mod probe;
pub mod provisioner;
pub mod proxy;
pub mod readiness;
pub mod retry;

pub use certificate::CertificateProvisioner;
pub use config::{CertScope, InstallMode, PreCertVariant, RunConfig, Settings};
pub use container::{ContainerRunner, ContainerSpec};
pub use domain::Domain;
pub use error::{ProvisionError, ProvisionResult};
pub use host::{Host, LocalHost, SshHost};
pub use nginx::{NginxConfig, SiteTemplate};
pub use packages::PackageInstaller;
pub use probe::{CurlProbe, HttpProbe, ProbeResponse};
pub use provisioner::Provisioner;
pub use proxy::ProxyConfigurator;
pub use readiness::ReadinessVerifier;
pub use retry::RetryPolicy;
