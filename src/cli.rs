use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::cmd;
use crate::config::{RunConfig, Settings};
use crate::error::{ProvisionError, ProvisionResult};
use crate::host::{Host, LocalHost, SshHost};
use crate::probe::CurlProbe;
use crate::provisioner::Provisioner;
use crate::retry::RetryPolicy;

#[derive(Debug, Parser)]
#[command(name = "hostkit", version)]
#[command(about = "Provision a VM: packages, one app container, nginx and TLS")]
pub struct Cli {
    /// Log every command hostkit runs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Full installer: any combination of image and domain
    Install {
        /// Container image to run
        #[arg(long)]
        image: Option<String>,

        /// Apex domain to serve, with its www alias
        #[arg(long)]
        domain: Option<String>,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Simple installer: image and apex domain, no www alias
    Simple {
        /// Container image to run
        image: String,

        /// Apex domain to serve
        domain: String,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Show container, nginx and renewal timer state
    Status {
        /// Settings file (YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Inspect a remote VM instead of this machine
        #[arg(long, value_name = "USER@HOST")]
        ssh: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Contact address for the certificate authority
    #[arg(long)]
    pub email: Option<String>,

    /// Settings file (YAML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Provision a remote VM instead of this machine
    #[arg(long, value_name = "USER@HOST")]
    pub ssh: Option<String>,

    /// Print the plan and generated nginx sites, change nothing
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Dispatch the parsed command.
    pub fn execute(&self) -> ProvisionResult<()> {
        match &self.command {
            Command::Install {
                image,
                domain,
                target,
            } => {
                let config = RunConfig::full(image.as_deref(), domain.as_deref())?;
                install(config, target)
            }
            Command::Simple {
                image,
                domain,
                target,
            } => install(RunConfig::simple(image, domain)?, target),
            Command::Status { config, ssh } => {
                let settings = load_settings(config.as_deref())?;
                let host = open_host(ssh.as_deref(), true)?;
                let probe = CurlProbe::new();
                Provisioner::new(host.as_ref(), &probe)
                    .settings(settings)
                    .status()
            }
        }
    }
}

fn install(config: RunConfig, target: &TargetArgs) -> ProvisionResult<()> {
    let settings = load_settings(target.config.as_deref())?;
    let config = config.email(target.email.clone());
    let host = open_host(target.ssh.as_deref(), !target.dry_run)?;
    let probe = CurlProbe::new();
    let provisioner = Provisioner::new(host.as_ref(), &probe).settings(settings);

    if target.dry_run {
        eprintln!("=== Dry run: no changes will be made ===");
        print!("{}", provisioner.dry_run(&config));
        return Ok(());
    }

    check_prerequisites(&config, target.ssh.is_some())?;
    provisioner.run(&config)
}

/// Local tools the run needs before anything on the host changes.
fn check_prerequisites(config: &RunConfig, over_ssh: bool) -> ProvisionResult<()> {
    let mut needed = Vec::new();
    if over_ssh {
        needed.push("ssh");
    }
    if config.domain.is_some() {
        needed.push("curl");
    }

    match needed.into_iter().find(|p| !cmd::command_exists(p)) {
        Some(missing) => Err(ProvisionError::CommandNotFound(format!(
            "{missing} (needed on this machine)"
        ))),
        None => Ok(()),
    }
}

fn load_settings(path: Option<&Path>) -> ProvisionResult<Settings> {
    path.map_or_else(|| Ok(Settings::default()), Settings::load)
}

const SSH_READY: RetryPolicy = RetryPolicy::new(3, Duration::from_secs(5));

fn open_host(ssh: Option<&str>, connect: bool) -> ProvisionResult<Box<dyn Host>> {
    let Some(target) = ssh else {
        return Ok(Box::new(LocalHost::new()));
    };

    let host = SshHost::parse(target)?;
    if connect {
        host.wait_for_ready(SSH_READY)?;
    }
    Ok(Box::new(host))
}
