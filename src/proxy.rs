use tracing::{info, warn};

use crate::config::NginxSettings;
use crate::domain::Domain;
use crate::error::{ProvisionError, ProvisionResult};
use crate::host::Host;
use crate::nginx::NginxConfig;

/// Locations of one nginx site on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePaths {
    pub available: String,
    pub enabled: String,
    pub staged: String,
    pub backup: String,
    pub default_enabled: String,
}

impl SitePaths {
    #[must_use]
    pub fn new(settings: &NginxSettings, domain: &Domain) -> Self {
        let available_dir = settings.sites_available.trim_end_matches('/');
        let enabled_dir = settings.sites_enabled.trim_end_matches('/');
        let available = format!("{available_dir}/{domain}");
        Self {
            enabled: format!("{enabled_dir}/{domain}"),
            staged: format!("{available}.staged"),
            backup: format!("{available}.bak"),
            default_enabled: format!("{enabled_dir}/{}", settings.default_site),
            available,
        }
    }
}

/// Writes, activates and reloads the nginx site for a domain.
pub struct ProxyConfigurator<'a> {
    host: &'a dyn Host,
    settings: &'a NginxSettings,
}

impl<'a> ProxyConfigurator<'a> {
    #[must_use]
    pub const fn new(host: &'a dyn Host, settings: &'a NginxSettings) -> Self {
        Self { host, settings }
    }

    /// Stage `config`, promote it, and reload nginx once
    /// `nginx -t` accepts it. A rejected configuration is rolled
    /// back and nginx is left untouched.
    pub fn apply(&self, domain: &Domain, config: &NginxConfig) -> ProvisionResult<()> {
        let paths = SitePaths::new(self.settings, domain);

        eprintln!("Writing nginx site {}", paths.available);
        self.host.write_file(&paths.staged, &config.to_string())?;

        let had_previous = self.host.exists(&paths.available)?;
        if had_previous {
            self.sh("cp", &["-p", &paths.available, &paths.backup])?;
        }
        self.sh("mv", &["-f", &paths.staged, &paths.available])?;
        self.sh("ln", &["-sfn", &paths.available, &paths.enabled])?;

        if let Err(e) = self.validate() {
            self.roll_back(&paths, had_previous)?;
            return Err(e);
        }

        if had_previous {
            self.sh("rm", &["-f", &paths.backup])?;
        }

        if paths.default_enabled != paths.enabled && self.host.exists(&paths.default_enabled)? {
            eprintln!("Removing default site {}", paths.default_enabled);
            self.sh("rm", &["-f", &paths.default_enabled])?;
        }

        self.reload()?;
        info!(%domain, "nginx site applied");
        eprintln!("✅ nginx configured for {domain}");
        Ok(())
    }

    /// `nginx -t`.
    pub fn validate(&self) -> ProvisionResult<()> {
        self.host.run("nginx", &["-t"]).map(|_| ()).map_err(|e| {
            ProvisionError::ProxyConfig(format!("nginx rejected the configuration: {}", e.reason()))
        })
    }

    /// Reload nginx when it runs, start it otherwise.
    pub fn reload(&self) -> ProvisionResult<()> {
        let action = if self.is_active()? { "reload" } else { "start" };
        self.host
            .run("systemctl", &[action, "nginx"])
            .map(|_| ())
            .map_err(|e| ProvisionError::ProxyConfig(format!("cannot {action} nginx: {}", e.reason())))
    }

    pub fn is_active(&self) -> ProvisionResult<bool> {
        self.host.succeeds("systemctl", &["is-active", "--quiet", "nginx"])
    }

    fn roll_back(&self, paths: &SitePaths, had_previous: bool) -> ProvisionResult<()> {
        if had_previous {
            warn!(path = %paths.available, "restoring previous nginx site");
            self.sh("mv", &["-f", &paths.backup, &paths.available])?;
        } else {
            warn!(path = %paths.available, "removing rejected nginx site");
            self.sh("rm", &["-f", &paths.enabled, &paths.available])?;
        }
        Ok(())
    }

    fn sh(&self, program: &str, args: &[&str]) -> ProvisionResult<()> {
        self.host
            .run(program, args)
            .map(|_| ())
            .map_err(|e| ProvisionError::ProxyConfig(e.reason()))
    }
}
