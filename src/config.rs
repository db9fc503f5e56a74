use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::Domain;
use crate::error::{ProvisionError, ProvisionResult};
use crate::retry::RetryPolicy;

/// Which installer entry point produced the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// `--image`/`--domain` flags, apex and `www` certificate.
    Full,
    /// Positional `<image> <domain>`, apex-only certificate.
    Simple,
}

/// Shape of the nginx site before a certificate exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreCertVariant {
    /// Port 80 only answers with permanent redirects to HTTPS.
    RedirectStub,
    /// Port 80 proxies straight to the application.
    PlainProxy,
}

/// Names a certificate is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertScope {
    ApexOnly,
    ApexAndWww,
}

impl CertScope {
    #[must_use]
    pub const fn includes_www(self) -> bool {
        matches!(self, Self::ApexAndWww)
    }
}

/// What a single invocation should provision.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub image: Option<String>,
    pub domain: Option<Domain>,
    pub mode: InstallMode,
    pub email: Option<String>,
}

impl RunConfig {
    /// Build a run from the full installer's optional flags. At
    /// least one of `image` and `domain` is required.
    pub fn full(image: Option<&str>, domain: Option<&str>) -> ProvisionResult<Self> {
        let image = image.map(str::trim).filter(|i| !i.is_empty());
        let domain = domain.map(str::trim).filter(|d| !d.is_empty());

        if image.is_none() && domain.is_none() {
            return Err(ProvisionError::Usage(
                "at least one of --image or --domain is required".into(),
            ));
        }

        Ok(Self {
            image: image.map(String::from),
            domain: domain.map(Domain::new).transpose()?,
            mode: InstallMode::Full,
            email: None,
        })
    }

    /// Build a run from the simple installer's positional arguments.
    pub fn simple(image: &str, domain: &str) -> ProvisionResult<Self> {
        let image = image.trim();
        if image.is_empty() {
            return Err(ProvisionError::Usage("image must not be empty".into()));
        }

        Ok(Self {
            image: Some(image.to_string()),
            domain: Some(Domain::new(domain)?),
            mode: InstallMode::Simple,
            email: None,
        })
    }

    #[must_use]
    pub fn email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    #[must_use]
    pub const fn pre_cert_variant(&self) -> PreCertVariant {
        match self.mode {
            InstallMode::Full => PreCertVariant::RedirectStub,
            InstallMode::Simple => PreCertVariant::PlainProxy,
        }
    }

    #[must_use]
    pub const fn cert_scope(&self) -> CertScope {
        match self.mode {
            InstallMode::Full => CertScope::ApexAndWww,
            InstallMode::Simple => CertScope::ApexOnly,
        }
    }
}

/// Tunables read from an optional YAML file. Every field has a
/// default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub packages: Vec<String>,
    pub container: ContainerSettings,
    pub nginx: NginxSettings,
    pub letsencrypt_dir: String,
    pub email: Option<String>,
    pub readiness: ReadinessSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerSettings {
    pub name: String,
    pub host_port: u16,
    pub container_port: u16,
    pub restart_policy: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NginxSettings {
    pub sites_available: String,
    pub sites_enabled: String,
    pub default_site: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadinessSettings {
    pub max_attempts: u32,
    pub interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            packages: ["nginx", "certbot", "python3-certbot-nginx", "docker.io", "curl"]
                .into_iter()
                .map(String::from)
                .collect(),
            container: ContainerSettings::default(),
            nginx: NginxSettings::default(),
            letsencrypt_dir: "/etc/letsencrypt".to_string(),
            email: None,
            readiness: ReadinessSettings::default(),
        }
    }
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            host_port: 7860,
            container_port: 7860,
            restart_policy: "unless-stopped".to_string(),
        }
    }
}

impl Default for NginxSettings {
    fn default() -> Self {
        Self {
            sites_available: "/etc/nginx/sites-available".to_string(),
            sites_enabled: "/etc/nginx/sites-enabled".to_string(),
            default_site: "default".to_string(),
        }
    }
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            max_attempts: 120,
            interval_secs: 2,
        }
    }
}

impl ReadinessSettings {
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.interval_secs))
    }
}

impl Settings {
    /// Parse settings from YAML text.
    pub fn from_yaml(text: &str) -> ProvisionResult<Self> {
        // An empty document deserializes to unit, not a map.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self = serde_yaml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a YAML file.
    pub fn load(path: &Path) -> ProvisionResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProvisionError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    fn validate(&self) -> ProvisionResult<()> {
        if self.container.name.trim().is_empty() {
            return Err(ProvisionError::Config("container.name is empty".into()));
        }
        if self.container.host_port == 0 || self.container.container_port == 0 {
            return Err(ProvisionError::Config("container ports must be non-zero".into()));
        }
        if self.packages.iter().any(|p| p.trim().is_empty()) {
            return Err(ProvisionError::Config("empty package name".into()));
        }
        Ok(())
    }
}
