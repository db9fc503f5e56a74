use tracing::{debug, info};

use crate::config::CertScope;
use crate::domain::Domain;
use crate::error::{ProvisionError, ProvisionResult};
use crate::host::Host;
use crate::nginx::TlsFiles;

/// Obtains certificates through `certbot` and checks that renewal is
/// scheduled by the OS.
pub struct CertificateProvisioner<'a> {
    host: &'a dyn Host,
    letsencrypt_dir: &'a str,
}

impl<'a> CertificateProvisioner<'a> {
    #[must_use]
    pub const fn new(host: &'a dyn Host, letsencrypt_dir: &'a str) -> Self {
        Self {
            host,
            letsencrypt_dir,
        }
    }

    /// Whether certbot already holds a certificate for `domain`.
    pub fn exists(&self, domain: &Domain) -> ProvisionResult<bool> {
        let tls = TlsFiles::letsencrypt(self.letsencrypt_dir, domain);
        self.host.exists(&tls.certificate)
    }

    /// Request a certificate, or renew it when close to expiry.
    ///
    /// certbot runs with the nginx authenticator only; the site
    /// configuration is rendered by hostkit afterwards.
    pub fn issue_or_renew(
        &self,
        domain: &Domain,
        scope: CertScope,
        email: Option<&str>,
    ) -> ProvisionResult<()> {
        let names = match scope {
            CertScope::ApexOnly => vec![domain.to_string()],
            CertScope::ApexAndWww => vec![domain.to_string(), domain.www_alias()],
        };
        eprintln!("Requesting certificate for {}...", names.join(", "));

        let args = certbot_args(&names, email);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.host
            .run("certbot", &refs)
            .map_err(|e| ProvisionError::Certificate(format!("certbot failed: {}", e.reason())))?;

        if !self.exists(domain)? {
            return Err(ProvisionError::Certificate(format!(
                "certbot succeeded but no certificate was found for {domain}"
            )));
        }

        info!(%domain, ?scope, "certificate in place");
        eprintln!("✅ Certificate ready for {domain}");
        Ok(())
    }

    /// Fail unless a certbot renewal timer is registered and active.
    pub fn ensure_renewal_timer(&self) -> ProvisionResult<String> {
        let listing = self
            .host
            .run("systemctl", &["list-timers", "--all", "--no-legend", "--plain"])
            .map_err(|e| ProvisionError::Certificate(format!("cannot list timers: {}", e.reason())))?;

        for unit in renewal_timer_units(&listing) {
            debug!(unit, "checking renewal timer");
            if self.host.succeeds("systemctl", &["is-active", "--quiet", unit])? {
                eprintln!("✅ Renewal timer {unit} active");
                return Ok(unit.to_string());
            }
        }

        Err(ProvisionError::RenewalTimerMissing)
    }
}

/// Arguments for a non-interactive `certbot certonly --nginx` run.
#[must_use]
pub fn certbot_args(names: &[String], email: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = [
        "certonly",
        "--nginx",
        "--non-interactive",
        "--agree-tos",
        "--keep-until-expiring",
        "--expand",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    match email {
        Some(email) => {
            args.push("-m".to_string());
            args.push(email.to_string());
        }
        None => args.push("--register-unsafely-without-email".to_string()),
    }

    for name in names {
        args.push("-d".to_string());
        args.push(name.clone());
    }
    args
}

/// Timer units from `systemctl list-timers --no-legend` whose name
/// mentions certbot (`certbot.timer`, `snap.certbot.renew.timer`).
#[must_use]
pub fn renewal_timer_units(listing: &str) -> Vec<&str> {
    listing
        .lines()
        .flat_map(str::split_whitespace)
        .filter(|word| {
            std::path::Path::new(word)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("timer"))
                && word.contains("certbot")
        })
        .collect()
}
