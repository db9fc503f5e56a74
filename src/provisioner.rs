use tracing::info;

use crate::certificate::CertificateProvisioner;
use crate::config::{RunConfig, Settings};
use crate::container::{ContainerRunner, ContainerSpec};
use crate::domain::Domain;
use crate::error::ProvisionResult;
use crate::host::Host;
use crate::nginx::{NginxConfig, SiteTemplate};
use crate::packages::PackageInstaller;
use crate::probe::HttpProbe;
use crate::proxy::{ProxyConfigurator, SitePaths};
use crate::readiness::ReadinessVerifier;

/// Runs the provisioning steps against one host, in order, stopping
/// at the first failure. Nothing is rolled back.
pub struct Provisioner<'a> {
    host: &'a dyn Host,
    probe: &'a dyn HttpProbe,
    settings: Settings,
}

impl<'a> Provisioner<'a> {
    #[must_use]
    pub fn new(host: &'a dyn Host, probe: &'a dyn HttpProbe) -> Self {
        Self {
            host,
            probe,
            settings: Settings::default(),
        }
    }

    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Execute the whole workflow for `config`.
    pub fn run(&self, config: &RunConfig) -> ProvisionResult<()> {
        eprintln!("==> Provisioning {}", self.host.name());

        step("Packages");
        PackageInstaller::new(self.host).ensure_all(&self.settings.packages)?;

        if let Some(image) = &config.image {
            step("Container");
            let spec = ContainerSpec::from_settings(image, &self.settings.container);
            ContainerRunner::new(self.host).deploy(&spec)?;
        }

        if let Some(domain) = &config.domain {
            self.secure_site(config, domain)?;

            step("Verification");
            let verifier = ReadinessVerifier::new(self.probe, self.settings.readiness.policy());
            verifier.wait_until_ready(domain)?;
            verifier.verify_redirects(domain, config.cert_scope())?;
        }

        info!(host = self.host.name(), "provisioning complete");
        eprintln!();
        eprintln!("🎉 {}", summary(config, &self.settings));
        Ok(())
    }

    fn secure_site(&self, config: &RunConfig, domain: &Domain) -> ProvisionResult<()> {
        let template = self.template(config, domain);
        let proxy = ProxyConfigurator::new(self.host, &self.settings.nginx);
        let certs = CertificateProvisioner::new(self.host, &self.settings.letsencrypt_dir);

        step("Reverse proxy");
        let has_certificate = certs.exists(domain)?;
        info!(%domain, has_certificate, "rendering nginx site");
        proxy.apply(
            domain,
            &template.render(has_certificate, config.pre_cert_variant()),
        )?;

        step("Certificate");
        let email = config.email.as_deref().or(self.settings.email.as_deref());
        certs.issue_or_renew(domain, config.cert_scope(), email)?;
        proxy.apply(domain, &template.post_certificate())?;
        certs.ensure_renewal_timer()?;
        Ok(())
    }

    fn template<'t>(&'t self, config: &RunConfig, domain: &'t Domain) -> SiteTemplate<'t> {
        SiteTemplate {
            domain,
            upstream_port: self.settings.container.host_port,
            letsencrypt_dir: &self.settings.letsencrypt_dir,
            scope: config.cert_scope(),
        }
    }

    /// Describe what [`run`](Self::run) would do without touching
    /// the host.
    #[must_use]
    pub fn dry_run(&self, config: &RunConfig) -> String {
        let mut out = String::new();
        out.push_str(&format!("# Plan for {}\n", self.host.name()));

        let mut n = 0;
        let mut line = |text: String| {
            n += 1;
            out.push_str(&format!("{n}. {text}\n"));
        };

        line(format!(
            "Ensure packages: {}",
            self.settings.packages.join(", ")
        ));

        if let Some(image) = &config.image {
            let spec = ContainerSpec::from_settings(image, &self.settings.container);
            line("Stop and remove all running containers".to_string());
            line(format!("Pull {}", spec.image));
            line(format!("docker {}", spec.run_args().join(" ")));
        }

        let mut configs = Vec::new();
        if let Some(domain) = &config.domain {
            let paths = SitePaths::new(&self.settings.nginx, domain);
            let names = if config.cert_scope().includes_www() {
                format!("{domain}, {}", domain.www_alias())
            } else {
                domain.to_string()
            };
            line(format!("Write {} and enable it", paths.available));
            line(format!("Request certificate for {names}"));
            line("Rewrite site with TLS termination and reload nginx".to_string());
            line("Check certbot renewal timer".to_string());
            line(format!(
                "Wait for {} ({} attempts, {}s apart)",
                domain.https_url(),
                self.settings.readiness.max_attempts,
                self.settings.readiness.interval_secs
            ));
            line("Verify redirects".to_string());

            let template = self.template(config, domain);
            configs.push((
                "pre-certificate",
                template.pre_certificate(config.pre_cert_variant()),
            ));
            configs.push(("post-certificate", template.post_certificate()));
        }

        for (label, nginx) in configs {
            out.push_str(&render_section(label, &nginx));
        }
        out
    }

    /// Print the managed container, nginx and renewal timer state.
    pub fn status(&self) -> ProvisionResult<()> {
        let name_filter = format!("name=^{}$", self.settings.container.name);
        let containers = self.host.run(
            "docker",
            &[
                "ps",
                "-a",
                "--filter",
                &name_filter,
                "--format",
                "{{.Names}}\t{{.Image}}\t{{.Status}}\t{{.Ports}}",
            ],
        )?;
        println!("Container:");
        if containers.is_empty() {
            println!("  (none)");
        }
        for row in containers.lines() {
            println!("  {row}");
        }

        let proxy = ProxyConfigurator::new(self.host, &self.settings.nginx);
        println!(
            "nginx: {}",
            if proxy.is_active()? { "active" } else { "inactive" }
        );

        let certs = CertificateProvisioner::new(self.host, &self.settings.letsencrypt_dir);
        match certs.ensure_renewal_timer() {
            Ok(unit) => println!("Renewal timer: {unit}"),
            Err(e) => println!("Renewal timer: {e}"),
        }
        Ok(())
    }
}

fn step(name: &str) {
    eprintln!();
    eprintln!("==> {name}");
}

fn render_section(label: &str, nginx: &NginxConfig) -> String {
    format!("\n--- nginx site ({label}) ---\n{nginx}")
}

fn summary(config: &RunConfig, settings: &Settings) -> String {
    match (&config.image, &config.domain) {
        (Some(image), Some(domain)) => format!(
            "{image} is live at {} (container '{}', port {})",
            domain.https_url(),
            settings.container.name,
            settings.container.host_port
        ),
        (Some(image), None) => format!(
            "{image} running as '{}' on port {}",
            settings.container.name, settings.container.host_port
        ),
        (None, Some(domain)) => format!("{} configured and verified", domain.https_url()),
        (None, None) => "nothing to do".to_string(),
    }
}
