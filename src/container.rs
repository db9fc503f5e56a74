use serde::Deserialize;
use tracing::info;

use crate::config::ContainerSettings;
use crate::error::{ProvisionError, ProvisionResult};
use crate::host::Host;

/// The single application container hostkit manages.
///
/// # Example
///
/// ```
/// use hostkit::ContainerSpec;
///
/// let spec = ContainerSpec::new("registry/app:1.0");
///
/// assert_eq!(spec.name, "app");
/// assert_eq!(spec.port_mapping(), "7860:7860");
/// assert_eq!(spec.restart_policy, "unless-stopped");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub host_port: u16,
    pub container_port: u16,
    pub restart_policy: String,
}

impl ContainerSpec {
    #[must_use]
    pub fn new(image: &str) -> Self {
        Self::from_settings(image, &ContainerSettings::default())
    }

    #[must_use]
    pub fn from_settings(image: &str, settings: &ContainerSettings) -> Self {
        Self {
            name: settings.name.clone(),
            image: image.to_string(),
            host_port: settings.host_port,
            container_port: settings.container_port,
            restart_policy: settings.restart_policy.clone(),
        }
    }

    #[must_use]
    pub fn port_mapping(&self) -> String {
        format!("{}:{}", self.host_port, self.container_port)
    }

    /// Arguments for `docker run`.
    #[must_use]
    pub fn run_args(&self) -> Vec<String> {
        vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "--restart".to_string(),
            self.restart_policy.clone(),
            "-p".to_string(),
            self.port_mapping(),
            self.image.clone(),
        ]
    }
}

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunningContainer {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Names", default)]
    pub names: String,
    #[serde(rename = "Image", default)]
    pub image: String,
}

/// Parse `docker ps --format '{{json .}}'` output.
pub fn parse_ps(output: &str) -> ProvisionResult<Vec<RunningContainer>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(ProvisionError::from))
        .collect()
}

/// Guarantees single-application occupancy of the host.
pub struct ContainerRunner<'a> {
    host: &'a dyn Host,
}

impl<'a> ContainerRunner<'a> {
    #[must_use]
    pub const fn new(host: &'a dyn Host) -> Self {
        Self { host }
    }

    /// Containers currently running, whatever their name or image.
    pub fn running(&self) -> ProvisionResult<Vec<RunningContainer>> {
        let output = self
            .docker(&["ps", "--no-trunc", "--format", "{{json .}}"])
            .map_err(|e| container_error("cannot list containers", &e))?;
        parse_ps(&output)
    }

    /// Replace whatever runs on the host with one container for
    /// `spec`.
    pub fn deploy(&self, spec: &ContainerSpec) -> ProvisionResult<()> {
        self.stop_all()?;
        self.remove_stale(&spec.name)?;

        eprintln!("Pulling {}...", spec.image);
        self.docker(&["pull", &spec.image])
            .map_err(|e| container_error(&format!("cannot pull {}", spec.image), &e))?;

        eprintln!("Starting container '{}' on port {}...", spec.name, spec.host_port);
        let args = spec.run_args();
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let id = self
            .docker(&refs)
            .map_err(|e| container_error(&format!("cannot start {}", spec.name), &e))?;

        info!(name = %spec.name, image = %spec.image, %id, "container started");
        eprintln!("✅ Container '{}' running ({})", spec.name, spec.port_mapping());
        Ok(())
    }

    /// Stop then remove every running container.
    pub fn stop_all(&self) -> ProvisionResult<()> {
        let running = self.running()?;
        if running.is_empty() {
            eprintln!("No running containers");
            return Ok(());
        }

        for container in &running {
            eprintln!(
                "Stopping {} ({})",
                if container.names.is_empty() {
                    &container.id
                } else {
                    &container.names
                },
                container.image
            );
        }

        let ids: Vec<&str> = running.iter().map(|c| c.id.as_str()).collect();

        let mut stop = vec!["stop"];
        stop.extend(&ids);
        self.docker(&stop)
            .map_err(|e| container_error("cannot stop containers", &e))?;

        let mut rm = vec!["rm"];
        rm.extend(&ids);
        self.docker(&rm)
            .map_err(|e| container_error("cannot remove containers", &e))?;

        Ok(())
    }

    /// Remove a stopped container that still holds `name`.
    fn remove_stale(&self, name: &str) -> ProvisionResult<()> {
        let filter = format!("name=^{name}$");
        let stale = self
            .docker(&["ps", "-aq", "--filter", &filter])
            .map_err(|e| container_error("cannot list containers", &e))?;
        if stale.is_empty() {
            return Ok(());
        }

        eprintln!("Removing stopped container '{name}'");
        self.docker(&["rm", "-f", name])
            .map_err(|e| container_error(&format!("cannot remove {name}"), &e))?;
        Ok(())
    }

    fn docker(&self, args: &[&str]) -> ProvisionResult<String> {
        self.host.run("docker", args)
    }
}

fn container_error(what: &str, err: &ProvisionError) -> ProvisionError {
    ProvisionError::Container(format!("{what}: {}", err.reason()))
}
