//! In-memory stand-ins for a VM and the public internet.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use hostkit::{Domain, Host, HttpProbe, ProbeResponse, ProvisionError, ProvisionResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub running: bool,
    pub ports: String,
    pub restart: String,
}

#[derive(Debug, Default)]
pub struct HostState {
    pub commands: Vec<String>,
    pub installed: BTreeSet<String>,
    pub broken_packages: BTreeSet<String>,
    pub apt_updates: u32,
    pub containers: Vec<FakeContainer>,
    pub next_id: u32,
    pub unpullable: BTreeSet<String>,
    pub stop_fails: bool,
    pub rm_fails: bool,
    pub files: BTreeMap<String, String>,
    pub links: BTreeMap<String, String>,
    pub reject_nginx: bool,
    pub nginx_active: bool,
    pub nginx_reloads: u32,
    pub nginx_starts: u32,
    pub certbot_fails: bool,
    pub certbot_runs: Vec<Vec<String>>,
    /// Names on each issued certificate, keyed by apex.
    pub lineages: BTreeMap<String, BTreeSet<String>>,
    pub timers: Vec<String>,
    pub active_units: BTreeSet<String>,
}

/// A Debian-like VM simulated in memory. Commands mutate
/// [`HostState`] the way the real tools would.
pub struct FakeHost {
    pub state: RefCell<HostState>,
}

impl FakeHost {
    /// A fresh VM with nothing installed.
    pub fn new() -> Self {
        Self {
            state: RefCell::new(HostState::default()),
        }
    }

    /// A VM as a stock image ships: certbot's distro timer present
    /// once the package is installed, nginx default site enabled.
    pub fn stock() -> Self {
        let host = Self::new();
        {
            let mut s = host.state.borrow_mut();
            s.timers.push("certbot.timer".into());
            s.active_units.insert("certbot.timer".into());
            s.files.insert(
                "/etc/nginx/sites-available/default".into(),
                "server { listen 80 default_server; }".into(),
            );
            s.links.insert(
                "/etc/nginx/sites-enabled/default".into(),
                "/etc/nginx/sites-available/default".into(),
            );
        }
        host
    }

    pub fn with_running(self, name: &str, image: &str) -> Self {
        {
            let mut s = self.state.borrow_mut();
            let id = next_id(&mut s);
            s.containers.push(FakeContainer {
                id,
                name: name.into(),
                image: image.into(),
                running: true,
                ports: String::new(),
                restart: "no".into(),
            });
        }
        self
    }

    pub fn with_stopped(self, name: &str, image: &str) -> Self {
        let host = self.with_running(name, image);
        if let Some(c) = host.state.borrow_mut().containers.last_mut() {
            c.running = false;
        }
        host
    }

    pub fn with_installed(self, packages: &[&str]) -> Self {
        self.state
            .borrow_mut()
            .installed
            .extend(packages.iter().map(|p| (*p).to_string()));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.borrow().commands.clone()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.state
            .borrow()
            .commands
            .iter()
            .any(|c| c.starts_with(prefix))
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.state
            .borrow()
            .commands
            .iter()
            .position(|c| c.starts_with(prefix))
    }

    pub fn running(&self) -> Vec<FakeContainer> {
        self.state
            .borrow()
            .containers
            .iter()
            .filter(|c| c.running)
            .cloned()
            .collect()
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.state.borrow().files.get(path).cloned()
    }

    pub fn link(&self, path: &str) -> Option<String> {
        self.state.borrow().links.get(path).cloned()
    }

    pub fn give_certificate(&self, domain: &str) {
        let mut s = self.state.borrow_mut();
        s.files.insert(
            format!("/etc/letsencrypt/live/{domain}/fullchain.pem"),
            "CERT".into(),
        );
        s.files.insert(
            format!("/etc/letsencrypt/live/{domain}/privkey.pem"),
            "KEY".into(),
        );
    }
}

fn next_id(s: &mut HostState) -> String {
    s.next_id += 1;
    format!("{:012x}", 0xc0ffee_u32 + s.next_id)
}

fn failed(command: &str, stderr: &str) -> ProvisionError {
    ProvisionError::CommandFailed {
        command: command.to_string(),
        status: ExitStatus::from_raw(256),
        stderr: stderr.to_string(),
    }
}

impl Host for FakeHost {
    fn name(&self) -> &str {
        "fake-vm"
    }

    fn run(&self, program: &str, args: &[&str]) -> ProvisionResult<String> {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        let mut s = self.state.borrow_mut();
        s.commands.push(line.clone());

        match (program, args) {
            ("env", ["DEBIAN_FRONTEND=noninteractive", "apt-get", "update"]) => {
                s.apt_updates += 1;
                Ok(String::new())
            }
            ("env", ["DEBIAN_FRONTEND=noninteractive", "apt-get", "install", "-y", pkg]) => {
                if s.broken_packages.contains(*pkg) {
                    return Err(failed(&line, &format!("E: Unable to locate package {pkg}")));
                }
                s.installed.insert((*pkg).to_string());
                Ok(String::new())
            }
            ("docker", ["ps", "--no-trunc", "--format", "{{json .}}"]) => Ok(s
                .containers
                .iter()
                .filter(|c| c.running)
                .map(|c| {
                    serde_json::json!({"ID": c.id, "Names": c.name, "Image": c.image}).to_string()
                })
                .collect::<Vec<_>>()
                .join("\n")),
            ("docker", ["ps", "-aq", "--filter", filter]) => {
                let name = filter
                    .trim_start_matches("name=^")
                    .trim_end_matches('$')
                    .to_string();
                Ok(s.containers
                    .iter()
                    .filter(|c| c.name == name)
                    .map(|c| c.id.clone())
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            ("docker", ["ps", "-a", "--filter", filter, "--format", _]) => {
                let name = filter.trim_start_matches("name=^").trim_end_matches('$');
                Ok(s.containers
                    .iter()
                    .filter(|c| c.name == name)
                    .map(|c| format!("{}\t{}\tUp\t{}", c.name, c.image, c.ports))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            ("docker", ["stop", ids @ ..]) => {
                if s.stop_fails {
                    return Err(failed(&line, "permission denied while trying to connect"));
                }
                for id in ids {
                    let c = s
                        .containers
                        .iter_mut()
                        .find(|c| c.id == *id)
                        .ok_or_else(|| failed(&line, "No such container"))?;
                    c.running = false;
                }
                Ok(ids.join("\n"))
            }
            ("docker", ["rm", "-f", name]) => {
                s.containers.retain(|c| c.name != *name);
                Ok((*name).to_string())
            }
            ("docker", ["rm", ids @ ..]) => {
                if s.rm_fails {
                    return Err(failed(&line, "removal of container is already in progress"));
                }
                for id in ids {
                    let pos = s
                        .containers
                        .iter()
                        .position(|c| c.id == *id)
                        .ok_or_else(|| failed(&line, "No such container"))?;
                    if s.containers[pos].running {
                        return Err(failed(&line, "cannot remove a running container"));
                    }
                    s.containers.remove(pos);
                }
                Ok(ids.join("\n"))
            }
            ("docker", ["pull", image]) => {
                if s.unpullable.contains(*image) {
                    return Err(failed(&line, "pull access denied"));
                }
                Ok(format!("Status: Downloaded newer image for {image}"))
            }
            (
                "docker",
                ["run", "-d", "--name", name, "--restart", restart, "-p", ports, image],
            ) => {
                if s.containers.iter().any(|c| c.name == *name) {
                    return Err(failed(&line, "Conflict. The container name is already in use"));
                }
                let id = next_id(&mut s);
                s.containers.push(FakeContainer {
                    id: id.clone(),
                    name: (*name).to_string(),
                    image: (*image).to_string(),
                    running: true,
                    ports: (*ports).to_string(),
                    restart: (*restart).to_string(),
                });
                Ok(id)
            }
            ("cp", ["-p", src, dst]) => {
                let content = s
                    .files
                    .get(*src)
                    .cloned()
                    .ok_or_else(|| failed(&line, "No such file or directory"))?;
                s.files.insert((*dst).to_string(), content);
                Ok(String::new())
            }
            ("mv", ["-f", src, dst]) => {
                let content = s
                    .files
                    .remove(*src)
                    .ok_or_else(|| failed(&line, "No such file or directory"))?;
                s.files.insert((*dst).to_string(), content);
                Ok(String::new())
            }
            ("ln", ["-sfn", target, link]) => {
                s.links.insert((*link).to_string(), (*target).to_string());
                Ok(String::new())
            }
            ("rm", ["-f", paths @ ..]) => {
                for path in paths {
                    s.files.remove(*path);
                    s.links.remove(*path);
                }
                Ok(String::new())
            }
            ("nginx", ["-t"]) => {
                let dangling = s.links.values().any(|t| !s.files.contains_key(t));
                if s.reject_nginx || dangling {
                    Err(failed(&line, "nginx: configuration file test failed"))
                } else {
                    Ok("syntax is ok".into())
                }
            }
            ("systemctl", ["reload", "nginx"]) => {
                if !s.nginx_active {
                    return Err(failed(&line, "nginx.service is not active"));
                }
                s.nginx_reloads += 1;
                Ok(String::new())
            }
            ("systemctl", ["start", "nginx"]) => {
                s.nginx_active = true;
                s.nginx_starts += 1;
                Ok(String::new())
            }
            ("systemctl", ["list-timers", ..]) => Ok(s
                .timers
                .iter()
                .map(|t| format!("n/a n/a n/a n/a {t} {}", t.replace(".timer", ".service")))
                .collect::<Vec<_>>()
                .join("\n")),
            ("certbot", args) => {
                s.certbot_runs
                    .push(args.iter().map(|a| (*a).to_string()).collect());
                if s.certbot_fails {
                    return Err(failed(&line, "Challenge failed for domain"));
                }
                let names: BTreeSet<String> = args
                    .windows(2)
                    .filter(|w| w[0] == "-d")
                    .map(|w| w[1].to_string())
                    .collect();
                let apex = args
                    .windows(2)
                    .find(|w| w[0] == "-d")
                    .map(|w| w[1].to_string())
                    .ok_or_else(|| failed(&line, "no domain"))?;
                let grows = s
                    .lineages
                    .get(&apex)
                    .is_some_and(|existing| !names.is_subset(existing));
                if grows && !args.contains(&"--expand") {
                    return Err(failed(
                        &line,
                        "Missing command line flag or config entry for this setting: \
                         You have an existing certificate that contains a portion of \
                         the domains you requested",
                    ));
                }
                s.lineages.insert(apex.clone(), names);
                s.files.insert(
                    format!("/etc/letsencrypt/live/{apex}/fullchain.pem"),
                    "CERT".into(),
                );
                s.files.insert(
                    format!("/etc/letsencrypt/live/{apex}/privkey.pem"),
                    "KEY".into(),
                );
                Ok("Successfully received certificate.".into())
            }
            _ => Err(failed(&line, "unexpected command in fake host")),
        }
    }

    fn succeeds(&self, program: &str, args: &[&str]) -> ProvisionResult<bool> {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        let mut s = self.state.borrow_mut();
        s.commands.push(line.clone());

        match (program, args) {
            ("dpkg", ["-s", pkg]) => Ok(s.installed.contains(*pkg)),
            ("systemctl", ["is-active", "--quiet", "nginx"]) => Ok(s.nginx_active),
            ("systemctl", ["is-active", "--quiet", unit]) => Ok(s.active_units.contains(*unit)),
            _ => Err(failed(&line, "unexpected probe in fake host")),
        }
    }

    fn write_file(&self, path: &str, content: &str) -> ProvisionResult<()> {
        let mut s = self.state.borrow_mut();
        s.commands.push(format!("write {path}"));
        s.files.insert(path.to_string(), content.to_string());
        Ok(())
    }

    fn exists(&self, path: &str) -> ProvisionResult<bool> {
        let s = self.state.borrow();
        Ok(s.files.contains_key(path) || s.links.contains_key(path))
    }
}

/// Scripted HTTP answers keyed by URL. Each URL replays its queue;
/// the last answer repeats forever.
pub struct ScriptedProbe {
    answers: RefCell<HashMap<String, VecDeque<Result<ProbeResponse, String>>>>,
    pub calls: RefCell<Vec<(String, bool)>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self {
            answers: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Answers of a correctly provisioned full-mode site.
    pub fn healthy(domain: &str) -> Self {
        let apex = format!("https://{domain}/");
        Self::new()
            .answer(&format!("https://{domain}"), 200, None)
            .answer(&format!("http://{domain}"), 301, Some(&apex))
            .answer(&format!("http://www.{domain}"), 301, Some(&apex))
            .answer(&format!("https://www.{domain}"), 301, Some(&apex))
    }

    pub fn answer(self, url: &str, status: u16, location: Option<&str>) -> Self {
        self.answers
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push_back(Ok(ProbeResponse::new(status, location)));
        self
    }

    pub fn refuse(self, url: &str) -> Self {
        self.answers
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push_back(Err("Connection refused".into()));
        self
    }

    /// Replace every queued answer for `url`.
    pub fn reset(self, url: &str) -> Self {
        self.answers.borrow_mut().remove(url);
        self
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.borrow().iter().filter(|(u, _)| u == url).count()
    }
}

impl HttpProbe for ScriptedProbe {
    fn head(&self, url: &str, insecure: bool) -> ProvisionResult<ProbeResponse> {
        self.calls.borrow_mut().push((url.to_string(), insecure));
        let mut answers = self.answers.borrow_mut();
        let queue = answers
            .get_mut(url)
            .ok_or_else(|| ProvisionError::Other(format!("Could not resolve host: {url}")))?;
        let answer = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match answer {
            Some(Ok(response)) => Ok(response),
            Some(Err(e)) => Err(ProvisionError::Other(e)),
            None => Err(ProvisionError::Other("no answer".into())),
        }
    }
}

pub fn domain(name: &str) -> Domain {
    Domain::new(name).expect("valid domain")
}
