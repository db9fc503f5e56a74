use std::process::ExitStatus;

pub type ProvisionResult<T> = Result<T, ProvisionError>;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("usage: {0}")]
    Usage(String),

    #[error("invalid domain '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: String },

    #[error("failed to install package '{package}': {reason}")]
    PackageInstall { package: String, reason: String },

    #[error("container error: {0}")]
    Container(String),

    #[error("proxy configuration error: {0}")]
    ProxyConfig(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("no active certificate renewal timer found")]
    RenewalTimerMissing,

    #[error("{url} did not become ready after {attempts} attempts")]
    ReadinessTimeout { url: String, attempts: u32 },

    #[error("redirect check failed for {url}: {detail}")]
    RedirectVerification { url: String, detail: String },

    #[error("command failed: {command}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("SSH connection failed: {0}")]
    SshFailed(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl ProvisionError {
    /// Text that best explains a failed command: its stderr when
    /// present, the command line otherwise.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::CommandFailed {
                command, stderr, ..
            } if stderr.is_empty() => format!("`{command}` failed"),
            Self::CommandFailed { stderr, .. } => stderr.clone(),
            other => other.to_string(),
        }
    }
}
