use std::fmt;
use std::str::FromStr;

use crate::error::{ProvisionError, ProvisionResult};

/// A validated apex DNS hostname such as `example.com`.
///
/// Only `[a-z0-9-]` labels separated by dots are accepted, so a
/// `Domain` can be interpolated into nginx configuration and shell
/// arguments as-is.
///
/// # Example
///
/// ```
/// use hostkit::Domain;
///
/// let domain: Domain = "Example.COM".parse().unwrap();
///
/// assert_eq!(domain.as_str(), "example.com");
/// assert_eq!(domain.www_alias(), "www.example.com");
/// assert!("exa mple.com".parse::<Domain>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Domain(String);

const MAX_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

impl Domain {
    pub fn new(raw: &str) -> ProvisionResult<Self> {
        let name = raw.trim().to_ascii_lowercase();
        let invalid = |reason: &str| ProvisionError::InvalidDomain {
            domain: raw.to_string(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("empty"));
        }
        if name.len() > MAX_LEN {
            return Err(invalid("longer than 253 characters"));
        }

        let labels: Vec<&str> = name.split('.').collect();
        if labels.len() < 2 {
            return Err(invalid("needs at least two labels"));
        }
        // The www alias is derived; `www.example.com` would become
        // `www.www.example.com`.
        if labels[0] == "www" {
            return Err(invalid("pass the apex, without 'www.'"));
        }

        for label in &labels {
            if label.is_empty() {
                return Err(invalid("empty label"));
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(invalid("label longer than 63 characters"));
            }
            if !label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            {
                return Err(invalid("only letters, digits and '-' are allowed"));
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err(invalid("label starts or ends with '-'"));
            }
        }

        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn www_alias(&self) -> String {
        format!("www.{}", self.0)
    }

    /// `https://<domain>`, the canonical public URL.
    #[must_use]
    pub fn https_url(&self) -> String {
        format!("https://{}", self.0)
    }
}

impl FromStr for Domain {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
