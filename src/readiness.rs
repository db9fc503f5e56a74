use tracing::debug;

use crate::config::CertScope;
use crate::domain::Domain;
use crate::error::{ProvisionError, ProvisionResult};
use crate::probe::{HttpProbe, ProbeResponse};
use crate::retry::{self, RetryPolicy};

/// Confirms the public endpoint serves the application and that
/// every alias converges on `https://<apex>`.
pub struct ReadinessVerifier<'a> {
    probe: &'a dyn HttpProbe,
    policy: RetryPolicy,
}

impl<'a> ReadinessVerifier<'a> {
    #[must_use]
    pub const fn new(probe: &'a dyn HttpProbe, policy: RetryPolicy) -> Self {
        Self { probe, policy }
    }

    /// Poll `https://<domain>` until it answers with a success
    /// status.
    pub fn wait_until_ready(&self, domain: &Domain) -> ProvisionResult<()> {
        let url = domain.https_url();
        retry::poll(self.policy, &url, || match self.probe.head(&url, false) {
            Ok(response) => {
                debug!(
                    %url,
                    status = response.status,
                    location = ?response.location,
                    "readiness probe"
                );
                serves_apex(&response, &url)
            }
            Err(e) => {
                debug!(%url, error = %e, "readiness probe failed");
                false
            }
        })
        .map(|_| ())
        .map_err(|e| ProvisionError::ReadinessTimeout {
            url,
            attempts: e.attempts,
        })
    }

    /// Check the redirect topology once. The first unmet check
    /// fails the run.
    pub fn verify_redirects(&self, domain: &Domain, scope: CertScope) -> ProvisionResult<()> {
        let https_apex = domain.https_url();

        let url = format!("http://{domain}");
        let response = self.fetch(&url, false)?;
        if !response.is_redirect() {
            return Err(unmet(&url, format!("expected a redirect, got {}", response.status)));
        }
        eprintln!("✅ {url} redirects ({})", response.status);

        if scope.includes_www() {
            let url = format!("http://{}", domain.www_alias());
            let response = self.fetch(&url, false)?;
            if response.status != 301 {
                return Err(unmet(&url, format!("expected 301, got {}", response.status)));
            }
            expect_apex_location(&url, &response, &https_apex)?;
            eprintln!("✅ {url} redirects to {https_apex}");

            // The alias check is about routing, not the chain.
            let url = format!("https://{}", domain.www_alias());
            let response = self.fetch(&url, true)?;
            expect_apex_location(&url, &response, &https_apex)?;
            eprintln!("✅ {url} redirects to {https_apex}");
        }

        let response = self.fetch(&https_apex, false)?;
        if !serves_apex(&response, &https_apex) {
            let detail = match response.location.as_deref() {
                Some(location) if response.is_redirect() => {
                    format!("redirects away to {location} ({})", response.status)
                }
                _ => format!("expected success, got {}", response.status),
            };
            return Err(unmet(&https_apex, detail));
        }
        eprintln!("✅ {https_apex} answers ({})", response.status);
        Ok(())
    }

    fn fetch(&self, url: &str, insecure: bool) -> ProvisionResult<ProbeResponse> {
        self.probe
            .head(url, insecure)
            .map_err(|e| unmet(url, format!("request failed: {}", e.reason())))
    }
}

/// The apex answers by itself: a 2xx, or a redirect that stays on
/// `https_apex` (a login page, say). Redirects to another host, `www`
/// included, do not count.
#[must_use]
pub fn serves_apex(response: &ProbeResponse, https_apex: &str) -> bool {
    response.is_success()
        || (response.is_redirect()
            && response
                .location
                .as_deref()
                .is_some_and(|location| points_at(location, https_apex)))
}

/// Whether `location` is `https_apex` itself or a path below it.
#[must_use]
pub fn points_at(location: &str, https_apex: &str) -> bool {
    location
        .strip_prefix(https_apex)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn expect_apex_location(
    url: &str,
    response: &ProbeResponse,
    https_apex: &str,
) -> ProvisionResult<()> {
    match response.location.as_deref() {
        Some(location) if points_at(location, https_apex) => Ok(()),
        Some(location) => Err(unmet(
            url,
            format!("Location is {location}, expected {https_apex}"),
        )),
        None => Err(unmet(
            url,
            format!("no Location header (status {})", response.status),
        )),
    }
}

fn unmet(url: &str, detail: String) -> ProvisionError {
    ProvisionError::RedirectVerification {
        url: url.to_string(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::{points_at, serves_apex};
    use crate::probe::ProbeResponse;

    #[test]
    fn apex_must_answer_itself() {
        let apex = "https://example.com";
        assert!(serves_apex(&ProbeResponse::new(200, None), apex));
        assert!(serves_apex(&ProbeResponse::new(204, None), apex));
        assert!(serves_apex(
            &ProbeResponse::new(302, Some("https://example.com/login")),
            apex
        ));
        assert!(!serves_apex(
            &ProbeResponse::new(301, Some("https://www.example.com/")),
            apex
        ));
        assert!(!serves_apex(&ProbeResponse::new(301, None), apex));
        assert!(!serves_apex(&ProbeResponse::new(404, None), apex));
    }

    #[test]
    fn location_matching() {
        assert!(points_at("https://example.com", "https://example.com"));
        assert!(points_at("https://example.com/", "https://example.com"));
        assert!(points_at("https://example.com/login?next=/", "https://example.com"));
        assert!(!points_at("https://www.example.com/", "https://example.com"));
        assert!(!points_at("https://example.com.evil.test/", "https://example.com"));
        assert!(!points_at("http://example.com/", "https://example.com"));
    }
}
