use crate::cmd;
use crate::error::{ProvisionError, ProvisionResult};

/// Status line and `Location` header of a headers-only request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub location: Option<String>,
}

impl ProbeResponse {
    #[must_use]
    pub fn new(status: u16, location: Option<&str>) -> Self {
        Self {
            status,
            location: location.map(String::from),
        }
    }

    /// A 2xx status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    #[must_use]
    pub const fn is_redirect(&self) -> bool {
        self.status >= 300 && self.status < 400
    }
}

/// Issues headers-only HTTP requests.
pub trait HttpProbe {
    /// Fetch the headers of `url`. With `insecure`, the certificate
    /// chain is not verified.
    fn head(&self, url: &str, insecure: bool) -> ProvisionResult<ProbeResponse>;
}

const WRITE_OUT: &str = "%{http_code} %{redirect_url}";

/// [`HttpProbe`] backed by the `curl` binary on the local machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct CurlProbe;

impl CurlProbe {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HttpProbe for CurlProbe {
    fn head(&self, url: &str, insecure: bool) -> ProvisionResult<ProbeResponse> {
        let mut args = vec![
            "--silent",
            "--show-error",
            "--head",
            "--output",
            "/dev/null",
            "--max-time",
            "10",
            "--write-out",
            WRITE_OUT,
        ];
        if insecure {
            args.push("--insecure");
        }
        args.push(url);

        let output = cmd::run("curl", &args)?;
        parse_write_out(&output)
    }
}

/// Parse the `%{http_code} %{redirect_url}` write-out of curl.
pub fn parse_write_out(output: &str) -> ProvisionResult<ProbeResponse> {
    let trimmed = output.trim();
    let (code, location) = trimmed.split_once(' ').unwrap_or((trimmed, ""));
    let status: u16 = code
        .parse()
        .map_err(|_| ProvisionError::Other(format!("unexpected curl output: '{output}'")))?;
    if status == 0 {
        return Err(ProvisionError::Other("no HTTP response received".into()));
    }

    let location = Some(location.trim()).filter(|l| !l.is_empty());
    Ok(ProbeResponse::new(status, location))
}
