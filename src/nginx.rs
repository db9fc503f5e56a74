//! Typed nginx site model and the fixed site topologies hostkit
//! renders.
//!
//! Text is only produced through [`fmt::Display`], and every host name
//! comes from a validated [`Domain`], so no caller-provided string is
//! spliced into the output unchecked.

use std::fmt;

use crate::config::{CertScope, PreCertVariant};
use crate::domain::Domain;

const INDENT: &str = "    ";

/// Headers forwarded to the application on every proxied request.
pub const FORWARDED_HEADERS: [(&str, &str); 4] = [
    ("Host", "$host"),
    ("X-Real-IP", "$remote_addr"),
    ("X-Forwarded-For", "$proxy_add_x_forwarded_for"),
    ("X-Forwarded-Proto", "$scheme"),
];

/// A complete site file: a sequence of `server` blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NginxConfig {
    pub servers: Vec<ServerBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listen {
    Http,
    Https,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub certificate: String,
    pub key: String,
}

impl TlsFiles {
    /// Certificate paths certbot maintains for `domain`.
    #[must_use]
    pub fn letsencrypt(letsencrypt_dir: &str, domain: &Domain) -> Self {
        let live = format!("{}/live/{domain}", letsencrypt_dir.trim_end_matches('/'));
        Self {
            certificate: format!("{live}/fullchain.pem"),
            key: format!("{live}/privkey.pem"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Tls(TlsFiles),
    Return { code: u16, target: String },
    Proxy { location: String, upstream: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerBlock {
    pub listen: Listen,
    pub server_names: Vec<String>,
    pub directives: Vec<Directive>,
}

impl ServerBlock {
    #[must_use]
    pub fn http(server_name: &str) -> Self {
        Self {
            listen: Listen::Http,
            server_names: vec![server_name.to_string()],
            directives: Vec::new(),
        }
    }

    #[must_use]
    pub fn https(server_name: &str, tls: TlsFiles) -> Self {
        Self {
            listen: Listen::Https,
            server_names: vec![server_name.to_string()],
            directives: vec![Directive::Tls(tls)],
        }
    }

    #[must_use]
    pub fn alias(mut self, server_name: &str) -> Self {
        self.server_names.push(server_name.to_string());
        self
    }

    /// Answer every request with a permanent redirect to `base`,
    /// keeping the request URI.
    #[must_use]
    pub fn redirect_to(mut self, base: &str) -> Self {
        self.directives.push(Directive::Return {
            code: 301,
            target: format!("{base}$request_uri"),
        });
        self
    }

    #[must_use]
    pub fn proxy_to(mut self, upstream: &str) -> Self {
        self.directives.push(Directive::Proxy {
            location: "/".to_string(),
            upstream: upstream.to_string(),
        });
        self
    }
}

impl NginxConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn server(mut self, block: ServerBlock) -> Self {
        self.servers.push(block);
        self
    }
}

impl fmt::Display for Listen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => {
                writeln!(f, "{INDENT}listen 80;")?;
                writeln!(f, "{INDENT}listen [::]:80;")
            }
            Self::Https => {
                writeln!(f, "{INDENT}listen 443 ssl;")?;
                writeln!(f, "{INDENT}listen [::]:443 ssl;")
            }
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tls(tls) => {
                writeln!(f, "{INDENT}ssl_certificate {};", tls.certificate)?;
                writeln!(f, "{INDENT}ssl_certificate_key {};", tls.key)?;
                writeln!(f, "{INDENT}ssl_protocols TLSv1.2 TLSv1.3;")?;
                writeln!(f, "{INDENT}ssl_session_cache shared:SSL:10m;")
            }
            Self::Return { code, target } => writeln!(f, "{INDENT}return {code} {target};"),
            Self::Proxy { location, upstream } => {
                writeln!(f, "{INDENT}location {location} {{")?;
                writeln!(f, "{INDENT}{INDENT}proxy_pass {upstream};")?;
                for (name, value) in FORWARDED_HEADERS {
                    writeln!(f, "{INDENT}{INDENT}proxy_set_header {name} {value};")?;
                }
                writeln!(f, "{INDENT}}}")
            }
        }
    }
}

impl fmt::Display for ServerBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "server {{")?;
        write!(f, "{}", self.listen)?;
        writeln!(f, "{INDENT}server_name {};", self.server_names.join(" "))?;
        for directive in &self.directives {
            writeln!(f)?;
            write!(f, "{directive}")?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for NginxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Managed by hostkit. Local edits are overwritten.")?;
        for server in &self.servers {
            writeln!(f)?;
            write!(f, "{server}")?;
        }
        Ok(())
    }
}

/// Inputs shared by every site topology.
#[derive(Debug, Clone, Copy)]
pub struct SiteTemplate<'a> {
    pub domain: &'a Domain,
    pub upstream_port: u16,
    pub letsencrypt_dir: &'a str,
    pub scope: CertScope,
}

impl SiteTemplate<'_> {
    fn upstream(&self) -> String {
        format!("http://localhost:{}", self.upstream_port)
    }

    /// Site served before a certificate exists.
    #[must_use]
    pub fn pre_certificate(&self, variant: PreCertVariant) -> NginxConfig {
        let apex = self.domain.as_str();
        let www = self.domain.www_alias();
        let https_apex = self.domain.https_url();

        match variant {
            PreCertVariant::RedirectStub => {
                let mut config =
                    NginxConfig::new().server(ServerBlock::http(apex).redirect_to(&https_apex));
                if self.scope.includes_www() {
                    config = config.server(ServerBlock::http(&www).redirect_to(&https_apex));
                }
                config
            }
            PreCertVariant::PlainProxy => {
                let mut block = ServerBlock::http(apex);
                if self.scope.includes_www() {
                    block = block.alias(&www);
                }
                NginxConfig::new().server(block.proxy_to(&self.upstream()))
            }
        }
    }

    /// Site served once the certificate exists: HTTP and `www`
    /// traffic converge on `https://<apex>`, which proxies to the
    /// application.
    #[must_use]
    pub fn post_certificate(&self) -> NginxConfig {
        let apex = self.domain.as_str();
        let www = self.domain.www_alias();
        let https_apex = self.domain.https_url();
        let tls = TlsFiles::letsencrypt(self.letsencrypt_dir, self.domain);

        let mut config = NginxConfig::new().server(ServerBlock::http(apex).redirect_to(&https_apex));

        if self.scope.includes_www() {
            config = config
                .server(ServerBlock::http(&www).redirect_to(&https_apex))
                .server(ServerBlock::https(&www, tls.clone()).redirect_to(&https_apex));
        }

        config.server(ServerBlock::https(apex, tls).proxy_to(&self.upstream()))
    }

    /// Pick the topology for the current certificate state.
    #[must_use]
    pub fn render(&self, has_certificate: bool, variant: PreCertVariant) -> NginxConfig {
        if has_certificate {
            self.post_certificate()
        } else {
            self.pre_certificate(variant)
        }
    }
}
