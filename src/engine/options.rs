//! Engine connection options
//!
//! Options come either from the `DOCKER_*` environment variables or from a
//! resolved [`ClientContext`].

use crate::context::{ClientContext, TLS_CA_FILE, TLS_CERT_FILE, TLS_KEY_FILE};
use crate::error::{ContextError, EngineError};
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// TLS client configuration: trust root, client identity, verification switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsOptions {
    pub ca_path: PathBuf,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub verify: bool,
}

impl TlsOptions {
    /// The three standard file names inside `dir`
    pub fn from_dir(dir: &Path, verify: bool) -> Self {
        Self {
            ca_path: dir.join(TLS_CA_FILE),
            cert_path: dir.join(TLS_CERT_FILE),
            key_path: dir.join(TLS_KEY_FILE),
            verify,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub host: String,
    /// A fixed API version; disables negotiation
    pub api_version: Option<String>,
    pub tls: Option<TlsOptions>,
}

/// Where requests go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Unix domain socket; requests use `base` only for the path
    Unix { socket: PathBuf, base: Url },
    /// Plain HTTP or HTTPS
    Tcp { base: Url },
}

impl Endpoint {
    pub fn base(&self) -> &Url {
        match self {
            Endpoint::Unix { base, .. } | Endpoint::Tcp { base } => base,
        }
    }
}

impl ClientOptions {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_version: None,
            tls: None,
        }
    }

    pub fn with_tls(mut self, tls: Option<TlsOptions>) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_api_version(mut self, version: Option<String>) -> Self {
        self.api_version = version;
        self
    }

    /// Defaults from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `DOCKER_HOST`, `DOCKER_API_VERSION`, `DOCKER_CERT_PATH` and `DOCKER_TLS_VERIFY`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let host = non_empty("DOCKER_HOST").unwrap_or_else(|| DEFAULT_DOCKER_HOST.to_string());
        let tls = non_empty("DOCKER_CERT_PATH").map(|dir| {
            TlsOptions::from_dir(Path::new(&dir), non_empty("DOCKER_TLS_VERIFY").is_some())
        });

        Self::new(host)
            .with_tls(tls)
            .with_api_version(non_empty("DOCKER_API_VERSION"))
    }

    /// Options for a context; fails when the context has no host
    pub fn from_context(context: &ClientContext) -> Result<Self, ContextError> {
        let host = context
            .endpoint_host
            .clone()
            .ok_or_else(|| ContextError::EndpointHostMissing(context.name.clone()))?;

        let tls = context.tls.as_ref().map(|tls| TlsOptions {
            ca_path: tls.ca_path.clone(),
            cert_path: tls.cert_path.clone(),
            key_path: tls.key_path.clone(),
            verify: !context.skip_tls_verify,
        });

        Ok(Self::new(host).with_tls(tls))
    }

    /// Parse the host into an endpoint. `tcp://` becomes HTTPS when TLS is set.
    pub fn endpoint(&self) -> Result<Endpoint, EngineError> {
        let (scheme, rest) = self
            .host
            .split_once("://")
            .ok_or_else(|| EngineError::InvalidHost(self.host.clone()))?;

        match scheme {
            "unix" => {
                if rest.is_empty() {
                    return Err(EngineError::InvalidHost(self.host.clone()));
                }
                Ok(Endpoint::Unix {
                    socket: PathBuf::from(rest),
                    base: Url::parse("http://localhost")?,
                })
            }
            "tcp" | "http" | "https" => {
                let http_scheme = match scheme {
                    "tcp" if self.tls.is_some() => "https",
                    "tcp" => "http",
                    other => other,
                };
                let host = rest.trim_end_matches('/');
                if host.is_empty() {
                    return Err(EngineError::InvalidHost(self.host.clone()));
                }
                let base = Url::parse(&format!("{}://{}", http_scheme, host))
                    .map_err(|_| EngineError::InvalidHost(self.host.clone()))?;
                Ok(Endpoint::Tcp { base })
            }
            _ => Err(EngineError::UnsupportedHost(self.host.clone())),
        }
    }
}
