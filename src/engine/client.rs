//! Docker Engine API client
//!
//! Only what pulling needs: `/_ping` for version negotiation and the streaming
//! `images/create` call. The underlying [`reqwest::Client`] is cheap to share and
//! safe to use from every worker at once; negotiation runs once and is cached.

use super::options::{ClientOptions, Endpoint, TlsOptions};
use super::reference::ImageReference;
use super::{ImageEngine, PullStream};
use crate::context::ClientContext;
use crate::error::{EngineError, MultipullError};
use crate::logging::Logger;
use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::{Certificate, Client, Identity, Response};
use serde::Deserialize;
use std::path::Path;
use tokio::sync::OnceCell;
use url::Url;

/// Highest API version this client speaks
pub const DEFAULT_API_VERSION: &str = "1.45";

/// Version assumed when the engine does not advertise one
pub const FALLBACK_API_VERSION: &str = "1.24";

const API_VERSION_HEADER: &str = "api-version";

#[derive(Debug, Deserialize)]
struct EngineMessage {
    message: String,
}

pub struct EngineClient {
    http: Client,
    base: Url,
    pinned_version: Option<String>,
    negotiated_version: OnceCell<String>,
    logger: Logger,
}

impl EngineClient {
    /// Build a client from explicit options
    pub fn new(options: &ClientOptions, logger: Logger) -> Result<Self, EngineError> {
        let endpoint = options.endpoint()?;
        // The engine is addressed directly, never through an HTTP proxy.
        let mut builder = Client::builder().no_proxy().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));

        if let Endpoint::Unix { socket, .. } = &endpoint {
            builder = unix_socket(builder, socket)?;
        }
        if let Some(tls) = &options.tls {
            builder = apply_tls(builder, tls)?;
        }

        let http = builder.build().map_err(EngineError::Tls)?;
        logger.detail(&format!("engine endpoint: {}", options.host));

        Ok(Self {
            http,
            base: endpoint.base().clone(),
            pinned_version: options.api_version.clone(),
            negotiated_version: OnceCell::new(),
            logger: logger.scoped("engine"),
        })
    }

    /// Client configured from `DOCKER_*` environment variables
    pub fn from_env(logger: Logger) -> Result<Self, EngineError> {
        Self::new(&ClientOptions::from_env(), logger)
    }

    /// Client for a resolved context. The built-in `default` context falls back
    /// to environment defaults.
    pub fn from_context(context: &ClientContext, logger: Logger) -> Result<Self, MultipullError> {
        if context.is_default() {
            return Ok(Self::from_env(logger)?);
        }
        let options = ClientOptions::from_context(context)?;
        Ok(Self::new(&options, logger)?)
    }

    /// API version used for requests, negotiated on first use
    pub async fn api_version(&self) -> &str {
        if let Some(version) = &self.pinned_version {
            return version;
        }

        self.negotiated_version
            .get_or_init(|| async {
                match self.ping().await {
                    Ok(server) => {
                        let version = negotiate_version(server.as_deref());
                        self.logger.debug(&format!("negotiated API version {}", version));
                        version
                    }
                    Err(e) => {
                        self.logger.debug(&format!(
                            "ping failed, using API version {}: {}",
                            DEFAULT_API_VERSION, e
                        ));
                        DEFAULT_API_VERSION.to_string()
                    }
                }
            })
            .await
    }

    /// Ping the engine and return the API version it advertises
    pub async fn ping(&self) -> Result<Option<String>, EngineError> {
        let response = self.http.get(self.base.join("/_ping")?).send().await?;
        let response = check_status(response).await?;

        Ok(response
            .headers()
            .get(API_VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }

    fn create_image_url(&self, version: &str, image: &ImageReference) -> Result<Url, EngineError> {
        let mut url = self.base.join(&format!("/v{}/images/create", version))?;
        url.query_pairs_mut()
            .append_pair("fromImage", image.name())
            .append_pair("tag", image.api_tag());
        Ok(url)
    }
}

#[async_trait]
impl ImageEngine for EngineClient {
    async fn pull_image(&self, reference: &str) -> Result<PullStream, EngineError> {
        let image = ImageReference::parse(reference)?;
        let version = self.api_version().await;
        let url = self.create_image_url(version, &image)?;

        self.logger.debug(&format!("POST {}", url));
        let response = self.http.post(url).send().await?;
        let response = check_status(response).await?;

        Ok(response.bytes_stream().map_err(EngineError::from).boxed())
    }
}

/// Pick the request version from what the engine advertises
pub fn negotiate_version(server: Option<&str>) -> String {
    let server = match server.map(str::trim).filter(|v| !v.is_empty()) {
        Some(server) => server,
        None => return FALLBACK_API_VERSION.to_string(),
    };

    match (parse_version(server), parse_version(DEFAULT_API_VERSION)) {
        (Some(theirs), Some(ours)) if theirs < ours => server.to_string(),
        (Some(_), _) => DEFAULT_API_VERSION.to_string(),
        (None, _) => FALLBACK_API_VERSION.to_string(),
    }
}

fn parse_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Turn a non-success response into an error carrying the engine's message
async fn check_status(response: Response) -> Result<Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<EngineMessage>(&body)
        .map(|m| m.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());

    Err(EngineError::Status {
        status: status.as_u16(),
        message,
    })
}

fn read_tls_file(path: &Path) -> Result<Vec<u8>, EngineError> {
    std::fs::read(path).map_err(|source| EngineError::TlsFile {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_tls(
    builder: reqwest::ClientBuilder,
    tls: &TlsOptions,
) -> Result<reqwest::ClientBuilder, EngineError> {
    let ca = read_tls_file(&tls.ca_path)?;
    let mut identity_pem = read_tls_file(&tls.cert_path)?;
    identity_pem.push(b'\n');
    identity_pem.extend(read_tls_file(&tls.key_path)?);

    let root = Certificate::from_pem(&ca).map_err(EngineError::Tls)?;
    let identity = Identity::from_pem(&identity_pem).map_err(EngineError::Tls)?;

    Ok(builder
        .add_root_certificate(root)
        .identity(identity)
        .danger_accept_invalid_certs(!tls.verify))
}

#[cfg(unix)]
fn unix_socket(
    builder: reqwest::ClientBuilder,
    socket: &Path,
) -> Result<reqwest::ClientBuilder, EngineError> {
    Ok(builder.unix_socket(socket.to_path_buf()))
}

#[cfg(not(unix))]
fn unix_socket(
    _builder: reqwest::ClientBuilder,
    socket: &Path,
) -> Result<reqwest::ClientBuilder, EngineError> {
    Err(EngineError::UnsupportedHost(format!("unix://{}", socket.display())))
}
