//! Error handling module for multipull
//!
//! Fatal errors are carried by [`MultipullError`]; everything that can go wrong
//! while pulling a single image is a [`PullError`] and stays scoped to that image.

use crate::concurrency::PoolError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort the whole run.
#[derive(Debug, Error)]
pub enum MultipullError {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Context resolution error: {0}")]
    ConfigResolution(#[from] ContextError),

    #[error("Connection setup error: {0}")]
    ConnectionSetup(#[from] EngineError),

    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Failures while locating or reading a client context on disk.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("no context specified")]
    NoContextSpecified,

    #[error("unable to determine the user home directory")]
    HomeDirUnavailable,

    #[error("error reading context config file {}: {source}", path.display())]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid context config file {}: {source}", path.display())]
    ConfigMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("current cli context is not defined")]
    CurrentContextUndefined,

    #[error("error reading context metadata file {}: {source}", path.display())]
    MetadataUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid context metadata file {}: {source}", path.display())]
    MetadataMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("host not defined for context {0}")]
    EndpointHostMissing(String),
}

/// Errors raised by the engine client.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unable to parse docker host `{0}`")]
    InvalidHost(String),

    #[error("unsupported docker host scheme in `{0}`")]
    UnsupportedHost(String),

    #[error("unable to read TLS file {}: {source}", path.display())]
    TlsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TLS material: {0}")]
    Tls(#[source] reqwest::Error),

    #[error("invalid image reference `{0}`")]
    InvalidReference(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("engine returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),
}

/// Malformed data in a pull progress stream.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed progress event: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("progress field `{field}` is out of range: {value}")]
    NumberOutOfRange { field: &'static str, value: String },

    #[error("stream ended inside a progress event ({0} trailing bytes)")]
    Truncated(usize),

    #[error("progress event exceeds {0} bytes")]
    EventTooLarge(usize),
}

/// Failures scoped to the pull of one image.
#[derive(Debug, Error)]
pub enum PullError {
    #[error("error pulling image: {0}")]
    Start(#[source] EngineError),

    #[error("error reading pull stream: {0}")]
    Stream(#[source] EngineError),

    #[error("error decoding: {0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    Engine(String),

    #[error("pull cancelled")]
    Cancelled,

    #[error("pull was not scheduled: {0}")]
    Rejected(#[source] PoolError),

    #[error("pull task ended without reporting")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, MultipullError>;
