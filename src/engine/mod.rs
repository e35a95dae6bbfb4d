//! Container engine access
//!
//! [`ImageEngine`] is the seam between the pull orchestrator and the engine: it
//! starts one image pull and hands back the raw streaming response body.
//! [`EngineClient`] implements it against the Docker Engine API.

pub mod client;
pub mod options;
pub mod reference;

pub use client::EngineClient;
pub use options::{ClientOptions, Endpoint, TlsOptions};
pub use reference::ImageReference;

use crate::error::EngineError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Raw body of a pull response, chunked as it arrives from the network
pub type PullStream = BoxStream<'static, Result<Bytes, EngineError>>;

/// Something that can pull images. Implementations must tolerate concurrent
/// calls from every worker without external locking.
#[async_trait]
pub trait ImageEngine: Send + Sync + 'static {
    /// Start pulling `reference`. Dropping the returned stream closes it.
    async fn pull_image(&self, reference: &str) -> Result<PullStream, EngineError>;
}
