//! Pull progress tracking
//!
//! The engine answers a pull with a stream of JSON objects such as
//!
//! ```json
//! {"status":"Downloading","id":"a1b2c3","progressDetail":{"current":50,"total":200}}
//! ```
//!
//! [`decoder`] turns the raw body into [`ProgressEvent`]s, [`aggregator`] folds
//! them into an [`ImageProgress`] per image and [`sink`] shows the result.

pub mod aggregator;
pub mod decoder;
pub mod sink;

pub use aggregator::ImageProgress;
pub use decoder::{ProgressDecoder, decode_events};
pub use sink::{ConsoleSink, ProgressSink};

/// One decoded progress message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressEvent {
    pub status: String,
    /// Layer id the message refers to, if any
    pub id: Option<String>,
    pub current: Option<f64>,
    pub total: Option<f64>,
    /// Error reported by the engine inside the stream
    pub error: Option<String>,
}
