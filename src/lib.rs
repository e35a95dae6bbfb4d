//! multipull library
//!
//! Pulls several container images in parallel through a Docker-compatible
//! engine, with a bounded worker pool, a streaming progress decoder and Docker
//! CLI context resolution.

pub mod cli;
pub mod concurrency;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod progress;

pub use config::RunConfig;
pub use context::{ClientContext, ContextStore};
pub use engine::{EngineClient, ImageEngine};
pub use error::{MultipullError, Result};
pub use logging::Logger;
pub use orchestrator::{PullOrchestrator, PullReport, PullSummary};
