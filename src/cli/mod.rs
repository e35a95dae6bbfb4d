//! Command line interface module
//!
//! Argument parsing and validation, plus the runner that drives a whole batch
//! of pulls from resolved context to final summary.

pub mod args;
pub mod runner;

pub use args::Args;
pub use runner::Runner;
