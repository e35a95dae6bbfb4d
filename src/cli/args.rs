//! Command-line argument parsing

use crate::config::DEFAULT_PARALLEL;
use crate::error::{MultipullError, Result};
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "multipull")]
#[command(about = "Pull several container images in parallel through a Docker engine")]
#[command(version)]
pub struct Args {
    /// Number of parallel image pulls
    #[arg(
        long = "parallel",
        short = 'p',
        default_value_t = DEFAULT_PARALLEL,
        help = "The number of parallel image pull requests to execute at one time"
    )]
    pub parallel: usize,

    /// Docker CLI context
    #[arg(
        long = "context",
        short = 'c',
        help = "The docker cli context to use (optional)"
    )]
    pub context: Option<String>,

    /// Use the current context
    #[arg(
        long = "current-context",
        help = "Use the current docker cli context; supersedes --context (optional)"
    )]
    pub current_context: bool,

    /// Docker configuration directory
    #[arg(
        long = "config-dir",
        help = "Docker cli configuration directory (default: $DOCKER_CONFIG or ~/.docker)"
    )]
    pub config_dir: Option<String>,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    /// Quiet output
    #[arg(
        long = "quiet",
        short = 'q',
        conflicts_with = "verbose",
        help = "Only print errors"
    )]
    pub quiet: bool,

    /// Images to pull
    #[arg(value_name = "IMAGE", help = "Image references to pull")]
    pub images: Vec<String>,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Load overrides from environment variables
    pub fn from_env(self) -> Self {
        self.with_env(|key| std::env::var(key).ok())
    }

    /// Apply `MULTIPULL_PARALLEL` and `MULTIPULL_VERBOSE` when the flags were
    /// left at their defaults
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.parallel == DEFAULT_PARALLEL {
            if let Some(parallel) = lookup("MULTIPULL_PARALLEL").and_then(|v| v.parse().ok()) {
                self.parallel = parallel;
            }
        }

        if !self.quiet && lookup("MULTIPULL_VERBOSE").is_some() {
            self.verbose = true;
        }

        self
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<()> {
        if self.images.is_empty() {
            return Err(MultipullError::Usage("no arguments specified".to_string()));
        }

        if self.parallel == 0 {
            return Err(MultipullError::Usage(
                "--parallel must be greater than 0".to_string(),
            ));
        }

        if let Some(image) = self.images.iter().find(|i| i.trim().is_empty()) {
            return Err(MultipullError::Usage(format!("invalid image reference {:?}", image)));
        }

        Ok(())
    }
}
