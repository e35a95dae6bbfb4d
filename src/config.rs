//! Run configuration built from the command line and environment

use crate::cli::Args;
use crate::context::{ContextSelection, ContextStore};
use crate::error::{ContextError, Result};
use crate::logging::Logger;
use std::path::PathBuf;

pub const DEFAULT_PARALLEL: usize = 2;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub parallel: usize,
    pub context: ContextSelection,
    pub config_dir: Option<PathBuf>,
    pub verbose: bool,
    pub quiet: bool,
    pub images: Vec<String>,
}

impl RunConfig {
    /// Validate the arguments and convert them
    pub fn from_args(args: Args) -> Result<Self> {
        args.validate()?;

        Ok(Self {
            parallel: args.parallel,
            context: ContextSelection::from_flags(args.context.as_deref(), args.current_context),
            config_dir: args.config_dir.map(PathBuf::from),
            verbose: args.verbose,
            quiet: args.quiet,
            images: args.images,
        })
    }

    pub fn logger(&self) -> Logger {
        if self.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(self.verbose)
        }
    }

    /// The explicit `--config-dir`, or the standard location
    pub fn context_store(&self) -> std::result::Result<ContextStore, ContextError> {
        match &self.config_dir {
            Some(dir) => Ok(ContextStore::new(dir)),
            None => ContextStore::from_env(),
        }
    }
}
