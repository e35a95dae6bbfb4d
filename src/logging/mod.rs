//! Logging and output control
//!
//! This module provides the [`Logger`] used for all user-visible output. It
//! supports quiet and verbose modes and scoped prefixes, so lines emitted by
//! concurrent pull tasks stay attributable to the function that wrote them.

use std::time::{Duration, Instant};

/// Logger responsible for all user-visible output
#[derive(Debug, Clone)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
    pub start_time: Option<Instant>,
    scope: Option<String>,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
            start_time: Some(Instant::now()),
            scope: None,
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
            start_time: Some(Instant::now()),
            scope: None,
        }
    }

    /// Copy of this logger whose lines are prefixed with `scope] `.
    pub fn scoped(&self, scope: &str) -> Self {
        Self {
            scope: Some(scope.to_string()),
            ..self.clone()
        }
    }

    fn tagged(&self, message: &str) -> String {
        match &self.scope {
            Some(scope) => format!("{}] {}", scope, message),
            None => message.to_string(),
        }
    }

    /// Main section heading
    pub fn section(&self, title: &str) {
        if !self.quiet {
            println!("{}\n--", title);
        }
    }

    pub fn debug(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("🐛 DEBUG: {}", self.tagged(message));
        }
    }

    /// Information message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("ℹ️  {}", self.tagged(message));
        }
    }

    /// Success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("✅ {}", self.tagged(message));
        }
    }

    /// Warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("⚠️  WARNING: {}", self.tagged(message));
        }
    }

    /// Error message, always shown
    pub fn error(&self, message: &str) {
        eprintln!("❌ ERROR: {}", self.tagged(message));
    }

    /// Step information
    pub fn step(&self, message: &str) {
        if !self.quiet {
            println!("▶️  {}", self.tagged(message));
        }
    }

    /// One progress line for a running operation
    pub fn progress(&self, message: &str) {
        if !self.quiet {
            println!("⏳ {}", self.tagged(message));
        }
    }

    /// Detailed information (only shown in verbose mode)
    pub fn detail(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("   {}", self.tagged(message));
        }
    }

    /// Plain line without decoration
    pub fn plain(&self, message: &str) {
        if !self.quiet {
            println!("{}", message);
        }
    }

    /// Time since the logger was created
    pub fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or_default()
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{}.{}s", secs, duration.subsec_millis() / 100)
        } else if secs < 3600 {
            format!("{}m{}s", secs / 60, secs % 60)
        } else {
            format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_prefix() {
        let logger = Logger::new(false).scoped("pull");
        assert_eq!(logger.tagged("error decoding"), "pull] error decoding");
        assert_eq!(Logger::new(false).tagged("plain"), "plain");
    }

    #[test]
    fn test_scoped_keeps_levels() {
        let logger = Logger::new_quiet().scoped("main");
        assert!(logger.quiet);
        assert!(!logger.verbose);
    }

    #[test]
    fn test_format_duration() {
        let logger = Logger::default();
        assert_eq!(logger.format_duration(Duration::from_millis(2_500)), "2.5s");
        assert_eq!(logger.format_duration(Duration::from_secs(125)), "2m5s");
        assert_eq!(logger.format_duration(Duration::from_secs(3_725)), "1h2m5s");
    }
}
