//! Display sinks for pull progress

use super::ImageProgress;
use crate::logging::Logger;
use std::collections::HashMap;
use std::sync::Mutex;

/// Receives progress for every image being pulled. Called concurrently from all
/// pull tasks.
pub trait ProgressSink: Send + Sync {
    /// A worker picked this image up and its pull is about to start
    fn register(&self, _progress: &ImageProgress) {}

    /// The visible state of an image changed
    fn update(&self, progress: &ImageProgress);

    /// Terminal state; always reports 100%
    fn finish(&self, progress: &ImageProgress);
}

/// Line-oriented sink writing through the [`Logger`]
///
/// Status changes are always printed, percentage changes only in verbose mode.
#[derive(Debug)]
pub struct ConsoleSink {
    output: Logger,
    last_status: Mutex<HashMap<String, String>>,
}

impl ConsoleSink {
    pub fn new(output: Logger) -> Self {
        Self {
            output,
            last_status: Mutex::new(HashMap::new()),
        }
    }

    /// Record the status shown for this image; true when it differs from the last one
    fn status_changed(&self, progress: &ImageProgress) -> bool {
        let mut last = match self.last_status.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match last.get(progress.reference()) {
            Some(status) if status == progress.status() => false,
            _ => {
                last.insert(
                    progress.reference().to_string(),
                    progress.status().to_string(),
                );
                true
            }
        }
    }

    fn started(progress: &ImageProgress) -> String {
        format!("{}: pulling", progress.reference())
    }

    fn line(progress: &ImageProgress) -> String {
        if progress.status().is_empty() {
            format!("{}: {}%", progress.reference(), progress.percent())
        } else {
            format!(
                "{}: {} {}%",
                progress.reference(),
                progress.status(),
                progress.percent()
            )
        }
    }
}

impl ProgressSink for ConsoleSink {
    fn register(&self, progress: &ImageProgress) {
        self.output.step(&Self::started(progress));
    }

    fn update(&self, progress: &ImageProgress) {
        if self.status_changed(progress) || self.output.verbose {
            self.output.progress(&Self::line(progress));
        }
    }

    fn finish(&self, progress: &ImageProgress) {
        self.status_changed(progress);
        self.output.plain(&Self::line(progress));
    }
}
