//! Per-image progress state

use super::ProgressEvent;

const STATUS_PREFIX: &str = "Status: ";
const COMPLETE: u8 = 100;

/// Status line and percentage shown for one image pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageProgress {
    reference: String,
    status: String,
    percent: u8,
    finished: bool,
}

impl ImageProgress {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            status: String::new(),
            percent: 0,
            finished: false,
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fold one event in. Returns true when the status or percentage changed.
    pub fn apply(&mut self, event: &ProgressEvent) -> bool {
        let status = match &event.error {
            Some(error) => error.as_str(),
            None => event.status.strip_prefix(STATUS_PREFIX).unwrap_or(&event.status),
        };
        let mut changed = false;
        if self.status != status {
            self.status = status.to_string();
            changed = true;
        }

        if let Some(percent) = percent_of(event.current, event.total) {
            if percent != self.percent {
                self.percent = percent;
                changed = true;
            }
        }
        changed
    }

    /// Record a failure as the terminal status
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    /// Force the terminal value once the stream is over, whatever the outcome
    pub fn finish(&mut self) {
        self.percent = COMPLETE;
        self.finished = true;
    }
}

/// `round(current / total * 100)` clamped to 0..=100; `None` without a usable total
pub fn percent_of(current: Option<f64>, total: Option<f64>) -> Option<u8> {
    let (current, total) = (current?, total?);
    if total.is_nan() || total <= 0.0 {
        return None;
    }
    let percent = (current / total * 100.0).round();
    Some(percent.clamp(0.0, 100.0) as u8)
}
