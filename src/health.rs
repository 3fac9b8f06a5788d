//! Derived uptime-error signal.

use tracing::{debug, warn};

/// Tracks whether the slideshow is currently failing to put anything up.
/// Set on load or watch failures, cleared by any successful paint or a full
/// reset.
#[derive(Debug, Default)]
pub struct Health {
    uptime_error: bool,
}

impl Health {
    pub fn is_error(&self) -> bool {
        self.uptime_error
    }

    pub fn record_failure(&mut self, file_path: &str, reason: &str) {
        if !self.uptime_error {
            warn!(file = file_path, reason, "entering uptime-error state");
        }
        self.uptime_error = true;
    }

    pub fn record_success(&mut self) {
        if self.uptime_error {
            debug!("uptime-error cleared");
        }
        self.uptime_error = false;
    }

    pub fn reset(&mut self) {
        self.uptime_error = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_sets_and_success_clears() {
        let mut health = Health::default();
        assert!(!health.is_error());
        health.record_failure("a.png", "load failed");
        assert!(health.is_error());
        health.record_success();
        assert!(!health.is_error());
    }

    #[test]
    fn reset_clears_the_flag() {
        let mut health = Health::default();
        health.record_failure("a.png", "load failed");
        health.reset();
        assert!(!health.is_error());
    }
}
