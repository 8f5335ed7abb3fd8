use indicatif::ProgressBar;
use std::time::Duration;

/// Spinner shown while a request is in flight.
pub struct ProgressDisplay {
    pb: Option<ProgressBar>,
}

impl ProgressDisplay {
    /// Starts a spinner for `url`, or does nothing when `enabled` is false.
    pub fn start(url: &str, enabled: bool) -> Self {
        if !enabled {
            return ProgressDisplay { pb: None };
        }
        let pb = ProgressBar::new_spinner();
        pb.set_message(format!("Fetching {}...", url));
        pb.enable_steady_tick(Duration::from_millis(100));
        ProgressDisplay { pb: Some(pb) }
    }

    pub fn is_active(&self) -> bool {
        self.pb.is_some()
    }

    /// Stops the spinner and clears it from the terminal.
    pub fn stop(self) {
        if let Some(pb) = self.pb {
            pb.disable_steady_tick();
            pb.finish_and_clear();
        }
    }
}
