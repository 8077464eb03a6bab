//! Terminal feedback for the watch command — spinner and styled output.
//!
//! Uses `indicatif` for the progress spinner and `console` for color
//! styling. [`WatchProgress`] observes a polling run and keeps the spinner
//! message in step with the lifecycle.

use chrono::{DateTime, Utc};
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::poller::{PollObserver, PollSnapshot, PollState};
use crate::status::TopicResult;

/// Spinner-backed observer for a polling run.
pub struct WatchProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl WatchProgress {
    /// Start the spinner for the given job.
    pub fn start(job_id: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("Checking status of job {job_id}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    pub fn finish_success(&self, count: usize) {
        self.pb.finish_with_message(format!(
            "{} Results ready — {count} topic(s)",
            self.green.apply_to("✓")
        ));
    }

    pub fn finish_error(&self, message: &str) {
        self.pb
            .finish_with_message(format!("{} {message}", self.red.apply_to("✗")));
    }

    pub fn finish_cancelled(&self) {
        self.pb.finish_with_message("cancelled".to_string());
    }
}

impl PollObserver for WatchProgress {
    fn on_update(&self, snapshot: &PollSnapshot) {
        if snapshot.errors > 0
            && let Some(message) = &snapshot.message
        {
            self.pb.println(format!(
                "  {} attempt {} failed: {message}",
                self.yellow.apply_to("↻"),
                snapshot.attempts
            ));
        }
        self.pb.set_message(status_line(snapshot));
    }
}

/// Human-readable one-liner for the current polling state.
fn status_line(snapshot: &PollSnapshot) -> String {
    match snapshot.state {
        PollState::Idle => String::new(),
        PollState::CheckingStatus => {
            format!("Checking job status (attempt {})", snapshot.attempts.max(1))
        }
        PollState::PollingResults => format!(
            "Job found, waiting for results (attempt {})",
            snapshot.attempts
        ),
        PollState::Finished => "Results ready".to_string(),
        PollState::Error => snapshot
            .message
            .clone()
            .unwrap_or_else(|| "polling failed".to_string()),
    }
}

/// Print a ranked result listing: position, score badge, title, creation time.
pub fn print_results(results: &[TopicResult]) {
    let bold = Style::new().bold();
    let dim = Style::new().dim();
    for (idx, item) in results.iter().enumerate() {
        let title = item.title.as_deref().unwrap_or("(untitled)");
        let score = item.match_score.as_deref().unwrap_or("–");
        let when = item
            .created_at
            .and_then(format_epoch_ms)
            .unwrap_or_default();
        println!(
            "{:>3}. [{score}] {} {}",
            idx + 1,
            bold.apply_to(title),
            dim.apply_to(when)
        );
    }
}

fn format_epoch_ms(ms: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
}
