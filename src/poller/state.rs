//! The polling lifecycle state machine.
//!
//! [`PollMachine`] is pure: it owns the state, attempt counter and error
//! run, and decides transitions from normalized inputs. The async driver in
//! [`controller`](super::controller) feeds it and handles the waiting.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::status::TopicResult;

/// The five states of the job polling lifecycle.
///
/// A watch flows through: IDLE → CHECKING_STATUS → POLLING_RESULTS →
/// FINISHED, with ERROR as the terminal failure state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollState {
    Idle,
    CheckingStatus,
    PollingResults,
    Finished,
    Error,
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollState::Idle => write!(f, "IDLE"),
            PollState::CheckingStatus => write!(f, "CHECKING_STATUS"),
            PollState::PollingResults => write!(f, "POLLING_RESULTS"),
            PollState::Finished => write!(f, "FINISHED"),
            PollState::Error => write!(f, "ERROR"),
        }
    }
}

/// One poll response, normalized for the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum PollInput {
    /// The job is not visible yet, or visible but not complete.
    NotYet,
    /// Terminal completion with the parsed result set.
    Complete(Vec<TopicResult>),
    /// The store marked the job itself as failed.
    JobFailed(String),
    /// The status request failed (transport, proxy, or upstream error).
    RequestFailed(String),
}

/// What the driver does after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum PollDecision {
    /// Schedule another attempt after the configured wait.
    Continue,
    /// Terminal success; the machine holds the results.
    Done,
    /// Terminal failure with a user-facing message.
    Abort(String),
}

/// Pacing and retry budget for a polling run.
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Wait between poll attempts, in milliseconds.
    pub interval_ms: u64,
    /// Consecutive request failures tolerated before giving up.
    pub max_errors: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 3000,
            max_errors: 3,
        }
    }
}

impl PollSettings {
    /// Wait before the next attempt after `errors` consecutive failures.
    /// delay = interval_ms * 2^(errors - 1), exponent capped at 6.
    pub fn delay_after_errors(&self, errors: u32) -> u64 {
        self.interval_ms * 2u64.pow(errors.saturating_sub(1).min(6))
    }
}

/// Drives one job's polling lifecycle.
#[derive(Debug)]
pub struct PollMachine {
    state: PollState,
    attempts: u32,
    consecutive_errors: u32,
    settings: PollSettings,
    results: Vec<TopicResult>,
    last_error: Option<String>,
}

impl PollMachine {
    pub fn new(settings: PollSettings) -> Self {
        Self {
            state: PollState::Idle,
            attempts: 0,
            consecutive_errors: 0,
            settings,
            results: Vec::new(),
            last_error: None,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    pub fn results(&self) -> &[TopicResult] {
        &self.results
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Enter CHECKING_STATUS: a job identifier became available.
    pub fn begin(&mut self) {
        self.state = PollState::CheckingStatus;
    }

    /// Record that a status request is about to be issued. Attempt counts
    /// are monotonically non-decreasing until [`reset`](Self::reset).
    pub fn note_attempt(&mut self) {
        self.attempts += 1;
    }

    /// Apply one poll response and decide what the driver does next.
    pub fn next(&mut self, input: PollInput) -> PollDecision {
        match input {
            PollInput::NotYet => {
                self.consecutive_errors = 0;
                // The job is confirmed to exist (or will shortly); from here
                // on the user-facing message is "awaiting completion".
                self.state = PollState::PollingResults;
                PollDecision::Continue
            }
            PollInput::Complete(results) => {
                self.consecutive_errors = 0;
                self.results = results;
                self.state = PollState::Finished;
                PollDecision::Done
            }
            PollInput::JobFailed(message) => {
                self.last_error = Some(message.clone());
                self.state = PollState::Error;
                PollDecision::Abort(message)
            }
            PollInput::RequestFailed(message) => {
                self.consecutive_errors += 1;
                self.last_error = Some(message.clone());
                if self.consecutive_errors >= self.settings.max_errors {
                    self.state = PollState::Error;
                    PollDecision::Abort(message)
                } else {
                    // State is unchanged: a transient failure keeps us in
                    // CHECKING_STATUS or POLLING_RESULTS for the retry.
                    PollDecision::Continue
                }
            }
        }
    }

    /// Return to IDLE for a fresh job (wizard restart).
    #[allow(dead_code)]
    pub fn reset(&mut self) {
        let settings = self.settings.clone();
        *self = Self::new(settings);
    }
}
