pub mod controller;
pub mod state;

pub use controller::{
    HttpStatusSource, PollObserver, PollOutcome, PollSnapshot, StatusSource, poll_job,
};
pub use state::{PollDecision, PollInput, PollMachine, PollSettings, PollState};
