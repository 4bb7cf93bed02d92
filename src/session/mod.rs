//! The reading-session state machine and its externally visible state.

mod controller;
mod state;

pub use controller::{SessionController, SessionDeps};
pub use state::{Feedback, SessionPhase, SessionSnapshot, SessionState};
