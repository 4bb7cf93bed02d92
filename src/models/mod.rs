//! Data types shared across the session core.

mod progress;
mod story;

pub use progress::ProgressRecord;
pub use story::Story;
