//! Time extraction module
//!
//! Turns free-form vision model output into validated `H:MM` tokens and
//! aggregates them into a summary for the history log.

mod summary;
mod time;

pub use summary::{extract, format_minutes, ExtractionResult};
pub use time::TimeToken;
