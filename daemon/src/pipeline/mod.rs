//! Capture pipeline module
//!
//! Turns hotkey matches and UI commands into capture requests, processes
//! submitted captures, and keeps the history log:
//! - Idle: waiting for a hotkey or tray request
//! - AwaitingCapture: the region picker is open
//! - Processing: the capture is with the vision service

mod history;
mod runner;

pub use history::{History, HistoryEntry, SharedHistory};
pub use runner::{Phase, Pipeline, PipelineCommand};
