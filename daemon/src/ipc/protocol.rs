//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::events::AppEvent;
use crate::extract::ExtractionResult;
use crate::pipeline::{HistoryEntry, Phase};

/// Largest frame either side may send
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Requests from UI to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Every processed capture, oldest first
    GetHistory,

    /// The most recent capture ("show details")
    GetLatest,

    /// Open the region picker without a hotkey
    StartCapture,

    /// Process the capture saved at `path`
    SubmitCapture { path: PathBuf },

    /// The picker was dismissed
    CancelCapture,

    /// Run the extractor over text directly
    ExtractText { text: String },

    /// Replace the registered hotkey chord
    SetHotkey { spec: String },

    /// Ping to check connectivity
    Ping,

    /// Subscribe to event notifications
    Subscribe,

    /// Stop the daemon
    Shutdown,
}

/// Responses from daemon to UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    History { entries: Vec<HistoryEntry> },

    Latest { entry: Option<HistoryEntry> },

    /// The command was queued for the capture pipeline
    Accepted,

    Extraction(ExtractionResult),

    /// The chord now registered, in canonical form
    HotkeyUpdated { chord: String },

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    ShuttingDown,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to UI (for subscribed clients)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Event { event: AppEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Current pipeline phase
    pub phase: Phase,

    /// Registered chord in canonical form
    pub hotkey: Option<String>,

    /// Whether a system input hook is running
    pub hotkey_listening: bool,

    /// Number of processed captures
    pub history_len: usize,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            phase: Phase::default(),
            hotkey: None,
            hotkey_listening: false,
            history_len: 0,
            uptime_secs: 0,
        }
    }
}
