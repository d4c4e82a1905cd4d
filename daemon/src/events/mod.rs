//! Events module for capture pipeline activity
//!
//! Broadcast to the IPC server, which pushes them to subscribed UI clients
//! (tray icon, region picker, results popup).

use serde::{Deserialize, Serialize};

use crate::pipeline::HistoryEntry;

/// Events emitted while handling hotkeys and captures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// The picker should open; `combination` is set when a hotkey asked
    CaptureRequested { combination: Option<String> },

    /// The pending capture was abandoned
    CaptureCancelled,

    /// A captured image is being sent to the vision service
    ProcessingStarted,

    /// A capture finished and was added to the history
    CaptureProcessed {
        entry: HistoryEntry,
        /// Notification text summarizing the result
        message: String,
    },

    /// The captured image could not be read
    CaptureFailed { reason: String },

    /// A new hotkey chord was registered
    HotkeyChanged { chord: String },
}

impl std::fmt::Display for AppEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppEvent::CaptureRequested { combination: Some(combo) } => {
                write!(f, "CAPTURE_REQUESTED ({})", combo)
            }
            AppEvent::CaptureRequested { combination: None } => write!(f, "CAPTURE_REQUESTED"),
            AppEvent::CaptureCancelled => write!(f, "CAPTURE_CANCELLED"),
            AppEvent::ProcessingStarted => write!(f, "PROCESSING_STARTED"),
            AppEvent::CaptureProcessed { entry, .. } => {
                write!(f, "CAPTURE_PROCESSED ({} times, {})", entry.result.count, entry.result.formatted_total)
            }
            AppEvent::CaptureFailed { reason } => write!(f, "CAPTURE_FAILED ({})", reason),
            AppEvent::HotkeyChanged { chord } => write!(f, "HOTKEY_CHANGED ({})", chord),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = AppEvent::CaptureRequested {
            combination: Some("ALT+S+SHIFT".to_string()),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("capture_requested"));
        assert!(json.contains("ALT+S+SHIFT"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"capture_cancelled"}"#;
        let event: AppEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, AppEvent::CaptureCancelled));
    }

    #[test]
    fn test_event_display() {
        let event = AppEvent::HotkeyChanged {
            chord: "ALT+D+SHIFT".to_string(),
        };
        assert_eq!(event.to_string(), "HOTKEY_CHANGED (ALT+D+SHIFT)");
    }
}
