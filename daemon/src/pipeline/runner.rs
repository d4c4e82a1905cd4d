//! Capture pipeline
//!
//! Moves between Idle, AwaitingCapture and Processing as hotkey matches and
//! UI commands arrive, runs captures through the vision service and the
//! time extractor, and records every processed capture.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::events::AppEvent;
use crate::extract::extract;
use crate::hotkey::MatchEvent;
use crate::vision::{prepare_png, VisionModel};

use super::history::{HistoryEntry, SharedHistory};

/// Where the pipeline is in the capture cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for a hotkey or tray request
    #[default]
    Idle,
    /// The region picker is open
    AwaitingCapture,
    /// A capture is with the vision service
    Processing,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::AwaitingCapture => write!(f, "AwaitingCapture"),
            Phase::Processing => write!(f, "Processing"),
        }
    }
}

/// Requests from the UI side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineCommand {
    /// Open the picker without a hotkey (tray "Capture Area")
    StartCapture,
    /// The picker saved the selected region to `path`
    SubmitCapture { path: PathBuf },
    /// The picker was dismissed
    CancelCapture,
}

pub struct Pipeline<V> {
    vision: V,
    phase: Phase,
    /// Time when the current non-Idle phase was entered
    phase_entered_at: Option<Instant>,
    history: SharedHistory,
    event_tx: broadcast::Sender<AppEvent>,
}

impl<V: VisionModel> Pipeline<V> {
    pub fn new(vision: V, history: SharedHistory, event_tx: broadcast::Sender<AppEvent>) -> Self {
        Self {
            vision,
            phase: Phase::Idle,
            phase_entered_at: None,
            history,
            event_tx,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the pipeline until both input channels close
    pub async fn run(
        &mut self,
        mut match_rx: mpsc::Receiver<MatchEvent>,
        mut command_rx: mpsc::Receiver<PipelineCommand>,
    ) {
        info!("capture pipeline started in Idle phase");

        loop {
            tokio::select! {
                Some(matched) = match_rx.recv() => self.handle_match(matched),
                Some(command) = command_rx.recv() => self.handle_command(command).await,
                else => break,
            }
        }

        info!("capture pipeline stopped");
    }

    fn handle_match(&mut self, matched: MatchEvent) {
        self.request_capture(Some(matched.combination));
    }

    async fn handle_command(&mut self, command: PipelineCommand) {
        match command {
            PipelineCommand::StartCapture => self.request_capture(None),
            PipelineCommand::CancelCapture => {
                if self.phase == Phase::AwaitingCapture {
                    self.transition_to(Phase::Idle);
                    self.emit(AppEvent::CaptureCancelled);
                } else {
                    debug!(phase = %self.phase, "no pending capture to cancel");
                }
            }
            PipelineCommand::SubmitCapture { path } => self.process_file(&path).await,
        }
    }

    /// Ask the picker for a region.
    ///
    /// A trigger while the picker is already open asks again, so a picker
    /// that crashed or was never connected cannot swallow the hotkey.
    fn request_capture(&mut self, combination: Option<String>) {
        match self.phase {
            Phase::Idle => self.transition_to(Phase::AwaitingCapture),
            Phase::AwaitingCapture => {
                debug!(?combination, "picker already requested, asking again");
                self.phase_entered_at = Some(Instant::now());
            }
            Phase::Processing => {
                debug!(?combination, "capture is processing, ignoring trigger");
                return;
            }
        }

        self.emit(AppEvent::CaptureRequested { combination });
    }

    async fn process_file(&mut self, path: &Path) {
        self.transition_to(Phase::Processing);
        self.emit(AppEvent::ProcessingStarted);

        let image = match tokio::fs::read(path).await {
            Ok(image) => image,
            Err(e) => {
                warn!(?path, %e, "failed to read capture");
                self.transition_to(Phase::Idle);
                self.emit(AppEvent::CaptureFailed {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
                return;
            }
        };

        let entry = process_capture(&self.vision, &image).await;
        self.history.write().await.append(entry.clone());

        self.transition_to(Phase::Idle);
        self.emit(AppEvent::CaptureProcessed {
            message: entry.result.notification_text(),
            entry,
        });
    }

    fn transition_to(&mut self, new_phase: Phase) {
        let old_phase = self.phase;
        let duration_ms = self
            .phase_entered_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        info!(
            from = %old_phase,
            to = %new_phase,
            duration_ms = duration_ms,
            "phase transition"
        );

        self.phase = new_phase;
        self.phase_entered_at = if new_phase != Phase::Idle {
            Some(Instant::now())
        } else {
            None
        };
    }

    fn emit(&self, event: AppEvent) {
        debug!(%event, "emitting event");
        // No subscribers is fine: the UI may not be connected yet
        let _ = self.event_tx.send(event);
    }
}

/// Run one captured image through the vision service and the extractor.
///
/// Service and decoding failures never escape: they produce a zero result
/// carrying the error text.
pub async fn process_capture<V: VisionModel>(vision: &V, image: &[u8]) -> HistoryEntry {
    let text = match prepare_png(image) {
        Ok(png) => vision.read_image(&png).await,
        Err(e) => Err(e),
    };

    match text {
        Ok(text) => {
            let result = extract(text.as_deref());
            info!(
                count = result.count,
                total = %result.formatted_total,
                "capture processed"
            );
            HistoryEntry::succeeded(result)
        }
        Err(e) => {
            warn!(%e, "error processing image");
            HistoryEntry::failed(e.to_string())
        }
    }
}
