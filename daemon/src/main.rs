//! snaplytics: background daemon that sums time values read from screen captures
//!
//! This daemon provides:
//! - Global hotkey detection that asks the picker UI for a screen region
//! - A capture pipeline that sends regions to a vision model and extracts
//!   `H:MM` durations from its answer
//! - An in-memory history of processed captures
//! - IPC server for the tray, picker and history clients
//!
//! Screen capture, notification delivery and window rendering live in the
//! UI clients, not here.
//!
//! The IPC socket and signal handling are Unix-only. The global hotkey uses
//! a CGEventTap on macOS and, with the `rdev-hook` feature, `rdev` elsewhere.

#[cfg(not(unix))]
compile_error!("snaplytics serves IPC over a Unix domain socket and supports Unix platforms only");

mod config;
mod events;
mod extract;
mod hotkey;
mod ipc;
mod lifecycle;
mod pipeline;
mod vision;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::AppEvent;
use crate::hotkey::{ChordMatcher, HotkeyListener};
use crate::ipc::{Handles, Server};
use crate::lifecycle::ShutdownSignal;
use crate::pipeline::{History, Phase, Pipeline};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "snaplytics starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, hotkey = %config.hotkey, "configuration loaded");

    let api_key = config
        .api_key
        .clone()
        .context("OPENAI_API_KEY must be set to reach the vision service")?;
    let vision = vision::Client::new(api_key)?
        .with_endpoint(&config.vision_endpoint)
        .with_model(&config.vision_model);

    let shutdown = ShutdownSignal::new();

    // Hotkey listener -> pipeline
    let (match_tx, match_rx) = mpsc::channel(32);
    // IPC server -> pipeline
    let (command_tx, command_rx) = mpsc::channel(32);
    // Pipeline -> IPC subscribers
    let (event_tx, _event_rx) = broadcast::channel::<AppEvent>(64);

    // A bad configured chord is a startup error
    let matcher = Arc::new(ChordMatcher::new());
    matcher
        .register(&config.hotkey)
        .with_context(|| format!("invalid SNAPLYTICS_HOTKEY {:?}", config.hotkey))?;

    let history = History::shared();
    let mut pipeline = Pipeline::new(vision, Arc::clone(&history), event_tx.clone());

    // Start the hotkey listener (runs on dedicated thread)
    let hotkey_listener = HotkeyListener::new(Arc::clone(&matcher), match_tx);
    match hotkey::platform_hook() {
        Some(hook) => match hotkey_listener.start(hook) {
            Ok(()) => info!("hotkey listener started"),
            Err(e) => {
                error!(?e, "failed to start hotkey listener");
                warn!("continuing without hotkey support - check Accessibility permissions");
            }
        },
        None => warn!("no system input hook in this build (enable the rdev-hook feature), captures start from the tray only"),
    }

    let server = Server::new(
        &config.socket_path,
        Handles {
            matcher: Arc::clone(&matcher),
            history: Arc::clone(&history),
            commands: command_tx,
            events: event_tx.clone(),
            shutdown: shutdown.clone(),
        },
    )?;
    server.set_hotkey_listening(hotkey_listener.is_running()).await;

    // Subscribe to pipeline events for IPC status updates
    let mut status_rx = event_tx.subscribe();
    let server_for_events = &server;

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the pipeline (processes hotkey matches and capture commands)
        _ = pipeline.run(match_rx, command_rx) => {
            info!("capture pipeline exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Mirror the pipeline phase into the status snapshot
        _ = async {
            loop {
                match status_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "pipeline event");
                        let phase = match &event {
                            AppEvent::CaptureRequested { .. } => Phase::AwaitingCapture,
                            AppEvent::ProcessingStarted => Phase::Processing,
                            AppEvent::CaptureCancelled
                            | AppEvent::CaptureProcessed { .. }
                            | AppEvent::CaptureFailed { .. } => Phase::Idle,
                            AppEvent::HotkeyChanged { .. } => continue,
                        };
                        server_for_events.set_phase(phase).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "pipeline event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("pipeline event handler exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    hotkey_listener.unregister_all();
    server.shutdown().await;

    info!("snaplytics stopped");

    Ok(())
}
