//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications for
//! pipeline events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::events::AppEvent;
use crate::extract::extract;
use crate::hotkey::ChordMatcher;
use crate::lifecycle::ShutdownSignal;
use crate::pipeline::{Phase, PipelineCommand, SharedHistory};

use super::protocol::{DaemonStatus, Notification, Request, Response, MAX_FRAME_LEN};

/// Daemon components the server reads from and forwards to
#[derive(Clone)]
pub struct Handles {
    pub matcher: Arc<ChordMatcher>,
    pub history: SharedHistory,
    pub commands: mpsc::Sender<PipelineCommand>,
    pub events: broadcast::Sender<AppEvent>,
    pub shutdown: ShutdownSignal,
}

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<RwLock<ServerState>>,
    handles: Handles,
    shutdown_tx: broadcast::Sender<()>,
}

/// Shared server state
struct ServerState {
    status: DaemonStatus,
    start_time: std::time::Instant,
}

impl Server {
    /// Create a new IPC server
    pub fn new(socket_path: &Path, handles: Handles) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            status: DaemonStatus::default(),
            start_time: std::time::Instant::now(),
        }));

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state,
            handles,
            shutdown_tx,
        })
    }

    /// Update the pipeline phase reported in status
    pub async fn set_phase(&self, phase: Phase) {
        let mut server_state = self.state.write().await;
        let old_phase = server_state.status.phase;
        server_state.status.phase = phase;

        if old_phase != phase {
            debug!(from = %old_phase, to = %phase, "IPC server: phase updated");
        }
    }

    /// Record whether the system input hook is running
    pub async fn set_hotkey_listening(&self, listening: bool) {
        self.state.write().await.status.hotkey_listening = listening;
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let handles = self.handles.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state, handles) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        mut stream: UnixStream,
        state: Arc<RwLock<ServerState>>,
        handles: Handles,
    ) -> Result<()> {
        loop {
            let Some(msg_buf) = Self::read_frame(&mut stream).await? else {
                debug!("client disconnected");
                return Ok(());
            };

            let request: Request = match serde_json::from_slice(&msg_buf) {
                Ok(request) => request,
                Err(e) => {
                    warn!(%e, "unparseable request");
                    Self::send_message(&mut stream, &Response::error("bad_request", e.to_string())).await?;
                    continue;
                }
            };

            debug!(?request, "received request");

            if matches!(request, Request::Subscribe) {
                // Subscribe before confirming so no event falls in between
                let events = handles.events.subscribe();
                Self::send_message(&mut stream, &Response::Subscribed).await?;
                debug!("client subscribed to notifications");
                return Self::push_events(stream, events).await;
            }

            let response = Self::process_request(request, &state, &handles).await;
            Self::send_message(&mut stream, &response).await?;
        }
    }

    /// Read one length-prefixed frame; `None` on a clean disconnect
    async fn read_frame(stream: &mut UnixStream) -> Result<Option<Vec<u8>>> {
        // Read message length (4-byte little-endian)
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_FRAME_LEN {
            anyhow::bail!("message too large: {len} bytes");
        }

        let mut msg_buf = vec![0u8; len];
        stream.read_exact(&mut msg_buf).await?;
        Ok(Some(msg_buf))
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(stream: &mut UnixStream, msg: &T) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        stream.write_all(&msg_len).await?;
        stream.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Forward every event to a subscribed client until it disconnects
    async fn push_events(mut stream: UnixStream, mut events: broadcast::Receiver<AppEvent>) -> Result<()> {
        let mut scratch = [0u8; 64];

        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        Self::send_message(&mut stream, &Notification::Event { event }).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                },
                read = stream.read(&mut scratch) => match read {
                    Ok(0) => {
                        debug!("subscriber disconnected");
                        return Ok(());
                    }
                    Ok(_) => debug!("ignoring input on subscribed connection"),
                    Err(e) => return Err(e.into()),
                },
            }
        }
    }

    /// Process a request and return a response
    async fn process_request(
        request: Request,
        state: &Arc<RwLock<ServerState>>,
        handles: &Handles,
    ) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => {
                let history_len = handles.history.read().await.len();
                let mut state = state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                state.status.hotkey = handles.matcher.chord().map(|chord| chord.to_string());
                state.status.history_len = history_len;
                Response::Status(state.status.clone())
            }

            Request::GetHistory => Response::History {
                entries: handles.history.read().await.entries().to_vec(),
            },

            Request::GetLatest => Response::Latest {
                entry: handles.history.read().await.latest().cloned(),
            },

            Request::StartCapture => Self::forward(handles, PipelineCommand::StartCapture).await,
            Request::SubmitCapture { path } => {
                Self::forward(handles, PipelineCommand::SubmitCapture { path }).await
            }
            Request::CancelCapture => Self::forward(handles, PipelineCommand::CancelCapture).await,

            Request::ExtractText { text } => Response::Extraction(extract(text.as_str())),

            Request::SetHotkey { spec } => match handles.matcher.register(&spec) {
                Ok(chord) => {
                    let chord = chord.to_string();
                    let _ = handles.events.send(AppEvent::HotkeyChanged { chord: chord.clone() });
                    Response::HotkeyUpdated { chord }
                }
                Err(e) => {
                    warn!(%e, "rejected hotkey");
                    Response::error("invalid_chord_spec", e.to_string())
                }
            },

            // Handled by the connection loop
            Request::Subscribe => Response::Subscribed,

            Request::Shutdown => {
                info!("shutdown requested via IPC");
                handles.shutdown.trigger();
                Response::ShuttingDown
            }
        }
    }

    async fn forward(handles: &Handles, command: PipelineCommand) -> Response {
        match handles.commands.send(command).await {
            Ok(()) => Response::Accepted,
            Err(_) => Response::error("pipeline_unavailable", "capture pipeline is not running"),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}
