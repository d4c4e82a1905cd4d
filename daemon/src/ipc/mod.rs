//! IPC module for daemon-UI communication
//!
//! The tray icon, region picker and history window are separate clients
//! that talk to the daemon over this socket.

mod protocol;
mod server;

pub use protocol::{DaemonStatus, Notification, Request, Response};
pub use server::{Handles, Server};
