//! Global hotkey listener
//!
//! Runs an input hook on a dedicated thread, feeds its key events into the
//! shared `ChordMatcher` and hands matches to the async side over a channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::keys::RawKey;
use super::matcher::{ChordMatcher, MatchEvent};

/// How long a hook may block before re-checking the running flag
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A raw key transition reported by an input hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEvent {
    Down(RawKey),
    Up(RawKey),
}

/// A source of system-wide key events.
///
/// `run` executes on the listener thread and must return soon after
/// `running` is cleared.
pub trait InputHook: Send + 'static {
    fn run(&mut self, sink: &mut dyn FnMut(KeyEvent), running: &AtomicBool) -> Result<(), HotkeyError>;
}

/// Input hook fed from a channel, for hosts that already own a key hook
pub struct ChannelHook {
    events: std_mpsc::Receiver<KeyEvent>,
}

impl ChannelHook {
    pub fn new(events: std_mpsc::Receiver<KeyEvent>) -> Self {
        Self { events }
    }
}

impl InputHook for ChannelHook {
    fn run(&mut self, sink: &mut dyn FnMut(KeyEvent), running: &AtomicBool) -> Result<(), HotkeyError> {
        while running.load(Ordering::SeqCst) {
            match self.events.recv_timeout(POLL_INTERVAL) {
                Ok(event) => sink(event),
                Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                    debug!("key event channel closed");
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Owns the hook thread and forwards chord matches
pub struct HotkeyListener {
    matcher: Arc<ChordMatcher>,
    match_tx: mpsc::Sender<MatchEvent>,
    running: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl HotkeyListener {
    /// Create a new hotkey listener
    pub fn new(matcher: Arc<ChordMatcher>, match_tx: mpsc::Sender<MatchEvent>) -> Self {
        Self {
            matcher,
            match_tx,
            running: Arc::new(AtomicBool::new(false)),
            thread: Mutex::new(None),
        }
    }

    /// Start the hook on a dedicated thread
    pub fn start(&self, mut hook: Box<dyn InputHook>) -> Result<(), HotkeyError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let matcher = Arc::clone(&self.matcher);
        let match_tx = self.match_tx.clone();
        let running = Arc::clone(&self.running);

        let spawned = thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");

                let mut sink = |event: KeyEvent| dispatch(&matcher, &match_tx, event);
                if let Err(e) = hook.run(&mut sink, &running) {
                    error!(?e, "hotkey listener error");
                }

                running.store(false, Ordering::SeqCst);
                info!("hotkey listener thread stopped");
            });

        match spawned {
            Ok(handle) => {
                *self.thread.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(HotkeyError::ThreadSpawn(e.to_string()))
            }
        }
    }

    /// Stop the hook, wait for its thread, and forget every held key.
    ///
    /// No key event is delivered to the matcher once this returns.
    pub fn unregister_all(&self) {
        self.running.store(false, Ordering::SeqCst);

        let handle = self.thread.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("hotkey listener thread panicked");
            }
        }

        self.matcher.clear();
        debug!("hotkey listener unregistered");
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.unregister_all();
    }
}

/// Apply one key event to the matcher and hand off any match.
///
/// Never blocks the hook thread: a full channel drops the match.
fn dispatch(matcher: &ChordMatcher, match_tx: &mpsc::Sender<MatchEvent>, event: KeyEvent) {
    match event {
        KeyEvent::Down(key) => {
            if let Some(matched) = matcher.on_key_down(&key) {
                info!(combination = %matched.combination, "hotkey triggered");
                if let Err(e) = match_tx.try_send(matched) {
                    warn!(%e, "failed to hand off hotkey match");
                }
            }
        }
        KeyEvent::Up(key) => matcher.on_key_up(&key),
    }
}

/// Errors that can occur in the hotkey listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to attach event tap to the run loop")]
    RunLoopSource,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("system input hook stopped delivering events")]
    HookClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener() -> (HotkeyListener, Arc<ChordMatcher>, mpsc::Receiver<MatchEvent>) {
        let matcher = Arc::new(ChordMatcher::new());
        matcher.register("Alt+Shift+S").unwrap();
        let (tx, rx) = mpsc::channel(8);
        (HotkeyListener::new(Arc::clone(&matcher), tx), matcher, rx)
    }

    #[test]
    fn test_listener_creation() {
        let (listener, _, _) = listener();
        assert!(!listener.is_running());
    }

    #[tokio::test]
    async fn test_match_is_delivered_over_channel() {
        let (listener, _, mut rx) = listener();
        let (key_tx, key_rx) = std_mpsc::channel();
        listener.start(Box::new(ChannelHook::new(key_rx))).unwrap();
        assert!(listener.is_running());

        for key in [
            RawKey::Named("alt_l".into()),
            RawKey::Named("shift_l".into()),
            RawKey::Char('s'),
            RawKey::Char('s'),
        ] {
            key_tx.send(KeyEvent::Down(key)).unwrap();
        }

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.combination, "ALT+S+SHIFT");

        listener.unregister_all();
        assert!(rx.try_recv().is_err(), "auto-repeat must not fire twice");
    }

    #[test]
    fn test_unregister_all_joins_and_clears() {
        let (listener, matcher, _rx) = listener();
        let (key_tx, key_rx) = std_mpsc::channel();
        listener.start(Box::new(ChannelHook::new(key_rx))).unwrap();

        key_tx.send(KeyEvent::Down(RawKey::Char('q'))).unwrap();
        // wait for the hook thread to apply the press
        for _ in 0..50 {
            if !matcher.held_keys().is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(matcher.held_keys(), vec!["Q"]);

        listener.unregister_all();
        assert!(!listener.is_running());
        assert!(matcher.held_keys().is_empty());

        // nothing is applied after unregistering
        let _ = key_tx.send(KeyEvent::Down(RawKey::Char('w')));
        thread::sleep(Duration::from_millis(50));
        assert!(matcher.held_keys().is_empty());
    }

    #[test]
    fn test_double_start_is_rejected() {
        let (listener, _, _rx) = listener();
        let (_key_tx, key_rx) = std_mpsc::channel();
        listener.start(Box::new(ChannelHook::new(key_rx))).unwrap();

        let (_key_tx2, key_rx2) = std_mpsc::channel();
        assert!(matches!(
            listener.start(Box::new(ChannelHook::new(key_rx2))),
            Err(HotkeyError::AlreadyRunning)
        ));
        listener.unregister_all();
    }
}
