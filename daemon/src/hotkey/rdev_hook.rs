//! Portable input hook on top of `rdev` (X11 on Linux, low-level hooks on Windows)
//!
//! `rdev::listen` blocks its thread for the life of the process and cannot
//! be stopped, so it runs on a thread of its own and the hook drains its
//! events in 100 ms slices on the listener thread. A restarted hook keeps
//! using the same `rdev` thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use rdev::{Event, EventType, Key};
use tracing::{error, info};

use super::keys::RawKey;
use super::listener::{HotkeyError, InputHook, KeyEvent, POLL_INTERVAL};

#[derive(Debug, Default)]
pub struct RdevHook {
    events: Option<mpsc::Receiver<KeyEvent>>,
}

impl InputHook for RdevHook {
    fn run(&mut self, sink: &mut dyn FnMut(KeyEvent), running: &AtomicBool) -> Result<(), HotkeyError> {
        let events = match self.events.take() {
            Some(events) => events,
            None => spawn_listen_thread()?,
        };

        while running.load(Ordering::SeqCst) {
            match events.recv_timeout(POLL_INTERVAL) {
                Ok(event) => sink(event),
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => return Err(HotkeyError::HookClosed),
            }
        }

        self.events = Some(events);
        Ok(())
    }
}

fn spawn_listen_thread() -> Result<mpsc::Receiver<KeyEvent>, HotkeyError> {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("rdev-listen".to_string())
        .spawn(move || {
            info!("rdev input hook started");
            let result = rdev::listen(move |event: Event| {
                if let Some(key_event) = key_event(&event.event_type) {
                    let _ = tx.send(key_event);
                }
            });
            if let Err(e) = result {
                error!(?e, "rdev input hook failed - is an X11 display available?");
            }
        })
        .map_err(|e| HotkeyError::ThreadSpawn(e.to_string()))?;

    Ok(rx)
}

fn key_event(event_type: &EventType) -> Option<KeyEvent> {
    match event_type {
        EventType::KeyPress(key) => Some(KeyEvent::Down(raw_key(*key))),
        EventType::KeyRelease(key) => Some(KeyEvent::Up(raw_key(*key))),
        _ => None,
    }
}

/// Map an `rdev` key to a raw key.
///
/// Physical keys are reported, so shifted characters keep their base letter.
fn raw_key(key: Key) -> RawKey {
    const LETTERS: [(Key, char); 36] = [
        (Key::KeyA, 'a'), (Key::KeyB, 'b'), (Key::KeyC, 'c'), (Key::KeyD, 'd'),
        (Key::KeyE, 'e'), (Key::KeyF, 'f'), (Key::KeyG, 'g'), (Key::KeyH, 'h'),
        (Key::KeyI, 'i'), (Key::KeyJ, 'j'), (Key::KeyK, 'k'), (Key::KeyL, 'l'),
        (Key::KeyM, 'm'), (Key::KeyN, 'n'), (Key::KeyO, 'o'), (Key::KeyP, 'p'),
        (Key::KeyQ, 'q'), (Key::KeyR, 'r'), (Key::KeyS, 's'), (Key::KeyT, 't'),
        (Key::KeyU, 'u'), (Key::KeyV, 'v'), (Key::KeyW, 'w'), (Key::KeyX, 'x'),
        (Key::KeyY, 'y'), (Key::KeyZ, 'z'), (Key::Num0, '0'), (Key::Num1, '1'),
        (Key::Num2, '2'), (Key::Num3, '3'), (Key::Num4, '4'), (Key::Num5, '5'),
        (Key::Num6, '6'), (Key::Num7, '7'), (Key::Num8, '8'), (Key::Num9, '9'),
    ];
    const NAMED: [(Key, &str); 35] = [
        (Key::ShiftLeft, "shift_l"), (Key::ShiftRight, "shift_r"),
        (Key::ControlLeft, "ctrl_l"), (Key::ControlRight, "ctrl_r"),
        (Key::Alt, "alt_l"), (Key::AltGr, "alt_r"),
        (Key::MetaLeft, "cmd_l"), (Key::MetaRight, "cmd_r"),
        (Key::Return, "enter"), (Key::Tab, "tab"), (Key::Space, "space"),
        (Key::Backspace, "backspace"), (Key::Escape, "esc"), (Key::Delete, "delete"),
        (Key::Home, "home"), (Key::End, "end"), (Key::PageUp, "page_up"),
        (Key::PageDown, "page_down"), (Key::LeftArrow, "left"), (Key::RightArrow, "right"),
        (Key::DownArrow, "down"), (Key::UpArrow, "up"), (Key::CapsLock, "caps_lock"),
        (Key::F1, "f1"), (Key::F2, "f2"), (Key::F3, "f3"), (Key::F4, "f4"),
        (Key::F5, "f5"), (Key::F6, "f6"), (Key::F7, "f7"), (Key::F8, "f8"),
        (Key::F9, "f9"), (Key::F10, "f10"), (Key::F11, "f11"), (Key::F12, "f12"),
    ];

    if let Some(&(_, c)) = LETTERS.iter().find(|(k, _)| *k == key) {
        return RawKey::Char(c);
    }
    if let Some(&(_, name)) = NAMED.iter().find(|(k, _)| *k == key) {
        return RawKey::Named(name.to_string());
    }
    match key {
        Key::Unknown(code) => RawKey::Unknown(i64::from(code)),
        other => RawKey::Named(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::keys::normalize;

    #[test]
    fn test_letter_and_digit_keys() {
        assert_eq!(raw_key(Key::KeyS), RawKey::Char('s'));
        assert_eq!(raw_key(Key::Num7), RawKey::Char('7'));
        assert_eq!(raw_key(Key::Unknown(191)), RawKey::Unknown(191));
    }

    #[test]
    fn test_modifiers_collapse_to_canonical_tokens() {
        assert_eq!(normalize(&raw_key(Key::Alt)).as_deref(), Some("ALT"));
        assert_eq!(normalize(&raw_key(Key::AltGr)).as_deref(), Some("ALT"));
        assert_eq!(normalize(&raw_key(Key::ShiftRight)).as_deref(), Some("SHIFT"));
        assert_eq!(normalize(&raw_key(Key::MetaLeft)).as_deref(), Some("CMD"));
        assert_eq!(normalize(&raw_key(Key::Space)).as_deref(), Some("SPACE"));
    }

    #[test]
    fn test_only_key_transitions_are_reported() {
        assert_eq!(
            key_event(&EventType::KeyPress(Key::KeyS)),
            Some(KeyEvent::Down(RawKey::Char('s')))
        );
        assert_eq!(
            key_event(&EventType::KeyRelease(Key::ShiftLeft)),
            Some(KeyEvent::Up(RawKey::Named("shift_l".to_string())))
        );
        assert_eq!(key_event(&EventType::MouseMove { x: 1.0, y: 2.0 }), None);
    }
}
