//! macOS input hook using CGEventTap
//!
//! Listens for key down/up and modifier flag changes on the session event
//! stream. The tap and its CFRunLoop live on the listener thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventType, EventField,
};
use tracing::{error, info, warn};

use super::keys::RawKey;
use super::listener::{HotkeyError, InputHook, KeyEvent, POLL_INTERVAL};

/// Listen-only session event tap
#[derive(Debug, Default)]
pub struct MacEventTap;

impl InputHook for MacEventTap {
    fn run(&mut self, sink: &mut dyn FnMut(KeyEvent), running: &AtomicBool) -> Result<(), HotkeyError> {
        let (callback_tx, callback_rx) = mpsc::channel::<KeyEvent>();
        // Set by the callback when the system disables the tap
        let disabled = Arc::new(AtomicBool::new(false));
        let disabled_by_system = Arc::clone(&disabled);

        // CGEventTap callback - must be fast and non-blocking
        let callback = move |_proxy: core_graphics::event::CGEventTapProxy,
                             event_type: CGEventType,
                             event: &CGEvent|
              -> Option<CGEvent> {
            let keycode = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
            let translated = match event_type {
                CGEventType::KeyDown => {
                    // the matcher latches on its own; repeats only add noise
                    let repeat = event.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT);
                    (repeat == 0).then(|| KeyEvent::Down(raw_key(keycode)))
                }
                CGEventType::KeyUp => Some(KeyEvent::Up(raw_key(keycode))),
                CGEventType::FlagsChanged => modifier_event(keycode, event.get_flags()),
                _ if disabled_by(event_type) => {
                    warn!("event tap disabled, will re-enable");
                    disabled_by_system.store(true, Ordering::SeqCst);
                    None
                }
                _ => None,
            };
            if let Some(key_event) = translated {
                let _ = callback_tx.send(key_event);
            }
            Some(event.clone())
        };

        let tap = CGEventTap::new(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::ListenOnly,
            vec![CGEventType::KeyDown, CGEventType::KeyUp, CGEventType::FlagsChanged],
            callback,
        )
        .map_err(|_| {
            error!("failed to create event tap - is Accessibility permission granted?");
            HotkeyError::EventTapCreation
        })?;

        tap.enable();

        let run_loop_source = tap
            .mach_port
            .create_runloop_source(0)
            .map_err(|_| HotkeyError::RunLoopSource)?;
        let run_loop = CFRunLoop::get_current();

        unsafe {
            run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
        }

        info!("event tap created and enabled");

        while running.load(Ordering::SeqCst) {
            unsafe {
                CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, POLL_INTERVAL, true);
            }

            if disabled.swap(false, Ordering::SeqCst) {
                tap.enable();
                info!("event tap re-enabled");
            }

            while let Ok(key_event) = callback_rx.try_recv() {
                sink(key_event);
            }
        }

        // Detach before the tap is dropped so no callback outlives the loop
        unsafe {
            run_loop.remove_source(&run_loop_source, kCFRunLoopCommonModes);
        }

        Ok(())
    }
}

/// Whether the system turned the tap off (slow callback or secure input)
fn disabled_by(event_type: CGEventType) -> bool {
    matches!(
        event_type,
        CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput
    )
}

/// Map a FlagsChanged keycode to a modifier press or release
fn modifier_event(keycode: i64, flags: CGEventFlags) -> Option<KeyEvent> {
    let (name, flag) = match keycode {
        56 => ("shift_l", CGEventFlags::CGEventFlagShift),
        60 => ("shift_r", CGEventFlags::CGEventFlagShift),
        59 => ("ctrl_l", CGEventFlags::CGEventFlagControl),
        62 => ("ctrl_r", CGEventFlags::CGEventFlagControl),
        58 => ("alt_l", CGEventFlags::CGEventFlagAlternate),
        61 => ("alt_r", CGEventFlags::CGEventFlagAlternate),
        55 => ("cmd_l", CGEventFlags::CGEventFlagCommand),
        54 => ("cmd_r", CGEventFlags::CGEventFlagCommand),
        _ => return None,
    };

    let key = RawKey::Named(name.to_string());
    Some(if flags.contains(flag) {
        KeyEvent::Down(key)
    } else {
        KeyEvent::Up(key)
    })
}

/// Map an ANSI virtual keycode to a raw key.
///
/// Keycodes identify physical keys, so Option-modified characters still
/// report their base letter.
fn raw_key(keycode: i64) -> RawKey {
    const LETTERS: [(i64, char); 36] = [
        (0, 'a'), (11, 'b'), (8, 'c'), (2, 'd'), (14, 'e'), (3, 'f'),
        (5, 'g'), (4, 'h'), (34, 'i'), (38, 'j'), (40, 'k'), (37, 'l'),
        (46, 'm'), (45, 'n'), (31, 'o'), (35, 'p'), (12, 'q'), (15, 'r'),
        (1, 's'), (17, 't'), (32, 'u'), (9, 'v'), (13, 'w'), (7, 'x'),
        (16, 'y'), (6, 'z'), (29, '0'), (18, '1'), (19, '2'), (20, '3'),
        (21, '4'), (23, '5'), (22, '6'), (26, '7'), (28, '8'), (25, '9'),
    ];
    const NAMED: [(i64, &str); 27] = [
        (36, "enter"), (48, "tab"), (49, "space"), (51, "backspace"), (53, "esc"),
        (117, "delete"), (115, "home"), (119, "end"), (116, "page_up"), (121, "page_down"),
        (123, "left"), (124, "right"), (125, "down"), (126, "up"),
        (122, "f1"), (120, "f2"), (99, "f3"), (118, "f4"), (96, "f5"), (97, "f6"),
        (98, "f7"), (100, "f8"), (101, "f9"), (109, "f10"), (103, "f11"), (111, "f12"),
        (57, "caps_lock"),
    ];

    if let Some(&(_, c)) = LETTERS.iter().find(|(code, _)| *code == keycode) {
        return RawKey::Char(c);
    }
    if let Some(&(_, name)) = NAMED.iter().find(|(code, _)| *code == keycode) {
        return RawKey::Named(name.to_string());
    }
    RawKey::Unknown(keycode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_keycodes() {
        assert_eq!(raw_key(1), RawKey::Char('s'));
        assert_eq!(raw_key(49), RawKey::Named("space".to_string()));
        assert_eq!(raw_key(10), RawKey::Unknown(10));
    }

    #[test]
    fn test_disable_notifications() {
        assert!(disabled_by(CGEventType::TapDisabledByTimeout));
        assert!(disabled_by(CGEventType::TapDisabledByUserInput));
        assert!(!disabled_by(CGEventType::KeyDown));
        assert!(!disabled_by(CGEventType::FlagsChanged));
    }

    #[test]
    fn test_modifier_flags() {
        assert_eq!(
            modifier_event(58, CGEventFlags::CGEventFlagAlternate),
            Some(KeyEvent::Down(RawKey::Named("alt_l".to_string())))
        );
        assert_eq!(
            modifier_event(58, CGEventFlags::CGEventFlagNull),
            Some(KeyEvent::Up(RawKey::Named("alt_l".to_string())))
        );
        assert_eq!(modifier_event(0, CGEventFlags::CGEventFlagNull), None);
    }
}
