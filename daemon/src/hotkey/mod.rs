//! Hotkey module for global keyboard chord detection
//!
//! An input hook thread reports raw key transitions, the `ChordMatcher`
//! tracks held keys against the registered chord, and matches reach the
//! capture pipeline over a channel.

mod chord;
mod keys;
mod listener;
#[cfg(target_os = "macos")]
mod macos;
mod matcher;
#[cfg(all(not(target_os = "macos"), feature = "rdev-hook"))]
mod rdev_hook;

pub use chord::{Chord, ChordError};
pub use keys::RawKey;
pub use listener::{ChannelHook, HotkeyError, HotkeyListener, InputHook, KeyEvent};
pub use matcher::{ChordMatcher, MatchEvent};

/// The system-wide input hook for this platform, if there is one
#[cfg(target_os = "macos")]
pub fn platform_hook() -> Option<Box<dyn InputHook>> {
    Some(Box::new(macos::MacEventTap))
}

/// The system-wide input hook for this platform, if there is one
#[cfg(all(not(target_os = "macos"), feature = "rdev-hook"))]
pub fn platform_hook() -> Option<Box<dyn InputHook>> {
    Some(Box::new(rdev_hook::RdevHook::default()))
}

/// The system-wide input hook for this platform, if there is one
#[cfg(all(not(target_os = "macos"), not(feature = "rdev-hook")))]
pub fn platform_hook() -> Option<Box<dyn InputHook>> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_hook_availability() {
        let expected = cfg!(any(target_os = "macos", feature = "rdev-hook"));
        assert_eq!(platform_hook().is_some(), expected);
    }
}
