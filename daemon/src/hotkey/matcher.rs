//! Chord matching over the held-key set
//!
//! The matcher is shared between the input hook thread, which feeds it key
//! events, and the async side, which registers chords and reads its state.
//! All state sits behind one mutex.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::chord::{Chord, ChordError};
use super::keys::{self, RawKey};

/// Raised when the held keys form the registered chord
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEvent {
    /// Canonical `A+B+C` form of the matched combination
    pub combination: String,
}

#[derive(Debug, Default)]
struct MatcherState {
    held: BTreeSet<String>,
    chord: Option<Chord>,
    /// Combination that last fired; matching stays quiet until one of its
    /// keys is released
    fired: Option<BTreeSet<String>>,
}

/// Tracks held keys and reports edge-triggered chord matches
#[derive(Debug, Default)]
pub struct ChordMatcher {
    state: Mutex<MatcherState>,
}

impl ChordMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MatcherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the chord to match, replacing any previous one.
    ///
    /// Safe to call while keys are held. Re-registering the same chord
    /// keeps the current latch.
    pub fn register(&self, spec: &str) -> Result<Chord, ChordError> {
        let chord = Chord::parse(spec)?;
        if chord.requires_ctrl() {
            warn!(%chord, "CTRL never takes part in matching; this chord cannot fire");
        }

        let mut state = self.lock();
        if state.chord.as_ref() != Some(&chord) {
            state.fired = None;
        }
        state.chord = Some(chord.clone());
        info!(%chord, "hotkey registered");

        Ok(chord)
    }

    /// The currently registered chord
    pub fn chord(&self) -> Option<Chord> {
        self.lock().chord.clone()
    }

    /// Handle a key press, returning a match when the chord is completed
    pub fn on_key_down(&self, key: &RawKey) -> Option<MatchEvent> {
        let token = keys::normalize(key)?;

        let mut state = self.lock();
        state.held.insert(token);

        let combination = keys::effective_combination(&state.held);
        let chord = state.chord.as_ref()?;
        if !chord.matches(&combination) {
            return None;
        }

        let rendered = keys::join(&combination);
        if state.fired.is_some() {
            debug!(combination = %rendered, "chord still held, not re-firing");
            return None;
        }

        state.fired = Some(combination);
        debug!(combination = %rendered, "chord matched");
        Some(MatchEvent {
            combination: rendered,
        })
    }

    /// Handle a key release
    pub fn on_key_up(&self, key: &RawKey) {
        let Some(token) = keys::normalize(key) else {
            return;
        };

        let mut state = self.lock();
        state.held.remove(&token);
        for variant in keys::variants(&token) {
            state.held.remove(&variant);
        }

        // Re-arm once a key that formed the last match goes up
        let released = keys::effective_combination(&BTreeSet::from([token]));
        let rearm = state
            .fired
            .as_ref()
            .is_some_and(|fired| released.iter().any(|key| fired.contains(key)));
        if rearm {
            state.fired = None;
        }
    }

    /// Forget every held key
    pub fn clear(&self) {
        let mut state = self.lock();
        state.held.clear();
        state.fired = None;
    }

    /// Snapshot of the held keys, sorted
    pub fn held_keys(&self) -> Vec<String> {
        self.lock().held.iter().cloned().collect()
    }

    /// Whether the registered chord has fired and is still held
    pub fn is_matched(&self) -> bool {
        self.lock().fired.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> RawKey {
        RawKey::Named(name.to_string())
    }

    fn matcher(spec: &str) -> ChordMatcher {
        let matcher = ChordMatcher::new();
        matcher.register(spec).unwrap();
        matcher
    }

    #[test]
    fn test_fires_once_for_alt_shift_s() {
        let m = matcher("ALT+SHIFT+S");

        assert_eq!(m.on_key_down(&named("alt_l")), None);
        assert_eq!(m.on_key_down(&named("shift")), None);
        let event = m.on_key_down(&RawKey::Char('s')).unwrap();
        assert_eq!(event.combination, "ALT+S+SHIFT");
        assert!(m.is_matched());

        // auto-repeat while held
        assert_eq!(m.on_key_down(&RawKey::Char('s')), None);
        assert_eq!(m.on_key_down(&RawKey::Char('s')), None);
    }

    #[test]
    fn test_order_does_not_matter() {
        let m = matcher("Alt+Shift+S");
        assert_eq!(m.on_key_down(&RawKey::Char('s')), None);
        assert_eq!(m.on_key_down(&named("shift_r")), None);
        assert!(m.on_key_down(&named("alt_r")).is_some());
    }

    #[test]
    fn test_release_and_repress_fires_again() {
        let m = matcher("ALT+SHIFT+S");
        m.on_key_down(&named("alt"));
        m.on_key_down(&named("shift"));
        assert!(m.on_key_down(&RawKey::Char('s')).is_some());

        m.on_key_up(&RawKey::Char('s'));
        assert!(!m.is_matched());
        assert!(m.on_key_down(&RawKey::Char('s')).is_some());
    }

    #[test]
    fn test_unrelated_release_does_not_rearm() {
        let m = matcher("ALT+SHIFT+S");
        m.on_key_down(&named("alt"));
        m.on_key_down(&named("shift"));
        assert!(m.on_key_down(&RawKey::Char('s')).is_some());

        // an extra key breaks the combination, releasing it restores it
        assert_eq!(m.on_key_down(&RawKey::Char('x')), None);
        m.on_key_up(&RawKey::Char('x'));
        assert_eq!(m.on_key_down(&RawKey::Char('s')), None);
    }

    #[test]
    fn test_ctrl_held_still_matches() {
        // Documented quirk: CTRL is tracked but excluded from the combination
        let m = matcher("ALT+SHIFT+S");
        m.on_key_down(&named("ctrl_l"));
        m.on_key_down(&named("alt"));
        m.on_key_down(&named("shift"));
        let event = m.on_key_down(&RawKey::Char('s')).unwrap();
        assert_eq!(event.combination, "ALT+S+SHIFT");
        assert!(m.held_keys().contains(&"CTRL".to_string()));
    }

    #[test]
    fn test_ctrl_chord_never_fires() {
        let m = matcher("CTRL+SHIFT+S");
        m.on_key_down(&named("ctrl"));
        m.on_key_down(&named("shift"));
        assert_eq!(m.on_key_down(&RawKey::Char('s')), None);
    }

    #[test]
    fn test_release_removes_variants() {
        let m = ChordMatcher::new();
        m.on_key_down(&named("shift_l"));
        m.on_key_down(&RawKey::Char('a'));
        assert_eq!(m.held_keys(), vec!["A", "SHIFT"]);

        m.on_key_up(&named("shift_r"));
        assert_eq!(m.held_keys(), vec!["A"]);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let m = matcher("ALT+S");
        assert_eq!(m.on_key_down(&RawKey::Unknown(-1)), None);
        m.on_key_up(&RawKey::Unknown(-1));
        assert!(m.held_keys().is_empty());
    }

    #[test]
    fn test_no_chord_registered() {
        let m = ChordMatcher::new();
        assert_eq!(m.on_key_down(&named("alt")), None);
        assert!(m.chord().is_none());
    }

    #[test]
    fn test_reregister_mid_press() {
        let m = matcher("ALT+SHIFT+S");
        m.on_key_down(&named("alt"));
        m.on_key_down(&named("shift"));

        m.register("ALT+SHIFT+D").unwrap();
        assert_eq!(m.on_key_down(&RawKey::Char('s')), None);
        m.on_key_up(&RawKey::Char('s'));
        assert_eq!(
            m.on_key_down(&RawKey::Char('d')).map(|e| e.combination),
            Some("ALT+D+SHIFT".to_string())
        );
    }

    #[test]
    fn test_register_rejects_bad_spec_and_keeps_old_chord() {
        let m = matcher("ALT+SHIFT+S");
        assert!(m.register("ALT++").is_err());
        assert_eq!(m.chord().unwrap().to_string(), "ALT+S+SHIFT");
    }

    #[test]
    fn test_clear_resets_held_and_latch() {
        let m = matcher("ALT+S");
        m.on_key_down(&named("alt"));
        assert!(m.on_key_down(&RawKey::Char('s')).is_some());

        m.clear();
        assert!(m.held_keys().is_empty());
        assert!(!m.is_matched());
    }
}
