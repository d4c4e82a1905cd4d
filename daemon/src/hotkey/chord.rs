//! Registered chord definitions

use std::collections::BTreeSet;
use std::fmt;

use super::keys;

/// Errors raised when registering a chord
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChordError {
    #[error("invalid chord spec {spec:?}: {reason}")]
    InvalidChordSpec { spec: String, reason: &'static str },
}

/// An order-independent set of canonical key tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord {
    keys: BTreeSet<String>,
}

impl Chord {
    /// Parse a `+`-delimited spec such as `Alt+Shift+S`
    pub fn parse(spec: &str) -> Result<Self, ChordError> {
        let invalid = |reason| ChordError::InvalidChordSpec {
            spec: spec.to_string(),
            reason,
        };

        if spec.trim().is_empty() {
            return Err(invalid("chord is empty"));
        }

        let mut keys = BTreeSet::new();
        for part in spec.split('+') {
            if part.trim().is_empty() {
                return Err(invalid("empty key name"));
            }
            let token = keys::canonical_name(part).ok_or_else(|| invalid("unrecognized key name"))?;
            keys.insert(token);
        }

        Ok(Self { keys })
    }

    /// Whether the chord names CTRL, which never takes part in matching
    pub fn requires_ctrl(&self) -> bool {
        self.keys.contains(keys::CTRL)
    }

    /// Whether a key combination is exactly this chord
    pub fn matches(&self, combination: &BTreeSet<String>) -> bool {
        &self.keys == combination
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&keys::join(&self.keys))
    }
}
