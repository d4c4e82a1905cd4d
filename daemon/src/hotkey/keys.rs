//! Key identities and canonical tokens
//!
//! Input hooks report keys as `RawKey`. Everything downstream works with
//! canonical tokens: upper-cased strings with left/right modifier variants
//! collapsed to `CTRL`, `SHIFT`, `ALT` or `CMD`.

use std::collections::BTreeSet;

use tracing::debug;

pub const CTRL: &str = "CTRL";
pub const SHIFT: &str = "SHIFT";
pub const ALT: &str = "ALT";
pub const CMD: &str = "CMD";

/// Toolkit prefix some hooks put in front of named keys (`Key.space`)
const NAMED_KEY_PREFIX: &str = "KEY.";

/// A key as reported by an input hook, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawKey {
    /// A key that produces a character
    Char(char),
    /// A named key such as `shift_r`, `f5` or `Key.space`
    Named(String),
    /// A key the hook could not identify
    Unknown(i64),
}

/// Normalize a raw key to its canonical token.
///
/// Returns `None` for keys that carry no usable identity; callers ignore
/// those events.
pub fn normalize(key: &RawKey) -> Option<String> {
    let token = match key {
        RawKey::Char(' ') => Some("SPACE".to_string()),
        RawKey::Char(c) if c.is_control() || c.is_whitespace() => None,
        RawKey::Char(c) => Some(c.to_uppercase().collect()),
        RawKey::Named(name) => canonical_name(name),
        RawKey::Unknown(_) => None,
    };

    if token.is_none() {
        debug!(?key, "ignoring key without a canonical token");
    }
    token
}

/// Canonical token for a key name, shared by event normalization and
/// chord parsing.
pub fn canonical_name(name: &str) -> Option<String> {
    let upper = name.trim().to_uppercase();
    let upper = upper.strip_prefix(NAMED_KEY_PREFIX).unwrap_or(&upper);

    if upper.is_empty() || upper.chars().any(char::is_whitespace) {
        return None;
    }

    let base = upper
        .strip_suffix("_L")
        .or_else(|| upper.strip_suffix("_R"))
        .unwrap_or(upper);

    let token = match base {
        "CTRL" | "CONTROL" => CTRL,
        "SHIFT" => SHIFT,
        "ALT" | "OPTION" => ALT,
        "CMD" | "COMMAND" => CMD,
        _ => upper,
    };
    Some(token.to_string())
}

/// Left/right spellings that may linger in the held set for `token`
pub fn variants(token: &str) -> [String; 2] {
    [format!("{token}_L"), format!("{token}_R")]
}

/// The subset of held keys that takes part in chord matching.
///
/// ALT and SHIFT variants collapse to their base name. CTRL is tracked in
/// the held set but never contributes to a combination.
pub fn effective_combination(held: &BTreeSet<String>) -> BTreeSet<String> {
    held.iter()
        .filter_map(|key| match key.as_str() {
            "CTRL" | "CTRL_L" | "CTRL_R" => None,
            "ALT" | "ALT_L" | "ALT_R" => Some(ALT.to_string()),
            "SHIFT" | "SHIFT_L" | "SHIFT_R" => Some(SHIFT.to_string()),
            other => Some(other.to_string()),
        })
        .collect()
}

/// Render a token set in its canonical `A+B+C` form
pub fn join(tokens: &BTreeSet<String>) -> String {
    tokens.iter().map(String::as_str).collect::<Vec<_>>().join("+")
}
