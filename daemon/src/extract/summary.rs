//! Extraction and aggregation over vision model output

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::time::TimeToken;

/// Word-bounded `H:MM` / `HH:MM` candidates; range checks happen per match
fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b([0-9]{1,2}):([0-9]{2})\b").expect("time pattern is a valid regex")
    })
}

/// Aggregate over every time token found in one piece of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Number of accepted tokens
    pub count: usize,

    /// Sum of all token durations
    pub total_minutes: u64,

    /// Mean duration, 0 when nothing was found
    pub average_minutes: f64,

    /// `total_minutes` rendered as `H:MM` (hours are not wrapped at 24)
    pub formatted_total: String,

    /// Canonical token strings in order of appearance
    pub tokens: Vec<String>,

    /// Per-token durations, parallel to `tokens`
    pub minutes: Vec<u32>,
}

impl ExtractionResult {
    /// A zero-valued result
    pub fn empty() -> Self {
        Self::from_tokens(&[])
    }

    pub fn from_tokens(tokens: &[TimeToken]) -> Self {
        let minutes: Vec<u32> = tokens.iter().map(TimeToken::total_minutes).collect();
        let total_minutes: u64 = minutes.iter().map(|&m| u64::from(m)).sum();
        let count = tokens.len();
        let average_minutes = if count == 0 {
            0.0
        } else {
            total_minutes as f64 / count as f64
        };

        Self {
            count,
            total_minutes,
            average_minutes,
            formatted_total: format_minutes(total_minutes),
            tokens: tokens.iter().map(TimeToken::canonical).collect(),
            minutes,
        }
    }

    /// Short summary shown to the user once a capture is processed
    pub fn notification_text(&self) -> String {
        match self.count {
            0 => "No times found in the captured area".to_string(),
            1 => format!("✓ Found 1 time\nTotal duration: {}", self.formatted_total),
            n => format!("✓ Found {} times\nTotal duration: {}", n, self.formatted_total),
        }
    }
}

impl Default for ExtractionResult {
    fn default() -> Self {
        Self::empty()
    }
}

/// Render a duration in minutes as `H:MM`.
///
/// The aggregate is a duration, not a clock time, so 1500 renders as `25:00`.
pub fn format_minutes(total: u64) -> String {
    format!("{}:{:02}", total / 60, total % 60)
}

/// Extract every valid time token from `text` and summarize them.
///
/// Absent text is treated as empty. Out-of-range matches are dropped.
pub fn extract<'a>(text: impl Into<Option<&'a str>>) -> ExtractionResult {
    let text: Option<&str> = text.into();
    let Some(text) = text else {
        return ExtractionResult::empty();
    };

    let tokens: Vec<TimeToken> = time_pattern()
        .captures_iter(text)
        .filter_map(|caps| {
            let raw = caps.get(0)?.as_str();
            let token = TimeToken::from_parts(raw, caps.get(1)?.as_str(), caps.get(2)?.as_str());
            if token.is_none() {
                debug!(raw, "discarding out-of-range time");
            }
            token
        })
        .collect();

    ExtractionResult::from_tokens(&tokens)
}
