//! Validated time tokens
//!
//! A `TimeToken` is only ever built from an `H:MM` or `HH:MM` span whose
//! hours fall in 0-23 and minutes in 0-59.

use std::fmt;
use std::str::FromStr;

/// A validated hours/minutes duration as it appeared in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeToken {
    /// The span exactly as matched
    raw: String,
    hours: u8,
    minutes: u8,
}

/// Errors from parsing a standalone time string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeParseError {
    #[error("expected H:MM or HH:MM, got {0:?}")]
    Shape(String),

    #[error("hours out of range: {0}")]
    Hours(u32),

    #[error("minutes out of range: {0}")]
    Minutes(u32),
}

impl TimeToken {
    /// Build a token from the matched hour and minute digits.
    ///
    /// Returns `None` for out-of-range values instead of failing, so a
    /// single bad match never aborts a whole extraction.
    pub fn from_parts(raw: &str, hours: &str, minutes: &str) -> Option<Self> {
        let hours: u32 = hours.parse().ok()?;
        let minutes: u32 = minutes.parse().ok()?;
        Self::validated(raw, hours, minutes).ok()
    }

    fn validated(raw: &str, hours: u32, minutes: u32) -> Result<Self, TimeParseError> {
        if hours > 23 {
            return Err(TimeParseError::Hours(hours));
        }
        if minutes > 59 {
            return Err(TimeParseError::Minutes(minutes));
        }

        Ok(Self {
            raw: raw.to_string(),
            hours: hours as u8,
            minutes: minutes as u8,
        })
    }

    /// The span as it appeared in the source text
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn hours(&self) -> u8 {
        self.hours
    }

    pub fn minutes(&self) -> u8 {
        self.minutes
    }

    /// Canonical rendering: unpadded hours, two-digit minutes
    pub fn canonical(&self) -> String {
        format!("{}:{:02}", self.hours, self.minutes)
    }

    /// Total duration in minutes
    pub fn total_minutes(&self) -> u32 {
        u32::from(self.hours) * 60 + u32::from(self.minutes)
    }
}

impl fmt::Display for TimeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.hours, self.minutes)
    }
}

impl FromStr for TimeToken {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let shape = || TimeParseError::Shape(s.to_string());

        let (hours, minutes) = s.split_once(':').ok_or_else(shape)?;
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());

        if hours.is_empty() || hours.len() > 2 || !all_digits(hours) {
            return Err(shape());
        }
        if minutes.len() != 2 || !all_digits(minutes) {
            return Err(shape());
        }

        let hours: u32 = hours.parse().map_err(|_| shape())?;
        let minutes: u32 = minutes.parse().map_err(|_| shape())?;
        Self::validated(s, hours, minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_strips_hour_padding() {
        let token = TimeToken::from_parts("09:05", "09", "05").unwrap();
        assert_eq!(token.raw(), "09:05");
        assert_eq!(token.canonical(), "9:05");
        assert_eq!(token.total_minutes(), 545);
    }

    #[test]
    fn test_out_of_range_is_dropped() {
        assert!(TimeToken::from_parts("24:00", "24", "00").is_none());
        assert!(TimeToken::from_parts("12:60", "12", "60").is_none());
        assert!(TimeToken::from_parts("23:59", "23", "59").is_some());
    }

    #[test]
    fn test_from_str_rejects_bad_shapes() {
        assert!(matches!("1:5".parse::<TimeToken>(), Err(TimeParseError::Shape(_))));
        assert!(matches!("123:45".parse::<TimeToken>(), Err(TimeParseError::Shape(_))));
        assert!(matches!("12-45".parse::<TimeToken>(), Err(TimeParseError::Shape(_))));
        assert_eq!("24:00".parse::<TimeToken>(), Err(TimeParseError::Hours(24)));
        assert_eq!("7:75".parse::<TimeToken>(), Err(TimeParseError::Minutes(75)));
    }

    #[test]
    fn test_display_then_parse_round_trips() {
        for hours in 0u8..24 {
            for minutes in 0u8..60 {
                let token: TimeToken = format!("{}:{:02}", hours, minutes).parse().unwrap();
                let reparsed: TimeToken = token.to_string().parse().unwrap();
                assert_eq!((reparsed.hours(), reparsed.minutes()), (hours, minutes));
                assert_eq!(reparsed.total_minutes(), u32::from(hours) * 60 + u32::from(minutes));
            }
        }
    }
}
