//! Parsing of compact duration tokens entered by administrators.
//!
//! A token is a number followed by a single unit suffix: `2w`, `14d`, `3h`,
//! `45m`. The parser normalizes everything to minutes and keeps the original
//! magnitude and a human-readable unit label for announcements.

use crate::error::ModError;

/// A duration token normalized to minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDuration {
    /// Total duration in minutes
    pub minutes: i64,
    /// Numeric part of the token, in the unit the admin typed
    pub magnitude: i64,
    /// Human-readable label for the typed unit
    pub unit_label: &'static str,
}

/// Minutes per unit suffix.
const UNITS: &[(char, i64, &str)] = &[
    ('w', 10080, "нед."),
    ('d', 1440, "дн."),
    ('h', 60, "час."),
    ('m', 1, "мин."),
];

/// Parse a duration token like `"2w"` into minutes plus a unit label.
///
/// A purely numeric token is rejected as ambiguous: the admin must always
/// name a unit. Unknown suffixes and non-numeric magnitudes are rejected
/// too — the caller decides how to report, nothing is silently defaulted.
///
/// # Errors
///
/// Returns [`ModError::InvalidDuration`] for every malformed token.
///
/// # Examples
///
/// ```
/// use chat_warden::duration::parse_duration;
///
/// let d = parse_duration("2w").expect("valid token");
/// assert_eq!(d.minutes, 20160);
/// assert_eq!(d.unit_label, "нед.");
/// assert!(parse_duration("45").is_err());
/// ```
pub fn parse_duration(token: &str) -> Result<ParsedDuration, ModError> {
    let invalid = || ModError::InvalidDuration(token.to_string());

    if token.chars().all(|c| c.is_ascii_digit()) {
        // No unit — ambiguous, including the empty token
        return Err(invalid());
    }

    let (last_idx, suffix) = token.char_indices().last().ok_or_else(invalid)?;
    let digits = &token[..last_idx];

    let (_, factor, label) = UNITS
        .iter()
        .find(|(unit, _, _)| *unit == suffix)
        .ok_or_else(invalid)?;

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let magnitude: i64 = digits.parse().map_err(|_| invalid())?;
    let minutes = magnitude.checked_mul(*factor).ok_or_else(invalid)?;

    Ok(ParsedDuration {
        minutes,
        magnitude,
        unit_label: label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_units() {
        let cases = [
            ("2w", 20160, 2, "нед."),
            ("3d", 4320, 3, "дн."),
            ("12h", 720, 12, "час."),
            ("45m", 45, 45, "мин."),
        ];
        for (token, minutes, magnitude, label) in cases {
            let parsed = parse_duration(token).expect("token should parse");
            assert_eq!(parsed.minutes, minutes, "token {token}");
            assert_eq!(parsed.magnitude, magnitude, "token {token}");
            assert_eq!(parsed.unit_label, label, "token {token}");
        }
    }

    #[test]
    fn test_numeric_only_is_ambiguous() {
        assert!(matches!(
            parse_duration("45"),
            Err(ModError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_unknown_suffix() {
        assert!(parse_duration("5y").is_err());
        assert!(parse_duration("5 d").is_err());
    }

    #[test]
    fn test_garbage_tokens() {
        for token in ["", "w", "dw", "1.5h", "-2d", "пятьm"] {
            assert!(parse_duration(token).is_err(), "token {token:?}");
        }
    }

    #[test]
    fn test_overflow_is_rejected() {
        assert!(parse_duration("99999999999999999999w").is_err());
        assert!(parse_duration("9223372036854775807w").is_err());
    }
}
