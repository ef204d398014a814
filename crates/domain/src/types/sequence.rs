//! Document number sequences

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Entity kind requesting a number. Both kinds share one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Offer,
    Project,
}

impl_domain_status_conversions!(DocumentKind {
    Offer => "offer",
    Project => "project",
});

/// Counter row keyed by company and year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberSequence {
    pub company_id: String,
    pub year: i32,
    pub last_sequence: u32,
}

/// `{PREFIX}-{year}-{sequence:03}`, e.g. `TK-2025-007`.
pub fn format_document_number(prefix: &str, year: i32, sequence: u32) -> String {
    format!("{}-{year}-{sequence:03}", prefix.to_uppercase())
}

/// Parse `{PREFIX}-{year}-{sequence}` back into its parts.
///
/// A trailing order suffix is ignored. Returns `None` for free-form numbers.
pub fn parse_document_number(number: &str) -> Option<(String, i32, u32)> {
    let trimmed = number.trim().trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let mut parts = trimmed.splitn(3, '-');
    let prefix = parts.next()?;
    let year = parts.next()?.parse::<i32>().ok()?;
    let sequence = parts.next()?.parse::<u32>().ok()?;
    if prefix.len() != 2 || !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((prefix.to_uppercase(), year, sequence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generated_numbers() {
        assert_eq!(parse_document_number("TK-2025-007"), Some(("TK".into(), 2025, 7)));
        assert_eq!(parse_document_number("TK-2025-007O"), Some(("TK".into(), 2025, 7)));
        assert_eq!(parse_document_number("customer ref 12"), None);
        assert_eq!(parse_document_number("TAK-2025-001"), None);
    }

    #[test]
    fn pads_to_three_digits() {
        assert_eq!(format_document_number("TK", 2025, 7), "TK-2025-007");
        assert_eq!(format_document_number("st", 2026, 42), "ST-2026-042");
    }

    #[test]
    fn wider_sequences_are_not_truncated() {
        assert_eq!(format_document_number("GR", 2025, 1234), "GR-2025-1234");
    }
}
