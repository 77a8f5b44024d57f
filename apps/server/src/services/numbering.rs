//! Human-readable work order numbers.
//!
//! A number is `{prefix}{sequence}` where the prefix is `{base}-{YYYYMM}-` and the
//! sequence is zero-padded to four digits. Past 9999 the sequence keeps growing.

use chrono::{Datelike, NaiveDate};

/// Width of the zero-padded sequence.
pub const SEQUENCE_WIDTH: usize = 4;

/// Attempts made when a concurrent insert takes the number first.
pub const MAX_ATTEMPTS: u32 = 3;

/// Prefix shared by every work order scheduled in the same month.
pub fn prefix_for(base: &str, scheduled: NaiveDate) -> String {
    format!("{}-{:04}{:02}-", base, scheduled.year(), scheduled.month())
}

/// Numeric suffix of `number`, if it carries `prefix`.
pub fn parse_sequence(number: &str, prefix: &str) -> Option<u32> {
    let suffix = number.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

pub fn format_number(prefix: &str, sequence: u32) -> String {
    format!("{}{:0width$}", prefix, sequence, width = SEQUENCE_WIDTH)
}

/// Next number after the highest existing one with the same prefix.
///
/// Numbers that do not parse under `prefix` are ignored.
pub fn next_number<'a, I>(prefix: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let max = existing
        .into_iter()
        .filter_map(|number| parse_sequence(number, prefix))
        .max()
        .unwrap_or(0);
    format_number(prefix, max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn october() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_prefix_uses_schedule_month() {
        assert_eq!(prefix_for("WO", october()), "WO-202610-");
    }

    #[test]
    fn test_first_number_against_empty_table() {
        let number = next_number("WO-202610-", std::iter::empty());
        assert_eq!(number, "WO-202610-0001");
    }

    #[test]
    fn test_sequential_generations_do_not_repeat() {
        let prefix = prefix_for("WO", october());
        let mut issued: Vec<String> = Vec::new();
        for _ in 0..12 {
            let next = next_number(&prefix, issued.iter().map(String::as_str));
            issued.push(next);
        }
        let expected: Vec<String> = (1..=12).map(|n| format!("WO-202610-{:04}", n)).collect();
        assert_eq!(issued, expected);
    }

    #[test]
    fn test_other_prefixes_and_garbage_are_ignored() {
        let existing = ["WO-202609-0042", "WO-202610-0007", "WO-202610-draft", "X"];
        assert_eq!(next_number("WO-202610-", existing), "WO-202610-0008");
    }

    #[test]
    fn test_sequence_grows_past_four_digits() {
        assert_eq!(next_number("WO-202610-", ["WO-202610-9999"]), "WO-202610-10000");
        assert_eq!(
            next_number("WO-202610-", ["WO-202610-10000", "WO-202610-9999"]),
            "WO-202610-10001"
        );
    }

    #[test]
    fn test_parse_sequence_rejects_signs() {
        assert_eq!(parse_sequence("WO-202610-+12", "WO-202610-"), None);
        assert_eq!(parse_sequence("WO-202610-0012", "WO-202610-"), Some(12));
    }
}
