//! Timestamp extraction from description text
use super::TimestampEntry;
use crate::error::{Result, SplitError};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static CHAPTER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9０-９]{2}:[0-9０-９]{2})\s+(.+)").expect("chapter pattern is valid"));

/// Extract every `MM:SS Title` entry from `description`, in source order.
///
/// Entries are neither sorted nor de-duplicated. An empty result means the
/// description has no usable table of contents.
pub fn parse_timestamps(description: &str) -> Vec<TimestampEntry> {
    let entries: Vec<TimestampEntry> = CHAPTER_LINE
        .captures_iter(description)
        .map(|caps| TimestampEntry::new(&caps[1], caps[2].trim()))
        .collect();

    debug!("📝 Parsed {} timestamp entries from description", entries.len());
    entries
}

/// Convert an `MM:SS` marker to seconds.
///
/// Seconds are not range checked, so `"01:75"` is 135. Full-width digits
/// (`０１:３０`) count the same as ASCII ones.
pub fn to_seconds(time: &str) -> Result<u32> {
    let invalid = || SplitError::InvalidTimestamp(time.to_string());
    let (minutes, seconds) = time.split_once(':').ok_or_else(invalid)?;

    let minutes = parse_number(minutes).ok_or_else(invalid)?;
    let seconds = parse_number(seconds).ok_or_else(invalid)?;
    minutes
        .checked_mul(60)
        .and_then(|m| m.checked_add(seconds))
        .ok_or_else(invalid)
}

fn digit_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => c.to_digit(10),
        '０'..='９' => Some(c as u32 - '０' as u32),
        _ => None,
    }
}

fn parse_number(part: &str) -> Option<u32> {
    if part.is_empty() {
        return None;
    }
    part.chars().try_fold(0u32, |acc, c| {
        acc.checked_mul(10)?.checked_add(digit_value(c)?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_seconds() {
        assert_eq!(to_seconds("02:05").unwrap(), 125);
        assert_eq!(to_seconds("00:00").unwrap(), 0);
        assert_eq!(to_seconds("10:00").unwrap(), 600);
        assert_eq!(to_seconds("99:99").unwrap(), 99 * 60 + 99);
    }

    #[test]
    fn test_to_seconds_rejects_malformed() {
        assert!(matches!(to_seconds("1205"), Err(SplitError::InvalidTimestamp(_))));
        assert!(matches!(to_seconds("ab:cd"), Err(SplitError::InvalidTimestamp(_))));
        assert!(matches!(to_seconds(":30"), Err(SplitError::InvalidTimestamp(_))));
        assert!(matches!(to_seconds("-1:30"), Err(SplitError::InvalidTimestamp(_))));
        assert!(matches!(to_seconds("99999999999:00"), Err(SplitError::InvalidTimestamp(_))));
    }

    #[test]
    fn test_full_width_digits() {
        assert_eq!(to_seconds("０１:３０").unwrap(), 90);
        assert_eq!(to_seconds("1０:0５").unwrap(), 605);

        let entries = parse_timestamps("０１:３０ 雑談\n10:00 Ending");
        assert_eq!(
            entries,
            vec![TimestampEntry::new("０１:３０", "雑談"), TimestampEntry::new("10:00", "Ending")]
        );
    }

    #[test]
    fn test_parse_typical_description() {
        let description = "Thanks for watching!\n\
            \n\
            00:00 Intro\n\
            01:30   Main topic  \n\
            05:00 Outro\n\
            \n\
            Follow me on socials.";

        let entries = parse_timestamps(description);
        assert_eq!(
            entries,
            vec![
                TimestampEntry::new("00:00", "Intro"),
                TimestampEntry::new("01:30", "Main topic"),
                TimestampEntry::new("05:00", "Outro"),
            ]
        );
    }

    #[test]
    fn test_parse_keeps_source_order_and_duplicates() {
        let description = "03:00 Later\n01:00 Earlier\n01:00 Earlier";
        let entries = parse_timestamps(description);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].time, "03:00");
        assert_eq!(entries[1], entries[2]);
    }

    #[test]
    fn test_parse_returns_empty_without_chapters() {
        assert!(parse_timestamps("").is_empty());
        assert!(parse_timestamps("No chapters here, just a story.").is_empty());
        assert!(parse_timestamps("0:30 single digit minute").is_empty());
        assert!(parse_timestamps("12:34").is_empty());
        assert!(parse_timestamps("12:34-no space").is_empty());
    }

    #[test]
    fn test_label_stops_at_line_end() {
        let entries = parse_timestamps("00:00 Opening theme\nsome other text\n02:10 Verse");
        assert_eq!(entries[0].label, "Opening theme");
        assert_eq!(entries[1].label, "Verse");
    }

    #[test]
    fn test_timestamp_inside_longer_text() {
        let entries = parse_timestamps("[12:05] Q&A session");
        assert!(entries.is_empty());

        let entries = parse_timestamps("Part two starts 12:05 Q&A session");
        assert_eq!(entries, vec![TimestampEntry::new("12:05", "Q&A session")]);
    }
}
