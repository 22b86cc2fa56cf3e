//! Segment planning from parsed chapter entries
use super::parser::to_seconds;
use super::{Segment, TimestampEntry};
use crate::error::Result;
use crate::sanitize::sanitize_filename;
use tracing::warn;

/// Container extension for every clip
pub const CLIP_EXTENSION: &str = "mp4";

/// Filename marker used when a segment runs to the end of the media
pub const END_MARKER: &str = "end";

/// Pair each entry with the next one to form `[start, end)` ranges.
///
/// The last entry runs to the end of the media. Order follows the input; chapters
/// are expected to be listed in time order already.
pub fn build_segments(entries: &[TimestampEntry]) -> Result<Vec<Segment>> {
    let mut segments = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let next = entries.get(index + 1);
        let start_seconds = to_seconds(&entry.time)?;
        let end_seconds = next.map(|n| to_seconds(&n.time)).transpose()?;

        if let Some(end) = end_seconds {
            if end <= start_seconds {
                warn!(
                    "⚠️ Chapter '{}' ends at {}s, not after its start {}s",
                    entry.label, end, start_seconds
                );
            }
        }

        let end_marker = next
            .map(|n| n.time.replace(':', ""))
            .unwrap_or_else(|| END_MARKER.to_string());

        let output_filename = format!(
            "{}-{}_{}.{}",
            entry.time.replace(':', ""),
            end_marker,
            sanitize_filename(&entry.label, false),
            CLIP_EXTENSION
        );

        segments.push(Segment {
            start_seconds,
            end_seconds,
            label: entry.label.clone(),
            output_filename,
        });
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapters::parse_timestamps;

    fn entries(pairs: &[(&str, &str)]) -> Vec<TimestampEntry> {
        pairs.iter().map(|(t, l)| TimestampEntry::new(*t, *l)).collect()
    }

    #[test]
    fn test_three_chapters() {
        let segments =
            build_segments(&entries(&[("00:00", "Intro"), ("01:30", "Main"), ("05:00", "Outro")]))
                .unwrap();

        let ranges: Vec<_> = segments
            .iter()
            .map(|s| (s.start_seconds, s.end_seconds, s.label.as_str()))
            .collect();
        assert_eq!(
            ranges,
            vec![(0, Some(90), "Intro"), (90, Some(300), "Main"), (300, None, "Outro")]
        );

        assert_eq!(segments[0].output_filename, "0000-0130_Intro.mp4");
        assert_eq!(segments[1].output_filename, "0130-0500_Main.mp4");
        assert_eq!(segments[2].output_filename, "0500-end_Outro.mp4");
    }

    #[test]
    fn test_single_chapter_runs_to_end() {
        let segments = build_segments(&entries(&[("02:00", "Only")])).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_seconds, 120);
        assert_eq!(segments[0].end_seconds, None);
        assert_eq!(segments[0].duration_seconds(), None);
        assert_eq!(segments[0].output_filename, "0200-end_Only.mp4");
    }

    #[test]
    fn test_empty_input() {
        assert!(build_segments(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_label_is_sanitized_in_filename_only() {
        let segments = build_segments(&entries(&[("00:00", "Q&A: what/why?")])).unwrap();
        assert_eq!(segments[0].label, "Q&A: what/why?");
        assert_eq!(segments[0].output_filename, "0000-end_QA whatwhy.mp4");
    }

    #[test]
    fn test_duplicate_timestamps_are_kept() {
        let segments =
            build_segments(&entries(&[("01:00", "A"), ("01:00", "B"), ("02:00", "C")])).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].end_seconds, Some(60));
        assert_eq!(segments[0].duration_seconds(), Some(0));
        assert_eq!(segments[1].start_seconds, 60);
    }

    #[test]
    fn test_out_of_range_seconds_are_literal() {
        let segments = build_segments(&entries(&[("00:99", "Odd"), ("02:00", "Next")])).unwrap();
        assert_eq!(segments[0].start_seconds, 99);
        assert_eq!(segments[0].end_seconds, Some(120));
    }

    #[test]
    fn test_full_width_timestamps() {
        let segments = build_segments(&entries(&[("０１:３０", "A"), ("02:00", "B")])).unwrap();
        assert_eq!(segments[0].start_seconds, 90);
        assert_eq!(segments[0].end_seconds, Some(120));
        assert_eq!(segments[0].output_filename, "０１３０-0200_A.mp4");
    }

    #[test]
    fn test_plan_from_description() {
        let description = "Setlist\n00:00 オープニング\n03:15 【歌】曲名\n07:40 Ending talk";
        let segments = build_segments(&parse_timestamps(description)).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].output_filename, "0000-0315_オープニング.mp4");
        assert_eq!(segments[1].output_filename, "0315-0740_【歌】曲名.mp4");
        assert_eq!(segments[2].output_filename, "0740-end_Ending talk.mp4");
    }
}
