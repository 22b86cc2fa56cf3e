//! Filename sanitization for clip and folder names
//!
//! Titles and chapter labels come from free-form video metadata, so anything
//! outside a small allow-list is dropped before it reaches the filesystem.

/// Full-width punctuation commonly used in Japanese titles
const FULL_WIDTH_PUNCTUATION: &str =
    "「」『』【】《》〈〉｛｝？！＃＄％＆’（）＊＋，−．／：；＜＝＞＠［］＾＿｀｛｜｝〜、。・";

/// Returns true if `c` may appear in a sanitized name
pub fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || "-_.() ".contains(c)
        || FULL_WIDTH_PUNCTUATION.contains(c)
        || ('\u{4e00}'..='\u{9fff}').contains(&c)
        || ('\u{3040}'..='\u{30ff}').contains(&c)
}

/// Filter `name` down to allowed characters.
///
/// With `is_folder` set, spaces are replaced by underscores so the result can be
/// used as a directory name without quoting.
pub fn sanitize_filename(name: &str, is_folder: bool) -> String {
    let sanitized: String = name.chars().filter(|c| is_allowed_char(*c)).collect();
    if is_folder {
        sanitized.replace(' ', "_")
    } else {
        sanitized
    }
}
