use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SplitError};

/// Last non-empty line of a tool's diagnostic output
pub fn last_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_string)
}

/// Up to `max_lines` trailing non-empty lines, joined with `" | "`
pub fn tail_lines(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join(" | ")
}

/// Run `<bin> <version_flag>` and return the first line it prints
pub async fn tool_version(bin: &Path, version_flag: &str) -> Result<String> {
    let tool = bin.display().to_string();

    let output = Command::new(bin)
        .arg(version_flag)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| SplitError::ToolUnavailable {
            tool: tool.clone(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(SplitError::ToolUnavailable {
            tool,
            message: format!("exited with {}", output.status),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = stdout.lines().next().unwrap_or("").trim().to_string();
    debug!("🔧 {} version: {}", tool, version);
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_line_skips_blank_lines() {
        let stderr = "WARNING: something\nERROR: Video unavailable\n\n  \n";
        assert_eq!(last_line(stderr).as_deref(), Some("ERROR: Video unavailable"));
        assert_eq!(last_line(""), None);
    }

    #[test]
    fn test_tail_lines() {
        let stderr = "a\nb\n\nc\nd\n";
        assert_eq!(tail_lines(stderr, 2), "c | d");
        assert_eq!(tail_lines(stderr, 10), "a | b | c | d");
        assert_eq!(tail_lines("", 3), "");
    }

    #[tokio::test]
    async fn test_missing_tool_is_reported() {
        let err = tool_version(Path::new("definitely-not-a-real-tool-xyz"), "--version")
            .await
            .unwrap_err();
        assert!(matches!(err, SplitError::ToolUnavailable { .. }));
    }
}
