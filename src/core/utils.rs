use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

/// Maximum characters of output or error text reported back to the submitter
pub const MAX_REPORTED_CHARS: usize = 256;

const TRUNCATION_MARKER: &str = "[... truncated ...]";

/// Keep the head and the tail of long text, dropping the middle.
pub fn truncate_output(output: &str, max_chars: usize) -> String {
    let total = output.chars().count();
    if total <= max_chars {
        return output.to_string();
    }

    let half = max_chars / 2;
    let head: String = output.chars().take(half).collect();
    let tail: String = output.chars().skip(total - half).collect();
    format!("{}{}{}", head, TRUNCATION_MARKER, tail)
}

/// Strip the scratch directory from a message so host paths never reach the verdict.
pub fn sanitize_message(message: &str, scratch_dir: &Path) -> String {
    let scratch = scratch_dir.to_string_lossy();
    if scratch.is_empty() {
        return message.to_string();
    }
    message
        .replace(&format!("{}/", scratch), "")
        .replace(scratch.as_ref(), ".")
}

/// Compile `pattern` once into `cell`; `None` if the pattern is invalid
pub fn cached_regex(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_untouched() {
        assert_eq!(truncate_output("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_keeps_head_and_tail() {
        let text = "a".repeat(100) + &"b".repeat(100);
        let out = truncate_output(&text, 20);
        assert!(out.starts_with("aaaaaaaaaa["));
        assert!(out.ends_with("]bbbbbbbbbb"));
        assert!(out.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncate_multibyte() {
        let text = "가".repeat(50);
        let out = truncate_output(&text, 10);
        assert_eq!(out.chars().filter(|c| *c == '가').count(), 10);
    }

    #[test]
    fn test_sanitize_removes_scratch_path() {
        let dir = Path::new("/tmp/mini_judge/judge-abc123");
        let msg = "File \"/tmp/mini_judge/judge-abc123/main.py\", line 3\ncwd=/tmp/mini_judge/judge-abc123";
        let cleaned = sanitize_message(msg, dir);
        assert_eq!(cleaned, "File \"main.py\", line 3\ncwd=.");
    }
}
