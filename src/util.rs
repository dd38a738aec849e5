//! Shared text helpers for handling raw oracle output.

use std::sync::LazyLock;

use regex::Regex;

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("static regex"));

/// Remove `<think>...</think>` reasoning blocks emitted by reasoning models.
///
/// An unterminated `<think>` swallows the rest of the text, matching how such
/// models behave when they are cut off mid-thought.
pub fn strip_think_blocks(text: &str) -> String {
    let stripped = THINK_BLOCK.replace_all(text, "");
    let stripped = match stripped.find("<think>") {
        Some(pos) => &stripped[..pos],
        None => stripped.as_ref(),
    };
    stripped.trim().to_string()
}

/// Every balanced `{...}` span in `text`, in order of its opening brace.
///
/// Handles fenced code blocks and prose around or before the object, including
/// stray braces in that prose. Braces inside JSON strings are ignored.
pub fn json_object_candidates(text: &str) -> impl Iterator<Item = &str> {
    text.match_indices('{')
        .filter_map(move |(start, _)| balanced_object(&text[start..]))
}

/// The balanced object at the start of `text`, which must begin with `{`.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Shorten `text` to at most `max_chars` characters for log lines.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_think_blocks_removes_reasoning() {
        let raw = "<think>\nthe user wants contacts\n</think>\n\nHere they are.";
        assert_eq!(strip_think_blocks(raw), "Here they are.");
    }

    #[test]
    fn strip_think_blocks_drops_unterminated_block() {
        assert_eq!(strip_think_blocks("Answer <think> still going"), "Answer");
    }

    #[test]
    fn strip_think_blocks_leaves_plain_text() {
        assert_eq!(strip_think_blocks("  plain  "), "plain");
    }

    #[test]
    fn json_object_from_fenced_block() {
        let raw = "Sure!\n```json\n{\"next\": \"FINISH\", \"nested\": {\"a\": 1}}\n```\nDone.";
        assert_eq!(
            json_object_candidates(raw).next(),
            Some("{\"next\": \"FINISH\", \"nested\": {\"a\": 1}}")
        );
    }

    #[test]
    fn json_object_ignores_braces_in_strings() {
        let raw = r#"{"instruction": "use {braces} and \"quotes\"", "x": 1} trailing"#;
        assert_eq!(
            json_object_candidates(raw).next(),
            Some(r#"{"instruction": "use {braces} and \"quotes\"", "x": 1}"#)
        );
    }

    #[test]
    fn json_object_candidates_continue_past_prose_braces() {
        let raw = "The user wants {all contacts}. Decision: {\"next\": \"FINISH\"}";
        let candidates: Vec<_> = json_object_candidates(raw).collect();
        assert_eq!(candidates, vec!["{all contacts}", "{\"next\": \"FINISH\"}"]);
    }

    #[test]
    fn json_object_unbalanced_is_none() {
        assert_eq!(json_object_candidates("{\"next\": \"a\"").next(), None);
        assert_eq!(json_object_candidates("no json here").next(), None);
    }

    #[test]
    fn preview_truncates_long_text() {
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("abc", 3), "abc");
    }
}
