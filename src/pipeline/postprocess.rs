//! Post-processing: deterministic cleanup of raw LLM concept responses.
//!
//! The extraction prompt asks for one `|`-separated line and nothing else,
//! but chat models still occasionally wrap the answer in a code fence, emit
//! Windows line endings, or sprinkle zero-width characters. These rules fix
//! such quirks without touching content, then split the list.
//!
//! ## Rule Order
//!
//! Fences are stripped first so the fence markers never become a concept;
//! invisible characters go before splitting so an all-invisible segment is
//! recognised as empty.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a raw response and split it into at most `max_concepts` concepts.
///
/// Segments are trimmed and empty segments dropped before the count cut.
pub fn parse_concept_list(raw: &str, max_concepts: usize) -> Vec<String> {
    let cleaned = clean_response(raw);
    cleaned
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(max_concepts)
        .map(str::to_string)
        .collect()
}

/// Apply all cleanup rules to the raw LLM output.
///
/// 1. Strip an outer code fence (` ``` ` or ` ```text `)
/// 2. Remove invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Fold line breaks into spaces so multi-line answers stay one list
pub fn clean_response(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = remove_invisible_chars(&s);
    fold_line_breaks(&s)
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n(.*)\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Fold line breaks ─────────────────────────────────────────────────

static RE_LINE_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\r\n]+").unwrap());

fn fold_line_breaks(input: &str) -> String {
    RE_LINE_BREAKS.replace_all(input, " ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_trims_and_truncates() {
        assert_eq!(parse_concept_list("A | B | C", 2), vec!["A", "B"]);
    }

    #[test]
    fn drops_empty_segments() {
        assert_eq!(parse_concept_list("| A || B |  |", 5), vec!["A", "B"]);
    }

    #[test]
    fn empty_response_yields_nothing() {
        assert!(parse_concept_list("", 3).is_empty());
        assert!(parse_concept_list(" | \u{200B} | ", 3).is_empty());
    }

    #[test]
    fn strips_fences() {
        let raw = "```text\nWide shot of a harbour | Close-up of a net\n```";
        assert_eq!(
            parse_concept_list(raw, 3),
            vec!["Wide shot of a harbour", "Close-up of a net"]
        );
    }

    #[test]
    fn folds_line_breaks() {
        assert_eq!(clean_response("a\r\nb\nc"), "a b c");
    }

    #[test]
    fn no_fence_passthrough() {
        assert_eq!(strip_code_fences("A | B"), "A | B");
    }
}
