//! Whitespace canonicalization for recognized text.

use regex::Regex;
use std::sync::LazyLock;

static HORIZONTAL_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid horizontal whitespace pattern"));

static BLANK_LINE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank line pattern"));

/// Returns the canonical form of `text`.
///
/// Carriage returns are removed, runs of spaces/tabs become one space, three or
/// more newlines become two, and the result is trimmed.
pub fn normalize(text: &str) -> String {
    let without_cr = text.replace('\r', "");
    let spaced = HORIZONTAL_RUN.replace_all(&without_cr, " ");
    let collapsed = BLANK_LINE_RUN.replace_all(&spaced, "\n\n");
    collapsed.trim().to_string()
}

/// Splits `text` into its ordered, trimmed, non-empty lines.
pub fn split_lines(text: &str) -> Vec<String> {
    normalize(text)
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
