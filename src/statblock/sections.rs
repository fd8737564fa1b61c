//! Splits the body of a stat block into named entries per category.

use regex::Regex;
use std::sync::LazyLock;

use super::{Entry, Section, SectionedEntries};

/// Label used when an entry has no "<Name>. " prefix.
pub const FALLBACK_LABEL: &str = "Feature";

/// A line that opens a new entry: a capitalized phrase of 2–60 characters
/// ending in a period followed by a space, e.g. "Bite. Melee Weapon Attack".
static ENTRY_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][^.]{1,59}\.\s").expect("valid entry start pattern"));

/// Splits joined entry text at the first "<short phrase>. ".
static ENTRY_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.{1,60}?)\.\s+(.+)$").expect("valid entry split pattern"));

/// Lines that belong to the stat block header rather than its body.
///
/// Labels match as printed (case-sensitive), and the numeric ones need their
/// value, so wrapped prose such as "hit points at the start of its turn" or
/// "speed is not reduced" stays in the body.
static HEADER_BLOCK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:Armor Class\s+\d|Hit Points?\s+\d|Speed\s+\d|Challenge\s+\d",
        r"|Proficiency Bonus\s+[+\-]?\d|(?:AC|HP|CR|PB):?\s*[\d+\-]",
        r"|(?:Saving Throws|Skills|Damage (?:Vulnerabilities|Resistances|Immunities)",
        r"|Condition Immunities|Senses|Languages|Habitat|Environment)\b",
        r"|(?:STR|DEX|CON|INT|WIS|CHA)\b)",
    ))
    .expect("valid header block pattern")
});

/// A row of ability scores such as "27 (+8) 10 (+0) ...".
static SCORE_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,2}\s*\(\s*[+\-\u{2212}\u{2013}]?\d+\s*\)").expect("valid score row pattern")
});

/// Returns the lines after the stat block header.
///
/// The header ends at the last header-block line (AC, HP, ability scores,
/// senses, challenge, ...) that precedes the first category heading. Without
/// any such line the body starts after the name and size/type lines.
pub fn body_lines(lines: &[String]) -> &[String] {
    let first_heading = lines
        .iter()
        .position(|line| Section::from_header(line).is_some())
        .unwrap_or(lines.len());

    let last_header_line = lines[..first_heading]
        .iter()
        .rposition(|line| HEADER_BLOCK_LINE.is_match(line) || SCORE_ROW.is_match(line));

    let start = match last_header_line {
        Some(index) => index + 1,
        None => first_heading.min(2),
    };

    &lines[start..]
}

/// Segments `lines` into entries under the five categories.
///
/// Category headings switch the current category and are not themselves
/// buffered. Inside a category a new entry begins at any line that looks like
/// "<Capitalized phrase>. ". Prose containing abbreviations or proper nouns
/// ending in a period can be split or merged wrongly; that is accepted.
pub fn segment(lines: &[String]) -> SectionedEntries {
    let mut entries = SectionedEntries::default();
    let mut current = Section::Traits;
    let mut buffer: Vec<&str> = Vec::new();

    for line in lines {
        let line = line.trim();

        if let Some(section) = Section::from_header(line) {
            flush(&mut buffer, current, &mut entries);
            current = section;
            continue;
        }

        if ENTRY_START.is_match(line) && !buffer.is_empty() {
            flush(&mut buffer, current, &mut entries);
        }

        if !line.is_empty() {
            buffer.push(line);
        }
    }

    flush(&mut buffer, current, &mut entries);
    entries
}

/// Turns the buffered lines into one entry under `section`.
fn flush(buffer: &mut Vec<&str>, section: Section, entries: &mut SectionedEntries) {
    if buffer.is_empty() {
        return;
    }

    let text = buffer.join(" ");
    buffer.clear();
    entries.entries_mut(section).push(split_entry(&text));
}

/// Splits "<Label>. <body>" into an entry, or files the whole text under
/// the fallback label.
pub fn split_entry(text: &str) -> Entry {
    let text = text.trim();
    match ENTRY_SPLIT.captures(text) {
        Some(caps) => Entry {
            label: caps[1].trim().to_string(),
            body: caps[2].trim().to_string(),
        },
        None => Entry {
            label: FALLBACK_LABEL.to_string(),
            body: text.to_string(),
        },
    }
}
