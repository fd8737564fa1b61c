//! User corrections applied to a draft before it is saved or exported.

use super::{StatBlockDraft, DEFAULT_ARMOR_CLASS, DEFAULT_CHALLENGE, DEFAULT_HIT_POINTS, UNKNOWN_NAME};

/// Optional overrides for the fields a reviewer usually corrects.
///
/// Values are raw text as typed by the user. `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewEdits {
    pub name: Option<String>,
    pub size_type: Option<String>,
    pub alignment: Option<String>,
    pub cr: Option<String>,
    pub ac: Option<String>,
    pub hp: Option<String>,
}

impl ReviewEdits {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns a copy of `draft` with the edits applied.
    ///
    /// A blank name becomes "Unknown Monster" and a blank CR becomes "1/8".
    /// AC that does not parse becomes 10; HP that does not parse becomes 1
    /// and is never below 1.
    pub fn apply(&self, draft: &StatBlockDraft) -> StatBlockDraft {
        let mut reviewed = draft.clone();
        let core = &mut reviewed.parsed.core;

        if let Some(name) = &self.name {
            core.name = non_blank_or(name, UNKNOWN_NAME);
        }
        if let Some(size_type) = &self.size_type {
            core.size_type = size_type.trim().to_string();
        }
        if let Some(alignment) = &self.alignment {
            core.alignment = alignment.trim().to_string();
        }
        if let Some(cr) = &self.cr {
            core.cr = non_blank_or(cr, DEFAULT_CHALLENGE);
        }
        if let Some(ac) = &self.ac {
            core.ac = parse_whole_number(ac)
                .map(|value| value.max(0) as u32)
                .unwrap_or(DEFAULT_ARMOR_CLASS);
        }
        if let Some(hp) = &self.hp {
            core.hp = parse_whole_number(hp)
                .map(|value| value.max(1) as u32)
                .unwrap_or(DEFAULT_HIT_POINTS);
        }

        reviewed
    }
}

fn non_blank_or(value: &str, fallback: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Parses user input as an integer, truncating any fractional part.
fn parse_whole_number(text: &str) -> Option<i64> {
    let text = text.trim();
    text.parse::<i64>().ok().or_else(|| {
        text.parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(|value| value.trunc() as i64)
    })
    .map(|value| value.min(u32::MAX as i64))
}
