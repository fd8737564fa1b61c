//! Field extraction from normalized stat block text.
//!
//! Every field is resolved independently by a short list of patterns tried in
//! precedence order. A field that no pattern matches (or whose number does not
//! parse) takes its default, so extraction always yields a complete record.

use regex::{Captures, Regex};
use std::str::FromStr;
use std::sync::LazyLock;

use super::{
    Ability, AbilityScores, CoreFields, MetaLists, DEFAULT_ABILITY_SCORE, DEFAULT_ARMOR_CLASS,
    DEFAULT_CHALLENGE, DEFAULT_HIT_POINTS, DEFAULT_PROFICIENCY_BONUS, DEFAULT_SPEED, UNKNOWN_NAME,
};
use crate::log;

static SIZE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(Tiny|Small|Medium|Large|Huge|Gargantuan)\s+([^,]+),\s*(.+)$")
        .expect("valid size line pattern")
});

static ARMOR_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bArmor Class\b\s*([0-9]{1,2})(?:\s*\(([^)]+)\))?")
        .expect("valid armor class pattern")
});

static ARMOR_CLASS_SHORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bAC\b[:\s]*([0-9]{1,2})(?:\s*\(([^)]+)\))?").expect("valid AC pattern")
});

static HIT_POINTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bHit Points?\b\s*([0-9]{1,4})(?:\s*\(([^)]+)\))?")
        .expect("valid hit points pattern")
});

static HIT_POINTS_SHORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bHP\b[:\s]*([0-9]{1,4})(?:\s*\(([^)]+)\))?").expect("valid HP pattern")
});

static SPEED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bSpeed\b\s*([^\n]+)").expect("valid speed pattern"));

static CHALLENGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bChallenge\b\s*([0-9]+(?:/[0-9]+)?)(?:\s*\(([\d,]+)\s*XP\))?")
        .expect("valid challenge pattern")
});

static CHALLENGE_SHORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bCR\b[:\s]*([0-9]+(?:/[0-9]+)?)").expect("valid CR pattern")
});

static PROFICIENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bProficiency Bonus\b\s*([+\-]?\d+)").expect("valid proficiency pattern")
});

static PROFICIENCY_SHORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bPB\b[:\s]*([+\-]?\d+)").expect("valid PB pattern"));

/// An ability label directly followed by its score, e.g. "STR 23".
static LABELED_SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(STR|DEX|CON|INT|WIS|CHA)\s+(\d{1,2})\b")
        .expect("valid labeled score pattern")
});

/// A bare score followed by its modifier, e.g. "23 (+6)".
static SCORE_WITH_MODIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})\s*\(\s*[+\-\u{2212}\u{2013}]?\d+\s*\)")
        .expect("valid score with modifier pattern")
});

// List-valued fields: "<label> <rest of line>".

static SAVES_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bSaving Throws\b\s*([^\n]+)").expect("valid saving throws pattern")
});

static SKILLS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bSkills\b\s*([^\n]+)").expect("valid skills pattern")
});

static VULNERABILITIES_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bDamage Vulnerabilities\b\s*([^\n]+)").expect("valid vulnerabilities pattern")
});

static RESISTANCES_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bDamage Resistances\b\s*([^\n]+)").expect("valid resistances pattern")
});

static IMMUNITIES_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bDamage Immunities\b\s*([^\n]+)").expect("valid immunities pattern")
});

static CONDITION_IMMUNITIES_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bCondition Immunities\b\s*([^\n]+)").expect("valid condition immunities pattern")
});

static SENSES_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bSenses\b\s*([^\n]+)").expect("valid senses pattern")
});

static LANGUAGES_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bLanguages\b\s*([^\n]+)").expect("valid languages pattern")
});

static HABITATS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:Habitat|Environment)\b\s*([^\n]+)").expect("valid habitat pattern")
});

/// Extracts core fields and list fields from normalized text and its lines.
pub fn extract_fields(text: &str, lines: &[String]) -> (CoreFields, MetaLists) {
    (extract_core(text, lines), extract_meta(text))
}

/// Extracts the scalar fields. Never fails.
pub fn extract_core(text: &str, lines: &[String]) -> CoreFields {
    let name = lines
        .first()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());

    let (size_type, alignment) = parse_size_line(lines.get(1).map(String::as_str).unwrap_or(""));

    let armor = first_match(text, &[&ARMOR_CLASS, &ARMOR_CLASS_SHORT]);
    let ac = armor
        .as_ref()
        .map(|caps| parse_or(group(caps, 1), DEFAULT_ARMOR_CLASS))
        .unwrap_or(DEFAULT_ARMOR_CLASS);
    let ac_text = armor.as_ref().map(|caps| group(caps, 2).to_string()).unwrap_or_default();

    let hit_points = first_match(text, &[&HIT_POINTS, &HIT_POINTS_SHORT]);
    let hp = hit_points
        .as_ref()
        .map(|caps| parse_or(group(caps, 1), DEFAULT_HIT_POINTS))
        .unwrap_or(DEFAULT_HIT_POINTS)
        .max(1);
    let hp_formula = hit_points
        .as_ref()
        .map(|caps| group(caps, 2).to_string())
        .unwrap_or_default();

    let speed = SPEED
        .captures(text)
        .map(|caps| group(&caps, 1).trim().to_string())
        .filter(|speed| !speed.is_empty())
        .unwrap_or_else(|| DEFAULT_SPEED.to_string());

    let challenge = first_match(text, &[&CHALLENGE, &CHALLENGE_SHORT]);
    let cr = challenge
        .as_ref()
        .map(|caps| group(caps, 1).to_string())
        .filter(|cr| !cr.is_empty())
        .unwrap_or_else(|| DEFAULT_CHALLENGE.to_string());
    let xp = challenge
        .as_ref()
        .map(|caps| parse_or(&group(caps, 2).replace(',', ""), 0u64))
        .unwrap_or(0);

    let proficiency_bonus = first_match(text, &[&PROFICIENCY, &PROFICIENCY_SHORT])
        .map(|caps| parse_or(group(&caps, 1), DEFAULT_PROFICIENCY_BONUS))
        .unwrap_or(DEFAULT_PROFICIENCY_BONUS);

    CoreFields {
        name,
        size_type,
        alignment,
        ac,
        ac_text,
        hp,
        hp_formula,
        speed,
        cr,
        xp,
        proficiency_bonus,
        abilities: extract_ability_scores(lines),
    }
}

/// Extracts the list-valued fields. Missing labels yield empty lists.
pub fn extract_meta(text: &str) -> MetaLists {
    MetaLists {
        saves: line_list(text, &SAVES_LINE),
        skills: line_list(text, &SKILLS_LINE),
        vulnerabilities: line_list(text, &VULNERABILITIES_LINE),
        resistances: line_list(text, &RESISTANCES_LINE),
        immunities: line_list(text, &IMMUNITIES_LINE),
        condition_immunities: line_list(text, &CONDITION_IMMUNITIES_LINE),
        senses: line_list(text, &SENSES_LINE),
        languages: line_list(text, &LANGUAGES_LINE),
        habitats: line_list(text, &HABITATS_LINE),
    }
}

/// Resolves the six ability scores in two tiers.
///
/// Tier 1 reads labeled scores ("STR 23") anywhere in the text. Tier 2 fills
/// the abilities tier 1 missed from the first six "score (modifier)" pairs,
/// by position. Whatever is still missing is 10.
pub fn extract_ability_scores(lines: &[String]) -> AbilityScores {
    let combined = lines.join(" ");
    let mut resolved: [Option<u32>; 6] = [None; 6];

    for caps in LABELED_SCORE.captures_iter(&combined) {
        if let (Some(ability), Ok(score)) = (
            Ability::from_label(group(&caps, 1)),
            group(&caps, 2).parse::<u32>(),
        ) {
            resolved[ability.index()] = Some(score);
        }
    }

    if resolved.iter().any(Option::is_none) {
        let positional: Vec<u32> = SCORE_WITH_MODIFIER
            .captures_iter(&combined)
            .filter_map(|caps| group(&caps, 1).parse::<u32>().ok())
            .take(6)
            .collect();

        if positional.len() == 6 {
            for (slot, score) in resolved.iter_mut().zip(positional) {
                if slot.is_none() {
                    *slot = Some(score);
                }
            }
        } else if !positional.is_empty() {
            log(&format!(
                "Ability scores: only {} score/modifier pairs found, need 6",
                positional.len()
            ));
        }
    }

    AbilityScores::from_array(resolved.map(|score| score.unwrap_or(DEFAULT_ABILITY_SCORE)))
}

/// Splits "<Size> <type>, <alignment>" into size/type and alignment.
fn parse_size_line(line: &str) -> (String, String) {
    match SIZE_LINE.captures(line) {
        Some(caps) => (
            format!("{} {}", group(&caps, 1), group(&caps, 2)).trim().to_string(),
            group(&caps, 3).trim().to_string(),
        ),
        None => (line.trim().to_string(), String::new()),
    }
}

/// Splits the rest of a labeled line on commas/semicolons.
fn line_list(text: &str, pattern: &Regex) -> Vec<String> {
    pattern
        .captures(text)
        .map(|caps| {
            group(&caps, 1)
                .split([',', ';'])
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Returns the captures of the first pattern that matches.
fn first_match<'t>(text: &'t str, patterns: &[&Regex]) -> Option<Captures<'t>> {
    patterns.iter().find_map(|pattern| pattern.captures(text))
}

/// Returns a capture group's text, or "" when the group did not participate.
fn group<'t>(caps: &Captures<'t>, index: usize) -> &'t str {
    caps.get(index).map(|m| m.as_str()).unwrap_or("")
}

/// Parses an integer, falling back to `fallback` on any failure.
fn parse_or<T: FromStr>(text: &str, fallback: T) -> T {
    text.trim().parse().unwrap_or(fallback)
}
