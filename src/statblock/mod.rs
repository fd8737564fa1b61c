//! Stat block data model and the text → draft parsing chain.
//!
//! Recognized text flows through [`normalize`] → [`extract`] → [`sections`]
//! and is assembled into a [`StatBlockDraft`] by [`build_draft`].

pub mod extract;
pub mod normalize;
pub mod review;
pub mod sections;

pub use extract::extract_fields;
pub use normalize::{normalize, split_lines};
pub use review::ReviewEdits;
pub use sections::{body_lines, segment};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name used when the text has no usable first line.
pub const UNKNOWN_NAME: &str = "Unknown Monster";

/// Challenge rating used when none is recognized.
pub const DEFAULT_CHALLENGE: &str = "1/8";

/// Speed used when no speed line is recognized.
pub const DEFAULT_SPEED: &str = "30 ft.";

pub const DEFAULT_ARMOR_CLASS: u32 = 10;
pub const DEFAULT_HIT_POINTS: u32 = 1;
pub const DEFAULT_PROFICIENCY_BONUS: i32 = 2;
pub const DEFAULT_ABILITY_SCORE: u32 = 10;

/// The six ability scores, in stat block order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ability {
    Str,
    Dex,
    Con,
    Int,
    Wis,
    Cha,
}

impl Ability {
    /// Parses a three-letter label such as "STR" or "wis".
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_uppercase().as_str() {
            "STR" => Some(Ability::Str),
            "DEX" => Some(Ability::Dex),
            "CON" => Some(Ability::Con),
            "INT" => Some(Ability::Int),
            "WIS" => Some(Ability::Wis),
            "CHA" => Some(Ability::Cha),
            _ => None,
        }
    }

    /// Position of this ability in stat block order.
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    #[serde(rename = "str")]
    pub strength: u32,
    #[serde(rename = "dex")]
    pub dexterity: u32,
    #[serde(rename = "con")]
    pub constitution: u32,
    #[serde(rename = "int")]
    pub intelligence: u32,
    #[serde(rename = "wis")]
    pub wisdom: u32,
    #[serde(rename = "cha")]
    pub charisma: u32,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::from_array([DEFAULT_ABILITY_SCORE; 6])
    }
}

impl AbilityScores {
    /// Builds scores from an array in STR, DEX, CON, INT, WIS, CHA order.
    pub fn from_array(scores: [u32; 6]) -> Self {
        Self {
            strength: scores[0],
            dexterity: scores[1],
            constitution: scores[2],
            intelligence: scores[3],
            wisdom: scores[4],
            charisma: scores[5],
        }
    }

    pub fn to_array(&self) -> [u32; 6] {
        [
            self.strength,
            self.dexterity,
            self.constitution,
            self.intelligence,
            self.wisdom,
            self.charisma,
        ]
    }
}

/// Scalar and short-text fields of a stat block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreFields {
    pub name: String,
    pub size_type: String,
    pub alignment: String,
    pub ac: u32,
    pub ac_text: String,
    pub hp: u32,
    pub hp_formula: String,
    pub speed: String,
    pub cr: String,
    pub xp: u64,
    pub proficiency_bonus: i32,
    #[serde(flatten)]
    pub abilities: AbilityScores,
}

impl Default for CoreFields {
    fn default() -> Self {
        Self {
            name: UNKNOWN_NAME.to_string(),
            size_type: String::new(),
            alignment: String::new(),
            ac: DEFAULT_ARMOR_CLASS,
            ac_text: String::new(),
            hp: DEFAULT_HIT_POINTS,
            hp_formula: String::new(),
            speed: DEFAULT_SPEED.to_string(),
            cr: DEFAULT_CHALLENGE.to_string(),
            xp: 0,
            proficiency_bonus: DEFAULT_PROFICIENCY_BONUS,
            abilities: AbilityScores::default(),
        }
    }
}

/// List-valued header fields (saves, senses, languages, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaLists {
    pub saves: Vec<String>,
    pub skills: Vec<String>,
    pub vulnerabilities: Vec<String>,
    pub resistances: Vec<String>,
    pub immunities: Vec<String>,
    pub condition_immunities: Vec<String>,
    pub senses: Vec<String>,
    pub languages: Vec<String>,
    pub habitats: Vec<String>,
}

/// One named trait, action, reaction, or legendary action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub label: String,
    pub body: String,
}

/// Categories the body of a stat block is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Traits,
    Actions,
    BonusActions,
    Reactions,
    LegendaryActions,
}

impl Section {
    /// Matches a whole-line category header, ignoring case.
    pub fn from_header(line: &str) -> Option<Self> {
        let line = line.trim();
        [
            ("Actions", Section::Actions),
            ("Bonus Actions", Section::BonusActions),
            ("Reactions", Section::Reactions),
            ("Legendary Actions", Section::LegendaryActions),
        ]
        .into_iter()
        .find(|(header, _)| line.eq_ignore_ascii_case(header))
        .map(|(_, section)| section)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionedEntries {
    pub traits: Vec<Entry>,
    pub actions: Vec<Entry>,
    pub bonus_actions: Vec<Entry>,
    pub reactions: Vec<Entry>,
    pub legendary_actions: Vec<Entry>,
}

impl SectionedEntries {
    pub fn entries_mut(&mut self, section: Section) -> &mut Vec<Entry> {
        match section {
            Section::Traits => &mut self.traits,
            Section::Actions => &mut self.actions,
            Section::BonusActions => &mut self.bonus_actions,
            Section::Reactions => &mut self.reactions,
            Section::LegendaryActions => &mut self.legendary_actions,
        }
    }
}

/// Everything recovered from one piece of text, without provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedStatBlock {
    #[serde(flatten)]
    pub core: CoreFields,
    #[serde(flatten)]
    pub meta: MetaLists,
    #[serde(flatten)]
    pub sections: SectionedEntries,
}

/// How a draft's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportMethod {
    /// Text came from running OCR on an image.
    ScreenshotOcr,
    /// Text was edited or supplied by the user and parsed directly.
    TextReparse,
}

/// Source label and source-type tag stamped onto every draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSource {
    pub label: String,
    pub source_type: String,
}

impl Default for DraftSource {
    fn default() -> Self {
        Self {
            label: "Imported Screenshot".to_string(),
            source_type: "homebrew".to_string(),
        }
    }
}

/// A parsed stat block plus identity and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatBlockDraft {
    pub id: String,
    pub source: String,
    pub source_type: String,
    #[serde(flatten)]
    pub parsed: ParsedStatBlock,
    pub imported_at: DateTime<Utc>,
    pub imported_from: ImportMethod,
}

impl StatBlockDraft {
    pub fn name(&self) -> &str {
        &self.parsed.core.name
    }

    /// Pretty-printed JSON, as used for clipboard-style export.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Runs extraction and segmentation over `text`.
///
/// Never fails: anything that cannot be recognized takes its default.
pub fn parse_stat_block(text: &str) -> ParsedStatBlock {
    let normalized = normalize(text);
    let lines = split_lines(&normalized);
    let (core, meta) = extract_fields(&normalized, &lines);
    let sections = segment(body_lines(&lines));

    ParsedStatBlock {
        core,
        meta,
        sections,
    }
}

/// Parses `text` and stamps a fresh identifier and import timestamp.
pub fn build_draft(text: &str, source: &DraftSource, method: ImportMethod) -> StatBlockDraft {
    StatBlockDraft {
        id: Uuid::new_v4().to_string(),
        source: source.label.clone(),
        source_type: source.source_type.clone(),
        parsed: parse_stat_block(text),
        imported_at: Utc::now(),
        imported_from: method,
    }
}
