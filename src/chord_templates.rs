//! Chord Template Database
//!
//! Root-relative interval patterns for each chord type. The order of a
//! template's intervals matters to the matcher, which weights thirds and
//! sevenths by position, and the order of templates decides which of two
//! equally scored chords is listed first.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::note_table::PitchClass;

/// Intervals must lie in `0..MAX_INTERVAL` semitones (two octaves).
pub const MAX_INTERVAL: u8 = 24;

/// (type id, display suffix, intervals), in lookup order.
const STANDARD_TEMPLATES: &[(&str, &str, &[u8])] = &[
    ("major", "", &[0, 4, 7]),
    ("minor", "m", &[0, 3, 7]),
    ("power", "5", &[0, 7]),
    ("diminished", "dim", &[0, 3, 6]),
    ("augmented", "aug", &[0, 4, 8]),
    ("sus2", "sus2", &[0, 2, 7]),
    ("sus4", "sus4", &[0, 5, 7]),
    ("sixth", "6", &[0, 4, 7, 9]),
    ("minor_sixth", "m6", &[0, 3, 7, 9]),
    ("dominant7", "7", &[0, 4, 7, 10]),
    ("major7", "maj7", &[0, 4, 7, 11]),
    ("minor7", "m7", &[0, 3, 7, 10]),
    ("minor_major7", "mMaj7", &[0, 3, 7, 11]),
    ("diminished7", "dim7", &[0, 3, 6, 9]),
    ("half_diminished", "m7b5", &[0, 3, 6, 10]),
    ("seventh_sus4", "7sus4", &[0, 5, 7, 10]),
    ("add9", "add9", &[0, 4, 7, 14]),
    ("dominant9", "9", &[0, 4, 7, 10, 14]),
    ("major9", "maj9", &[0, 4, 7, 11, 14]),
    ("minor9", "m9", &[0, 3, 7, 10, 14]),
];

/// One chord type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordTemplate {
    /// Stable key, e.g. `"minor7"`.
    #[serde(rename = "id")]
    pub type_id: String,
    /// Appended to the root name for display, e.g. `"m7"`.
    #[serde(default)]
    pub suffix: String,
    /// Semitone offsets from the root, in template order.
    pub intervals: Vec<u8>,
}

impl ChordTemplate {
    /// Display name for this chord on `root`, e.g. `"Am7"`.
    pub fn display_name(&self, root: PitchClass) -> String {
        format!("{}{}", root, self.suffix)
    }

    /// Absolute pitch classes of the chord on `root`, in interval order.
    pub fn notes_on(&self, root: PitchClass) -> Vec<PitchClass> {
        self.intervals
            .iter()
            .map(|&i| root.transpose(i as usize))
            .collect()
    }
}

/// Anything that can hand the matcher a template table.
pub trait TemplateSource {
    /// Templates in lookup order.
    fn templates(&self) -> &[ChordTemplate];
}

/// Validated, immutable chord template table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordDatabase {
    templates: Vec<ChordTemplate>,
}

impl ChordDatabase {
    /// The built-in table: triads, sixths, sevenths and ninths.
    pub fn standard() -> Self {
        let templates = STANDARD_TEMPLATES
            .iter()
            .map(|&(id, suffix, intervals)| ChordTemplate {
                type_id: id.to_string(),
                suffix: suffix.to_string(),
                intervals: intervals.to_vec(),
            })
            .collect();
        ChordDatabase { templates }
    }

    /// Validate a custom table.
    ///
    /// Every template needs a unique id, at least one interval, a `0` interval
    /// for the root, and intervals below [`MAX_INTERVAL`].
    pub fn from_templates(templates: Vec<ChordTemplate>) -> Result<Self, ConfigError> {
        if templates.is_empty() {
            return Err(ConfigError::EmptyChordDatabase);
        }
        let mut seen = HashSet::new();
        for t in &templates {
            if !seen.insert(t.type_id.as_str()) {
                return Err(ConfigError::DuplicateChordType(t.type_id.clone()));
            }
            if !t.intervals.contains(&0) {
                return Err(ConfigError::MissingRoot(t.type_id.clone()));
            }
            if let Some(&interval) = t.intervals.iter().find(|&&i| i >= MAX_INTERVAL) {
                return Err(ConfigError::IntervalOutOfRange {
                    type_id: t.type_id.clone(),
                    interval,
                });
            }
        }
        Ok(ChordDatabase { templates })
    }

    /// Template by id.
    pub fn get(&self, type_id: &str) -> Option<&ChordTemplate> {
        self.templates.iter().find(|t| t.type_id == type_id)
    }

    /// Number of templates; never zero.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Always `false`; validated databases are never empty.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateSource for ChordDatabase {
    fn templates(&self) -> &[ChordTemplate] {
        &self.templates
    }
}

impl Default for ChordDatabase {
    fn default() -> Self {
        Self::standard()
    }
}
