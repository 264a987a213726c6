//! Chord Matcher
//!
//! Scores every (root, chord type) pair against a set of detected pitch
//! classes and ranks the plausible ones.

use crate::chord_templates::TemplateSource;
use crate::note_table::{PitchClass, PitchClassSet};

/// Candidates scoring at or below this percentage are dropped.
pub const MIN_MATCH_PERCENT: f32 = 30.0;

/// Thirds and sevenths define chord quality and count double.
const QUALITY_INTERVALS: [u8; 4] = [3, 4, 10, 11];

/// A scored chord candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordMatch {
    /// Chord root.
    pub root: PitchClass,
    /// Template id, e.g. `"major"`.
    pub type_id: String,
    /// Root name plus suffix, e.g. `"C#m7"`.
    pub display_name: String,
    /// Match percentage in `(30, 100]`.
    pub score: f32,
    /// Chord tones in template interval order.
    pub notes: Vec<PitchClass>,
}

/// Rank chord candidates for `active`, best first.
///
/// With a `root_hint` only that root is tried, otherwise all twelve. For each
/// candidate, chord tones present in `active` earn their weight (2 for
/// intervals 3, 4, 10 and 11, else 1) out of the template's total weight; each
/// active note then adds 0.5 if it is a chord tone or subtracts 0.5 if not.
/// The ratio is scaled to a percentage, clamped to `[0, 100]`, and candidates
/// at or below [`MIN_MATCH_PERCENT`] are discarded.
///
/// The sort is stable: equal scores keep generation order, roots `C..B` in
/// the outer loop and templates in table order in the inner loop. An empty
/// `active` set returns immediately without reading the template table.
pub fn match_chords<S>(
    active: &PitchClassSet,
    root_hint: Option<PitchClass>,
    source: &S,
) -> Vec<ChordMatch>
where
    S: TemplateSource + ?Sized,
{
    if active.is_empty() {
        return Vec::new();
    }

    let templates = source.templates();
    let roots: Vec<PitchClass> = match root_hint {
        Some(root) => vec![root],
        None => PitchClass::ALL.to_vec(),
    };

    let mut matches = Vec::new();
    for &root in &roots {
        for template in templates {
            let notes = template.notes_on(root);

            let mut total = 0.0f32;
            let mut score = 0.0f32;
            for (&interval, &note) in template.intervals.iter().zip(&notes) {
                let weight = if QUALITY_INTERVALS.contains(&interval) {
                    2.0
                } else {
                    1.0
                };
                total += weight;
                if active.contains(note) {
                    score += weight;
                }
            }
            for note in active.iter() {
                if notes.contains(&note) {
                    score += 0.5;
                } else {
                    score -= 0.5;
                }
            }

            if total <= 0.0 {
                continue;
            }
            let percent = (100.0 * score / total).clamp(0.0, 100.0);
            if percent <= MIN_MATCH_PERCENT {
                continue;
            }
            matches.push(ChordMatch {
                root,
                type_id: template.type_id.clone(),
                display_name: template.display_name(root),
                score: percent,
                notes,
            });
        }
    }

    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    log::trace!(
        "{} chord candidates for {} notes over {} roots",
        matches.len(),
        active.len(),
        roots.len()
    );
    matches
}
