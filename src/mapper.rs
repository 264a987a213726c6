//! Frequency-to-Note Mapper
//!
//! Resolves peaks against a [`NoteTable`]. Lookup is first-match in table
//! order: when bands overlap, the band listed first wins, and reordering the
//! table changes the result.

use crate::note_table::{NoteId, NoteTable, PitchClass};
use crate::peaks::Peak;

/// Largest cents deviation reported either side of a band centre.
pub const MAX_CENTS: i32 = 50;

/// A single-note reading with its deviation from the matched band centre.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PitchEstimate {
    /// Matched band identity.
    pub note: NoteId,
    /// Measured frequency in Hz.
    pub frequency: f32,
    /// Peak magnitude.
    pub magnitude: f32,
    /// Octave number; taken from the band when it has one.
    pub octave: i32,
    /// Deviation from the band centre, in `[-50, 50]`.
    pub cents: i32,
}

impl PitchEstimate {
    /// The reference frequency this estimate's cents were measured against,
    /// recovered as `frequency / 2^(cents / 1200)`.
    pub fn reference_frequency(&self) -> f32 {
        self.frequency / 2f32.powf(self.cents as f32 / 1200.0)
    }
}

/// Identity of the first band containing the peak frequency.
pub fn map_to_note(peak: &Peak, table: &NoteTable) -> Option<NoteId> {
    table.find(peak.frequency).map(|band| band.id())
}

/// Octave-independent pitch class of the peak.
pub fn map_pitch_class(peak: &Peak, table: &NoteTable) -> Option<PitchClass> {
    table.find(peak.frequency).map(|band| band.note)
}

/// Full monophonic reading: note, octave and cents from the band midpoint.
pub fn estimate_pitch(peak: &Peak, table: &NoteTable) -> Option<PitchEstimate> {
    let band = table.find(peak.frequency)?;
    let octave = match band.octave {
        Some(octave) => octave as i32,
        None => octave_of(peak.frequency),
    };
    Some(PitchEstimate {
        note: band.id(),
        frequency: peak.frequency,
        magnitude: peak.magnitude,
        octave,
        cents: cents_between(peak.frequency, band.center()),
    })
}

/// `round(1200 * log2(freq / reference))`, clamped to `[-50, 50]`.
pub fn cents_between(freq: f32, reference: f32) -> i32 {
    let cents = (1200.0 * (freq / reference).log2()).round();
    if cents.is_nan() {
        return 0;
    }
    (cents as i32).clamp(-MAX_CENTS, MAX_CENTS)
}

/// Scientific octave of the nearest tempered note (A4 = 440 Hz).
fn octave_of(freq: f32) -> i32 {
    let midi = (69.0 + 12.0 * (freq / 440.0).log2()).round() as i32;
    midi.div_euclid(12) - 1
}
