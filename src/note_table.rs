//! Note Table
//!
//! Pitch classes and the static frequency bands that map a spectral peak onto a
//! note identity. Bands are tested in table order and the first band whose
//! inclusive range contains a frequency wins; adjacent equal-tempered bands
//! share a sliver of overlap, so reordering a table changes its output.

use std::fmt::{self, Display};
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

const SEMITONES: usize = 12;

/// Reference pitch for the standard table (A4).
pub const DEFAULT_A4_HZ: f32 = 440.0;

/// Octaves covered by the standard table (C0 through B8).
pub const DEFAULT_OCTAVES: RangeInclusive<i8> = 0..=8;

const NAMES: [&str; SEMITONES] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Twelve chromatic pitch classes, in ascending order from C.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PitchClass {
    /// C
    C,
    /// C sharp / D flat
    Cs,
    /// D
    D,
    /// D sharp / E flat
    Ds,
    /// E
    E,
    /// F
    F,
    /// F sharp / G flat
    Fs,
    /// G
    G,
    /// G sharp / A flat
    Gs,
    /// A
    A,
    /// A sharp / B flat
    As,
    /// B
    B,
}

impl PitchClass {
    /// All pitch classes in chromatic order.
    pub const ALL: [PitchClass; SEMITONES] = [
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Ds,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
        PitchClass::A,
        PitchClass::As,
        PitchClass::B,
    ];

    /// Pitch class for a semitone index; wraps modulo 12.
    pub const fn from_index(idx: usize) -> PitchClass {
        Self::ALL[idx % SEMITONES]
    }

    /// Position in the chromatic order, `C = 0` to `B = 11`.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Sharps-only display name, e.g. `"F#"`.
    pub const fn name(self) -> &'static str {
        NAMES[self as usize]
    }

    /// The pitch class `semitones` above this one (octave-folded).
    pub const fn transpose(self, semitones: usize) -> PitchClass {
        Self::from_index(self as usize + semitones)
    }
}

impl Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pc = match s.trim() {
            "C" | "B#" => PitchClass::C,
            "C#" | "Db" => PitchClass::Cs,
            "D" => PitchClass::D,
            "D#" | "Eb" => PitchClass::Ds,
            "E" | "Fb" => PitchClass::E,
            "F" | "E#" => PitchClass::F,
            "F#" | "Gb" => PitchClass::Fs,
            "G" => PitchClass::G,
            "G#" | "Ab" => PitchClass::Gs,
            "A" => PitchClass::A,
            "A#" | "Bb" => PitchClass::As,
            "B" | "Cb" => PitchClass::B,
            other => return Err(ConfigError::UnknownPitchClass(other.to_string())),
        };
        Ok(pc)
    }
}

impl TryFrom<String> for PitchClass {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PitchClass> for String {
    fn from(pc: PitchClass) -> Self {
        pc.name().to_string()
    }
}

/// Unordered set of pitch classes, stored as a 12-bit mask.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PitchClassSet(u16);

impl PitchClassSet {
    /// The empty set.
    pub const fn new() -> Self {
        PitchClassSet(0)
    }

    /// Add a pitch class. Returns `true` if it was not already present.
    pub fn insert(&mut self, pc: PitchClass) -> bool {
        let bit = 1 << pc.index();
        let fresh = self.0 & bit == 0;
        self.0 |= bit;
        fresh
    }

    /// Whether `pc` is in the set.
    pub const fn contains(&self, pc: PitchClass) -> bool {
        self.0 & (1 << pc as usize) != 0
    }

    /// Number of distinct pitch classes.
    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether the set is empty.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Members in chromatic order starting at C.
    pub fn iter(&self) -> impl Iterator<Item = PitchClass> + '_ {
        PitchClass::ALL.into_iter().filter(move |&pc| self.contains(pc))
    }

    /// Lowest member in the fixed `C..B` ordering; the inferred bass note.
    pub fn lowest(&self) -> Option<PitchClass> {
        if self.0 == 0 {
            None
        } else {
            Some(PitchClass::from_index(self.0.trailing_zeros() as usize))
        }
    }
}

impl FromIterator<PitchClass> for PitchClassSet {
    fn from_iter<I: IntoIterator<Item = PitchClass>>(iter: I) -> Self {
        let mut set = PitchClassSet::new();
        for pc in iter {
            set.insert(pc);
        }
        set
    }
}

/// Identity of a note band: a pitch class, plus an octave for monophonic tables.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NoteId {
    /// Octave-independent pitch class.
    pub pitch_class: PitchClass,
    /// Scientific octave number (A4 = 440 Hz), absent in pitch-class-only tables.
    pub octave: Option<i8>,
}

impl Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.octave {
            Some(octave) => write!(f, "{}{}", self.pitch_class, octave),
            None => write!(f, "{}", self.pitch_class),
        }
    }
}

/// One accepted frequency band for a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteBand {
    /// Pitch class of the band.
    pub note: PitchClass,
    /// Octave, when the table distinguishes octaves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub octave: Option<i8>,
    /// Lower bound in Hz, inclusive.
    pub min_hz: f32,
    /// Upper bound in Hz, inclusive.
    pub max_hz: f32,
}

impl NoteBand {
    /// Identity of the note this band accepts.
    pub fn id(&self) -> NoteId {
        NoteId {
            pitch_class: self.note,
            octave: self.octave,
        }
    }

    /// Whether `freq` lies inside the band, bounds included.
    pub fn contains(&self, freq: f32) -> bool {
        (self.min_hz..=self.max_hz).contains(&freq)
    }

    /// Arithmetic midpoint of the band, the "perfect" reference frequency.
    pub fn center(&self) -> f32 {
        (self.min_hz + self.max_hz) * 0.5
    }
}

/// Validated, immutable table of note bands.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteTable {
    bands: Vec<NoteBand>,
}

impl NoteTable {
    /// Validate a custom table. Order is preserved and significant.
    pub fn from_bands(bands: Vec<NoteBand>) -> Result<Self, ConfigError> {
        if bands.is_empty() {
            return Err(ConfigError::EmptyNoteTable);
        }
        for (index, band) in bands.iter().enumerate() {
            let finite = band.min_hz.is_finite() && band.max_hz.is_finite();
            if !finite || band.min_hz >= band.max_hz {
                return Err(ConfigError::InvalidBand {
                    index,
                    min_hz: band.min_hz,
                    max_hz: band.max_hz,
                });
            }
        }
        Ok(NoteTable { bands })
    }

    /// Equal-tempered pitch-class+octave bands, ordered from the lowest note up.
    ///
    /// Each band is centred on the tempered frequency and reaches half a
    /// semitone to either side. The half-width is linear, so a band's midpoint
    /// is exactly its tempered frequency and neighbouring bands overlap by a
    /// few hundredths of a hertz; the lower note wins inside the overlap.
    pub fn equal_tempered(a4_hz: f32, octaves: RangeInclusive<i8>) -> Result<Self, ConfigError> {
        if !a4_hz.is_finite() || a4_hz <= 0.0 {
            return Err(ConfigError::InvalidReference(a4_hz));
        }
        if octaves.is_empty() {
            return Err(ConfigError::EmptyNoteTable);
        }
        Self::from_bands(tempered_bands(a4_hz, octaves))
    }

    /// Same bands as [`NoteTable::equal_tempered`] with the octave dropped from
    /// each identity, for octave-independent (polyphonic) mapping.
    pub fn pitch_classes(a4_hz: f32, octaves: RangeInclusive<i8>) -> Result<Self, ConfigError> {
        let mut table = Self::equal_tempered(a4_hz, octaves)?;
        for band in &mut table.bands {
            band.octave = None;
        }
        Ok(table)
    }

    /// First band, in table order, whose inclusive range contains `freq`.
    pub fn find(&self, freq: f32) -> Option<&NoteBand> {
        self.bands.iter().find(|band| band.contains(freq))
    }

    /// Bands in lookup order.
    pub fn bands(&self) -> &[NoteBand] {
        &self.bands
    }

    /// Number of bands; never zero.
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    /// Always `false`; validated tables are never empty.
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

impl Default for NoteTable {
    /// A4 = 440 Hz, octaves 0 through 8.
    fn default() -> Self {
        NoteTable {
            bands: tempered_bands(DEFAULT_A4_HZ, DEFAULT_OCTAVES),
        }
    }
}

fn tempered_bands(a4_hz: f32, octaves: RangeInclusive<i8>) -> Vec<NoteBand> {
    // Linear half-width that spans +/- 50 cents on average.
    let spread = (2f32.powf(1.0 / 24.0) - 2f32.powf(-1.0 / 24.0)) * 0.5;
    let mut bands = Vec::with_capacity(octaves.clone().count() * SEMITONES);

    for octave in octaves {
        for pc in PitchClass::ALL {
            let midi = (octave as i32 + 1) * SEMITONES as i32 + pc.index() as i32;
            let center = a4_hz * 2f32.powf((midi - 69) as f32 / SEMITONES as f32);
            let half = center * spread;
            bands.push(NoteBand {
                note: pc,
                octave: Some(octave),
                min_hz: center - half,
                max_hz: center + half,
            });
        }
    }
    bands
}
