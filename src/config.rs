//! Configuration
//!
//! Detection parameters and optional custom tables, loadable from TOML.
//! Everything is validated once, when the analyzers are built.
//!
//! ```toml
//! [monophonic]
//! range = { min_hz = 80.0, max_hz = 1100.0 }
//! volume_floor = 60.0
//! decay_ms = 800
//!
//! [polyphonic]
//! max_peaks = 8
//!
//! [[chord_templates]]
//! id = "major"
//! suffix = ""
//! intervals = [0, 4, 7]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::chord_templates::{ChordDatabase, ChordTemplate};
use crate::note_table::{NoteBand, NoteTable};
use crate::peaks::FrequencyRange;
use crate::tracker::{
    PitchTracker, DEFAULT_HISTORY_LEN, DEFAULT_STABILITY_CENTS, DEFAULT_STABLE_COUNT,
};

/// Startup configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A note table with no bands.
    #[error("note table is empty")]
    EmptyNoteTable,

    /// A band with non-finite or inverted bounds.
    #[error("note band {index} has invalid bounds {min_hz}..={max_hz} Hz")]
    InvalidBand {
        /// Position of the band in the table.
        index: usize,
        /// Lower bound given.
        min_hz: f32,
        /// Upper bound given.
        max_hz: f32,
    },

    /// A tuning reference that is not a positive finite frequency.
    #[error("invalid reference frequency {0} Hz")]
    InvalidReference(f32),

    /// A pitch class name that could not be parsed.
    #[error("unknown pitch class `{0}`")]
    UnknownPitchClass(String),

    /// A chord database with no templates.
    #[error("chord template database is empty")]
    EmptyChordDatabase,

    /// A template without a `0` interval.
    #[error("chord template `{0}` has no root (0) interval")]
    MissingRoot(String),

    /// A template interval outside `0..24`.
    #[error("chord template `{type_id}` has interval {interval} outside 0..24")]
    IntervalOutOfRange {
        /// Offending template.
        type_id: String,
        /// Offending interval.
        interval: u8,
    },

    /// Two templates sharing one id.
    #[error("duplicate chord template id `{0}`")]
    DuplicateChordType(String),

    /// A frequency range that is non-finite, negative or inverted.
    #[error("invalid {name} {min_hz}..={max_hz} Hz")]
    InvalidRange {
        /// Which range.
        name: &'static str,
        /// Lower bound given.
        min_hz: f32,
        /// Upper bound given.
        max_hz: f32,
    },

    /// A magnitude floor that is negative or not finite.
    #[error("invalid {name} {value}")]
    InvalidFloor {
        /// Which floor.
        name: &'static str,
        /// Value given.
        value: f32,
    },

    /// A zero sample rate.
    #[error("invalid sample rate {0}")]
    InvalidSampleRate(u32),

    /// A zero transform size.
    #[error("invalid transform size {0}")]
    InvalidTransformSize(usize),

    /// A history window that cannot hold the stability count.
    #[error("history of {history_len} cannot hold {stable_count} stable samples")]
    InvalidWindow {
        /// Window capacity given.
        history_len: usize,
        /// Stability count given.
        stable_count: usize,
    },

    /// A negative stability window.
    #[error("invalid stability window of {0} cents")]
    InvalidStabilityCents(i32),

    /// The polyphonic peak limit was zero.
    #[error("max_peaks must be at least 1")]
    InvalidPeakLimit,

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisConfig {
    /// Single-note (vocal) tracking.
    #[serde(default)]
    pub monophonic: MonophonicConfig,
    /// Chord (instrument) tracking.
    #[serde(default)]
    pub polyphonic: PolyphonicConfig,
    /// Custom note bands, in lookup order. Defaults to the tempered table.
    #[serde(default)]
    pub note_bands: Option<Vec<NoteBand>>,
    /// Custom chord templates, in lookup order. Defaults to the standard set.
    #[serde(default)]
    pub chord_templates: Option<Vec<ChordTemplate>>,
}

/// Parameters for the monophonic pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct MonophonicConfig {
    /// Accepted peak frequencies.
    #[serde(default = "default_vocal_range")]
    pub range: FrequencyRange,
    /// Minimum bin magnitude for a peak.
    #[serde(default = "default_peak_floor")]
    pub peak_floor: f32,
    /// Frames whose strongest peak is below this are silence.
    #[serde(default = "default_volume_floor")]
    pub volume_floor: f32,
    /// Smoothing window capacity.
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    /// Samples of one note before a held note is re-reported.
    #[serde(default = "default_stable_count")]
    pub stable_count: usize,
    /// Cents spread allowed in a stable reading.
    #[serde(default = "default_stability_cents")]
    pub stability_cents: i32,
    /// Silence, in milliseconds, after which tracking stops.
    #[serde(default = "default_decay_ms")]
    pub decay_ms: u64,
}

/// Parameters for the polyphonic pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct PolyphonicConfig {
    /// Accepted peak frequencies.
    #[serde(default = "default_instrument_range")]
    pub range: FrequencyRange,
    /// Minimum bin magnitude for a peak.
    #[serde(default = "default_peak_floor")]
    pub peak_floor: f32,
    /// Only this many of the loudest peaks are mapped to notes.
    #[serde(default = "default_max_peaks")]
    pub max_peaks: usize,
    /// Pass the inferred bass pitch class to the matcher as a root hint.
    #[serde(default)]
    pub anchor_on_root: bool,
}

impl Default for MonophonicConfig {
    fn default() -> Self {
        Self {
            range: default_vocal_range(),
            peak_floor: default_peak_floor(),
            volume_floor: default_volume_floor(),
            history_len: default_history_len(),
            stable_count: default_stable_count(),
            stability_cents: default_stability_cents(),
            decay_ms: default_decay_ms(),
        }
    }
}

impl Default for PolyphonicConfig {
    fn default() -> Self {
        Self {
            range: default_instrument_range(),
            peak_floor: default_peak_floor(),
            max_peaks: default_max_peaks(),
            anchor_on_root: false,
        }
    }
}

fn default_vocal_range() -> FrequencyRange {
    FrequencyRange::VOCAL
}

fn default_instrument_range() -> FrequencyRange {
    FrequencyRange::INSTRUMENT
}

fn default_peak_floor() -> f32 {
    40.0
}

fn default_volume_floor() -> f32 {
    60.0
}

fn default_history_len() -> usize {
    DEFAULT_HISTORY_LEN
}

fn default_stable_count() -> usize {
    DEFAULT_STABLE_COUNT
}

fn default_stability_cents() -> i32 {
    DEFAULT_STABILITY_CENTS
}

fn default_decay_ms() -> u64 {
    800
}

fn default_max_peaks() -> usize {
    10
}

impl MonophonicConfig {
    /// Build a fresh tracking session from these parameters.
    pub fn tracker(&self) -> Result<PitchTracker, ConfigError> {
        PitchTracker::builder()
            .history_len(self.history_len)
            .stable_count(self.stable_count)
            .stability_cents(self.stability_cents)
            .volume_floor(self.volume_floor)
            .decay(Duration::from_millis(self.decay_ms))
            .build()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.range.validate("vocal range")?;
        check_floor("monophonic peak_floor", self.peak_floor)?;
        self.tracker().map(|_| ())
    }
}

impl PolyphonicConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.range.validate("instrument range")?;
        check_floor("polyphonic peak_floor", self.peak_floor)?;
        if self.max_peaks == 0 {
            return Err(ConfigError::InvalidPeakLimit);
        }
        Ok(())
    }
}

impl AnalysisConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AnalysisConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!(
            "Loaded config from {} ({} custom note bands, {} custom chord templates)",
            path.display(),
            config.note_bands.as_ref().map_or(0, Vec::len),
            config.chord_templates.as_ref().map_or(0, Vec::len),
        );
        Ok(config)
    }

    /// Check every parameter and table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.monophonic.validate()?;
        self.polyphonic.validate()?;
        self.note_table()?;
        self.chord_database()?;
        Ok(())
    }

    /// The configured note table, or the standard tempered one.
    pub fn note_table(&self) -> Result<NoteTable, ConfigError> {
        match &self.note_bands {
            Some(bands) => NoteTable::from_bands(bands.clone()),
            None => Ok(NoteTable::default()),
        }
    }

    /// The configured chord database, or the standard one.
    pub fn chord_database(&self) -> Result<ChordDatabase, ConfigError> {
        match &self.chord_templates {
            Some(templates) => ChordDatabase::from_templates(templates.clone()),
            None => Ok(ChordDatabase::standard()),
        }
    }
}

fn check_floor(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidFloor { name, value });
    }
    Ok(())
}
