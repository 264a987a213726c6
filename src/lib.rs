//! # chord_tracker
//!
//! Real-time note and chord inference from magnitude spectra: pick spectral
//! peaks, map them onto note bands, smooth single-note readings over time, and
//! rank chord templates against the sounding pitch classes.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use chord_tracker::{AnalysisConfig, MonophonicAnalyzer, PolyphonicAnalyzer, SpectrumFormat};
//!
//! fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1) Describe the spectra the capture side will deliver
//!     let format = SpectrumFormat::new(44_100, 2048)?;
//!     let config = AnalysisConfig::default();
//!
//!     // 2) One analyzer per mode; the monophonic one owns a tracking session
//!     let mut voice = MonophonicAnalyzer::new(format, &config)?;
//!     let chords = PolyphonicAnalyzer::new(format, &config)?;
//!
//!     // 3) In your polling loop:
//!     let magnitudes = vec![0.0f32; 1024]; // fill with byte-scaled magnitudes
//!     let frame = voice.process(&magnitudes, Duration::from_millis(0));
//!     if let Some(reading) = frame.pitch {
//!         println!("{} {:+} cents", reading.estimate.note, reading.estimate.cents);
//!     }
//!     if let Some(best) = chords.process(&magnitudes).best() {
//!         println!("{} ({:.0}%)", best.display_name, best.score);
//!     }
//!
//!     Ok(())
//! }
//! # run().unwrap();
//! ```
//!
//! ## Features
//! - `fft` (default): enables the `SpectrumAnalyzer` PCM front-end via `rustfft`

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rust_2018_idioms)]
#![deny(clippy::all)]

/// Per-tick pipelines.
pub use analyzer::{ChordFrame, MonophonicAnalyzer, PitchFrame, PolyphonicAnalyzer};

/// Chord scoring and templates.
pub use chord_matcher::{match_chords, ChordMatch};
pub use chord_templates::{ChordDatabase, ChordTemplate, TemplateSource};

/// Configuration and startup errors.
pub use config::{AnalysisConfig, ConfigError, MonophonicConfig, PolyphonicConfig};

/// Note identities and mapping.
pub use mapper::{estimate_pitch, map_pitch_class, map_to_note, PitchEstimate};
pub use note_table::{NoteBand, NoteId, NoteTable, PitchClass, PitchClassSet};

/// Spectra and peaks.
pub use peaks::{extract_peaks, FrequencyRange, Peak, Spectrum, SpectrumFormat};

/// Monophonic session state.
pub use tracker::{PitchReading, PitchTracker, PitchTrackerBuilder, TrackerState};

/// PCM-to-spectrum front-end.
#[cfg(feature = "fft")]
pub use spectrum::{Scaling, SpectrumAnalyzer, SpectrumAnalyzerBuilder, SpectrumError};

/// Analysis pipelines.
pub mod analyzer;

/// Chord matching.
pub mod chord_matcher;

/// Chord template database.
pub mod chord_templates;

/// Configuration loading and validation.
pub mod config;

/// Frequency-to-note mapping.
pub mod mapper;

/// Pitch classes and note bands.
pub mod note_table;

/// Spectral peak extraction.
pub mod peaks;

/// Monophonic pitch tracking.
pub mod tracker;

/// FFT magnitude spectra.
#[cfg(feature = "fft")]
pub mod spectrum;
