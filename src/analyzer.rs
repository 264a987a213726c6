//! Per-tick analysis pipelines.
//!
//! [`MonophonicAnalyzer`] follows the single most prominent pitch through one
//! tracking session; [`PolyphonicAnalyzer`] reports every sounding pitch
//! class and the chords that fit them. Both are fed one magnitude spectrum per
//! tick by the capture side.

use std::time::Duration;

use crate::chord_matcher::{match_chords, ChordMatch};
use crate::chord_templates::ChordDatabase;
use crate::config::{AnalysisConfig, ConfigError, MonophonicConfig, PolyphonicConfig};
use crate::mapper::{estimate_pitch, map_pitch_class};
use crate::note_table::{NoteTable, PitchClass, PitchClassSet};
use crate::peaks::{extract_peaks, FrequencyRange, Spectrum, SpectrumFormat};
use crate::tracker::{PitchReading, PitchTracker};

/// Monophonic output for one tick.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PitchFrame {
    /// Tracked pitch, or `None` when silent.
    pub pitch: Option<PitchReading>,
    /// Gamma-corrected loudness, 0..1.
    pub volume: f32,
}

/// Polyphonic output for one tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChordFrame {
    /// Distinct pitch classes, loudest peak first.
    pub notes: Vec<PitchClass>,
    /// Lowest detected pitch class in `C..B` order.
    pub root: Option<PitchClass>,
    /// Ranked chord candidates.
    pub chords: Vec<ChordMatch>,
}

impl ChordFrame {
    /// Highest-ranked chord, if any.
    pub fn best(&self) -> Option<&ChordMatch> {
        self.chords.first()
    }

    /// Detected notes as display strings.
    pub fn note_names(&self) -> Vec<&'static str> {
        self.notes.iter().map(|pc| pc.name()).collect()
    }
}

/// Single-note tracking over a stream of spectra.
#[derive(Debug, Clone)]
pub struct MonophonicAnalyzer {
    format: SpectrumFormat,
    table: NoteTable,
    range: FrequencyRange,
    peak_floor: f32,
    tracker: PitchTracker,
}

impl MonophonicAnalyzer {
    /// Build from a full configuration.
    pub fn new(format: SpectrumFormat, config: &AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::with_table(format, config.note_table()?, &config.monophonic)
    }

    /// Build with an explicit note table.
    pub fn with_table(
        format: SpectrumFormat,
        table: NoteTable,
        config: &MonophonicConfig,
    ) -> Result<Self, ConfigError> {
        config.range.validate("vocal range")?;
        Ok(MonophonicAnalyzer {
            format,
            table,
            range: config.range,
            peak_floor: config.peak_floor,
            tracker: config.tracker()?,
        })
    }

    /// Analyse one spectrum taken at session time `now`.
    ///
    /// The loudest in-range peak is the candidate note; its magnitude is the
    /// frame loudness the tracker gates on. No peak means a silent frame.
    pub fn process(&mut self, magnitudes: &[f32], now: Duration) -> PitchFrame {
        let spectrum = Spectrum::new(magnitudes, self.format);
        let peaks = extract_peaks(&spectrum, self.peak_floor, Some(self.range));
        let strongest = peaks.first();

        let magnitude = strongest.map_or(0.0, |p| p.magnitude);
        let estimate = strongest.and_then(|p| estimate_pitch(p, &self.table));
        PitchFrame {
            pitch: self.tracker.update(magnitude, estimate, now),
            volume: spectrum.volume_level(),
        }
    }

    /// The session's tracker.
    pub fn tracker(&self) -> &PitchTracker {
        &self.tracker
    }

    /// Start a new session.
    pub fn reset(&mut self) {
        self.tracker.reset();
    }
}

/// Pitch-class detection and chord ranking. Holds no per-tick state.
#[derive(Debug, Clone)]
pub struct PolyphonicAnalyzer {
    format: SpectrumFormat,
    table: NoteTable,
    chords: ChordDatabase,
    config: PolyphonicConfig,
}

impl PolyphonicAnalyzer {
    /// Build from a full configuration.
    pub fn new(format: SpectrumFormat, config: &AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::with_tables(
            format,
            config.note_table()?,
            config.chord_database()?,
            config.polyphonic.clone(),
        )
    }

    /// Build with explicit tables.
    pub fn with_tables(
        format: SpectrumFormat,
        table: NoteTable,
        chords: ChordDatabase,
        config: PolyphonicConfig,
    ) -> Result<Self, ConfigError> {
        config.range.validate("instrument range")?;
        if config.max_peaks == 0 {
            return Err(ConfigError::InvalidPeakLimit);
        }
        Ok(PolyphonicAnalyzer {
            format,
            table,
            chords,
            config,
        })
    }

    /// Analyse one spectrum.
    pub fn process(&self, magnitudes: &[f32]) -> ChordFrame {
        let spectrum = Spectrum::new(magnitudes, self.format);
        let (notes, active) = self.detect_notes(&spectrum);
        let root = active.lowest();
        let hint = if self.config.anchor_on_root {
            root
        } else {
            None
        };
        ChordFrame {
            chords: match_chords(&active, hint, &self.chords),
            notes,
            root,
        }
    }

    /// Distinct pitch classes among the loudest in-range peaks, in
    /// first-detection order, plus the same notes as a set.
    fn detect_notes(&self, spectrum: &Spectrum<'_>) -> (Vec<PitchClass>, PitchClassSet) {
        let peaks = extract_peaks(spectrum, self.config.peak_floor, Some(self.config.range));
        let mut notes = Vec::new();
        let mut active = PitchClassSet::new();
        for peak in peaks.iter().take(self.config.max_peaks) {
            if let Some(pc) = map_pitch_class(peak, &self.table) {
                if active.insert(pc) {
                    notes.push(pc);
                }
            }
        }
        (notes, active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BINS: usize = 8192;

    fn format() -> SpectrumFormat {
        SpectrumFormat::new(44_100, 2 * BINS).unwrap()
    }

    fn bin_of(freq: f32) -> usize {
        (freq / format().bin_width()).round() as usize
    }

    fn spectrum_with(peaks: &[(usize, f32)]) -> Vec<f32> {
        let mut mags = vec![0.0; BINS];
        for &(bin, mag) in peaks {
            mags[bin] = mag;
        }
        mags
    }

    fn g_major() -> Vec<f32> {
        spectrum_with(&[
            (bin_of(196.0), 200.0),
            (bin_of(246.9), 150.0),
            (bin_of(293.7), 100.0),
        ])
    }

    #[test]
    fn out_of_vocal_range_peak_is_silence() {
        // 44.1 kHz / 2048: bin 186 sits at ~4005 Hz.
        let coarse = SpectrumFormat::new(44_100, 2048).unwrap();
        let config = AnalysisConfig::default();
        let mut mags = vec![0.0; 1024];
        mags[186] = 200.0;

        let mut mono = MonophonicAnalyzer::new(coarse, &config).unwrap();
        assert!(mono.process(&mags, Duration::ZERO).pitch.is_none());

        let poly = PolyphonicAnalyzer::new(coarse, &config).unwrap();
        let frame = poly.process(&mags);
        assert_eq!(frame.notes, vec![PitchClass::B]);
    }

    #[test]
    fn tracks_loudest_peak() {
        let mut mono = MonophonicAnalyzer::new(format(), &AnalysisConfig::default()).unwrap();
        let mags = spectrum_with(&[(bin_of(440.0), 180.0), (bin_of(660.0), 90.0)]);
        let frame = mono.process(&mags, Duration::ZERO);
        let reading = frame.pitch.unwrap();
        assert_eq!(reading.estimate.note.pitch_class, PitchClass::A);
        assert!(frame.volume > 0.0);
    }

    #[test]
    fn quiet_peak_counts_as_silence() {
        let mut mono = MonophonicAnalyzer::new(format(), &AnalysisConfig::default()).unwrap();
        // Above the peak floor (40) but below the volume floor (60).
        let mags = spectrum_with(&[(bin_of(440.0), 50.0)]);
        assert!(mono.process(&mags, Duration::ZERO).pitch.is_none());
    }

    #[test]
    fn notes_keep_detection_order_and_root_is_lowest_index() {
        let poly = PolyphonicAnalyzer::new(format(), &AnalysisConfig::default()).unwrap();
        // E4 loudest, then G4, then C4.
        let mags = spectrum_with(&[
            (bin_of(329.63), 200.0),
            (bin_of(392.0), 150.0),
            (bin_of(261.63), 100.0),
        ]);
        let frame = poly.process(&mags);
        assert_eq!(frame.note_names(), vec!["E", "G", "C"]);
        assert_eq!(frame.root, Some(PitchClass::C));
        let best = frame.best().unwrap();
        assert_eq!(best.display_name, "C");
        assert_eq!(best.score, 100.0);
    }

    #[test]
    fn root_is_not_the_loudest_note() {
        let poly = PolyphonicAnalyzer::new(format(), &AnalysisConfig::default()).unwrap();
        let frame = poly.process(&g_major());
        assert_eq!(frame.note_names(), vec!["G", "B", "D"]);
        assert_eq!(frame.root, Some(PitchClass::D));
        assert!(frame
            .chords
            .iter()
            .any(|c| c.display_name == "G" && c.score == 100.0));
    }

    #[test]
    fn anchoring_restricts_roots() {
        let mut config = AnalysisConfig::default();
        config.polyphonic.anchor_on_root = true;
        let poly = PolyphonicAnalyzer::new(format(), &config).unwrap();
        let frame = poly.process(&g_major());
        assert!(!frame.chords.is_empty());
        assert!(frame.chords.iter().all(|c| c.root == PitchClass::D));
    }

    #[test]
    fn peak_limit_caps_detected_notes() {
        let mut config = AnalysisConfig::default();
        config.polyphonic.max_peaks = 2;
        let poly = PolyphonicAnalyzer::new(format(), &config).unwrap();
        assert_eq!(poly.process(&g_major()).notes.len(), 2);
    }

    #[test]
    fn silent_spectrum_yields_empty_frame() {
        let poly = PolyphonicAnalyzer::new(format(), &AnalysisConfig::default()).unwrap();
        let frame = poly.process(&[0.0; BINS]);
        assert_eq!(frame, ChordFrame::default());
    }
}
