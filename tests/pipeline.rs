//! End-to-end tests: synthetic tones through the FFT front-end and both analyzers.

#![cfg(feature = "fft")]

use chord_tracker::{
    AnalysisConfig, MonophonicAnalyzer, PitchClass, PolyphonicAnalyzer, Scaling, SpectrumAnalyzer,
    TrackerState,
};
use lazy_static::lazy_static;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::collections::HashSet;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44_100;

lazy_static! {
    /// Floors expressed in linear `|X| / n` units.
    static ref LINEAR_CONFIG: AnalysisConfig = {
        let mut config = AnalysisConfig::default();
        config.monophonic.peak_floor = 0.01;
        config.monophonic.volume_floor = 0.02;
        config.polyphonic.peak_floor = 0.01;
        config
    };
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Sum of sines, each `(frequency, amplitude)`.
fn tones(parts: &[(f32, f32)], len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            parts
                .iter()
                .map(|&(freq, amp)| amp * (2.0 * PI * freq * t).sin())
                .sum()
        })
        .collect()
}

fn linear_analyzer(size: usize) -> SpectrumAnalyzer {
    SpectrumAnalyzer::builder()
        .transform_size(size)
        .sample_rate(SAMPLE_RATE)
        .scaling(Scaling::Linear)
        .build()
        .unwrap()
}

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[test]
fn sung_a4_settles_then_decays() {
    init_logging();
    let mut fft = linear_analyzer(4096);
    let mut voice = MonophonicAnalyzer::new(fft.format(), &LINEAR_CONFIG).unwrap();
    let frame = tones(&[(440.0, 0.3)], 4096);

    let mut now = 0;
    for tick in 0..6 {
        let mags = fft.process(&frame).unwrap();
        let reading = voice.process(mags, ms(now)).pitch.unwrap();
        assert_eq!(reading.estimate.note.to_string(), "A4");
        assert!(reading.estimate.cents.abs() <= 10);
        if tick >= 2 {
            assert!(reading.stable, "tick {tick}");
        }
        now += 93;
    }

    let silence = vec![0.0; 4096];
    let start = now;
    while now - start <= 800 {
        let mags = fft.process(&silence).unwrap();
        assert!(voice.process(mags, ms(now)).pitch.is_some());
        now += 93;
    }
    let mags = fft.process(&silence).unwrap();
    assert!(voice.process(mags, ms(now)).pitch.is_none());
    assert_eq!(voice.tracker().state(), TrackerState::Silent);
}

#[test]
fn c_major_triad_is_recognised() {
    init_logging();
    let mut fft = linear_analyzer(8192);
    let chords = PolyphonicAnalyzer::new(fft.format(), &LINEAR_CONFIG).unwrap();
    let frame = tones(&[(261.63, 0.25), (329.63, 0.25), (392.0, 0.25)], 8192);

    let result = chords.process(fft.process(&frame).unwrap());
    let notes: HashSet<PitchClass> = result.notes.iter().copied().collect();
    assert_eq!(
        notes,
        HashSet::from([PitchClass::C, PitchClass::E, PitchClass::G])
    );
    assert_eq!(result.root, Some(PitchClass::C));
    let best = result.best().unwrap();
    assert_eq!(best.display_name, "C");
    assert_eq!(best.score, 100.0);
}

#[test]
fn high_tone_is_instrument_only() {
    init_logging();
    let mut fft = linear_analyzer(2048);
    let format = fft.format();
    // Bin 186 at 44.1 kHz / 2048.
    let frame = tones(&[(format.bin_frequency(186), 0.5)], 2048);
    let mags = fft.process(&frame).unwrap().to_vec();

    let mut voice = MonophonicAnalyzer::new(format, &LINEAR_CONFIG).unwrap();
    assert!(voice.process(&mags, ms(0)).pitch.is_none());

    let chords = PolyphonicAnalyzer::new(format, &LINEAR_CONFIG).unwrap();
    assert_eq!(chords.process(&mags).notes, vec![PitchClass::B]);
}

#[test]
fn independent_sessions_run_in_parallel() {
    init_logging();
    let format = linear_analyzer(8192).format();
    let chords = PolyphonicAnalyzer::new(format, &LINEAR_CONFIG).unwrap();

    // One session per chromatic note from C4 to B4.
    let failures: Vec<String> = (0..12usize)
        .into_par_iter()
        .filter_map(|semitone| {
            let freq = 261.63 * 2f32.powf(semitone as f32 / 12.0);
            let expected = PitchClass::from_index(semitone);
            let mut fft = linear_analyzer(8192);
            let mut voice = MonophonicAnalyzer::new(format, &LINEAR_CONFIG).unwrap();
            let frame = tones(&[(freq, 0.3)], 8192);

            let mut last = None;
            for tick in 0..3u64 {
                let mags = fft.process(&frame).unwrap();
                last = voice.process(mags, ms(tick * 186)).pitch;
                if chords.process(mags).notes != vec![expected] {
                    return Some(format!("{expected}: polyphonic mismatch"));
                }
            }
            match last {
                Some(r) if r.stable && r.estimate.note.pitch_class == expected => None,
                other => Some(format!("{expected}: got {other:?}")),
            }
        })
        .collect();

    assert!(failures.is_empty(), "{}", failures.join("\n"));
}

#[test]
fn config_file_round_trip() {
    init_logging();
    let path = std::env::temp_dir().join(format!("chord_tracker_{}.toml", std::process::id()));
    std::fs::write(
        &path,
        r#"
        [monophonic]
        decay_ms = 400

        [[chord_templates]]
        id = "major"
        suffix = ""
        intervals = [0, 4, 7]

        [[chord_templates]]
        id = "minor"
        suffix = "m"
        intervals = [0, 3, 7]
        "#,
    )
    .unwrap();

    let config = AnalysisConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(config.monophonic.decay_ms, 400);
    assert_eq!(config.chord_database().unwrap().len(), 2);
}
