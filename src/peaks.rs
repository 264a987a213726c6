//! Peak Extractor
//!
//! Local-maximum picking over one magnitude spectrum.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Sampling rate and transform size a spectrum was produced with.
///
/// Validated once at startup; both values are non-zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SpectrumFormat {
    sample_rate: u32,
    transform_size: usize,
}

impl SpectrumFormat {
    /// Check and pair a sample rate with a transform size.
    pub fn new(sample_rate: u32, transform_size: usize) -> Result<Self, ConfigError> {
        if sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate(sample_rate));
        }
        if transform_size == 0 {
            return Err(ConfigError::InvalidTransformSize(transform_size));
        }
        Ok(SpectrumFormat {
            sample_rate,
            transform_size,
        })
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Transform size in samples.
    pub fn transform_size(&self) -> usize {
        self.transform_size
    }

    /// Width of one bin in Hz.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.transform_size as f32
    }

    /// Centre frequency of bin `i`: `i * sample_rate / transform_size`.
    pub fn bin_frequency(&self, i: usize) -> f32 {
        i as f32 * self.bin_width()
    }
}

/// One magnitude spectrum, borrowed from the caller for a single analysis call.
#[derive(Debug, Copy, Clone)]
pub struct Spectrum<'a> {
    /// Non-negative magnitude per frequency bin.
    pub magnitudes: &'a [f32],
    /// How the magnitudes were produced.
    pub format: SpectrumFormat,
}

impl<'a> Spectrum<'a> {
    /// Wrap a magnitude slice.
    pub fn new(magnitudes: &'a [f32], format: SpectrumFormat) -> Self {
        Spectrum { magnitudes, format }
    }

    /// Loudness on a 0..1 scale for byte-scaled (0..255) magnitudes.
    ///
    /// `(mean / 256) ^ 0.7`, clamped to 1. An empty spectrum is silent.
    pub fn volume_level(&self) -> f32 {
        if self.magnitudes.is_empty() {
            return 0.0;
        }
        let mean = self.magnitudes.iter().sum::<f32>() / self.magnitudes.len() as f32;
        (mean.max(0.0) / 256.0).powf(0.7).min(1.0)
    }
}

/// A spectral local maximum.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Peak {
    /// Bin centre frequency in Hz.
    pub frequency: f32,
    /// Magnitude of the bin.
    pub magnitude: f32,
}

/// Inclusive frequency window in Hz.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    /// Lowest accepted frequency.
    pub min_hz: f32,
    /// Highest accepted frequency.
    pub max_hz: f32,
}

impl FrequencyRange {
    /// Typical sung range, roughly E2 to C6.
    pub const VOCAL: FrequencyRange = FrequencyRange {
        min_hz: 80.0,
        max_hz: 1100.0,
    };

    /// 88-key piano range, A0 to C8.
    pub const INSTRUMENT: FrequencyRange = FrequencyRange {
        min_hz: 27.5,
        max_hz: 4186.0,
    };

    /// Build a checked range.
    pub fn new(min_hz: f32, max_hz: f32) -> Result<Self, ConfigError> {
        let range = FrequencyRange { min_hz, max_hz };
        range.validate("range")?;
        Ok(range)
    }

    /// Whether `freq` lies inside, bounds included.
    pub fn contains(&self, freq: f32) -> bool {
        (self.min_hz..=self.max_hz).contains(&freq)
    }

    pub(crate) fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        let finite = self.min_hz.is_finite() && self.max_hz.is_finite();
        if !finite || self.min_hz < 0.0 || self.min_hz > self.max_hz {
            return Err(ConfigError::InvalidRange {
                name,
                min_hz: self.min_hz,
                max_hz: self.max_hz,
            });
        }
        Ok(())
    }
}

/// Local maxima above `floor`, loudest first.
///
/// Bin `i` qualifies when its magnitude exceeds `floor` and is strictly
/// greater than both neighbours; the first and last bins only need to beat the
/// neighbour they have. With a `range`, peaks outside it are dropped. Equal
/// magnitudes keep ascending bin order.
pub fn extract_peaks(
    spectrum: &Spectrum<'_>,
    floor: f32,
    range: Option<FrequencyRange>,
) -> Vec<Peak> {
    let mags = spectrum.magnitudes;
    let last = mags.len().saturating_sub(1);
    let mut peaks = Vec::new();

    for (i, &m) in mags.iter().enumerate() {
        if m <= floor {
            continue;
        }
        let above_left = i == 0 || m > mags[i - 1];
        let above_right = i == last || m > mags[i + 1];
        if !(above_left && above_right) {
            continue;
        }
        let frequency = spectrum.format.bin_frequency(i);
        if range.is_some_and(|r| !r.contains(frequency)) {
            continue;
        }
        peaks.push(Peak {
            frequency,
            magnitude: m,
        });
    }

    peaks.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
    log::trace!("extracted {} peaks from {} bins", peaks.len(), mags.len());
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> SpectrumFormat {
        SpectrumFormat::new(44_100, 2048).unwrap()
    }

    #[test]
    fn quiet_spectrum_has_no_peaks() {
        let mags = vec![10.0; 1024];
        let spectrum = Spectrum::new(&mags, format());
        assert!(extract_peaks(&spectrum, 20.0, None).is_empty());
        assert!(extract_peaks(&Spectrum::new(&[], format()), 0.0, None).is_empty());
    }

    #[test]
    fn isolated_spike_is_one_peak() {
        for len in [1usize, 2, 3, 17, 1024] {
            let mut mags = vec![0.0; len];
            let at = len / 2;
            mags[at] = 100.0;
            let spectrum = Spectrum::new(&mags, format());
            let peaks = extract_peaks(&spectrum, 10.0, None);
            assert_eq!(peaks.len(), 1, "len {len}");
            assert_eq!(peaks[0].frequency, format().bin_frequency(at));
        }
    }

    #[test]
    fn plateau_is_not_a_peak() {
        let mags = [0.0, 50.0, 50.0, 0.0];
        let spectrum = Spectrum::new(&mags, format());
        assert!(extract_peaks(&spectrum, 10.0, None).is_empty());
    }

    #[test]
    fn peak_must_exceed_floor() {
        let mags = [0.0, 20.0, 0.0];
        let spectrum = Spectrum::new(&mags, format());
        assert!(extract_peaks(&spectrum, 20.0, None).is_empty());
        assert_eq!(extract_peaks(&spectrum, 19.5, None).len(), 1);
    }

    #[test]
    fn peaks_are_ranked_by_magnitude() {
        let mags = [0.0, 30.0, 0.0, 90.0, 0.0, 60.0, 0.0];
        let spectrum = Spectrum::new(&mags, format());
        let peaks = extract_peaks(&spectrum, 10.0, None);
        let ranked: Vec<f32> = peaks.iter().map(|p| p.magnitude).collect();
        assert_eq!(ranked, vec![90.0, 60.0, 30.0]);
    }

    #[test]
    fn edge_bins_count_as_peaks() {
        let mags = [80.0, 10.0, 10.0, 70.0];
        let spectrum = Spectrum::new(&mags, format());
        let peaks = extract_peaks(&spectrum, 20.0, None);
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].frequency, 0.0);
    }

    #[test]
    fn range_filters_out_of_band_peaks() {
        let mut mags = vec![0.0; 1024];
        mags[186] = 200.0; // ~4005 Hz
        mags[20] = 150.0; // ~431 Hz
        let spectrum = Spectrum::new(&mags, format());

        let vocal = extract_peaks(&spectrum, 10.0, Some(FrequencyRange::VOCAL));
        assert_eq!(vocal.len(), 1);
        assert!((vocal[0].frequency - 430.66).abs() < 0.01);

        let wide = extract_peaks(&spectrum, 10.0, Some(FrequencyRange::INSTRUMENT));
        assert_eq!(wide.len(), 2);
        assert!((wide[0].frequency - 4005.18).abs() < 0.01);
    }

    #[test]
    fn volume_level_is_gamma_corrected() {
        let mags = vec![128.0; 16];
        let level = Spectrum::new(&mags, format()).volume_level();
        assert!((level - 0.5f32.powf(0.7)).abs() < 1e-6);
        let loud = vec![255.0; 4];
        assert!(Spectrum::new(&loud, format()).volume_level() <= 1.0);
        assert_eq!(Spectrum::new(&[], format()).volume_level(), 0.0);
    }

    #[test]
    fn rejects_zero_format() {
        assert!(SpectrumFormat::new(0, 2048).is_err());
        assert!(SpectrumFormat::new(44_100, 0).is_err());
        assert!(FrequencyRange::new(500.0, 100.0).is_err());
    }
}
