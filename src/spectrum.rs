//! Spectrum
//!
//! Capture-side helper that turns PCM frames into the magnitude spectra the
//! analyzers consume: Hamming window, forward FFT, then linear or byte-scaled
//! magnitudes for the lower half of the bins.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use thiserror::Error;

use crate::config::ConfigError;
use crate::peaks::SpectrumFormat;

/// Errors returned by the spectrum front-end.
#[derive(Debug, Error)]
pub enum SpectrumError {
    /// Frame received was not of the expected size.
    #[error("expected frame of length {expected}, got {got}")]
    InvalidFrameSize {
        /// The transform size.
        expected: usize,
        /// The length of the frame received.
        got: usize,
    },

    /// The analyzer could not be configured.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A decibel window with `min_db >= max_db`.
    #[error("invalid decibel window {min_db}..{max_db}")]
    InvalidDecibelWindow {
        /// Floor of the window.
        min_db: f32,
        /// Ceiling of the window.
        max_db: f32,
    },
}

/// How bin magnitudes are reported.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Scaling {
    /// `|X| / n`.
    Linear,
    /// Decibels mapped linearly onto `0..=255`, clamped.
    Byte {
        /// Level reported as 0.
        min_db: f32,
        /// Level reported as 255.
        max_db: f32,
    },
}

impl Default for Scaling {
    fn default() -> Self {
        Scaling::Byte {
            min_db: -100.0,
            max_db: -30.0,
        }
    }
}

/// Builder for a [`SpectrumAnalyzer`].
pub struct SpectrumAnalyzerBuilder {
    transform_size: usize,
    sample_rate: u32,
    scaling: Scaling,
}

impl SpectrumAnalyzerBuilder {
    /// Start with transform_size = 2048, sample_rate = 44_100, byte scaling
    /// over -100..-30 dB.
    pub fn new() -> Self {
        SpectrumAnalyzerBuilder {
            transform_size: 2048,
            sample_rate: 44_100,
            scaling: Scaling::default(),
        }
    }

    /// Set the transform (and frame) size.
    pub fn transform_size(mut self, size: usize) -> Self {
        self.transform_size = size;
        self
    }

    /// Set the sampling rate of the audio.
    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Set the magnitude scaling.
    pub fn scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = scaling;
        self
    }

    /// Finalize and create the analyzer.
    pub fn build(self) -> Result<SpectrumAnalyzer, SpectrumError> {
        let format = SpectrumFormat::new(self.sample_rate, self.transform_size)?;
        if let Scaling::Byte { min_db, max_db } = self.scaling {
            if !(min_db.is_finite() && max_db.is_finite()) || min_db >= max_db {
                return Err(SpectrumError::InvalidDecibelWindow { min_db, max_db });
            }
        }

        // Prepare FFT plan once
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(self.transform_size);

        Ok(SpectrumAnalyzer {
            format,
            scaling: self.scaling,
            window: hamming_window(self.transform_size),
            fft_buffer: vec![Complex { re: 0.0, im: 0.0 }; self.transform_size],
            magnitudes: vec![0.0; self.transform_size / 2],
            fft,
        })
    }
}

impl Default for SpectrumAnalyzerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame-at-a-time magnitude spectrum calculator.
pub struct SpectrumAnalyzer {
    format: SpectrumFormat,
    scaling: Scaling,
    window: Vec<f32>,
    fft_buffer: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectrumAnalyzer {
    /// Start customizing with a builder.
    pub fn builder() -> SpectrumAnalyzerBuilder {
        SpectrumAnalyzerBuilder::new()
    }

    /// Sample rate and transform size of the spectra produced.
    pub fn format(&self) -> SpectrumFormat {
        self.format
    }

    /// Transform one frame of exactly `transform_size` samples.
    ///
    /// Returns `transform_size / 2` magnitudes, valid until the next call.
    pub fn process(&mut self, frame: &[f32]) -> Result<&[f32], SpectrumError> {
        let n = self.format.transform_size();
        if frame.len() != n {
            return Err(SpectrumError::InvalidFrameSize {
                expected: n,
                got: frame.len(),
            });
        }

        let mut replaced = 0usize;
        for ((slot, &sample), &w) in self.fft_buffer.iter_mut().zip(frame).zip(&self.window) {
            let sample = if sample.is_finite() {
                sample
            } else {
                replaced += 1;
                0.0
            };
            slot.re = sample * w;
            slot.im = 0.0;
        }
        if replaced > 0 {
            log::warn!("zeroed {replaced} non-finite samples in frame");
        }

        self.fft.process(&mut self.fft_buffer);

        let norm = 1.0 / n as f32;
        for (mag, c) in self.magnitudes.iter_mut().zip(&self.fft_buffer) {
            let linear = (c.re * c.re + c.im * c.im).sqrt() * norm;
            *mag = match self.scaling {
                Scaling::Linear => linear,
                Scaling::Byte { min_db, max_db } => {
                    let db = 20.0 * linear.max(f32::MIN_POSITIVE).log10();
                    (255.0 * (db - min_db) / (max_db - min_db)).clamp(0.0, 255.0)
                }
            };
        }
        Ok(&self.magnitudes)
    }
}

fn hamming_window(size: usize) -> Vec<f32> {
    if size == 1 {
        return vec![1.0];
    }
    let denom = (size - 1) as f32;
    (0..size)
        .map(|n| 0.54 - 0.46 * (2.0 * std::f32::consts::PI * n as f32 / denom).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, amp: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn rejects_wrong_frame_size() {
        let mut analyzer = SpectrumAnalyzer::builder().transform_size(1024).build().unwrap();
        assert!(matches!(
            analyzer.process(&[0.0; 512]),
            Err(SpectrumError::InvalidFrameSize {
                expected: 1024,
                got: 512,
            })
        ));
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(SpectrumAnalyzer::builder().transform_size(0).build().is_err());
        assert!(SpectrumAnalyzer::builder().sample_rate(0).build().is_err());
        assert!(SpectrumAnalyzer::builder()
            .scaling(Scaling::Byte {
                min_db: -30.0,
                max_db: -100.0,
            })
            .build()
            .is_err());
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let mut analyzer = SpectrumAnalyzer::builder()
            .transform_size(4096)
            .scaling(Scaling::Linear)
            .build()
            .unwrap();
        let bin_width = analyzer.format().bin_width();
        // Exactly on bin 40.
        let frame = sine(40.0 * bin_width, 0.5, 44_100, 4096);
        let mags = analyzer.process(&frame).unwrap();
        assert_eq!(mags.len(), 2048);
        let loudest = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(loudest, 40);
        // Hamming coherent gain 0.54, one-sided amplitude / 2.
        assert!((mags[40] - 0.5 * 0.54 / 2.0).abs() < 0.01);
    }

    #[test]
    fn byte_scaling_stays_in_range() {
        let mut analyzer = SpectrumAnalyzer::builder().transform_size(1024).build().unwrap();
        let frame = sine(1000.0, 1.0, 44_100, 1024);
        let mags = analyzer.process(&frame).unwrap();
        assert!(mags.iter().all(|&m| (0.0..=255.0).contains(&m)));
        let silent = analyzer.process(&[0.0; 1024]).unwrap();
        assert!(silent.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn non_finite_samples_are_zeroed() {
        let mut analyzer = SpectrumAnalyzer::builder()
            .transform_size(256)
            .scaling(Scaling::Linear)
            .build()
            .unwrap();
        let mut frame = vec![0.0; 256];
        frame[10] = f32::NAN;
        let mags = analyzer.process(&frame).unwrap();
        assert!(mags.iter().all(|m| m.is_finite()));
    }
}
