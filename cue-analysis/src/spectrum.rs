//! FFT-based spectrum analyzer for the analysis tap

use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;

/// FFT window length (also the tap's time-domain window)
pub const FFT_SIZE: usize = 2048;

/// Default number of frequency bars
pub const DEFAULT_BANDS: usize = 32;

/// Dominant frequency region of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrequencyBand {
    /// Below 250Hz - kicks, bass
    Bass,
    /// 250Hz-4kHz - vocals, instruments
    #[default]
    Mid,
    /// Above 4kHz - hi-hats, cymbals, air
    High,
}

/// One analysis result
#[derive(Clone, Debug, Default)]
pub struct SpectrumData {
    /// Magnitude per band (0.0 - 1.0)
    pub bands: Vec<f32>,
    /// Peak level (0.0 - 1.0)
    pub peak: f32,
    /// Region holding the most energy per bin
    pub dominant: FrequencyBand,
}

/// Real-time FFT spectrum analyzer
pub struct SpectrumAnalyzer {
    sample_rate: u32,
    fft: std::sync::Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    frequency_bands: Vec<(f32, f32)>,
    smoothing: f32,
    previous_magnitudes: Vec<f32>,
    /// Reused between calls
    fft_buffer: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    /// Create an analyzer producing `band_count` logarithmic bands
    pub fn new(sample_rate: u32, band_count: usize) -> Self {
        let band_count = band_count.max(1);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);

        // Hann window
        let window: Vec<f32> = (0..FFT_SIZE)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / FFT_SIZE as f32).cos()))
            .collect();

        // Logarithmically spaced bands (20Hz - 20kHz)
        let min_freq = 20.0f32;
        let max_freq = 20000.0f32.min(sample_rate as f32 / 2.0);
        let log_min = min_freq.ln();
        let log_max = max_freq.ln();

        let frequency_bands = (0..band_count)
            .map(|i| {
                let t0 = i as f32 / band_count as f32;
                let t1 = (i + 1) as f32 / band_count as f32;
                (
                    (log_min + t0 * (log_max - log_min)).exp(),
                    (log_min + t1 * (log_max - log_min)).exp(),
                )
            })
            .collect();

        Self {
            sample_rate,
            fft,
            window,
            frequency_bands,
            smoothing: 0.7,
            previous_magnitudes: vec![0.0; band_count],
            fft_buffer: vec![Complex::new(0.0, 0.0); FFT_SIZE],
        }
    }

    pub fn band_count(&self) -> usize {
        self.frequency_bands.len()
    }

    /// Analyze a buffer of mono samples
    pub fn process(&mut self, samples: &[f32]) -> SpectrumData {
        let sample_count = samples.len().min(FFT_SIZE);
        for (i, &sample) in samples.iter().enumerate().take(sample_count) {
            self.fft_buffer[i] = Complex::new(sample * self.window[i], 0.0);
        }
        for buf in self.fft_buffer.iter_mut().skip(sample_count) {
            *buf = Complex::new(0.0, 0.0);
        }

        self.fft.process(&mut self.fft_buffer);

        let bin_width = self.sample_rate as f32 / FFT_SIZE as f32;
        let nyquist_bin = FFT_SIZE / 2;

        let mut magnitudes: Vec<f32> = self
            .frequency_bands
            .iter()
            .map(|&(low, high)| {
                let start_bin = (low / bin_width) as usize;
                let end_bin = ((high / bin_width) as usize).min(nyquist_bin);
                if start_bin < end_bin {
                    let sum: f32 = self.fft_buffer[start_bin..end_bin]
                        .iter()
                        .map(|c| c.norm())
                        .sum();
                    sum / (end_bin - start_bin) as f32
                } else {
                    0.0
                }
            })
            .collect();

        // Normalize to 0-1 range (approximate based on typical values)
        let max_magnitude = magnitudes.iter().cloned().fold(0.0f32, f32::max);
        if max_magnitude > 0.0 {
            for mag in &mut magnitudes {
                *mag = (*mag / max_magnitude.max(100.0)).clamp(0.0, 1.0);
            }
        }

        for (mag, prev) in magnitudes
            .iter_mut()
            .zip(self.previous_magnitudes.iter_mut())
        {
            *mag = *prev * self.smoothing + *mag * (1.0 - self.smoothing);
            *prev = *mag;
        }

        SpectrumData {
            bands: magnitudes,
            peak: peak_level(samples),
            dominant: self.dominant_band(bin_width),
        }
    }

    /// Compare average energy per bin across bass, mid and high regions
    fn dominant_band(&self, bin_width: f32) -> FrequencyBand {
        let nyquist_bin = FFT_SIZE / 2;
        let bass_end = ((250.0 / bin_width) as usize).clamp(1, nyquist_bin);
        let mid_end = ((4000.0 / bin_width) as usize).clamp(bass_end, nyquist_bin);

        let average = |from: usize, to: usize| {
            if to > from {
                self.fft_buffer[from..to]
                    .iter()
                    .map(|c| c.norm_sqr())
                    .sum::<f32>()
                    / (to - from) as f32
            } else {
                0.0
            }
        };

        let bass = average(1, bass_end);
        let mid = average(bass_end, mid_end);
        let high = average(mid_end, nyquist_bin);

        if bass >= mid && bass >= high {
            FrequencyBand::Bass
        } else if high >= mid {
            FrequencyBand::High
        } else {
            FrequencyBand::Mid
        }
    }
}

/// Peak absolute level of a buffer (0.0 - 1.0)
pub fn peak_level(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0f32, f32::max)
        .min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32) -> Vec<f32> {
        (0..FFT_SIZE)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_silence() {
        let mut analyzer = SpectrumAnalyzer::new(48000, 16);
        let data = analyzer.process(&[0.0; FFT_SIZE]);
        assert_eq!(data.bands.len(), 16);
        assert!(data.bands.iter().all(|b| *b == 0.0));
        assert_eq!(data.peak, 0.0);
    }

    #[test]
    fn test_bass_tone_is_dominant_bass() {
        let mut analyzer = SpectrumAnalyzer::new(48000, DEFAULT_BANDS);
        let data = analyzer.process(&sine(80.0, 48000));
        assert_eq!(data.dominant, FrequencyBand::Bass);
        assert!(data.peak > 0.9);
    }

    #[test]
    fn test_high_tone_is_dominant_high() {
        let mut analyzer = SpectrumAnalyzer::new(48000, DEFAULT_BANDS);
        let data = analyzer.process(&sine(9000.0, 48000));
        assert_eq!(data.dominant, FrequencyBand::High);
    }

    #[test]
    fn test_short_input_is_zero_padded() {
        let mut analyzer = SpectrumAnalyzer::new(44100, 8);
        let data = analyzer.process(&[0.5; 100]);
        assert_eq!(data.bands.len(), 8);
        assert!(data.bands.iter().all(|b| (0.0..=1.0).contains(b)));
    }
}
