//! Analysis tap - frequency and time-domain windows for visualization

use crate::backend::ElementId;
use cue_analysis::{FrequencyBand, SpectrumAnalyzer, SpectrumData, DEFAULT_BANDS, FFT_SIZE};
use parking_lot::Mutex;
use ringbuf::traits::Consumer;
use ringbuf::HeapCons;
use std::sync::Arc;

/// Tap shared between the backend that feeds it and the visualizer
pub type TapHandle = Arc<Mutex<AnalysisTap>>;

/// Analysis point on one element's output
pub struct AnalysisTap {
    element: ElementId,
    /// Most recent mono samples, oldest first
    window: Vec<f32>,
    analyzer: SpectrumAnalyzer,
    spectrum: SpectrumData,
    /// Samples pushed by the audio thread
    source: Option<HeapCons<f32>>,
    scratch: Vec<f32>,
}

impl AnalysisTap {
    pub fn new(element: ElementId, sample_rate: u32) -> Self {
        let analyzer = SpectrumAnalyzer::new(sample_rate, DEFAULT_BANDS);
        Self {
            element,
            window: vec![0.0; FFT_SIZE],
            spectrum: SpectrumData {
                bands: vec![0.0; analyzer.band_count()],
                ..Default::default()
            },
            analyzer,
            source: None,
            scratch: vec![0.0; FFT_SIZE],
        }
    }

    /// Tap fed from a ring buffer consumer
    pub fn with_source(element: ElementId, sample_rate: u32, source: HeapCons<f32>) -> Self {
        let mut tap = Self::new(element, sample_rate);
        tap.source = Some(source);
        tap
    }

    pub fn into_handle(self) -> TapHandle {
        Arc::new(Mutex::new(self))
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    /// Append mono samples to the window
    pub fn feed(&mut self, samples: &[f32]) {
        if samples.len() >= FFT_SIZE {
            self.window
                .copy_from_slice(&samples[samples.len() - FFT_SIZE..]);
        } else {
            self.window.rotate_left(samples.len());
            let start = FFT_SIZE - samples.len();
            self.window[start..].copy_from_slice(samples);
        }
    }

    /// Pull pending samples and recompute the spectrum
    pub fn refresh(&mut self) {
        if let Some(mut source) = self.source.take() {
            loop {
                let read = source.pop_slice(&mut self.scratch);
                if read == 0 {
                    break;
                }
                let chunk = std::mem::take(&mut self.scratch);
                self.feed(&chunk[..read]);
                self.scratch = chunk;
            }
            self.source = Some(source);
        }
        self.spectrum = self.analyzer.process(&self.window);
    }

    /// Band magnitudes (0.0 - 1.0) from the last refresh
    pub fn frequency_data(&self) -> &[f32] {
        &self.spectrum.bands
    }

    /// Time-domain window (-1.0 - 1.0)
    pub fn time_data(&self) -> &[f32] {
        &self.window
    }

    pub fn peak(&self) -> f32 {
        self.spectrum.peak
    }

    pub fn dominant_band(&self) -> FrequencyBand {
        self.spectrum.dominant
    }
}
