//! Analysis for Cue
//!
//! Provides the FFT spectrum used by the live analysis tap and the synthetic
//! full-track overview profiles.

mod overview;
mod spectrum;

pub use overview::{OverviewCache, OverviewProfile, OVERVIEW_SAMPLES};
pub use spectrum::{peak_level, FrequencyBand, SpectrumAnalyzer, SpectrumData, DEFAULT_BANDS, FFT_SIZE};
