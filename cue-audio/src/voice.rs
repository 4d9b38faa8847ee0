//! Voice - playback of one decoded element inside the audio callback

use crate::backend::ElementId;
use ringbuf::traits::Producer;
use ringbuf::HeapProd;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Initial size of the mono scratch buffer fed to the analysis tap
const TAP_SCRATCH_SIZE: usize = 4096;

pub struct Voice {
    element: ElementId,
    /// Interleaved stereo samples
    samples: Arc<Vec<f32>>,
    /// Read position in samples (always even)
    position: usize,
    /// Frames played, readable from the control thread
    shared_position: Arc<AtomicU64>,
    playing: bool,
    ended: bool,
    volume: f32,
    /// Smoothed volume (interpolates toward volume to prevent clicks)
    smoothed_volume: f32,
    tap: Option<HeapProd<f32>>,
    tap_scratch: Vec<f32>,
}

impl Voice {
    /// Smoothing coefficient for volume (~5ms at 48kHz)
    const VOLUME_SMOOTH_COEFF: f32 = 0.995;

    pub fn new(element: ElementId, samples: Arc<Vec<f32>>, shared_position: Arc<AtomicU64>) -> Self {
        Self {
            element,
            samples,
            position: 0,
            shared_position,
            playing: false,
            ended: false,
            volume: 1.0,
            smoothed_volume: 1.0,
            tap: None,
            tap_scratch: vec![0.0; TAP_SCRATCH_SIZE],
        }
    }

    /// Start at `volume` with no ramp from full scale
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.set_volume(volume);
        self.smoothed_volume = self.volume;
        self
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn play(&mut self) {
        if self.position + 1 < self.samples.len() {
            self.playing = true;
            self.ended = false;
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Pause and rewind
    pub fn stop(&mut self) {
        self.playing = false;
        self.position = 0;
        self.shared_position.store(0, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn attach_tap(&mut self, tap: HeapProd<f32>) {
        self.tap = Some(tap);
    }

    pub fn detach_tap(&mut self) {
        self.tap = None;
    }

    /// Whether the voice reached its end since the last call
    pub fn take_ended(&mut self) -> bool {
        std::mem::take(&mut self.ended)
    }

    /// Render into a zeroed stereo interleaved buffer
    pub fn process(&mut self, output: &mut [f32]) {
        if !self.playing {
            return;
        }

        let frames = output.len() / 2;
        if frames > self.tap_scratch.len() {
            self.tap_scratch.resize(frames, 0.0);
        }

        let sample_count = self.samples.len();
        let mut mono_len = 0;

        for frame in output.chunks_exact_mut(2) {
            if self.position + 1 >= sample_count {
                // End of track
                self.playing = false;
                self.ended = true;
                break;
            }

            self.smoothed_volume = Self::VOLUME_SMOOTH_COEFF * self.smoothed_volume
                + (1.0 - Self::VOLUME_SMOOTH_COEFF) * self.volume;

            let left = self.samples[self.position] * self.smoothed_volume;
            let right = self.samples[self.position + 1] * self.smoothed_volume;
            frame[0] = left;
            frame[1] = right;

            self.tap_scratch[mono_len] = (left + right) * 0.5;
            mono_len += 1;
            self.position += 2;
        }

        self.shared_position
            .store((self.position / 2) as u64, Ordering::Relaxed);

        if let Some(tap) = &mut self.tap {
            // A full ring just drops the newest samples
            tap.push_slice(&self.tap_scratch[..mono_len]);
        }
    }
}
