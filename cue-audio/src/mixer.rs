//! Mixer - sums voice outputs onto the master bus

/// Mix bus for any number of voices
pub struct Mixer {
    /// Master volume
    master_volume: f32,
    /// Smoothed master volume (interpolates toward master_volume to prevent clicks)
    smoothed_master_volume: f32,
}

impl Mixer {
    /// Smoothing coefficient for master volume (~5ms at 48kHz)
    const MASTER_VOLUME_SMOOTH_COEFF: f32 = 0.995;
}

impl Default for Mixer {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            smoothed_master_volume: 1.0,
        }
    }
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set master volume
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 2.0);
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Add one voice's stereo buffer onto the bus
    pub fn accumulate(&self, voice: &[f32], bus: &mut [f32]) {
        for (out, sample) in bus.iter_mut().zip(voice) {
            *out += *sample;
        }
    }

    /// Apply master volume and soft clipping to the summed bus
    pub fn finish(&mut self, bus: &mut [f32]) {
        for frame in bus.chunks_mut(2) {
            self.smoothed_master_volume = Self::MASTER_VOLUME_SMOOTH_COEFF
                * self.smoothed_master_volume
                + (1.0 - Self::MASTER_VOLUME_SMOOTH_COEFF) * self.master_volume;

            for sample in frame.iter_mut() {
                *sample = soft_clip(*sample * self.smoothed_master_volume);
            }
        }
    }
}

/// Soft clip threshold
const SOFT_CLIP_THRESHOLD: f32 = 0.75;
/// Soft clip ceiling
const SOFT_CLIP_CEILING: f32 = 0.89;

/// Gentle soft clipper for the mix bus
///
/// Transparent below the threshold. Above it, approaches the ceiling along
/// an exponential knee so two overlapping voices never clip hard.
#[inline(always)]
fn soft_clip(x: f32) -> f32 {
    let abs_x = x.abs();

    if abs_x <= SOFT_CLIP_THRESHOLD {
        return x;
    }

    let sign = x.signum();
    let knee_width = SOFT_CLIP_CEILING - SOFT_CLIP_THRESHOLD;
    let over = abs_x - SOFT_CLIP_THRESHOLD;
    let ratio = over / knee_width;

    let compressed = SOFT_CLIP_THRESHOLD + knee_width * (1.0 - (-ratio * 3.0).exp());
    sign * compressed.min(SOFT_CLIP_CEILING)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_clip_transparent_below_threshold() {
        assert_eq!(soft_clip(0.5), 0.5);
        assert_eq!(soft_clip(-0.7), -0.7);
    }

    #[test]
    fn test_soft_clip_never_exceeds_ceiling() {
        for x in [0.8f32, 1.0, 2.0, 10.0] {
            assert!(soft_clip(x) <= SOFT_CLIP_CEILING);
            assert!(soft_clip(-x) >= -SOFT_CLIP_CEILING);
        }
    }

    #[test]
    fn test_accumulate_sums_voices() {
        let mixer = Mixer::new();
        let mut bus = vec![0.0f32; 4];
        mixer.accumulate(&[0.1, 0.2, 0.1, 0.2], &mut bus);
        mixer.accumulate(&[0.1, 0.1, 0.1, 0.1], &mut bus);
        assert!((bus[0] - 0.2).abs() < 1e-6);
        assert!((bus[1] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_master_volume_clamped() {
        let mut mixer = Mixer::new();
        mixer.set_master_volume(5.0);
        assert_eq!(mixer.master_volume(), 2.0);
        mixer.set_master_volume(-1.0);
        assert_eq!(mixer.master_volume(), 0.0);
    }
}
