//! Synthetic full-track overview
//!
//! The overview is a reproducible stand-in for a decoded amplitude envelope:
//! the same track identity and duration always yield the same profile, so the
//! whole track can be drawn without decoding it up front.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Number of amplitude points in a profile
pub const OVERVIEW_SAMPLES: usize = 1000;

/// Fraction of the track covered by the intro fade-in
const INTRO_FRACTION: f32 = 0.08;
/// Fraction of the track covered by the outro fade-out
const OUTRO_FRACTION: f32 = 0.10;
/// Length of the build-up before the drop
const BUILD_FRACTION: f32 = 0.12;
/// Length of the high-energy section after the drop
const DROP_FRACTION: f32 = 0.25;

/// Amplitude profile for one track
#[derive(Debug, Clone)]
pub struct OverviewProfile {
    track_key: String,
    samples: Vec<f32>,
    generated_at: Instant,
}

impl OverviewProfile {
    /// Generate the profile for a track identity and duration
    pub fn generate(track_key: &str, duration: Option<Duration>) -> Self {
        let duration_ms = duration.map(|d| d.as_millis() as u64).unwrap_or(0);
        let mut rng = XorShift::new(seed(track_key, duration_ms));

        // Drop lands somewhere in the middle third
        let drop_at = 0.3 + rng.next_f32() * 0.3;
        let build_start = drop_at - BUILD_FRACTION;
        let drop_end = drop_at + DROP_FRACTION;

        let samples = (0..OVERVIEW_SAMPLES)
            .map(|i| {
                let pos = i as f32 / OVERVIEW_SAMPLES as f32;

                let section = if pos < build_start {
                    0.7
                } else if pos < drop_at - 0.02 {
                    // Build-up ramps towards the drop
                    0.6 + 0.35 * (pos - build_start) / (BUILD_FRACTION - 0.02)
                } else if pos < drop_at {
                    // Short breakdown right before the drop
                    0.3
                } else if pos < drop_end {
                    1.0
                } else {
                    0.8
                };

                let fade = if pos < INTRO_FRACTION {
                    pos / INTRO_FRACTION
                } else if pos > 1.0 - OUTRO_FRACTION {
                    (1.0 - pos) / OUTRO_FRACTION
                } else {
                    1.0
                };

                let texture = 0.6 + 0.4 * rng.next_f32();
                (texture * section * fade).clamp(0.0, 1.0)
            })
            .collect();

        Self {
            track_key: track_key.to_string(),
            samples,
            generated_at: Instant::now(),
        }
    }

    pub fn track_key(&self) -> &str {
        &self.track_key
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn generated_at(&self) -> Instant {
        self.generated_at
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Amplitude at a normalized position (0.0-1.0)
    pub fn amplitude_at(&self, position: f64) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let idx = ((position.clamp(0.0, 1.0) * self.samples.len() as f64) as usize)
            .min(self.samples.len() - 1);
        self.samples[idx]
    }
}

/// Profiles memoized by track key for the lifetime of the process
#[derive(Debug, Default)]
pub struct OverviewCache {
    profiles: HashMap<String, Arc<OverviewProfile>>,
}

impl OverviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached profile for a track, generating it on first use
    pub fn get_or_generate(&mut self, track_key: &str, duration: Option<Duration>) -> Arc<OverviewProfile> {
        if let Some(profile) = self.profiles.get(track_key) {
            return profile.clone();
        }
        let profile = Arc::new(OverviewProfile::generate(track_key, duration));
        self.profiles.insert(track_key.to_string(), profile.clone());
        tracing::debug!("Generated overview for {}", track_key);
        profile
    }

    pub fn get(&self, track_key: &str) -> Option<Arc<OverviewProfile>> {
        self.profiles.get(track_key).cloned()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// FNV-1a over the identity bytes followed by the duration
fn seed(track_key: &str, duration_ms: u64) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = track_key
        .bytes()
        .chain(duration_ms.to_le_bytes())
        .fold(OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME));

    // xorshift never leaves zero
    if hash == 0 {
        OFFSET
    } else {
        hash
    }
}

/// xorshift64 PRNG
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Next value in 0.0..1.0
    fn next_f32(&mut self) -> f32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 40) as f32 / (1u64 << 24) as f32
    }
}
