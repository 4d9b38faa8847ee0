//! Crossfade transition between an outgoing and an incoming session

use crate::backend::{MediaBackend, Readiness};
use crate::error::PreviewError;
use crate::session::PlaybackSession;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default crossfade length
pub const DEFAULT_CROSSFADE: Duration = Duration::from_secs(5);
/// Shortest allowed crossfade
pub const MIN_CROSSFADE: Duration = Duration::from_secs(1);
/// Longest allowed crossfade
pub const MAX_CROSSFADE: Duration = Duration::from_secs(15);

/// Clamp a crossfade length in seconds to the allowed range
pub fn clamp_crossfade(seconds: f32) -> Duration {
    let seconds = if seconds.is_finite() {
        seconds
    } else {
        DEFAULT_CROSSFADE.as_secs_f32()
    };
    Duration::from_secs_f32(seconds.clamp(MIN_CROSSFADE.as_secs_f32(), MAX_CROSSFADE.as_secs_f32()))
}

/// Phase of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossfadePhase {
    /// Incoming session still loading
    Idle,
    /// Both sessions audible, volumes ramping
    Transitioning,
    /// Outgoing disposed, waiting one frame before handing over
    Settling,
    Complete,
}

/// Result of advancing a transition by one frame
#[derive(Debug, Clone, PartialEq)]
pub enum CrossfadeStep {
    Waiting,
    Ramping { progress: f32 },
    Completed,
    Failed(PreviewError),
}

/// Linear volume ramp of `from` to silence while `to` rises to full
pub struct CrossfadeTransition {
    from: PlaybackSession,
    to: PlaybackSession,
    from_volume: f32,
    started_at: Option<Instant>,
    duration: Duration,
    phase: CrossfadePhase,
}

impl CrossfadeTransition {
    /// Take ownership of both sessions; `to` starts silent
    pub fn begin<B: MediaBackend>(
        mut from: PlaybackSession,
        to: PlaybackSession,
        duration: Duration,
        backend: &mut B,
    ) -> Self {
        from.set_fading(true);
        let from_volume = from.volume(backend);
        to.set_volume(backend, 0.0);
        info!(
            "Crossfade {} -> {} over {:.1}s",
            from.track().display_name(),
            to.track().display_name(),
            duration.as_secs_f32()
        );
        Self {
            from,
            to,
            from_volume,
            started_at: None,
            duration,
            phase: CrossfadePhase::Idle,
        }
    }

    pub fn phase(&self) -> CrossfadePhase {
        self.phase
    }

    pub fn outgoing(&self) -> &PlaybackSession {
        &self.from
    }

    pub fn incoming(&self) -> &PlaybackSession {
        &self.to
    }

    pub fn outgoing_mut(&mut self) -> &mut PlaybackSession {
        &mut self.from
    }

    pub fn incoming_mut(&mut self) -> &mut PlaybackSession {
        &mut self.to
    }

    /// Ramp progress in 0.0..=1.0
    pub fn progress(&self, now: Instant) -> f32 {
        match self.started_at {
            None => 0.0,
            Some(start) => {
                let elapsed = now.saturating_duration_since(start).as_secs_f32();
                (elapsed / self.duration.as_secs_f32()).clamp(0.0, 1.0)
            }
        }
    }

    /// Advance by one frame
    pub fn tick<B: MediaBackend>(&mut self, now: Instant, backend: &mut B) -> CrossfadeStep {
        match self.phase {
            CrossfadePhase::Idle => match self.to.poll_ready(backend) {
                Readiness::Pending => CrossfadeStep::Waiting,
                Readiness::Failed(msg) => CrossfadeStep::Failed(PreviewError::Playback(msg)),
                Readiness::Ready => match self.to.play(backend) {
                    Ok(()) => {
                        self.started_at = Some(now);
                        self.phase = CrossfadePhase::Transitioning;
                        CrossfadeStep::Ramping { progress: 0.0 }
                    }
                    Err(e) => CrossfadeStep::Failed(e),
                },
            },
            CrossfadePhase::Transitioning => {
                let progress = self.progress(now);
                self.from
                    .set_volume(backend, self.from_volume * (1.0 - progress));
                self.to.set_volume(backend, progress);

                if self.to.is_paused(backend) {
                    debug!("Incoming session paused mid-ramp, resuming");
                    if let Err(e) = backend.play(self.to.element()) {
                        return CrossfadeStep::Failed(e);
                    }
                }

                if progress >= 1.0 {
                    self.from.dispose(backend);
                    self.phase = CrossfadePhase::Settling;
                }
                CrossfadeStep::Ramping { progress }
            }
            CrossfadePhase::Settling => {
                self.phase = CrossfadePhase::Complete;
                info!("Crossfade complete: {}", self.to.track().display_name());
                CrossfadeStep::Completed
            }
            CrossfadePhase::Complete => CrossfadeStep::Completed,
        }
    }

    /// The incoming session, once the transition has completed
    pub fn into_incoming(self) -> Result<PlaybackSession, Self> {
        if self.phase == CrossfadePhase::Complete {
            Ok(self.to)
        } else {
            Err(self)
        }
    }

    /// Cancel: drop the incoming session and give back the outgoing one
    ///
    /// Returns `None` if the outgoing session was already disposed.
    pub fn abort<B: MediaBackend>(mut self, backend: &mut B) -> Option<PlaybackSession> {
        warn!("Crossfade to {} aborted", self.to.track().display_name());
        self.to.dispose(backend);
        if self.from.is_disposed() {
            return None;
        }
        self.from.set_fading(false);
        self.from.set_volume(backend, self.from_volume);
        Some(self.from)
    }
}
