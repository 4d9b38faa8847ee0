//! Play queue - autoplay sequencing and automix triggering
//!
//! The queue never touches sessions itself. Each operation returns the
//! `QueueAction` the player should carry out.

use crate::crossfade::{clamp_crossfade, DEFAULT_CROSSFADE};
use cue_library::TrackDescriptor;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Delay before the first duration probe after a track starts
const PROBE_DELAY: Duration = Duration::from_millis(500);
/// Delay between probes while the duration is still unknown
const PROBE_RETRY: Duration = Duration::from_millis(250);
/// Probes attempted before giving up on automix for the track
const PROBE_ATTEMPTS: u8 = 8;

/// Work the player has to do on the queue's behalf
#[derive(Debug, Clone, PartialEq)]
pub enum QueueAction {
    /// Hard cut to a track
    Preview(TrackDescriptor),
    /// Crossfade from the current track into this one
    Crossfade(TrackDescriptor),
    /// Ran past the last track
    Completed,
}

/// Playback position of the queue's current track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackClock {
    pub position: Duration,
    pub duration: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
struct Probe {
    due: Instant,
    attempts: u8,
}

/// Snapshot for display
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStatus {
    pub cursor: Option<usize>,
    pub len: usize,
    pub active: bool,
    pub automix: bool,
    pub crossfade: Duration,
}

/// Ordered list of tracks played back to back
#[derive(Debug)]
pub struct PlayQueue {
    tracks: Vec<TrackDescriptor>,
    /// -1 is "before the first track"
    cursor: isize,
    active: bool,
    completed: bool,
    automix: bool,
    crossfade: Duration,
    probe: Option<Probe>,
    /// Duration read by the last successful probe
    known_duration: Option<Duration>,
    /// Position at which the automix crossfade fires
    trigger_at: Option<Duration>,
    /// An automix crossfade failed; hard cut when the current track ends
    fallback_pending: bool,
}

impl Default for PlayQueue {
    fn default() -> Self {
        Self {
            tracks: Vec::new(),
            cursor: -1,
            active: false,
            completed: false,
            automix: false,
            crossfade: DEFAULT_CROSSFADE,
            probe: None,
            known_duration: None,
            trigger_at: None,
            fallback_pending: false,
        }
    }
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue contents and rewind before the first track
    pub fn initialize_queue(&mut self, tracks: Vec<TrackDescriptor>) {
        info!("Queue initialized with {} tracks", tracks.len());
        self.tracks = tracks;
        self.cursor = -1;
        self.active = false;
        self.completed = false;
        self.disarm();
    }

    /// Advance to the next track
    pub fn play_next(&mut self, now: Instant) -> Option<QueueAction> {
        self.disarm();
        self.cursor += 1;

        let Some(track) = self.current_track().cloned() else {
            self.cursor = self.tracks.len() as isize;
            return self.finish();
        };

        self.active = true;
        self.completed = false;
        self.probe = Some(Probe {
            due: now + PROBE_DELAY,
            attempts: 0,
        });
        debug!("Queue advanced to {}", self.cursor);
        Some(QueueAction::Preview(track))
    }

    /// Step back one track; only valid past the first track
    pub fn play_previous(&mut self, now: Instant) -> Option<QueueAction> {
        if self.cursor <= 0 {
            return None;
        }
        self.cursor -= 2;
        self.play_next(now)
    }

    /// Jump straight to a track
    pub fn skip_to_track(&mut self, index: usize, now: Instant) -> Option<QueueAction> {
        if index >= self.tracks.len() {
            return None;
        }
        self.cursor = index as isize - 1;
        self.play_next(now)
    }

    /// Skip ahead; crossfades when automix is on and something is playing
    pub fn skip_to_next(&mut self, now: Instant, playing: bool) -> Option<QueueAction> {
        if self.automix && playing && self.has_next() {
            self.crossfade_next(now)
        } else {
            self.play_next(now)
        }
    }

    pub fn set_auto_mix(&mut self, enabled: bool, seconds: f32) {
        self.automix = enabled;
        self.crossfade = clamp_crossfade(seconds);
        self.trigger_at = self.known_duration.and_then(|d| self.trigger_for(d));
        info!(
            "Automix {} ({:.1}s)",
            if enabled { "on" } else { "off" },
            self.crossfade.as_secs_f32()
        );
    }

    /// Stop autoplay without clearing the queue
    pub fn stop(&mut self) {
        if self.active {
            debug!("Queue stopped");
        }
        self.active = false;
        self.disarm();
    }

    /// The current track finished on its own
    pub fn on_track_ended(&mut self, now: Instant) -> Option<QueueAction> {
        if !self.active {
            return None;
        }
        if self.fallback_pending {
            self.fallback_pending = false;
            let track = self.current_track().cloned()?;
            self.probe = Some(Probe {
                due: now + PROBE_DELAY,
                attempts: 0,
            });
            return Some(QueueAction::Preview(track));
        }
        self.play_next(now)
    }

    /// The current track failed; keep going
    pub fn on_playback_error(&mut self, now: Instant) -> Option<QueueAction> {
        if !self.active {
            return None;
        }
        self.play_next(now)
    }

    /// An automix crossfade could not start the incoming track
    pub fn on_crossfade_failed(&mut self) {
        if self.active {
            self.fallback_pending = true;
        }
    }

    /// Per-frame update: duration probe and automix trigger
    pub fn tick(
        &mut self,
        now: Instant,
        clock: Option<PlaybackClock>,
        transition_active: bool,
    ) -> Option<QueueAction> {
        if !self.active {
            return None;
        }

        if let Some(probe) = self.probe {
            if now >= probe.due {
                match clock.and_then(|c| c.duration) {
                    Some(duration) => {
                        self.probe = None;
                        self.known_duration = Some(duration);
                        self.trigger_at = self.trigger_for(duration);
                        debug!("Probed duration {:.1}s", duration.as_secs_f32());
                    }
                    None if probe.attempts + 1 >= PROBE_ATTEMPTS => {
                        debug!("Duration unknown, automix disabled for this track");
                        self.probe = None;
                    }
                    None => {
                        self.probe = Some(Probe {
                            due: now + PROBE_RETRY,
                            attempts: probe.attempts + 1,
                        });
                    }
                }
            }
        }

        let trigger = self.trigger_at?;
        let clock = clock?;
        if !self.automix || transition_active || self.fallback_pending || clock.position < trigger {
            return None;
        }
        self.crossfade_next(now)
    }

    fn crossfade_next(&mut self, now: Instant) -> Option<QueueAction> {
        if !self.has_next() {
            // Nothing to fade into; the last track ends naturally
            self.trigger_at = None;
            return None;
        }
        let next = self.cursor + 1;
        self.disarm();
        self.cursor = next;
        self.active = true;
        self.completed = false;
        self.probe = Some(Probe {
            due: now + PROBE_DELAY,
            attempts: 0,
        });
        self.tracks.get(next as usize).cloned().map(QueueAction::Crossfade)
    }

    fn has_next(&self) -> bool {
        usize::try_from(self.cursor + 1).map_or(false, |i| i < self.tracks.len())
    }

    fn finish(&mut self) -> Option<QueueAction> {
        self.active = false;
        if self.completed {
            return None;
        }
        self.completed = true;
        info!("Queue completed");
        Some(QueueAction::Completed)
    }

    fn trigger_for(&self, duration: Duration) -> Option<Duration> {
        (self.automix && duration > self.crossfade).then(|| duration - self.crossfade)
    }

    fn disarm(&mut self) {
        self.probe = None;
        self.known_duration = None;
        self.trigger_at = None;
        self.fallback_pending = false;
    }

    pub fn current_track(&self) -> Option<&TrackDescriptor> {
        usize::try_from(self.cursor)
            .ok()
            .and_then(|i| self.tracks.get(i))
    }

    pub fn cursor(&self) -> Option<usize> {
        usize::try_from(self.cursor)
            .ok()
            .filter(|i| *i < self.tracks.len())
    }

    pub fn tracks(&self) -> &[TrackDescriptor] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn automix(&self) -> bool {
        self.automix
    }

    pub fn crossfade(&self) -> Duration {
        self.crossfade
    }

    /// Position at which the automix crossfade will fire
    pub fn trigger_at(&self) -> Option<Duration> {
        self.trigger_at
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            cursor: self.cursor(),
            len: self.tracks.len(),
            active: self.active,
            automix: self.automix,
            crossfade: self.crossfade,
        }
    }
}
