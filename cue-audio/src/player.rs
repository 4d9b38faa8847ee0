//! Preview player - wires the serializer, queue and crossfades to a backend
//!
//! The front-end owns one `PreviewPlayer` and calls `tick` once per frame.
//! Everything the user sees comes back over the `PlayerEvent` channel.

use crate::backend::{ElementEvent, MediaBackend};
use crate::crossfade::{CrossfadeStep, CrossfadeTransition};
use crate::error::PreviewError;
use crate::events::{Notice, PlayerEvent};
use crate::queue::{PlayQueue, PlaybackClock, QueueAction};
use crate::resources::{RegistryStats, ResourceOptions, ResourceRegistry, SharedRegistry};
use crate::serializer::{Origin, PreviewSerializer, PreviewTicket, SerializerEvent};
use crate::session::{EventRouter, PlaybackSession, SessionFactory, SessionId, SessionState};
use crate::tap::TapHandle;
use crossbeam_channel::Sender;
use cue_library::{Config, FileIndex, TrackDescriptor};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Tuning for a player, usually taken from `Config`
#[derive(Debug, Clone, Copy)]
pub struct PlayerOptions {
    pub max_handles: usize,
    pub resources: ResourceOptions,
    pub sweep_interval: Duration,
    pub settle_delay: Duration,
    pub automix: bool,
    pub crossfade_secs: f32,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for PlayerOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_handles: config.max_handles,
            resources: ResourceOptions {
                ttl: config.handle_ttl,
                immediate: false,
            },
            sweep_interval: config.sweep_interval,
            settle_delay: config.settle_delay,
            automix: config.automix,
            crossfade_secs: config.crossfade_secs,
        }
    }
}

pub struct PreviewPlayer<B: MediaBackend> {
    backend: B,
    registry: SharedRegistry,
    factory: SessionFactory,
    serializer: PreviewSerializer,
    queue: PlayQueue,
    transition: Option<CrossfadeTransition>,
    events: Sender<PlayerEvent>,
    last_sweep: Instant,
    sweep_interval: Duration,
}

impl<B: MediaBackend> PreviewPlayer<B> {
    pub fn new(
        backend: B,
        files: FileIndex,
        options: PlayerOptions,
        events: Sender<PlayerEvent>,
        now: Instant,
    ) -> Self {
        let registry = ResourceRegistry::shared(options.max_handles);
        let factory = SessionFactory::new(registry.clone(), EventRouter::new(), files, options.resources);
        let mut queue = PlayQueue::new();
        queue.set_auto_mix(options.automix, options.crossfade_secs);

        Self {
            backend,
            registry,
            factory,
            serializer: PreviewSerializer::new(options.settle_delay),
            queue,
            transition: None,
            events,
            last_sweep: now,
            sweep_interval: options.sweep_interval,
        }
    }

    // === User commands ===

    /// Preview a single track, taking over from the queue
    pub fn preview(&mut self, track: TrackDescriptor) -> PreviewTicket {
        if self.queue.is_active() {
            self.queue.stop();
            self.notify_queue();
        }
        if let Some(transition) = self.transition.take() {
            if let Some(outgoing) = transition.abort(&mut self.backend) {
                // Closed by the serializer once the new request is admitted
                self.serializer.adopt(outgoing, Origin::Manual, &mut self.backend);
            }
        }
        self.backend.resume_graph();
        self.serializer.submit(track, Origin::Manual)
    }

    /// Replace the queue contents
    pub fn queue_all(&mut self, tracks: Vec<TrackDescriptor>) {
        self.queue.initialize_queue(tracks);
        self.notify_queue();
    }

    pub fn play_next(&mut self, now: Instant) {
        let action = self.queue.play_next(now);
        self.execute(action, now);
    }

    pub fn play_previous(&mut self, now: Instant) {
        let action = self.queue.play_previous(now);
        self.execute(action, now);
    }

    pub fn skip_to_track(&mut self, index: usize, now: Instant) {
        let action = self.queue.skip_to_track(index, now);
        self.execute(action, now);
    }

    /// Skip ahead, crossfading when automix is on
    pub fn skip_to_next(&mut self, now: Instant) {
        if self.transition.is_some() {
            debug!("Skip ignored, crossfade in progress");
            return;
        }
        let playing = self.is_playing();
        let action = self.queue.skip_to_next(now, playing);
        self.execute(action, now);
    }

    pub fn set_auto_mix(&mut self, enabled: bool, seconds: f32) {
        self.queue.set_auto_mix(enabled, seconds);
        self.notify_queue();
    }

    pub fn toggle_pause(&mut self) {
        if self.transition.is_some() {
            debug!("Pause ignored, crossfade in progress");
            return;
        }
        let Some(session) = self.serializer.current_mut() else {
            return;
        };
        match session.state() {
            SessionState::Playing => session.pause(&mut self.backend),
            SessionState::Paused => {
                if let Err(e) = session.resume(&mut self.backend) {
                    let notice = Notice::error(e.to_string());
                    self.send(PlayerEvent::Notice(notice));
                }
            }
            _ => {}
        }
    }

    /// Stop everything: queue, crossfade and the current preview
    pub fn stop(&mut self) {
        self.queue.stop();
        if let Some(transition) = self.transition.take() {
            if let Some(mut outgoing) = transition.abort(&mut self.backend) {
                outgoing.close(&mut self.backend);
            }
        }
        self.serializer.close(&mut self.backend);
        self.notify_queue();
    }

    // === Frame update ===

    /// Advance everything by one frame
    pub fn tick(&mut self, now: Instant) {
        self.route_backend_events(now);
        self.pump_serializer(now);
        self.tick_transition(now);
        self.tick_queue(now);
        self.sweep(now);
    }

    fn route_backend_events(&mut self, now: Instant) {
        for event in self.backend.drain_events() {
            let Some(session) = self.factory.router().route(&event) else {
                debug!("Dropped event for unsubscribed {}", event.element());
                continue;
            };
            match event {
                ElementEvent::Ended(_) => self.on_ended(session, now),
                ElementEvent::Error(_, message) => self.on_element_error(session, message, now),
            }
        }
    }

    fn on_ended(&mut self, session: SessionId, now: Instant) {
        if let Some(transition) = &self.transition {
            if transition.outgoing().id() == session {
                // The transition disposes its outgoing side
                debug!("{} ended while fading", session);
                return;
            }
            if transition.incoming().id() == session {
                warn!("{} ended before the crossfade finished", session);
                self.finish_transition_early(now);
                return;
            }
        }

        if self.serializer.current().map(|s| s.id()) == Some(session) {
            self.finish_current(now);
        }
    }

    /// The authoritative session reached its end
    fn finish_current(&mut self, now: Instant) {
        let Some((mut session, origin)) = self.serializer.take_current() else {
            return;
        };
        session.mark_ended();
        let track = session.track().clone();
        session.dispose(&mut self.backend);
        info!("Finished {}", track.display_name());
        self.send(PlayerEvent::PlaybackEnded(track));

        if origin == Origin::Queue {
            let action = self.queue.on_track_ended(now);
            self.execute(action, now);
        }
    }

    /// The incoming track ran out mid-fade: drop both sides and move on
    fn finish_transition_early(&mut self, now: Instant) {
        let Some(transition) = self.transition.take() else {
            return;
        };
        let track = transition.incoming().track().clone();
        if let Some(mut outgoing) = transition.abort(&mut self.backend) {
            outgoing.close(&mut self.backend);
        }
        self.send(PlayerEvent::PlaybackEnded(track));
        let action = self.queue.on_track_ended(now);
        self.execute(action, now);
    }

    fn on_element_error(&mut self, session: SessionId, message: String, now: Instant) {
        if let Some(transition) = &self.transition {
            if transition.incoming().id() == session {
                self.fail_transition(PreviewError::Playback(message));
                return;
            }
            if transition.outgoing().id() == session {
                warn!("{} failed while fading: {}", session, message);
                return;
            }
        }

        if self.serializer.current().map(|s| s.id()) != Some(session) {
            return;
        }
        let Some((mut session, origin)) = self.serializer.take_current() else {
            return;
        };
        warn!("{} failed: {}", session.id(), message);
        let track = session.track().display_name();
        session.dispose(&mut self.backend);

        if origin == Origin::Queue {
            self.send(PlayerEvent::Notice(Notice::warning(format!("Skipping {}: {}", track, message))));
            let action = self.queue.on_playback_error(now);
            self.execute(action, now);
        } else {
            self.send(PlayerEvent::Notice(Notice::error(format!("{}: {}", track, message))));
        }
    }

    fn pump_serializer(&mut self, now: Instant) {
        let events = self.serializer.pump(now, &mut self.factory, &mut self.backend);
        for event in events {
            match event {
                SerializerEvent::Started { .. } => {
                    if let Some(session) = self.serializer.current() {
                        let track = session.track().clone();
                        self.send(PlayerEvent::TrackChanged(track));
                    }
                }
                SerializerEvent::Failed { error, .. } if error.is_silent() => {}
                SerializerEvent::Failed {
                    track,
                    origin: Origin::Manual,
                    error: error @ PreviewError::ResourceExhausted { .. },
                    ..
                } => {
                    warn!("Preview of {} not started: {}", track.display_name(), error);
                }
                SerializerEvent::Failed {
                    track,
                    origin: Origin::Manual,
                    error,
                    ..
                } => {
                    warn!("Preview of {} failed: {}", track.display_name(), error);
                    self.send(PlayerEvent::Notice(Notice::error(error.to_string())));
                }
                SerializerEvent::Failed {
                    track,
                    origin: Origin::Queue,
                    error,
                    ..
                } => {
                    warn!("Queue track {} failed: {}", track.display_name(), error);
                    let notice = Notice::warning(format!("Skipping {}: {}", track.display_name(), error));
                    self.send(PlayerEvent::Notice(notice));
                    let action = self.queue.on_playback_error(now);
                    self.execute(action, now);
                }
            }
        }
    }

    fn tick_transition(&mut self, now: Instant) {
        let Some(transition) = self.transition.as_mut() else {
            return;
        };
        match transition.tick(now, &mut self.backend) {
            CrossfadeStep::Waiting | CrossfadeStep::Ramping { .. } => {}
            CrossfadeStep::Completed => {
                let Some(transition) = self.transition.take() else {
                    return;
                };
                match transition.into_incoming() {
                    Ok(incoming) => {
                        let track = incoming.track().clone();
                        self.serializer.adopt(incoming, Origin::Queue, &mut self.backend);
                        self.send(PlayerEvent::TrackChanged(track));
                        self.notify_queue();
                    }
                    Err(transition) => self.transition = Some(transition),
                }
            }
            CrossfadeStep::Failed(error) => self.fail_transition(error),
        }
    }

    fn tick_queue(&mut self, now: Instant) {
        let clock = self.queue_clock();
        let action = self.queue.tick(now, clock, self.transition.is_some());
        self.execute(action, now);
    }

    fn sweep(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_sweep) < self.sweep_interval {
            return;
        }
        self.last_sweep = now;
        let swept = self.registry.lock().sweep(now);
        if swept > 0 {
            debug!("Swept {} stale handles", swept);
        }
    }

    // === Queue actions ===

    fn execute(&mut self, action: Option<QueueAction>, now: Instant) {
        match action {
            None => {}
            Some(QueueAction::Preview(track)) => {
                if let Some(transition) = self.transition.take() {
                    if let Some(mut outgoing) = transition.abort(&mut self.backend) {
                        outgoing.close(&mut self.backend);
                    }
                }
                self.backend.resume_graph();
                drop(self.serializer.submit(track, Origin::Queue));
                self.notify_queue();
            }
            Some(QueueAction::Crossfade(track)) => self.begin_crossfade(track, now),
            Some(QueueAction::Completed) => {
                self.send(PlayerEvent::QueueCompleted);
                self.send(PlayerEvent::Notice(Notice::info("Queue finished")));
                self.notify_queue();
            }
        }
    }

    fn begin_crossfade(&mut self, track: TrackDescriptor, now: Instant) {
        if self.transition.is_some() {
            debug!("Crossfade to {} dropped, one is already running", track.display_name());
            return;
        }
        if self.serializer.is_busy() || !self.is_playing() {
            debug!("Nothing playing, hard cut to {}", track.display_name());
            return self.execute(Some(QueueAction::Preview(track)), now);
        }
        let Some((outgoing, _)) = self.serializer.take_current() else {
            return;
        };

        match self.factory.open(&track, &mut self.backend, now) {
            Ok(incoming) => {
                let duration = self.queue.crossfade();
                self.transition = Some(CrossfadeTransition::begin(outgoing, incoming, duration, &mut self.backend));
                self.notify_queue();
            }
            Err(error) => {
                warn!("Crossfade to {} failed: {}", track.display_name(), error);
                self.serializer.adopt(outgoing, Origin::Queue, &mut self.backend);
                self.send(PlayerEvent::Notice(Notice::warning(error.to_string())));
                self.queue.on_crossfade_failed();
            }
        }
    }

    /// Abort the running transition and keep the outgoing track
    fn fail_transition(&mut self, error: PreviewError) {
        let Some(transition) = self.transition.take() else {
            return;
        };
        let track = transition.incoming().track().display_name();
        if let Some(outgoing) = transition.abort(&mut self.backend) {
            self.serializer.adopt(outgoing, Origin::Queue, &mut self.backend);
        }
        self.send(PlayerEvent::Notice(Notice::warning(format!("Crossfade to {} failed: {}", track, error))));
        self.queue.on_crossfade_failed();
    }

    // === Queries ===

    fn queue_clock(&self) -> Option<PlaybackClock> {
        let session = match &self.transition {
            Some(transition) => transition.incoming(),
            None => match self.serializer.current_origin() {
                Some(Origin::Queue) => self.serializer.current()?,
                _ => return None,
            },
        };
        Some(PlaybackClock {
            position: session.position(&self.backend),
            duration: session.duration(&self.backend),
        })
    }

    /// Session whose output drives the visualizer
    fn audible(&self) -> Option<&PlaybackSession> {
        match &self.transition {
            Some(transition) if !transition.outgoing().is_disposed() => Some(transition.outgoing()),
            Some(transition) => Some(transition.incoming()),
            None => self.serializer.current(),
        }
    }

    /// Tap to visualize; the outgoing track's until a crossfade hands over
    pub fn visual_tap(&self) -> Option<TapHandle> {
        self.audible().and_then(|s| s.tap().cloned())
    }

    pub fn now_playing(&self) -> Option<&TrackDescriptor> {
        self.audible().map(|s| s.track())
    }

    /// Position and duration of the audible track
    pub fn clock(&self) -> Option<PlaybackClock> {
        self.audible().map(|s| PlaybackClock {
            position: s.position(&self.backend),
            duration: s.duration(&self.backend),
        })
    }

    pub fn is_playing(&self) -> bool {
        self.audible().map_or(false, |s| s.state() == SessionState::Playing)
    }

    pub fn is_paused(&self) -> bool {
        self.serializer
            .current()
            .map_or(false, |s| s.state() == SessionState::Paused)
    }

    pub fn queue(&self) -> &PlayQueue {
        &self.queue
    }

    pub fn transition(&self) -> Option<&CrossfadeTransition> {
        self.transition.as_ref()
    }

    pub fn registry_stats(&self) -> RegistryStats {
        self.registry.lock().stats()
    }

    pub fn files(&self) -> &FileIndex {
        self.factory.files()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn notify_queue(&self) {
        self.send(PlayerEvent::QueueStateChanged(self.queue.status()));
    }

    fn send(&self, event: PlayerEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ElementId;
    use crate::events::NoticeLevel;
    use crate::fake::{track, FakeBackend};
    use crate::resources::Blob;
    use crossbeam_channel::{unbounded, Receiver};
    use cue_library::LocalFile;

    const NAMES: [&str; 3] = ["A - One - 1A - 120.mp3", "B - Two - 2A - 121.mp3", "C - Three - 3A - 122.mp3"];
    const FRAME: Duration = Duration::from_millis(33);

    fn player(names: &[&str]) -> (PreviewPlayer<FakeBackend>, Receiver<PlayerEvent>) {
        let files = names
            .iter()
            .map(|n| LocalFile::in_memory(*n, vec![0u8; 8]))
            .collect();
        let options = PlayerOptions {
            settle_delay: Duration::ZERO,
            ..PlayerOptions::default()
        };
        let (tx, rx) = unbounded();
        (PreviewPlayer::new(FakeBackend::new(), files, options, tx, Instant::now()), rx)
    }

    fn all_tracks() -> Vec<TrackDescriptor> {
        NAMES.iter().map(|n| track(n)).collect()
    }

    fn current_element(player: &PreviewPlayer<FakeBackend>) -> ElementId {
        player.serializer.current().unwrap().element()
    }

    fn notices(rx: &Receiver<PlayerEvent>) -> Vec<Notice> {
        rx.try_iter()
            .filter_map(|e| match e {
                PlayerEvent::Notice(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_manual_preview_emits_track_changed() {
        let (mut player, rx) = player(&NAMES);
        let mut ticket = player.preview(track(NAMES[0]));
        player.tick(Instant::now());

        assert!(matches!(ticket.try_outcome(), Some(Ok(_))));
        assert_eq!(player.now_playing().unwrap().title(), "One");
        assert!(player.visual_tap().is_some());
        assert!(player.is_playing());
        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.contains(&PlayerEvent::TrackChanged(track(NAMES[0]))));
    }

    #[test]
    fn test_manual_preview_at_resource_cap_only_logs() {
        let (tx, rx) = unbounded();
        let files = NAMES
            .iter()
            .map(|n| LocalFile::in_memory(*n, vec![0u8; 8]))
            .collect();
        let options = PlayerOptions {
            max_handles: 1,
            settle_delay: Duration::ZERO,
            ..PlayerOptions::default()
        };
        let now = Instant::now();
        let mut player = PreviewPlayer::new(FakeBackend::new(), files, options, tx, now);
        {
            let mut registry = player.registry.lock();
            let id = registry
                .create(Blob::new(vec![0u8; 8], "mp3"), ResourceOptions::default(), now)
                .unwrap();
            registry.add_ref(id);
        }

        let mut ticket = player.preview(track(NAMES[0]));
        player.tick(now);

        assert!(matches!(
            ticket.try_outcome(),
            Some(Err(PreviewError::ResourceExhausted { cap: 1 }))
        ));
        assert!(player.now_playing().is_none());
        assert!(notices(&rx).is_empty());
    }

    #[test]
    fn test_queue_plays_through_and_completes_once() {
        let (mut player, rx) = player(&NAMES);
        player.queue_all(all_tracks());
        let mut t = Instant::now();
        player.play_next(t);

        for expected in ["One", "Two", "Three"] {
            player.tick(t);
            assert_eq!(player.now_playing().unwrap().title(), expected);
            let element = current_element(&player);
            player.backend_mut().finish(element);
            t += FRAME;
        }
        player.tick(t);
        player.tick(t + Duration::from_secs(1));

        let events: Vec<_> = rx.try_iter().collect();
        let completed = events.iter().filter(|e| **e == PlayerEvent::QueueCompleted).count();
        let ended = events
            .iter()
            .filter(|e| matches!(e, PlayerEvent::PlaybackEnded(_)))
            .count();
        assert_eq!(completed, 1);
        assert_eq!(ended, 3);
        assert!(!player.queue().is_active());
        assert!(player.now_playing().is_none());
        assert_eq!(player.registry_stats().live, 0);
    }

    #[test]
    fn test_automix_crossfades_within_one_frame() {
        let (mut player, rx) = player(&NAMES);
        player.backend_mut().default_duration = Some(Duration::from_secs(30));
        player.set_auto_mix(true, 5.0);
        player.queue_all(all_tracks());

        let t0 = Instant::now();
        player.play_next(t0);
        player.tick(t0);
        let first = current_element(&player);

        let mut elapsed = Duration::ZERO;
        while player.transition().is_none() {
            elapsed += FRAME;
            player.backend_mut().element_mut(first).position = elapsed;
            player.tick(t0 + elapsed);
            assert!(elapsed < Duration::from_secs(30), "automix never fired");
        }
        let target = Duration::from_secs(25);
        assert!(elapsed >= target);
        assert!(elapsed - target <= FRAME);
        // Visuals stay on the outgoing track during the fade
        assert_eq!(player.now_playing().unwrap().title(), "One");

        let fired = t0 + elapsed;
        let mut t = fired;
        while player.transition().is_some() {
            t += FRAME;
            player.tick(t);
            assert!(t <= fired + Duration::from_secs(6), "crossfade never completed");
        }

        assert_eq!(player.now_playing().unwrap().title(), "Two");
        assert_eq!(player.queue().cursor(), Some(1));
        assert!(!player.backend().elements.contains_key(&first));
        assert_eq!(player.registry_stats().live, 1);
        let changes = rx
            .try_iter()
            .filter(|e| matches!(e, PlayerEvent::TrackChanged(_)))
            .count();
        assert_eq!(changes, 2);
    }

    #[test]
    fn test_fading_outgoing_end_is_ignored() {
        let (mut player, rx) = player(&NAMES);
        player.set_auto_mix(true, 2.0);
        player.queue_all(all_tracks());
        let t0 = Instant::now();
        player.play_next(t0);
        player.tick(t0);
        let first = current_element(&player);

        player.skip_to_next(t0);
        player.tick(t0 + FRAME);
        player.backend_mut().finish(first);
        player.tick(t0 + FRAME * 2);
        assert!(player.transition().is_some());

        let mut t = t0 + FRAME * 2;
        while player.transition().is_some() {
            t += FRAME;
            player.tick(t);
        }
        assert_eq!(player.now_playing().unwrap().title(), "Two");
        assert!(!rx.try_iter().any(|e| matches!(e, PlayerEvent::PlaybackEnded(_))));
    }

    #[test]
    fn test_second_transition_is_dropped() {
        let (mut player, _rx) = player(&NAMES);
        player.set_auto_mix(true, 5.0);
        player.queue_all(all_tracks());
        let t0 = Instant::now();
        player.play_next(t0);
        player.tick(t0);

        player.skip_to_next(t0);
        assert!(player.transition().is_some());
        player.skip_to_next(t0);
        assert_eq!(player.queue().cursor(), Some(1));
        assert_eq!(player.transition().unwrap().incoming().track().title(), "Two");
    }

    #[test]
    fn test_manual_preview_stops_queue_and_aborts_crossfade() {
        let (mut player, _rx) = player(&NAMES);
        player.set_auto_mix(true, 5.0);
        player.queue_all(all_tracks());
        let t0 = Instant::now();
        player.play_next(t0);
        player.tick(t0);
        player.skip_to_next(t0);
        assert!(player.transition().is_some());

        let mut ticket = player.preview(track(NAMES[2]));
        assert!(player.transition().is_none());
        assert!(!player.queue().is_active());

        player.tick(t0 + FRAME);
        assert!(matches!(ticket.try_outcome(), Some(Ok(_))));
        assert_eq!(player.now_playing().unwrap().title(), "Three");
        assert_eq!(player.backend().live(), 1);
        assert_eq!(player.registry_stats().live, 1);
    }

    #[test]
    fn test_crossfade_degrades_to_hard_cut_when_paused() {
        let (mut player, _rx) = player(&NAMES);
        player.set_auto_mix(true, 5.0);
        player.queue_all(all_tracks());
        let t0 = Instant::now();
        player.play_next(t0);
        player.tick(t0);
        player.toggle_pause();
        assert!(player.is_paused());

        player.skip_to_next(t0);
        assert!(player.transition().is_none());
        player.tick(t0 + FRAME);
        assert_eq!(player.now_playing().unwrap().title(), "Two");
        assert!(player.is_playing());
    }

    #[test]
    fn test_manual_not_found_is_an_error_notice() {
        let (mut player, rx) = player(&NAMES);
        player.queue_all(all_tracks());
        let t0 = Instant::now();
        player.play_next(t0);
        player.tick(t0);

        let mut ticket = player.preview(track("Nobody - Nothing.mp3"));
        player.tick(t0 + FRAME);

        assert!(matches!(ticket.try_outcome(), Some(Err(PreviewError::NotFound { .. }))));
        assert!(notices(&rx).iter().any(|n| n.level == NoticeLevel::Error));
        assert_eq!(player.queue().cursor(), Some(0));
        assert_eq!(player.queue().len(), 3);
    }

    #[test]
    fn test_queue_failure_skips_with_warning() {
        let names = ["A - Broken.ogg", NAMES[1]];
        let (mut player, rx) = player(&names);
        player.backend_mut().failing_extensions.push("ogg".into());
        player.queue_all(names.iter().map(|n| track(n)).collect());

        let t0 = Instant::now();
        player.play_next(t0);
        player.tick(t0);
        player.tick(t0 + FRAME);

        assert_eq!(player.now_playing().unwrap().title(), "Two");
        assert!(notices(&rx).iter().any(|n| n.level == NoticeLevel::Warning));
    }

    #[test]
    fn test_element_error_advances_queue() {
        let (mut player, _rx) = player(&NAMES);
        player.queue_all(all_tracks());
        let t0 = Instant::now();
        player.play_next(t0);
        player.tick(t0);

        let element = current_element(&player);
        player.backend_mut().fail(element, "device lost");
        player.tick(t0 + FRAME);
        player.tick(t0 + FRAME * 2);
        assert_eq!(player.now_playing().unwrap().title(), "Two");
    }

    #[test]
    fn test_stop_releases_everything() {
        let (mut player, _rx) = player(&NAMES);
        player.queue_all(all_tracks());
        let t0 = Instant::now();
        player.play_next(t0);
        player.tick(t0);

        player.stop();
        assert!(player.now_playing().is_none());
        assert_eq!(player.backend().live(), 0);
        assert_eq!(player.registry_stats().live, 0);
        assert!(!player.queue().is_active());
    }
}
