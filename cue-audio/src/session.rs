//! Playback session - one element, one resource, one analysis tap
//!
//! A session owns its own teardown: `dispose` disconnects the tap, drops
//! the event subscription, removes the element and returns the resource to
//! the registry. It is safe to call more than once.

use crate::backend::{ElementEvent, ElementId, GraphState, MediaBackend, Readiness};
use crate::error::PreviewError;
use crate::resources::{Blob, ResourceId, ResourceKind, ResourceOptions, SharedRegistry};
use crate::tap::TapHandle;
use cue_library::{FileIndex, TrackDescriptor};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Identifier of a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Connected,
    Playing,
    Paused,
    Ended,
    Closed,
    Disposed,
}

type Routes = Arc<Mutex<HashMap<ElementId, SessionId>>>;

/// Maps element events to the session subscribed to them
#[derive(Debug, Clone, Default)]
pub struct EventRouter {
    routes: Routes,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, element: ElementId, session: SessionId) -> Subscription {
        self.routes.lock().insert(element, session);
        Subscription {
            routes: self.routes.clone(),
            element,
            active: true,
        }
    }

    /// Session listening to this event, if any
    pub fn route(&self, event: &ElementEvent) -> Option<SessionId> {
        self.routes.lock().get(&event.element()).copied()
    }

    pub fn len(&self) -> usize {
        self.routes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.lock().is_empty()
    }
}

/// Live registration of a session for its element's events
#[derive(Debug)]
pub struct Subscription {
    routes: Routes,
    element: ElementId,
    active: bool,
}

impl Subscription {
    pub fn dispose(&mut self) {
        if self.active {
            self.routes.lock().remove(&self.element);
            self.active = false;
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Playback of a single track
pub struct PlaybackSession {
    id: SessionId,
    track: TrackDescriptor,
    element: ElementId,
    resource: ResourceId,
    registry: SharedRegistry,
    tap: Option<TapHandle>,
    state: SessionState,
    fading: bool,
    subscription: Subscription,
}

impl PlaybackSession {
    /// Register the blob, create the element and subscribe to its events
    #[allow(clippy::too_many_arguments)]
    pub fn open<B: MediaBackend>(
        id: SessionId,
        track: TrackDescriptor,
        blob: Blob,
        backend: &mut B,
        registry: &SharedRegistry,
        router: &EventRouter,
        options: ResourceOptions,
        now: Instant,
    ) -> Result<Self, PreviewError> {
        let resource = {
            let mut reg = registry.lock();
            let resource = reg.create(blob.clone(), options, now)?;
            reg.add_ref(resource);
            resource
        };

        let element = match backend.create_element(&blob) {
            Ok(element) => element,
            Err(e) => {
                let mut reg = registry.lock();
                reg.release(resource);
                reg.revoke(resource);
                return Err(e);
            }
        };

        debug!("{} opened {} for {}", id, element, track.display_name());
        Ok(Self {
            id,
            track,
            element,
            resource,
            registry: registry.clone(),
            tap: None,
            state: SessionState::Loading,
            fading: false,
            subscription: router.subscribe(element, id),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn track(&self) -> &TrackDescriptor {
        &self.track
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn tap(&self) -> Option<&TapHandle> {
        self.tap.as_ref()
    }

    pub fn is_fading(&self) -> bool {
        self.fading
    }

    /// Mark as the outgoing side of a crossfade
    pub fn set_fading(&mut self, fading: bool) {
        self.fading = fading;
    }

    pub fn is_disposed(&self) -> bool {
        self.state == SessionState::Disposed
    }

    /// Poll a loading element; connects analysis once it is ready
    pub fn poll_ready<B: MediaBackend>(&mut self, backend: &mut B) -> Readiness {
        match self.state {
            SessionState::Loading | SessionState::Idle => {}
            SessionState::Disposed | SessionState::Closed => {
                return Readiness::Failed(PreviewError::Closed.to_string())
            }
            _ => return Readiness::Ready,
        }

        match backend.readiness(self.element) {
            Readiness::Ready => match self.connect_analysis(backend) {
                Ok(()) => {
                    self.state = SessionState::Connected;
                    Readiness::Ready
                }
                Err(e) => Readiness::Failed(e.to_string()),
            },
            other => other,
        }
    }

    /// Route the element through an analysis tap
    ///
    /// No-op while a tap is connected and the graph is running. A stale tap
    /// is replaced and a suspended graph resumed.
    pub fn connect_analysis<B: MediaBackend>(&mut self, backend: &mut B) -> Result<(), PreviewError> {
        if self.is_disposed() {
            return Err(PreviewError::Closed);
        }

        let graph = backend.graph_state();
        if self.tap.is_some() && graph == GraphState::Running {
            return Ok(());
        }

        if self.tap.take().is_some() {
            backend.disconnect_tap(self.element);
        }
        self.tap = Some(backend.connect_tap(self.element)?);

        if graph == GraphState::Suspended {
            backend.resume_graph();
        }
        Ok(())
    }

    pub fn play<B: MediaBackend>(&mut self, backend: &mut B) -> Result<(), PreviewError> {
        match self.state {
            SessionState::Disposed | SessionState::Closed => return Err(PreviewError::Closed),
            SessionState::Playing => return Ok(()),
            _ => {}
        }
        self.connect_analysis(backend)?;
        backend.play(self.element)?;
        self.state = SessionState::Playing;
        Ok(())
    }

    pub fn pause<B: MediaBackend>(&mut self, backend: &mut B) {
        if self.state == SessionState::Playing {
            backend.pause(self.element);
            self.state = SessionState::Paused;
        }
    }

    pub fn resume<B: MediaBackend>(&mut self, backend: &mut B) -> Result<(), PreviewError> {
        if self.state == SessionState::Paused {
            self.play(backend)?;
        }
        Ok(())
    }

    /// Whether the element is actually paused, regardless of our state
    pub fn is_paused<B: MediaBackend>(&self, backend: &B) -> bool {
        backend.is_paused(self.element)
    }

    pub fn set_volume<B: MediaBackend>(&self, backend: &mut B, volume: f32) {
        backend.set_volume(self.element, volume.clamp(0.0, 1.0));
    }

    pub fn volume<B: MediaBackend>(&self, backend: &B) -> f32 {
        backend.volume(self.element)
    }

    pub fn position<B: MediaBackend>(&self, backend: &B) -> Duration {
        backend.position(self.element)
    }

    pub fn duration<B: MediaBackend>(&self, backend: &B) -> Option<Duration> {
        backend.duration(self.element)
    }

    /// Record natural end of playback
    pub fn mark_ended(&mut self) {
        if matches!(
            self.state,
            SessionState::Playing | SessionState::Paused | SessionState::Connected
        ) {
            self.state = SessionState::Ended;
        }
    }

    /// Force-stop and dispose
    pub fn close<B: MediaBackend>(&mut self, backend: &mut B) {
        if self.is_disposed() {
            return;
        }
        backend.stop(self.element);
        self.state = SessionState::Closed;
        self.dispose(backend);
    }

    /// Release everything the session holds
    pub fn dispose<B: MediaBackend>(&mut self, backend: &mut B) {
        if self.is_disposed() {
            return;
        }
        if self.tap.take().is_some() {
            backend.disconnect_tap(self.element);
        }
        self.subscription.dispose();
        backend.remove_element(self.element);
        {
            let mut reg = self.registry.lock();
            reg.release(self.resource);
            reg.revoke(self.resource);
        }
        self.state = SessionState::Disposed;
        debug!("{} disposed", self.id);
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if !self.is_disposed() {
            warn!("{} dropped without dispose, leaking {}", self.id, self.element);
            self.registry.lock().release(self.resource);
        }
    }
}

/// Opens sessions for tracks: resolve, read, register, create
pub struct SessionFactory {
    registry: SharedRegistry,
    router: EventRouter,
    files: FileIndex,
    options: ResourceOptions,
    next_id: u64,
}

impl SessionFactory {
    pub fn new(
        registry: SharedRegistry,
        router: EventRouter,
        files: FileIndex,
        options: ResourceOptions,
    ) -> Self {
        Self {
            registry,
            router,
            files,
            options,
            next_id: 1,
        }
    }

    pub fn files(&self) -> &FileIndex {
        &self.files
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Open a loading session for a track
    pub fn open<B: MediaBackend>(
        &mut self,
        track: &TrackDescriptor,
        backend: &mut B,
        now: Instant,
    ) -> Result<PlaybackSession, PreviewError> {
        let file = self.files.resolve(track)?;
        let extension = file.extension().unwrap_or_default();
        if ResourceKind::from_extension(&extension) != Some(ResourceKind::Audio) {
            return Err(PreviewError::UnsupportedType(extension));
        }
        let blob = Blob::new(file.read()?, extension);

        let id = SessionId(self.next_id);
        self.next_id += 1;
        PlaybackSession::open(
            id,
            track.clone(),
            blob,
            backend,
            &self.registry,
            &self.router,
            self.options,
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{factory, track, FakeBackend};

    #[test]
    fn test_open_play_dispose() {
        let (mut factory, registry) = factory(&["A - B - 1A - 120.mp3"]);
        let mut backend = FakeBackend::new();
        let mut session = factory
            .open(&track("A - B - 1A - 120.mp3"), &mut backend, Instant::now())
            .unwrap();

        assert_eq!(session.state(), SessionState::Loading);
        assert_eq!(registry.lock().ref_count(session.resource()), Some(1));

        assert_eq!(session.poll_ready(&mut backend), Readiness::Ready);
        assert_eq!(session.state(), SessionState::Connected);
        assert!(session.tap().is_some());
        assert_eq!(backend.graph_state(), GraphState::Running);

        session.play(&mut backend).unwrap();
        assert_eq!(session.state(), SessionState::Playing);
        assert!(!session.is_paused(&backend));

        session.dispose(&mut backend);
        assert!(session.is_disposed());
        assert!(registry.lock().is_empty());
        assert_eq!(backend.live(), 0);
        assert!(factory.router().is_empty());

        // Second dispose does nothing
        session.dispose(&mut backend);
        assert_eq!(backend.removed.len(), 1);
        assert_eq!(registry.lock().stats().revoked, 1);
    }

    #[test]
    fn test_connect_analysis_is_idempotent() {
        let (mut factory, _) = factory(&["x.wav"]);
        let mut backend = FakeBackend::new();
        let mut session = factory.open(&track("x.wav"), &mut backend, Instant::now()).unwrap();

        session.connect_analysis(&mut backend).unwrap();
        session.connect_analysis(&mut backend).unwrap();
        assert_eq!(backend.taps_connected, 1);

        // A suspended graph means the tap is stale
        backend.graph = GraphState::Suspended;
        session.connect_analysis(&mut backend).unwrap();
        assert_eq!(backend.taps_connected, 2);
        assert_eq!(backend.graph, GraphState::Running);
    }

    #[test]
    fn test_pause_resume() {
        let (mut factory, _) = factory(&["x.wav"]);
        let mut backend = FakeBackend::new();
        let mut session = factory.open(&track("x.wav"), &mut backend, Instant::now()).unwrap();
        session.poll_ready(&mut backend);
        session.play(&mut backend).unwrap();

        session.pause(&mut backend);
        assert_eq!(session.state(), SessionState::Paused);
        assert!(session.is_paused(&backend));

        session.resume(&mut backend).unwrap();
        assert_eq!(session.state(), SessionState::Playing);
        session.dispose(&mut backend);
    }

    #[test]
    fn test_close_stops_and_rejects_play() {
        let (mut factory, registry) = factory(&["x.wav"]);
        let mut backend = FakeBackend::new();
        let mut session = factory.open(&track("x.wav"), &mut backend, Instant::now()).unwrap();
        session.poll_ready(&mut backend);
        session.play(&mut backend).unwrap();

        session.close(&mut backend);
        assert!(session.is_disposed());
        assert!(registry.lock().is_empty());
        assert_eq!(session.play(&mut backend), Err(PreviewError::Closed));
    }

    #[test]
    fn test_load_failure_is_reported() {
        let (mut factory, _) = factory(&["x.ogg"]);
        let mut backend = FakeBackend::new();
        backend.failing_extensions.push("ogg".into());
        let mut session = factory.open(&track("x.ogg"), &mut backend, Instant::now()).unwrap();
        assert!(matches!(session.poll_ready(&mut backend), Readiness::Failed(_)));
        session.dispose(&mut backend);
    }

    #[test]
    fn test_unknown_track_not_found() {
        let (mut factory, registry) = factory(&["a.mp3"]);
        let mut backend = FakeBackend::new();
        let err = factory
            .open(&track("missing.mp3"), &mut backend, Instant::now())
            .err()
            .unwrap();
        assert!(matches!(err, PreviewError::NotFound { .. }));
        assert!(registry.lock().is_empty());
        assert_eq!(backend.live(), 0);
    }

    #[test]
    fn test_image_is_not_playable() {
        let (mut factory, _) = factory(&["cover.png"]);
        let mut backend = FakeBackend::new();
        let err = factory
            .open(&track("cover.png"), &mut backend, Instant::now())
            .err()
            .unwrap();
        assert_eq!(err, PreviewError::UnsupportedType("png".into()));
    }

    #[test]
    fn test_router_drops_events_after_dispose() {
        let router = EventRouter::new();
        let element = ElementId::new(4);
        let mut sub = router.subscribe(element, SessionId(9));
        assert_eq!(router.route(&ElementEvent::Ended(element)), Some(SessionId(9)));

        sub.dispose();
        assert!(!sub.is_active());
        assert_eq!(router.route(&ElementEvent::Ended(element)), None);
    }

    #[test]
    fn test_subscription_drop_unsubscribes() {
        let router = EventRouter::new();
        {
            let _sub = router.subscribe(ElementId::new(1), SessionId(1));
            assert_eq!(router.len(), 1);
        }
        assert!(router.is_empty());
    }
}
