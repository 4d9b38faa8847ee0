//! Preview serializer - latest-wins admission of preview requests
//!
//! Requests are queued by `submit` and drained by `pump`, which the player
//! calls every frame. At most one playback-start attempt is in flight; any
//! request that is overtaken by a newer one is rejected with `Superseded`
//! before the survivor's playback is attempted.

use crate::backend::{MediaBackend, Readiness};
use crate::error::PreviewError;
use crate::session::{PlaybackSession, SessionFactory, SessionId};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use cue_library::TrackDescriptor;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Who asked for a preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Manual,
    Queue,
}

/// Result delivered to a request's ticket
pub type PreviewOutcome = Result<SessionId, PreviewError>;

/// Caller side of a preview request
#[derive(Debug)]
pub struct PreviewTicket {
    request: u64,
    rx: Receiver<PreviewOutcome>,
    outcome: Option<PreviewOutcome>,
}

impl PreviewTicket {
    pub fn request_id(&self) -> u64 {
        self.request
    }

    /// The outcome, once the serializer has settled the request
    pub fn try_outcome(&mut self) -> Option<&PreviewOutcome> {
        if self.outcome.is_none() {
            match self.rx.try_recv() {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.outcome = Some(Err(PreviewError::Closed)),
            }
        }
        self.outcome.as_ref()
    }

    pub fn is_settled(&mut self) -> bool {
        self.try_outcome().is_some()
    }
}

/// Noteworthy results of a pump
#[derive(Debug, Clone, PartialEq)]
pub enum SerializerEvent {
    Started {
        request: u64,
        session: SessionId,
        origin: Origin,
    },
    Failed {
        request: u64,
        track: TrackDescriptor,
        origin: Origin,
        error: PreviewError,
    },
}

struct PendingRequest {
    id: u64,
    track: TrackDescriptor,
    origin: Origin,
    reply: Sender<PreviewOutcome>,
}

impl PendingRequest {
    fn settle(self, outcome: PreviewOutcome) {
        // A dropped ticket just means nobody is waiting
        let _ = self.reply.send(outcome);
    }

    fn supersede(self) {
        debug!("Preview request {} superseded", self.id);
        let id = self.id;
        self.settle(Err(PreviewError::Superseded { request: id }));
    }
}

enum AttemptPhase {
    Settling { until: Instant },
    Loading { session: PlaybackSession },
}

struct Attempt {
    request: PendingRequest,
    phase: AttemptPhase,
}

/// Serializes preview requests onto one authoritative session
pub struct PreviewSerializer {
    pending: Vec<PendingRequest>,
    attempt: Option<Attempt>,
    current: Option<(PlaybackSession, Origin)>,
    next_request: u64,
    settle_delay: Duration,
}

impl PreviewSerializer {
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            pending: Vec::new(),
            attempt: None,
            current: None,
            next_request: 1,
            settle_delay,
        }
    }

    /// Queue a preview request
    pub fn submit(&mut self, track: TrackDescriptor, origin: Origin) -> PreviewTicket {
        let (reply, rx) = bounded(1);
        let request = self.next_request;
        self.next_request += 1;
        debug!("Preview request {} for {}", request, track.display_name());
        self.pending.push(PendingRequest {
            id: request,
            track,
            origin,
            reply,
        });
        PreviewTicket {
            request,
            rx,
            outcome: None,
        }
    }

    /// Whether a request is queued or being started
    pub fn is_busy(&self) -> bool {
        !self.pending.is_empty() || self.attempt.is_some()
    }

    pub fn current(&self) -> Option<&PlaybackSession> {
        self.current.as_ref().map(|(s, _)| s)
    }

    pub fn current_mut(&mut self) -> Option<&mut PlaybackSession> {
        self.current.as_mut().map(|(s, _)| s)
    }

    pub fn current_origin(&self) -> Option<Origin> {
        self.current.as_ref().map(|(_, o)| *o)
    }

    /// Hand the current session to another owner
    pub fn take_current(&mut self) -> Option<(PlaybackSession, Origin)> {
        self.current.take()
    }

    /// Install a session started elsewhere as the authoritative one
    pub fn adopt<B: MediaBackend>(&mut self, session: PlaybackSession, origin: Origin, backend: &mut B) {
        if let Some((mut previous, _)) = self.current.replace((session, origin)) {
            previous.close(backend);
        }
    }

    /// Drain queued requests
    ///
    /// Iterates until no work is left or the in-flight attempt has to wait
    /// for time to pass or the element to load.
    pub fn pump<B: MediaBackend>(
        &mut self,
        now: Instant,
        factory: &mut SessionFactory,
        backend: &mut B,
    ) -> Vec<SerializerEvent> {
        let mut events = Vec::new();

        loop {
            // Newer work overtakes whatever is being started
            if !self.pending.is_empty() {
                if let Some(attempt) = self.attempt.take() {
                    if let AttemptPhase::Loading { mut session } = attempt.phase {
                        session.dispose(backend);
                    }
                    attempt.request.supersede();
                }
            }

            if self.attempt.is_none() {
                let Some(survivor) = self.pending.pop() else {
                    break;
                };
                for stale in self.pending.drain(..) {
                    stale.supersede();
                }

                if let Some((mut previous, _)) = self.current.take() {
                    previous.close(backend);
                }
                self.attempt = Some(Attempt {
                    request: survivor,
                    phase: AttemptPhase::Settling {
                        until: now + self.settle_delay,
                    },
                });
            }

            let Some(mut attempt) = self.attempt.take() else {
                break;
            };

            match attempt.phase {
                AttemptPhase::Settling { until } if now < until => {
                    self.attempt = Some(attempt);
                    break;
                }
                AttemptPhase::Settling { .. } => {
                    match factory.open(&attempt.request.track, backend, now) {
                        Ok(session) => {
                            attempt.phase = AttemptPhase::Loading { session };
                            self.attempt = Some(attempt);
                        }
                        Err(error) => events.push(Self::fail(attempt.request, error)),
                    }
                }
                AttemptPhase::Loading { mut session } => match session.poll_ready(backend) {
                    Readiness::Pending => {
                        attempt.phase = AttemptPhase::Loading { session };
                        self.attempt = Some(attempt);
                        break;
                    }
                    Readiness::Failed(msg) => {
                        session.dispose(backend);
                        events.push(Self::fail(attempt.request, PreviewError::Playback(msg)));
                    }
                    Readiness::Ready => match session.play(backend) {
                        Ok(()) => {
                            let request = attempt.request;
                            let id = session.id();
                            info!("Previewing {}", session.track().display_name());
                            events.push(SerializerEvent::Started {
                                request: request.id,
                                session: id,
                                origin: request.origin,
                            });
                            self.current = Some((session, request.origin));
                            request.settle(Ok(id));
                        }
                        Err(error) => {
                            session.dispose(backend);
                            events.push(Self::fail(attempt.request, error));
                        }
                    },
                },
            }
        }

        events
    }

    fn fail(request: PendingRequest, error: PreviewError) -> SerializerEvent {
        debug!("Preview request {} failed: {}", request.id, error);
        let event = SerializerEvent::Failed {
            request: request.id,
            track: request.track.clone(),
            origin: request.origin,
            error: error.clone(),
        };
        request.settle(Err(error));
        event
    }

    /// Stop everything: reject queued and in-flight requests, close the current session
    pub fn close<B: MediaBackend>(&mut self, backend: &mut B) {
        for request in self.pending.drain(..) {
            request.settle(Err(PreviewError::Closed));
        }
        if let Some(attempt) = self.attempt.take() {
            if let AttemptPhase::Loading { mut session } = attempt.phase {
                session.dispose(backend);
            }
            attempt.request.settle(Err(PreviewError::Closed));
        }
        if let Some((mut session, _)) = self.current.take() {
            session.close(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{factory, track, FakeBackend};

    const NAMES: [&str; 3] = ["A - One - 1A - 120.mp3", "B - Two - 2A - 121.mp3", "C - Three - 3A - 122.mp3"];

    fn superseded(ticket: &mut PreviewTicket) -> bool {
        matches!(ticket.try_outcome(), Some(Err(PreviewError::Superseded { .. })))
    }

    #[test]
    fn test_only_last_of_n_submits_succeeds() {
        let (mut factory, _) = factory(&NAMES);
        let mut backend = FakeBackend::new();
        let mut serializer = PreviewSerializer::new(Duration::ZERO);

        let mut tickets: Vec<PreviewTicket> = NAMES
            .iter()
            .map(|n| serializer.submit(track(n), Origin::Manual))
            .collect();
        serializer.pump(Instant::now(), &mut factory, &mut backend);

        let (last, earlier) = tickets.split_last_mut().unwrap();
        assert!(earlier.iter_mut().all(superseded));
        assert!(matches!(last.try_outcome(), Some(Ok(_))));
        assert_eq!(serializer.current().unwrap().track().title(), "Three");
        // Superseded requests never touched the backend
        assert_eq!(backend.live(), 1);
    }

    #[test]
    fn test_a_then_b_before_a_settles() {
        let (mut factory, _) = factory(&NAMES);
        let mut backend = FakeBackend::new();
        backend.load_polls = 2;
        let mut serializer = PreviewSerializer::new(Duration::ZERO);
        let now = Instant::now();

        let mut a = serializer.submit(track(NAMES[0]), Origin::Manual);
        serializer.pump(now, &mut factory, &mut backend);
        assert!(a.try_outcome().is_none());
        assert_eq!(backend.live(), 1);

        let mut b = serializer.submit(track(NAMES[1]), Origin::Manual);
        serializer.pump(now, &mut factory, &mut backend);

        // A is rejected as soon as B shows up and its element is gone
        let outcome = a.try_outcome().unwrap().clone().unwrap_err();
        assert!(outcome.to_string().contains("superseded"));
        assert_eq!(backend.live(), 1);
        assert!(b.try_outcome().is_none());

        serializer.pump(now, &mut factory, &mut backend);
        serializer.pump(now, &mut factory, &mut backend);
        let session = *b.try_outcome().unwrap().as_ref().unwrap();
        assert_eq!(serializer.current().unwrap().id(), session);
        assert_eq!(serializer.current().unwrap().track().title(), "Two");
    }

    #[test]
    fn test_settle_delay_and_previous_teardown() {
        let (mut factory, registry) = factory(&NAMES);
        let mut backend = FakeBackend::new();
        let mut serializer = PreviewSerializer::new(Duration::from_millis(50));
        let t0 = Instant::now();

        serializer.submit(track(NAMES[0]), Origin::Manual);
        serializer.pump(t0, &mut factory, &mut backend);
        assert!(serializer.current().is_none());
        let events = serializer.pump(t0 + Duration::from_millis(50), &mut factory, &mut backend);
        assert!(matches!(events[..], [SerializerEvent::Started { .. }]));

        serializer.submit(track(NAMES[1]), Origin::Queue);
        serializer.pump(t0 + Duration::from_millis(60), &mut factory, &mut backend);
        // Old session torn down before the settle delay
        assert!(serializer.current().is_none());
        assert_eq!(backend.live(), 0);
        assert!(registry.lock().is_empty());

        serializer.pump(t0 + Duration::from_millis(110), &mut factory, &mut backend);
        assert_eq!(serializer.current_origin(), Some(Origin::Queue));
        assert_eq!(registry.lock().len(), 1);
    }

    #[test]
    fn test_not_found_fails_ticket() {
        let (mut factory, _) = factory(&NAMES);
        let mut backend = FakeBackend::new();
        let mut serializer = PreviewSerializer::new(Duration::ZERO);

        let mut ticket = serializer.submit(track("Nobody - Nothing.mp3"), Origin::Manual);
        let events = serializer.pump(Instant::now(), &mut factory, &mut backend);

        assert!(matches!(
            ticket.try_outcome(),
            Some(Err(PreviewError::NotFound { .. }))
        ));
        assert!(matches!(
            events[..],
            [SerializerEvent::Failed { origin: Origin::Manual, .. }]
        ));
        assert!(!serializer.is_busy());
    }

    #[test]
    fn test_decode_failure_is_playback_error() {
        let (mut factory, registry) = factory(&["x.ogg"]);
        let mut backend = FakeBackend::new();
        backend.failing_extensions.push("ogg".into());
        let mut serializer = PreviewSerializer::new(Duration::ZERO);

        let mut ticket = serializer.submit(track("x.ogg"), Origin::Queue);
        serializer.pump(Instant::now(), &mut factory, &mut backend);

        assert!(matches!(ticket.try_outcome(), Some(Err(PreviewError::Playback(_)))));
        assert!(registry.lock().is_empty());
        assert_eq!(backend.live(), 0);
    }

    #[test]
    fn test_close_rejects_in_flight() {
        let (mut factory, _) = factory(&NAMES);
        let mut backend = FakeBackend::new();
        backend.load_polls = 5;
        let mut serializer = PreviewSerializer::new(Duration::ZERO);

        let mut ticket = serializer.submit(track(NAMES[0]), Origin::Manual);
        serializer.pump(Instant::now(), &mut factory, &mut backend);
        serializer.close(&mut backend);

        assert_eq!(ticket.try_outcome(), Some(&Err(PreviewError::Closed)));
        assert_eq!(backend.live(), 0);
    }

    #[test]
    fn test_dropped_ticket_does_not_stall() {
        let (mut factory, _) = factory(&NAMES);
        let mut backend = FakeBackend::new();
        let mut serializer = PreviewSerializer::new(Duration::ZERO);

        drop(serializer.submit(track(NAMES[0]), Origin::Manual));
        serializer.pump(Instant::now(), &mut factory, &mut backend);
        assert!(serializer.current().is_some());
    }
}
