//! Preview engine for Cue - serialized track previews, crossfades and autoplay
//!
//! Control logic is single-threaded and driven by `PreviewPlayer::tick`:
//! - Resources: ref-counted handles with TTL sweep and LRU eviction
//! - Sessions: one playback element per track preview
//! - Serializer: latest-wins admission of preview requests
//! - Crossfade: linear volume ramp between two sessions
//! - Queue: autoplay sequencing with automix triggers
//! - Engine: cpal output implementing `MediaBackend`

mod backend;
mod crossfade;
mod engine;
mod error;
mod events;
mod mixer;
mod player;
mod queue;
mod resources;
mod serializer;
mod session;
mod tap;
mod voice;

#[cfg(test)]
mod fake;

pub use backend::{ElementEvent, ElementId, GraphState, MediaBackend, Readiness};
pub use crossfade::{
    clamp_crossfade, CrossfadePhase, CrossfadeStep, CrossfadeTransition, DEFAULT_CROSSFADE,
    MAX_CROSSFADE, MIN_CROSSFADE,
};
pub use engine::{EngineBackend, EngineCommand, EngineEvent, EngineState};
pub use error::{EngineError, PreviewError};
pub use events::{Notice, NoticeLevel, PlayerEvent};
pub use player::{PlayerOptions, PreviewPlayer};
pub use queue::{PlayQueue, PlaybackClock, QueueAction, QueueStatus};
pub use resources::{
    Blob, RegistryStats, ResourceId, ResourceKind, ResourceOptions, ResourceRegistry,
    SharedRegistry, DEFAULT_MAX_HANDLES,
};
pub use serializer::{Origin, PreviewOutcome, PreviewSerializer, PreviewTicket, SerializerEvent};
pub use session::{
    EventRouter, PlaybackSession, SessionFactory, SessionId, SessionState, Subscription,
};
pub use tap::{AnalysisTap, TapHandle};
