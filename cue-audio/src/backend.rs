//! Media backend seam
//!
//! The control logic drives playback elements only through `MediaBackend`.
//! The cpal engine implements it for real output; tests use an in-process
//! fake.

use crate::error::PreviewError;
use crate::resources::Blob;
use crate::tap::TapHandle;
use std::fmt;
use std::time::Duration;

/// Identifier of a native playback element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// Load state of an element
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    Pending,
    Ready,
    Failed(String),
}

/// State of the shared audio graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    Suspended,
    Running,
    Closed,
}

/// Asynchronous notifications from elements
#[derive(Debug, Clone, PartialEq)]
pub enum ElementEvent {
    Ended(ElementId),
    Error(ElementId, String),
}

impl ElementEvent {
    pub fn element(&self) -> ElementId {
        match self {
            ElementEvent::Ended(id) | ElementEvent::Error(id, _) => *id,
        }
    }
}

/// Native media playback as seen by the control thread
pub trait MediaBackend {
    /// Create a paused element for a blob; loading continues in the background
    fn create_element(&mut self, blob: &Blob) -> Result<ElementId, PreviewError>;

    /// Poll whether the element finished loading
    fn readiness(&mut self, id: ElementId) -> Readiness;

    fn play(&mut self, id: ElementId) -> Result<(), PreviewError>;

    fn pause(&mut self, id: ElementId);

    /// Stop and rewind
    fn stop(&mut self, id: ElementId);

    fn is_paused(&self, id: ElementId) -> bool;

    fn set_volume(&mut self, id: ElementId, volume: f32);

    fn volume(&self, id: ElementId) -> f32;

    fn position(&self, id: ElementId) -> Duration;

    /// Known once the element is ready
    fn duration(&self, id: ElementId) -> Option<Duration>;

    /// Release the element; unknown ids are ignored
    fn remove_element(&mut self, id: ElementId);

    /// Route the element through a fresh analysis tap
    fn connect_tap(&mut self, id: ElementId) -> Result<TapHandle, PreviewError>;

    fn disconnect_tap(&mut self, id: ElementId);

    fn graph_state(&self) -> GraphState;

    fn resume_graph(&mut self);

    /// Take queued element events
    fn drain_events(&mut self) -> Vec<ElementEvent>;
}
