//! In-process backend for tests

use crate::backend::{ElementEvent, ElementId, GraphState, MediaBackend, Readiness};
use crate::error::PreviewError;
use crate::resources::Blob;
use crate::tap::{AnalysisTap, TapHandle};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug)]
pub struct FakeElement {
    pub extension: String,
    pub polls_until_ready: u32,
    pub failure: Option<String>,
    pub playing: bool,
    pub volume: f32,
    /// Volume when playback first started, as the engine builds its voice
    pub start_volume: Option<f32>,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub tapped: bool,
}

pub struct FakeBackend {
    pub elements: HashMap<ElementId, FakeElement>,
    pub removed: Vec<ElementId>,
    pub events: Vec<ElementEvent>,
    pub graph: GraphState,
    pub taps_connected: usize,
    next_id: u64,
    /// Polls a new element needs before it is ready
    pub load_polls: u32,
    /// Duration given to new elements
    pub default_duration: Option<Duration>,
    /// Extensions whose elements fail to load
    pub failing_extensions: Vec<String>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            elements: HashMap::new(),
            removed: Vec::new(),
            events: Vec::new(),
            graph: GraphState::Suspended,
            taps_connected: 0,
            next_id: 1,
            load_polls: 0,
            default_duration: Some(Duration::from_secs(180)),
            failing_extensions: Vec::new(),
        }
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&self, id: ElementId) -> &FakeElement {
        &self.elements[&id]
    }

    pub fn element_mut(&mut self, id: ElementId) -> &mut FakeElement {
        self.elements.get_mut(&id).unwrap()
    }

    pub fn live(&self) -> usize {
        self.elements.len()
    }

    /// Report natural end of playback
    pub fn finish(&mut self, id: ElementId) {
        if let Some(el) = self.elements.get_mut(&id) {
            el.playing = false;
            if let Some(d) = el.duration {
                el.position = d;
            }
        }
        self.events.push(ElementEvent::Ended(id));
    }

    pub fn fail(&mut self, id: ElementId, message: &str) {
        self.events.push(ElementEvent::Error(id, message.to_string()));
    }
}

impl MediaBackend for FakeBackend {
    fn create_element(&mut self, blob: &Blob) -> Result<ElementId, PreviewError> {
        let id = ElementId::new(self.next_id);
        self.next_id += 1;
        let failure = self
            .failing_extensions
            .iter()
            .any(|e| e == blob.extension())
            .then(|| "decode failed".to_string());
        self.elements.insert(
            id,
            FakeElement {
                extension: blob.extension().to_string(),
                polls_until_ready: self.load_polls,
                failure,
                playing: false,
                volume: 1.0,
                start_volume: None,
                position: Duration::ZERO,
                duration: self.default_duration,
                tapped: false,
            },
        );
        Ok(id)
    }

    fn readiness(&mut self, id: ElementId) -> Readiness {
        let Some(el) = self.elements.get_mut(&id) else {
            return Readiness::Failed("unknown element".into());
        };
        if let Some(msg) = &el.failure {
            return Readiness::Failed(msg.clone());
        }
        if el.polls_until_ready > 0 {
            el.polls_until_ready -= 1;
            return Readiness::Pending;
        }
        Readiness::Ready
    }

    fn play(&mut self, id: ElementId) -> Result<(), PreviewError> {
        let el = self
            .elements
            .get_mut(&id)
            .ok_or_else(|| PreviewError::Playback("unknown element".into()))?;
        if el.polls_until_ready > 0 || el.failure.is_some() {
            return Err(PreviewError::Playback("element is still loading".into()));
        }
        el.playing = true;
        el.start_volume.get_or_insert(el.volume);
        Ok(())
    }

    fn pause(&mut self, id: ElementId) {
        if let Some(el) = self.elements.get_mut(&id) {
            el.playing = false;
        }
    }

    fn stop(&mut self, id: ElementId) {
        if let Some(el) = self.elements.get_mut(&id) {
            el.playing = false;
            el.position = Duration::ZERO;
        }
    }

    fn is_paused(&self, id: ElementId) -> bool {
        self.elements.get(&id).map_or(true, |el| !el.playing)
    }

    fn set_volume(&mut self, id: ElementId, volume: f32) {
        if let Some(el) = self.elements.get_mut(&id) {
            el.volume = volume;
        }
    }

    fn volume(&self, id: ElementId) -> f32 {
        self.elements.get(&id).map_or(0.0, |el| el.volume)
    }

    fn position(&self, id: ElementId) -> Duration {
        self.elements.get(&id).map_or(Duration::ZERO, |el| el.position)
    }

    fn duration(&self, id: ElementId) -> Option<Duration> {
        self.elements.get(&id).and_then(|el| el.duration)
    }

    fn remove_element(&mut self, id: ElementId) {
        if self.elements.remove(&id).is_some() {
            self.removed.push(id);
        }
    }

    fn connect_tap(&mut self, id: ElementId) -> Result<TapHandle, PreviewError> {
        let el = self
            .elements
            .get_mut(&id)
            .ok_or_else(|| PreviewError::Playback("unknown element".into()))?;
        el.tapped = true;
        self.taps_connected += 1;
        Ok(AnalysisTap::new(id, 48000).into_handle())
    }

    fn disconnect_tap(&mut self, id: ElementId) {
        if let Some(el) = self.elements.get_mut(&id) {
            el.tapped = false;
        }
    }

    fn graph_state(&self) -> GraphState {
        self.graph
    }

    fn resume_graph(&mut self) {
        if self.graph == GraphState::Suspended {
            self.graph = GraphState::Running;
        }
    }

    fn drain_events(&mut self) -> Vec<ElementEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Session factory over in-memory files with the given names
pub fn factory(names: &[&str]) -> (crate::session::SessionFactory, crate::resources::SharedRegistry) {
    use crate::resources::{ResourceOptions, ResourceRegistry};
    use crate::session::{EventRouter, SessionFactory};
    use cue_library::LocalFile;

    let registry = ResourceRegistry::shared(50);
    let files = names
        .iter()
        .map(|n| LocalFile::in_memory(*n, vec![0u8; 8]))
        .collect();
    (
        SessionFactory::new(
            registry.clone(),
            EventRouter::new(),
            files,
            ResourceOptions::default(),
        ),
        registry,
    )
}

pub fn track(name: &str) -> cue_library::TrackDescriptor {
    cue_library::TrackDescriptor::from_file_name(name).unwrap()
}
