//! Terminal UI for Cue - visualizer, widgets, themes, and layout
//!
//! Provides the vintage CRT-style front-end for previewing library tracks.

mod app;
mod layout;
mod theme;
mod viewport;
mod visualizer;
pub mod widgets;

pub use app::{App, AppState, MessageType, MESSAGE_TTL};
pub use layout::{CanvasId, CanvasLayout};
pub use theme::{Theme, CRT_AMBER, CRT_GREEN, CYBERPUNK};
pub use viewport::{OverviewViewport, MAX_ZOOM, MIN_ZOOM, PAN_HOLD, PLAYHEAD_ANCHOR, ZOOM_STEP};
pub use visualizer::{Visualizer, WaveformStyle, PLACEHOLDER_LEVEL};
pub use widgets::{BarsWidget, HelpWidget, LibraryState, LibraryWidget, StatusBarWidget, WaveformWidget};
