//! UI Widgets for Cue

mod bars;
mod library;
pub mod status_bar;
mod waveform;

pub use bars::BarsWidget;
pub use library::{LibraryState, LibraryWidget};
pub use status_bar::{HelpWidget, StatusBarWidget};
pub use waveform::WaveformWidget;
