//! Overview viewport - zoom and pan over the full-track overview

use cue_library::{PrefStore, PrefsError};
use std::time::{Duration, Instant};

pub const MIN_ZOOM: f64 = 0.5;
pub const MAX_ZOOM: f64 = 10.0;
pub const ZOOM_STEP: f64 = 0.5;

/// Fraction of the visible window left of the playhead while following
pub const PLAYHEAD_ANCHOR: f64 = 0.35;

/// How long a manual pan suppresses auto-scroll
pub const PAN_HOLD: Duration = Duration::from_secs(3);

const ZOOM_KEY: &str = "overview.zoom";
const OFFSET_KEY: &str = "overview.offset";

/// Visible window over a track normalized to 0.0 - 1.0
///
/// `offset` is the left edge of the window. It always stays within
/// `[0, max(0, 1 - 1/zoom)]` so the window never runs past the track.
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewViewport {
    zoom: f64,
    offset: f64,
    /// Last manual pan, suppresses auto-scroll for `PAN_HOLD`
    panned_at: Option<Instant>,
}

impl Default for OverviewViewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            offset: 0.0,
            panned_at: None,
        }
    }
}

impl OverviewViewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore zoom and offset from preferences, ignoring missing or bad values
    pub fn load(prefs: &dyn PrefStore) -> Self {
        let mut viewport = Self::default();
        if let Some(zoom) = prefs.get_f64(ZOOM_KEY) {
            viewport.set_zoom(zoom);
        }
        if let Some(offset) = prefs.get_f64(OFFSET_KEY) {
            viewport.set_offset(offset);
        }
        viewport
    }

    pub fn save(&self, prefs: &mut dyn PrefStore) -> Result<(), PrefsError> {
        prefs.set_f64(ZOOM_KEY, self.zoom)?;
        prefs.set_f64(OFFSET_KEY, self.offset)
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Width of the visible window as a fraction of the track
    pub fn visible_width(&self) -> f64 {
        (1.0 / self.zoom).min(1.0)
    }

    pub fn max_offset(&self) -> f64 {
        (1.0 - 1.0 / self.zoom).max(0.0)
    }

    /// Visible range as (start, end), both within 0.0 - 1.0
    pub fn window(&self) -> (f64, f64) {
        let end = (self.offset + self.visible_width()).min(1.0);
        (self.offset, end)
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom - ZOOM_STEP);
    }

    /// Set zoom, snapped to the step grid, keeping the window center in place
    pub fn set_zoom(&mut self, zoom: f64) {
        if !zoom.is_finite() {
            return;
        }
        let center = self.offset + self.visible_width() / 2.0;
        self.zoom = ((zoom / ZOOM_STEP).round() * ZOOM_STEP).clamp(MIN_ZOOM, MAX_ZOOM);
        self.set_offset(center - self.visible_width() / 2.0);
    }

    pub fn reset_zoom(&mut self) {
        self.zoom = 1.0;
        self.offset = 0.0;
        self.panned_at = None;
    }

    pub fn set_offset(&mut self, offset: f64) {
        if offset.is_finite() {
            self.offset = offset.clamp(0.0, self.max_offset());
        }
    }

    /// Manual pan by a fraction of the visible window
    pub fn pan(&mut self, delta: f64, now: Instant) {
        self.set_offset(self.offset + delta * self.visible_width());
        self.panned_at = Some(now);
    }

    /// Whether auto-scroll is held off by a recent manual pan
    pub fn is_held(&self, now: Instant) -> bool {
        self.panned_at
            .map_or(false, |at| now.saturating_duration_since(at) < PAN_HOLD)
    }

    /// Auto-scroll so the playhead sits at `PLAYHEAD_ANCHOR` of the window
    ///
    /// Returns true if the offset changed.
    pub fn follow(&mut self, progress: f64, now: Instant) -> bool {
        if self.is_held(now) || !progress.is_finite() {
            return false;
        }
        let before = self.offset;
        let progress = progress.clamp(0.0, 1.0);
        self.set_offset(progress - PLAYHEAD_ANCHOR * self.visible_width());
        self.offset != before
    }

    /// Map a track position to a column in a window `width` cells wide
    pub fn column_of(&self, progress: f64, width: u16) -> Option<u16> {
        let (start, end) = self.window();
        if width == 0 || progress < start || progress > end || end <= start {
            return None;
        }
        let column = ((progress - start) / (end - start) * width as f64) as u16;
        Some(column.min(width - 1))
    }

    /// Track position under a column in a window `width` cells wide
    pub fn position_at(&self, column: u16, width: u16) -> f64 {
        let (start, end) = self.window();
        if width == 0 {
            return start;
        }
        start + (column as f64 / width as f64) * (end - start)
    }
}
