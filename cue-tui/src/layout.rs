//! Named canvases - the front-end maps canvas ids to screen rectangles

use ratatui::layout::Rect;
use std::collections::HashMap;
use std::fmt;

/// Name of a drawing surface
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanvasId(String);

impl CanvasId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CanvasId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for CanvasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Screen rectangle of every canvas for the current frame
#[derive(Debug, Clone, Default)]
pub struct CanvasLayout {
    rects: HashMap<CanvasId, Rect>,
}

impl CanvasLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place(&mut self, id: impl Into<CanvasId>, rect: Rect) {
        self.rects.insert(id.into(), rect);
    }

    pub fn remove(&mut self, id: &CanvasId) -> Option<Rect> {
        self.rects.remove(id)
    }

    /// Rectangle of a canvas, if it is on screen and not empty
    pub fn rect(&self, id: &CanvasId) -> Option<Rect> {
        self.rects
            .get(id)
            .copied()
            .filter(|r| r.width > 0 && r.height > 0)
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }
}
