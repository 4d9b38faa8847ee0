//! Library widget for displaying the track collection
//!
//! Marks the track that is playing and the queue position.

use crate::theme::Theme;
use cue_library::{format_duration, TrackDescriptor};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{
        Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget,
        Widget,
    },
};

/// State for the library widget
#[derive(Debug, Clone, Default)]
pub struct LibraryState {
    pub tracks: Vec<TrackDescriptor>,
    /// Currently selected track index
    pub selected_index: usize,
    /// Scroll offset for the list
    pub scroll_offset: usize,
    /// Identity key of the audible track
    pub playing: Option<String>,
    /// Queue cursor, while the queue runs
    pub queue_cursor: Option<usize>,
}

impl LibraryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the track list
    pub fn set_tracks(&mut self, tracks: Vec<TrackDescriptor>) {
        self.tracks = tracks;
        self.selected_index = 0;
        self.scroll_offset = 0;
    }

    /// Move selection down
    pub fn select_next(&mut self) {
        let count = self.tracks.len();
        if count > 0 && self.selected_index < count - 1 {
            self.selected_index += 1;
        }
    }

    /// Move selection up
    pub fn select_prev(&mut self) {
        if self.selected_index > 0 {
            self.selected_index -= 1;
        }
    }

    pub fn select_first(&mut self) {
        self.selected_index = 0;
        self.scroll_offset = 0;
    }

    pub fn select_last(&mut self) {
        if !self.tracks.is_empty() {
            self.selected_index = self.tracks.len() - 1;
        }
    }

    /// Move selection by a page
    pub fn page(&mut self, delta: isize) {
        if self.tracks.is_empty() {
            return;
        }
        let target = self.selected_index as isize + delta;
        self.selected_index = target.clamp(0, self.tracks.len() as isize - 1) as usize;
    }

    pub fn selected_track(&self) -> Option<&TrackDescriptor> {
        self.tracks.get(self.selected_index)
    }

    fn is_playing(&self, track: &TrackDescriptor) -> bool {
        self.playing.as_deref() == Some(track.identity_key().as_str())
    }

    /// Update scroll offset to keep selection visible
    fn update_scroll(&mut self, visible_height: usize) {
        if visible_height == 0 {
            return;
        }

        if self.selected_index >= self.scroll_offset + visible_height {
            self.scroll_offset = self.selected_index - visible_height + 1;
        }

        if self.selected_index < self.scroll_offset {
            self.scroll_offset = self.selected_index;
        }
    }
}

/// Widget for displaying the track library
pub struct LibraryWidget<'a> {
    state: &'a mut LibraryState,
    theme: &'a Theme,
    is_focused: bool,
}

impl<'a> LibraryWidget<'a> {
    pub fn new(state: &'a mut LibraryState, theme: &'a Theme) -> Self {
        Self {
            state,
            theme,
            is_focused: true,
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.is_focused = focused;
        self
    }

    fn format_bpm(bpm: Option<f32>) -> String {
        bpm.map(|b| format!("{:6.1}", b))
            .unwrap_or_else(|| "  --- ".to_string())
    }

    fn format_key(key: Option<&str>) -> String {
        key.map(|k| format!("{:>3}", k))
            .unwrap_or_else(|| "  ?".to_string())
    }

    fn format_time(track: &TrackDescriptor) -> String {
        format!("{:>5}", format_duration(track.duration()))
    }
}

impl Widget for LibraryWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = format!(" LIBRARY [{}] ", self.state.tracks.len());

        let border_style = if self.is_focused {
            self.theme.border_active()
        } else {
            self.theme.border()
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(Span::styled(title, self.theme.title()));

        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height < 2 || inner.width < 30 {
            return;
        }

        // Reserve space for scrollbar
        let list_width = inner.width.saturating_sub(1);

        let header = Line::from(vec![
            Span::styled("  KEY", self.theme.dim()),
            Span::styled("    BPM", self.theme.dim()),
            Span::styled("  TIME", self.theme.dim()),
            Span::styled("  TRACK", self.theme.dim()),
        ]);
        Paragraph::new(header).render(Rect::new(inner.x, inner.y, list_width, 1), buf);

        let list_height = (inner.height - 1) as usize;
        let list_area = Rect::new(inner.x, inner.y + 1, list_width, inner.height - 1);

        self.state.update_scroll(list_height);
        let scroll_offset = self.state.scroll_offset;

        for (i, track) in self
            .state
            .tracks
            .iter()
            .enumerate()
            .skip(scroll_offset)
            .take(list_height)
        {
            let y = list_area.y + (i - scroll_offset) as u16;
            let is_selected = i == self.state.selected_index;
            let is_playing = self.state.is_playing(track);

            let marker = if is_playing {
                "▶ "
            } else if self.state.queue_cursor == Some(i) {
                "» "
            } else {
                "  "
            };

            // MARKER(2) + KEY(3) + space(1) + BPM(6) + space(1) + TIME(5) + space(2) = 20
            let name_width = (list_width as usize).saturating_sub(20);
            let name: String = track.display_name().chars().take(name_width).collect();

            let style = if is_selected {
                self.theme.highlight()
            } else if is_playing {
                self.theme.playing()
            } else {
                self.theme.normal()
            };

            let line = Line::from(vec![
                Span::styled(marker, style),
                Span::styled(Self::format_key(track.key()), style),
                Span::styled(" ", style),
                Span::styled(Self::format_bpm(track.bpm()), style),
                Span::styled(" ", style),
                Span::styled(Self::format_time(track), style),
                Span::styled("  ", style),
                Span::styled(name, style),
            ]);

            Paragraph::new(line).render(Rect::new(list_area.x, y, list_width, 1), buf);
        }

        if self.state.tracks.len() > list_height {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight);
            let mut scrollbar_state =
                ScrollbarState::new(self.state.tracks.len()).position(scroll_offset);

            let scrollbar_area =
                Rect::new(inner.x + inner.width - 1, inner.y + 1, 1, inner.height - 1);
            StatefulWidget::render(scrollbar, scrollbar_area, buf, &mut scrollbar_state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_track(name: &str) -> TrackDescriptor {
        TrackDescriptor::from_file_name(&format!("Artist - {} - 8A - 128.mp3", name)).unwrap()
    }

    #[test]
    fn test_library_state_navigation() {
        let mut state = LibraryState::new();
        state.set_tracks(vec![
            make_track("Track 1"),
            make_track("Track 2"),
            make_track("Track 3"),
        ]);

        assert_eq!(state.selected_index, 0);

        state.select_next();
        assert_eq!(state.selected_index, 1);

        state.select_next();
        assert_eq!(state.selected_index, 2);

        // Should not go past end
        state.select_next();
        assert_eq!(state.selected_index, 2);

        state.select_prev();
        assert_eq!(state.selected_index, 1);

        state.select_first();
        assert_eq!(state.selected_index, 0);

        state.select_last();
        assert_eq!(state.selected_index, 2);

        state.page(-10);
        assert_eq!(state.selected_index, 0);
        state.page(10);
        assert_eq!(state.selected_index, 2);
    }

    #[test]
    fn test_selected_track() {
        let mut state = LibraryState::new();
        assert!(state.selected_track().is_none());
        state.set_tracks(vec![make_track("Track 1"), make_track("Track 2")]);

        assert_eq!(state.selected_track().unwrap().title(), "Track 1");
        state.select_next();
        assert_eq!(state.selected_track().unwrap().title(), "Track 2");
    }

    #[test]
    fn test_playing_row_is_marked() {
        let theme = Theme::default();
        let mut state = LibraryState::new();
        let tracks = vec![make_track("One"), make_track("Two")];
        state.playing = Some(tracks[1].identity_key());
        state.set_tracks(tracks);

        let area = Rect::new(0, 0, 50, 6);
        let mut buf = Buffer::empty(area);
        LibraryWidget::new(&mut state, &theme).render(area, &mut buf);

        // Border, header, then rows
        assert_eq!(buf[(1, 3)].symbol(), "▶");
        assert_eq!(buf[(1, 2)].symbol(), " ");
    }

    #[test]
    fn test_format_bpm() {
        assert_eq!(LibraryWidget::format_bpm(Some(128.0)), " 128.0");
        assert_eq!(LibraryWidget::format_bpm(Some(99.5)), "  99.5");
        assert_eq!(LibraryWidget::format_bpm(None), "  --- ");
    }

    #[test]
    fn test_format_key() {
        assert_eq!(LibraryWidget::format_key(Some("8A")), " 8A");
        assert_eq!(LibraryWidget::format_key(None), "  ?");
    }
}
