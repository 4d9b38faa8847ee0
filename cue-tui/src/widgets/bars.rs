//! Frequency bars widget - FFT band visualization

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::Span,
    widgets::{Block, Borders, Widget},
};

/// Characters for vertical bar rendering (8 levels)
pub(crate) const BAR_CHARS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Widget for displaying frequency bands as vertical bars
pub struct BarsWidget<'a> {
    bands: &'a [f32],
    theme: &'a Theme,
    title: &'a str,
    /// False while showing placeholder motion
    live: bool,
}

impl<'a> BarsWidget<'a> {
    pub fn new(bands: &'a [f32], theme: &'a Theme) -> Self {
        Self {
            bands,
            theme,
            title: " SPECTRUM ",
            live: true,
        }
    }

    pub fn title(mut self, title: &'a str) -> Self {
        self.title = title;
        self
    }

    pub fn live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    /// Get full height bar representation, bottom row first
    pub(crate) fn render_bar(magnitude: f32, height: u16) -> Vec<char> {
        let total_levels = (magnitude.clamp(0.0, 1.0) * 8.0 * height as f32) as usize;
        let full_blocks = total_levels / 8;
        let partial = total_levels % 8;

        (0..height as usize)
            .map(|row| {
                if row < full_blocks {
                    '█'
                } else if row == full_blocks && partial > 0 {
                    BAR_CHARS[partial]
                } else {
                    ' '
                }
            })
            .collect()
    }
}

impl Widget for BarsWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border())
            .title(Span::styled(self.title, self.theme.title()));

        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height < 1 || inner.width < 1 || self.bands.is_empty() {
            return;
        }

        let width = inner.width as usize;
        let height = inner.height as usize;
        let band_count = self.bands.len();

        // Two columns per band when there is room
        let bands_to_show = width.min(band_count);
        let band_width = if width >= bands_to_show * 2 { 2 } else { 1 };
        let start_x = width.saturating_sub(bands_to_show * band_width) / 2;

        for band in 0..bands_to_show {
            let band_idx = (band * band_count) / bands_to_show;
            let bar = Self::render_bar(self.bands[band_idx], height as u16);
            let style = if self.live {
                self.theme.spectrum_style(band_idx, band_count)
            } else {
                self.theme.dim()
            };

            let x = inner.x + (start_x + band * band_width) as u16;
            for (row, ch) in bar.iter().enumerate() {
                if *ch == ' ' {
                    continue;
                }
                let y = inner.y + inner.height - 1 - row as u16;
                buf[(x, y)].set_char(*ch).set_style(style);
            }
        }
    }
}
