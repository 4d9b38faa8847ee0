//! Waveform panel - time-domain traces and the zoomable full-track overview

use super::bars::{BarsWidget, BAR_CHARS};
use crate::theme::Theme;
use crate::viewport::OverviewViewport;
use crate::visualizer::WaveformStyle;
use cue_analysis::{FrequencyBand, OverviewProfile};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

/// Lag of the simulated right channel, in samples
const STEREO_LAG: usize = 32;
/// Level of the simulated right channel relative to the left
const STEREO_SPREAD: f32 = 0.85;

/// Waveform panel in one of the `WaveformStyle`s
pub struct WaveformWidget<'a> {
    theme: &'a Theme,
    style: WaveformStyle,
    viewport: &'a OverviewViewport,
    /// Mono time-domain window (-1.0 - 1.0)
    samples: &'a [f32],
    peak: f32,
    dominant: FrequencyBand,
    /// Playhead position (0.0 - 1.0), if the duration is known
    progress: Option<f64>,
    overview: Option<&'a OverviewProfile>,
}

impl<'a> WaveformWidget<'a> {
    pub fn new(theme: &'a Theme, style: WaveformStyle, viewport: &'a OverviewViewport) -> Self {
        Self {
            theme,
            style,
            viewport,
            samples: &[],
            peak: 0.0,
            dominant: FrequencyBand::default(),
            progress: None,
            overview: None,
        }
    }

    pub fn samples(mut self, samples: &'a [f32], peak: f32) -> Self {
        self.samples = samples;
        self.peak = peak;
        self
    }

    pub fn dominant(mut self, band: FrequencyBand) -> Self {
        self.dominant = band;
        self
    }

    pub fn progress(mut self, progress: Option<f64>) -> Self {
        self.progress = progress;
        self
    }

    pub fn overview(mut self, overview: Option<&'a OverviewProfile>) -> Self {
        self.overview = overview;
        self
    }

    fn title(&self) -> String {
        match self.style {
            WaveformStyle::Overview => {
                format!(" WAVEFORM [{} x{:.1}] ", self.style.name(), self.viewport.zoom())
            }
            style => format!(" WAVEFORM [{}] ", style.name()),
        }
    }

    /// Mean of the samples falling into one column
    fn column_mean(samples: &[f32], column: usize, width: usize) -> f32 {
        let (start, end) = Self::column_span(samples.len(), column, width);
        if start >= end {
            return 0.0;
        }
        samples[start..end].iter().sum::<f32>() / (end - start) as f32
    }

    /// RMS of the samples falling into one column
    fn column_rms(samples: &[f32], column: usize, width: usize) -> f32 {
        let (start, end) = Self::column_span(samples.len(), column, width);
        if start >= end {
            return 0.0;
        }
        let sum: f32 = samples[start..end].iter().map(|s| s * s).sum();
        (sum / (end - start) as f32).sqrt()
    }

    fn column_span(len: usize, column: usize, width: usize) -> (usize, usize) {
        let per_col = (len / width.max(1)).max(1);
        let start = column * per_col;
        (start.min(len), ((column + 1) * per_col).min(len))
    }

    /// Classic oscilloscope trace across `area`
    fn render_trace(&self, samples: &[f32], area: Rect, style: Style, buf: &mut Buffer) {
        let width = area.width as usize;
        let height = area.height as usize;
        if width == 0 || height == 0 {
            return;
        }

        let mid_y = height / 2;
        for x in 0..area.width {
            buf[(area.x + x, area.y + mid_y as u16)]
                .set_char('─')
                .set_style(self.theme.dim());
        }

        if samples.is_empty() {
            return;
        }

        for x in 0..width {
            let normalized = Self::column_mean(samples, x, width).clamp(-1.0, 1.0);
            let y_offset = (normalized * (mid_y as f32 - 0.5).max(0.0)) as i32;
            let y = (mid_y as i32 - y_offset).clamp(0, height as i32 - 1) as u16;

            let ch = if normalized.abs() > 0.7 {
                '█'
            } else if normalized.abs() > 0.3 {
                '▓'
            } else if normalized.abs() > 0.1 {
                '░'
            } else {
                '·'
            };
            buf[(area.x + x as u16, area.y + y)]
                .set_char(ch)
                .set_style(style);
        }
    }

    fn render_dual(&self, area: Rect, buf: &mut Buffer) {
        let top = Rect {
            height: area.height / 2,
            ..area
        };
        let bottom = Rect {
            y: area.y + top.height,
            height: area.height - top.height,
            ..area
        };

        // Right channel is the left one slightly delayed and attenuated
        let right: Vec<f32> = (0..self.samples.len())
            .map(|i| self.samples[i.saturating_sub(STEREO_LAG)] * STEREO_SPREAD)
            .collect();

        self.render_trace(self.samples, top, Style::default().fg(self.theme.low), buf);
        self.render_trace(&right, bottom, Style::default().fg(self.theme.high), buf);
    }

    /// Mirrored amplitude segments, tinted by level and dominant band
    fn render_tinted(&self, area: Rect, buf: &mut Buffer) {
        let width = area.width as usize;
        let half = (area.height / 2).max(1);
        let mid_y = area.y + area.height / 2;
        let gain = if self.peak > 0.0 { 1.0 / self.peak } else { 1.0 };

        for x in 0..width {
            let level = (Self::column_rms(self.samples, x, width) * gain).clamp(0.0, 1.0);
            let style = if level > 0.75 {
                self.theme.meter_style(level)
            } else {
                self.theme.band_style(self.dominant)
            };

            let bar = BarsWidget::render_bar(level, half);
            for (row, ch) in bar.iter().enumerate() {
                if *ch == ' ' {
                    break;
                }
                let px = area.x + x as u16;
                let up = mid_y.saturating_sub(row as u16 + 1);
                if up >= area.y {
                    buf[(px, up)].set_char(*ch).set_style(style);
                }
                let down = mid_y + row as u16;
                if down < area.y + area.height {
                    buf[(px, down)].set_char('█').set_style(style);
                }
            }
        }
    }

    /// Whole track as bars, played part highlighted
    fn render_progress_bars(&self, overview: &OverviewProfile, area: Rect, buf: &mut Buffer) {
        let width = area.width as usize;
        let playhead = self.progress.map(|p| (p * width as f64) as usize);

        for x in 0..width {
            let position = x as f64 / width as f64;
            let is_playhead = playhead == Some(x);
            let is_played = playhead.map_or(false, |p| x < p);
            let style = if is_playhead {
                Style::default().fg(self.theme.highlight)
            } else {
                self.theme.waveform_style(!is_played)
            };

            let bar = BarsWidget::render_bar(overview.amplitude_at(position), area.height);
            for (row, ch) in bar.iter().enumerate() {
                let y = area.y + area.height - 1 - row as u16;
                let ch = if is_playhead { '│' } else { *ch };
                if ch != ' ' {
                    buf[(area.x + x as u16, y)].set_char(ch).set_style(style);
                }
            }
        }
    }

    /// Compact full-track strip with brackets around the zoom window
    fn overview_strip(&self, overview: &OverviewProfile, width: usize) -> Line<'a> {
        let compact_chars = [' ', '▁', '▂', '▃', '▄'];
        let playhead = self.progress.map(|p| (p * width as f64) as usize);
        let (start, end) = self.viewport.window();
        let start_pos = (start * width as f64) as usize;
        let end_pos = (end * width as f64) as usize;
        let zoomed = self.viewport.zoom() > 1.0;

        let spans = (0..width)
            .map(|i| {
                if playhead == Some(i) {
                    return Span::styled("│", self.theme.highlight());
                }
                if zoomed && i == start_pos {
                    return Span::styled("[", self.theme.highlight());
                }
                if zoomed && i + 1 == end_pos {
                    return Span::styled("]", self.theme.highlight());
                }

                let amplitude = overview.amplitude_at(i as f64 / width as f64);
                let ch = compact_chars[((amplitude.clamp(0.0, 1.0) * 4.0) as usize).min(4)];
                let style = if playhead.map_or(false, |p| i < p) {
                    Style::default().fg(self.theme.accent)
                } else if i >= start_pos && i < end_pos {
                    self.theme.normal()
                } else {
                    self.theme.dim()
                };
                Span::styled(ch.to_string(), style)
            })
            .collect::<Vec<_>>();

        Line::from(spans)
    }

    /// Zoom window over the overview with the playhead marked
    fn detail_row(&self, overview: &OverviewProfile, width: u16) -> Line<'a> {
        let playhead = self
            .progress
            .and_then(|p| self.viewport.column_of(p, width));

        let spans = (0..width)
            .map(|i| {
                if playhead == Some(i) {
                    return Span::styled("│", self.theme.highlight());
                }
                let position = self.viewport.position_at(i, width);
                let ch = BAR_CHARS[((overview.amplitude_at(position).clamp(0.0, 1.0) * 8.0)
                    as usize)
                    .min(8)];
                let is_played = self.progress.map_or(false, |p| position < p);
                Span::styled(ch.to_string(), self.theme.waveform_style(!is_played))
            })
            .collect::<Vec<_>>();

        Line::from(spans)
    }

    fn render_overview(&self, overview: &OverviewProfile, area: Rect, buf: &mut Buffer) {
        let strip = self.overview_strip(overview, area.width as usize);
        Paragraph::new(strip).render(Rect { height: 1, ..area }, buf);

        for row in 1..area.height {
            let line = self.detail_row(overview, area.width);
            Paragraph::new(line).render(
                Rect {
                    y: area.y + row,
                    height: 1,
                    ..area
                },
                buf,
            );
        }
    }

    fn render_empty(&self, area: Rect, buf: &mut Buffer) {
        let line = Line::from(Span::styled(
            "─".repeat(area.width as usize),
            self.theme.dim(),
        ));
        Paragraph::new(line).render(
            Rect {
                y: area.y + area.height / 2,
                height: 1,
                ..area
            },
            buf,
        );
    }
}

impl Widget for WaveformWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border())
            .title(Span::styled(self.title(), self.theme.title()));

        let inner = block.inner(area);
        block.render(area, buf);

        if inner.width < 2 || inner.height < 1 {
            return;
        }

        match (self.style, self.overview) {
            (WaveformStyle::Trace, _) => {
                self.render_trace(self.samples, inner, Style::default().fg(self.theme.accent), buf)
            }
            (WaveformStyle::DualChannel, _) => self.render_dual(inner, buf),
            (WaveformStyle::Tinted, _) => self.render_tinted(inner, buf),
            (WaveformStyle::ProgressBars, Some(overview)) => {
                self.render_progress_bars(overview, inner, buf)
            }
            (WaveformStyle::Overview, Some(overview)) => self.render_overview(overview, inner, buf),
            (WaveformStyle::ProgressBars | WaveformStyle::Overview, None) => {
                self.render_empty(inner, buf)
            }
        }
    }
}
