//! Status bar widget - now playing, queue state and notices

use crate::app::MessageType;
use crate::theme::Theme;
use cue_audio::{PlaybackClock, QueueStatus};
use cue_library::{format_duration, TrackDescriptor};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

/// Widget for the bottom status line
pub struct StatusBarWidget<'a> {
    theme: &'a Theme,
    track: Option<&'a TrackDescriptor>,
    clock: Option<PlaybackClock>,
    paused: bool,
    queue: Option<&'a QueueStatus>,
    message: Option<&'a str>,
    message_type: MessageType,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(theme: &'a Theme) -> Self {
        Self {
            theme,
            track: None,
            clock: None,
            paused: false,
            queue: None,
            message: None,
            message_type: MessageType::Info,
        }
    }

    pub fn now_playing(
        mut self,
        track: Option<&'a TrackDescriptor>,
        clock: Option<PlaybackClock>,
        paused: bool,
    ) -> Self {
        self.track = track;
        self.clock = clock;
        self.paused = paused;
        self
    }

    pub fn queue(mut self, status: Option<&'a QueueStatus>) -> Self {
        self.queue = status;
        self
    }

    pub fn message(mut self, msg: Option<&'a str>, msg_type: MessageType) -> Self {
        self.message = msg;
        self.message_type = msg_type;
        self
    }

    fn transport(&self) -> (&'static str, Style) {
        match (self.track, self.paused) {
            (None, _) => ("STOPPED", self.theme.dim()),
            (Some(_), true) => ("PAUSED", Style::from(self.theme.warning)),
            (Some(_), false) => ("PLAYING", self.theme.highlight()),
        }
    }

    fn queue_label(&self) -> String {
        match self.queue {
            Some(q) if q.active => {
                let position = q.cursor.map_or(0, |c| c + 1);
                let mix = if q.automix {
                    format!(" mix {}s", q.crossfade.as_secs())
                } else {
                    String::new()
                };
                format!("Q {}/{}{}", position, q.len, mix)
            }
            Some(q) if q.automix => format!("mix {}s", q.crossfade.as_secs()),
            _ => String::new(),
        }
    }

    fn elapsed(&self) -> String {
        match self.clock {
            Some(clock) => {
                let position = format_duration(Some(clock.position));
                let position = if position.is_empty() { "0:00".to_string() } else { position };
                match clock.duration {
                    Some(d) => format!("{} / {}", position, format_duration(Some(d))),
                    None => position,
                }
            }
            None => String::new(),
        }
    }
}

impl Widget for StatusBarWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 1 {
            return;
        }

        let chunks = Layout::horizontal([
            Constraint::Length(10), // Transport
            Constraint::Min(20),    // Track or message
            Constraint::Length(16), // Time
            Constraint::Length(16), // Queue
        ])
        .split(area);

        let (transport, transport_style) = self.transport();
        let transport_line = Line::from(vec![
            Span::raw("["),
            Span::styled(transport, transport_style),
            Span::raw("]"),
        ]);
        Paragraph::new(transport_line).render(chunks[0], buf);

        // Notices take precedence over the track name
        let content = if let Some(msg) = self.message {
            let msg_style = match self.message_type {
                MessageType::Info => self.theme.dim(),
                MessageType::Success => Style::from(self.theme.accent),
                MessageType::Warning => Style::default().fg(self.theme.warning),
                MessageType::Error => Style::default().fg(self.theme.danger),
            };
            Line::from(Span::styled(msg, msg_style))
        } else if let Some(track) = self.track {
            Line::from(Span::styled(track.display_name(), self.theme.normal()))
        } else {
            Line::from(Span::styled(
                "Ready. Enter to preview, ? for help",
                self.theme.dim(),
            ))
        };
        Paragraph::new(content).render(chunks[1], buf);

        Paragraph::new(Line::from(Span::styled(self.elapsed(), self.theme.normal())))
            .render(chunks[2], buf);
        Paragraph::new(Line::from(Span::styled(self.queue_label(), self.theme.dim())))
            .render(chunks[3], buf);
    }
}

/// Help overlay widget with scrolling support
pub struct HelpWidget<'a> {
    theme: &'a Theme,
    scroll: u16,
}

impl<'a> HelpWidget<'a> {
    pub fn new(theme: &'a Theme) -> Self {
        Self { theme, scroll: 0 }
    }

    pub fn scroll(mut self, scroll: u16) -> Self {
        self.scroll = scroll;
        self
    }

    pub(crate) fn help_lines() -> Vec<&'static str> {
        vec![
            "╔════════════════════════════════════════════════════════════════╗",
            "║                 CUE - library track preview                    ║",
            "║                  ↑/↓ or j/k to scroll                          ║",
            "╠════════════════════════════════════════════════════════════════╣",
            "║ LIBRARY                                                        ║",
            "║   ↑ / ↓  j / k  Move selection                                 ║",
            "║   PgUp / PgDn   Move selection by a page                       ║",
            "║   g / G         Jump to first / last track                     ║",
            "║   Enter         Preview selected track                         ║",
            "║   Space         Pause / resume                                 ║",
            "║   s             Stop                                           ║",
            "╠────────────────────────────────────────────────────────────────╣",
            "║ QUEUE                                                          ║",
            "║   a             Queue whole library from the selection         ║",
            "║   n / p         Next / previous track                          ║",
            "║   m             Toggle automix (crossfade between tracks)      ║",
            "║   [ / ]         Crossfade length -1s / +1s                     ║",
            "╠────────────────────────────────────────────────────────────────╣",
            "║ WAVEFORM                                                       ║",
            "║   w             Cycle style: trace / progress / dual /         ║",
            "║                 tinted / overview                              ║",
            "║   + / -         Zoom overview in / out                         ║",
            "║   0             Reset zoom                                     ║",
            "║   ← / →         Pan overview                                   ║",
            "╠────────────────────────────────────────────────────────────────╣",
            "║ DISPLAY                                                        ║",
            "║   t             Cycle theme: green / amber / cyber             ║",
            "╠════════════════════════════════════════════════════════════════╣",
            "║               Press Esc or ? to close help                     ║",
            "║                      q to quit                                 ║",
            "╚════════════════════════════════════════════════════════════════╝",
        ]
    }
}

impl Widget for HelpWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Clear background
        for y in area.y..area.y + area.height {
            for x in area.x..area.x + area.width {
                buf[(x, y)].set_char(' ').set_style(self.theme.normal());
            }
        }

        let help_text = Self::help_lines();
        let total_lines = help_text.len() as u16;
        let visible_lines = area.height.min(total_lines);

        let max_scroll = total_lines.saturating_sub(visible_lines);
        let scroll = self.scroll.min(max_scroll);

        let start_x = area.x + area.width.saturating_sub(68) / 2;

        for (i, line) in help_text
            .iter()
            .skip(scroll as usize)
            .take(visible_lines as usize)
            .enumerate()
        {
            let y = area.y + i as u16;

            for (j, ch) in line.chars().enumerate() {
                let x = start_x + j as u16;
                if x >= area.x + area.width {
                    break;
                }

                let style = if matches!(
                    ch,
                    '║' | '╔' | '╗' | '╚' | '╝' | '═' | '╠' | '╣' | '─' | '│'
                ) {
                    self.theme.border()
                } else {
                    self.theme.normal()
                };

                buf[(x, y)].set_char(ch).set_style(style);
            }
        }

        if total_lines > visible_lines {
            let indicator = format!(" [{}/{}] ", scroll + 1, max_scroll + 1);
            let indicator_x = area.x + area.width.saturating_sub(indicator.len() as u16 + 2);
            let indicator_y = area.y + area.height - 1;

            for (i, ch) in indicator.chars().enumerate() {
                let x = indicator_x + i as u16;
                if x < area.x + area.width {
                    buf[(x, indicator_y)]
                        .set_char(ch)
                        .set_style(self.theme.dim());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_queue_label() {
        let theme = Theme::default();
        let status = QueueStatus {
            cursor: Some(1),
            len: 3,
            active: true,
            automix: true,
            crossfade: Duration::from_secs(5),
        };
        let bar = StatusBarWidget::new(&theme).queue(Some(&status));
        assert_eq!(bar.queue_label(), "Q 2/3 mix 5s");

        let idle = QueueStatus {
            active: false,
            automix: false,
            ..status
        };
        let bar = StatusBarWidget::new(&theme).queue(Some(&idle));
        assert_eq!(bar.queue_label(), "");
    }

    #[test]
    fn test_elapsed() {
        let theme = Theme::default();
        let clock = PlaybackClock {
            position: Duration::from_secs(65),
            duration: Some(Duration::from_secs(180)),
        };
        let track = TrackDescriptor::new("A", "B", "A - B.mp3").unwrap();
        let bar = StatusBarWidget::new(&theme).now_playing(Some(&track), Some(clock), false);
        assert_eq!(bar.elapsed(), "1:05 / 3:00");
        assert_eq!(bar.transport().0, "PLAYING");
    }

    #[test]
    fn test_help_lines_are_boxed() {
        for line in HelpWidget::help_lines() {
            assert_eq!(line.chars().count(), 66, "{}", line);
        }
    }
}
