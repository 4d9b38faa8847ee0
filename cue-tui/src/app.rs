//! Application state

use crate::theme::{Theme, CRT_AMBER, CRT_GREEN, CYBERPUNK};
use crate::widgets::LibraryState;
use cue_audio::{NoticeLevel, PlayerEvent, QueueStatus};
use std::time::{Duration, Instant};

/// How long a status message stays visible
pub const MESSAGE_TTL: Duration = Duration::from_secs(4);

/// Message type for colored status messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageType {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl From<NoticeLevel> for MessageType {
    fn from(level: NoticeLevel) -> Self {
        match level {
            NoticeLevel::Info => MessageType::Info,
            NoticeLevel::Warning => MessageType::Warning,
            NoticeLevel::Error => MessageType::Error,
        }
    }
}

/// Application state
pub struct AppState {
    pub library: LibraryState,
    /// Last queue snapshot from the player
    pub queue: Option<QueueStatus>,

    // UI state
    pub message: Option<String>,
    pub message_type: MessageType,
    message_at: Option<Instant>,
    pub show_help: bool,
    pub help_scroll: u16,

    pub theme: Theme,
    pub frame_count: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            library: LibraryState::default(),
            queue: None,
            message: None,
            message_type: MessageType::Info,
            message_at: None,
            show_help: false,
            help_scroll: 0,
            theme: Theme::default(),
            frame_count: 0,
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update state from a player event
    pub fn handle_player_event(&mut self, event: PlayerEvent, now: Instant) {
        match event {
            PlayerEvent::TrackChanged(track) => {
                self.library.playing = Some(track.identity_key());
                self.set_success(format!("Now playing: {}", track.display_name()), now);
            }
            PlayerEvent::QueueStateChanged(status) => {
                self.library.queue_cursor = if status.active { status.cursor } else { None };
                self.queue = Some(status);
            }
            PlayerEvent::PlaybackEnded(track) => {
                if self.library.playing.as_deref() == Some(track.identity_key().as_str()) {
                    self.library.playing = None;
                }
            }
            PlayerEvent::QueueCompleted => {
                self.library.queue_cursor = None;
                self.set_message("Queue finished", now);
            }
            PlayerEvent::Notice(notice) => {
                self.message_type = notice.level.into();
                self.message = Some(notice.message);
                self.message_at = Some(now);
            }
        }
    }

    /// Per-frame housekeeping
    pub fn tick(&mut self, now: Instant) {
        self.frame_count = self.frame_count.wrapping_add(1);
        if let Some(at) = self.message_at {
            if now.saturating_duration_since(at) >= MESSAGE_TTL {
                self.clear_message();
            }
        }
    }

    /// Toggle help display
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
        if self.show_help {
            self.help_scroll = 0;
        }
    }

    pub fn help_scroll_up(&mut self) {
        self.help_scroll = self.help_scroll.saturating_sub(3);
    }

    pub fn help_scroll_down(&mut self) {
        self.help_scroll = self.help_scroll.saturating_add(3);
    }

    /// Set theme by name
    pub fn set_theme(&mut self, name: &str, now: Instant) {
        match Theme::by_name(&name.to_lowercase()) {
            Some(theme) => {
                self.theme = theme;
                self.set_success(format!("Theme set to: {}", self.theme.name), now);
            }
            None => self.set_error(format!("Unknown theme: {}. Use green/amber/cyber", name), now),
        }
    }

    /// Cycle green -> amber -> cyberpunk
    pub fn cycle_theme(&mut self, now: Instant) {
        let next = match self.theme.name {
            name if name == CRT_GREEN.name => CRT_AMBER,
            name if name == CRT_AMBER.name => CYBERPUNK,
            _ => CRT_GREEN,
        };
        self.set_theme(next.name, now);
    }

    pub fn clear_message(&mut self) {
        self.message = None;
        self.message_type = MessageType::Info;
        self.message_at = None;
    }

    fn show(&mut self, msg: String, message_type: MessageType, now: Instant) {
        self.message = Some(msg);
        self.message_type = message_type;
        self.message_at = Some(now);
    }

    pub fn set_message(&mut self, msg: impl Into<String>, now: Instant) {
        self.show(msg.into(), MessageType::Info, now);
    }

    pub fn set_success(&mut self, msg: impl Into<String>, now: Instant) {
        self.show(msg.into(), MessageType::Success, now);
    }

    pub fn set_warning(&mut self, msg: impl Into<String>, now: Instant) {
        self.show(msg.into(), MessageType::Warning, now);
    }

    pub fn set_error(&mut self, msg: impl Into<String>, now: Instant) {
        self.show(msg.into(), MessageType::Error, now);
    }
}

/// Main application
pub struct App {
    pub state: AppState,
    pub should_quit: bool,
}

impl App {
    pub fn new() -> Self {
        Self {
            state: AppState::new(),
            should_quit: false,
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
