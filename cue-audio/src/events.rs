//! Notifications from the player to the front-end

use crate::queue::QueueStatus;
use cue_library::TrackDescriptor;
use std::fmt;

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Short message for the status line
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Events emitted by `PreviewPlayer`
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// A track became the authoritative preview
    TrackChanged(TrackDescriptor),
    QueueStateChanged(QueueStatus),
    /// A track played to its end
    PlaybackEnded(TrackDescriptor),
    QueueCompleted,
    Notice(Notice),
}
