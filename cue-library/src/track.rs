//! Track descriptors - validated once at the ingestion boundary
//!
//! Everything downstream of ingestion consumes `TrackDescriptor` and never
//! re-validates it.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Separator used in canonical library file names
pub const NAME_SEPARATOR: &str = " - ";

/// Errors that can occur while building a track descriptor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    #[error("Track title is empty")]
    EmptyTitle,
    #[error("Track source name is empty")]
    EmptySource,
    #[error("Invalid Camelot key: {0}")]
    InvalidKey(String),
    #[error("Invalid BPM: {0}")]
    InvalidBpm(String),
}

/// Immutable description of a library track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackDescriptor {
    artist: String,
    title: String,
    /// File name the track was ingested from (used for resolution)
    source_name: String,
    duration: Option<Duration>,
    /// Camelot notation, e.g. "8A"
    key: Option<String>,
    bpm: Option<f32>,
}

impl TrackDescriptor {
    /// Create a descriptor with the required fields
    pub fn new(
        artist: impl Into<String>,
        title: impl Into<String>,
        source_name: impl Into<String>,
    ) -> Result<Self, TrackError> {
        let artist = artist.into().trim().to_string();
        let title = title.into().trim().to_string();
        let source_name = source_name.into().trim().to_string();

        if title.is_empty() {
            return Err(TrackError::EmptyTitle);
        }
        if source_name.is_empty() {
            return Err(TrackError::EmptySource);
        }

        Ok(Self {
            artist,
            title,
            source_name,
            duration: None,
            key: None,
            bpm: None,
        })
    }

    /// Attach a known duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Attach a Camelot key (validated)
    pub fn with_key(mut self, key: &str) -> Result<Self, TrackError> {
        let key = key.trim();
        if !is_camelot_key(key) {
            return Err(TrackError::InvalidKey(key.to_string()));
        }
        self.key = Some(key.to_string());
        Ok(self)
    }

    /// Attach a BPM value (validated)
    pub fn with_bpm(mut self, bpm: f32) -> Result<Self, TrackError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(TrackError::InvalidBpm(bpm.to_string()));
        }
        self.bpm = Some(bpm);
        Ok(self)
    }

    /// Ingest a track from a library file name
    ///
    /// Canonical names follow `Artist - Title - Key - BPM.ext`. Names that do
    /// not match keep the whole base name as the title.
    pub fn from_file_name(file_name: &str) -> Result<Self, TrackError> {
        let base = base_name(file_name);

        if let Some((artist, title, key, bpm)) = parse_canonical(base) {
            return Self::new(artist, title, file_name)?
                .with_key(key)?
                .with_bpm(bpm);
        }

        Self::new("", base, file_name)
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn bpm(&self) -> Option<f32> {
        self.bpm
    }

    /// Human readable "Artist - Title" (or just the title)
    pub fn display_name(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{}{}{}", self.artist, NAME_SEPARATOR, self.title)
        }
    }

    /// Stable identity used for caching per-track data
    pub fn identity_key(&self) -> String {
        format!("{}|{}|{}", self.artist, self.title, self.source_name)
    }
}

/// Check whether a file name is already in canonical `Artist - Title - Key - BPM` form
pub fn is_canonical_name(file_name: &str) -> bool {
    parse_canonical(base_name(file_name)).is_some()
}

/// Validate Camelot notation: one or two digits followed by A or B
pub fn is_camelot_key(key: &str) -> bool {
    let Some(letter) = key.chars().last() else {
        return false;
    };
    let digits = &key[..key.len() - letter.len_utf8()];
    matches!(letter, 'A' | 'B')
        && (1..=2).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
}

/// Format a duration as `M:SS` (empty for unknown or zero)
pub fn format_duration(duration: Option<Duration>) -> String {
    match duration {
        Some(d) if d.as_secs() > 0 => {
            let secs = d.as_secs();
            format!("{}:{:02}", secs / 60, secs % 60)
        }
        _ => String::new(),
    }
}

/// File name without its extension
pub fn base_name(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
}

/// Split `Artist - Title - Key - BPM`, validating key and numeric BPM
fn parse_canonical(base: &str) -> Option<(&str, String, &str, f32)> {
    let parts: Vec<&str> = base.split(NAME_SEPARATOR).collect();
    if parts.len() < 4 {
        return None;
    }

    let key = parts[parts.len() - 2].trim();
    let bpm_raw = parts[parts.len() - 1].trim();
    if !is_camelot_key(key) {
        return None;
    }

    let bpm_clean: String = bpm_raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let bpm = bpm_clean.parse::<f32>().ok().filter(|b| *b > 0.0)?;

    // Titles may themselves contain the separator
    let title = parts[1..parts.len() - 2].join(NAME_SEPARATOR);

    Some((parts[0].trim(), title.trim().to_string(), key, bpm))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_name() {
        let track = TrackDescriptor::from_file_name("Bicep - Glue - 4A - 130.mp3").unwrap();
        assert_eq!(track.artist(), "Bicep");
        assert_eq!(track.title(), "Glue");
        assert_eq!(track.key(), Some("4A"));
        assert_eq!(track.bpm(), Some(130.0));
        assert_eq!(track.source_name(), "Bicep - Glue - 4A - 130.mp3");
    }

    #[test]
    fn test_parse_title_with_separator() {
        let track =
            TrackDescriptor::from_file_name("Artist - Song - Extended Mix - 12B - 124.flac")
                .unwrap();
        assert_eq!(track.title(), "Song - Extended Mix");
        assert_eq!(track.key(), Some("12B"));
    }

    #[test]
    fn test_non_canonical_falls_back_to_title() {
        let track = TrackDescriptor::from_file_name("random_recording.wav").unwrap();
        assert_eq!(track.artist(), "");
        assert_eq!(track.title(), "random_recording");
        assert!(track.key().is_none());
        assert!(!is_canonical_name("random_recording.wav"));
    }

    #[test]
    fn test_invalid_key_is_not_canonical() {
        assert!(!is_canonical_name("A - B - 13C - 120.mp3"));
        assert!(is_canonical_name("A - B - 11A - 120 BPM.mp3"));
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(
            TrackDescriptor::new("a", "  ", "x.mp3").unwrap_err(),
            TrackError::EmptyTitle
        );
        assert_eq!(
            TrackDescriptor::new("a", "t", "").unwrap_err(),
            TrackError::EmptySource
        );
        let track = TrackDescriptor::new("a", "t", "x.mp3").unwrap();
        assert!(track.clone().with_key("8C").is_err());
        assert!(track.with_bpm(-1.0).is_err());
    }

    #[test]
    fn test_camelot_keys() {
        assert!(is_camelot_key("8A"));
        assert!(is_camelot_key("12B"));
        assert!(!is_camelot_key("123A"));
        assert!(!is_camelot_key("A"));
        assert!(!is_camelot_key(""));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Some(Duration::from_secs(185))), "3:05");
        assert_eq!(format_duration(Some(Duration::ZERO)), "");
        assert_eq!(format_duration(None), "");
    }

    #[test]
    fn test_display_and_identity() {
        let track = TrackDescriptor::new("Artist", "Title", "f.mp3").unwrap();
        assert_eq!(track.display_name(), "Artist - Title");
        assert_eq!(track.identity_key(), "Artist|Title|f.mp3");
    }
}
