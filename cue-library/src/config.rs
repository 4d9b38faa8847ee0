//! Simple configuration persistence for Cue
//!
//! Stores the library folder and preview engine tuning.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Folder scanned for tracks
    pub library_folder: Option<PathBuf>,
    /// Crossfade length in seconds (clamped by the queue)
    pub crossfade_secs: f32,
    /// Whether queue transitions crossfade
    pub automix: bool,
    /// Maximum outstanding resource handles
    pub max_handles: usize,
    /// Age after which an unreferenced handle is swept
    pub handle_ttl: Duration,
    /// Interval between sweeps
    pub sweep_interval: Duration,
    /// Pause between tearing down one preview and starting the next
    pub settle_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library_folder: None,
            crossfade_secs: 5.0,
            automix: false,
            max_handles: 50,
            handle_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
            settle_delay: Duration::from_millis(50),
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        Self::load_or_default(&Self::config_path())
    }

    /// Load from `path`, warning when an existing file can't be read
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!("Failed to read config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.serialize())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cue")
            .join("config.txt")
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();

            match key.trim() {
                "library_folder" if !value.is_empty() => {
                    config.library_folder = Some(PathBuf::from(value));
                }
                "crossfade_secs" => {
                    if let Some(v) = value.parse::<f32>().ok().filter(|v| v.is_finite()) {
                        config.crossfade_secs = v;
                    }
                }
                "automix" => {
                    if let Ok(v) = value.parse() {
                        config.automix = v;
                    }
                }
                "max_handles" => {
                    if let Some(v) = value.parse().ok().filter(|v| *v > 0) {
                        config.max_handles = v;
                    }
                }
                "handle_ttl_secs" => {
                    if let Ok(v) = value.parse() {
                        config.handle_ttl = Duration::from_secs(v);
                    }
                }
                "sweep_interval_secs" => {
                    if let Some(v) = value.parse().ok().filter(|v| *v > 0) {
                        config.sweep_interval = Duration::from_secs(v);
                    }
                }
                "settle_delay_ms" => {
                    if let Ok(v) = value.parse() {
                        config.settle_delay = Duration::from_millis(v);
                    }
                }
                _ => {} // Ignore unknown keys
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = vec!["# Cue Configuration".to_string()];

        if let Some(ref folder) = self.library_folder {
            lines.push(format!("library_folder={}", folder.display()));
        }
        lines.push(format!("crossfade_secs={}", self.crossfade_secs));
        lines.push(format!("automix={}", self.automix));
        lines.push(format!("max_handles={}", self.max_handles));
        lines.push(format!("handle_ttl_secs={}", self.handle_ttl.as_secs()));
        lines.push(format!("sweep_interval_secs={}", self.sweep_interval.as_secs()));
        lines.push(format!("settle_delay_ms={}", self.settle_delay.as_millis()));

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_config_falls_back_to_default() {
        // A directory exists but can't be read as a file
        let dir = std::env::temp_dir();
        assert!(Config::load_from(&dir).is_err());
        assert_eq!(Config::load_or_default(&dir), Config::default());
        assert_eq!(
            Config::load_or_default(&dir.join("cue-missing-config.txt")),
            Config::default()
        );
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Config::parse(""), Config::default());
    }

    #[test]
    fn test_parse_with_folder() {
        let config = Config::parse("library_folder=/home/user/music");
        assert_eq!(
            config.library_folder,
            Some(PathBuf::from("/home/user/music"))
        );
    }

    #[test]
    fn test_parse_tuning_with_comments() {
        let content = "# Comment\ncrossfade_secs=8.5\nautomix=true\nsettle_delay_ms=20\n# end";
        let config = Config::parse(content);
        assert_eq!(config.crossfade_secs, 8.5);
        assert!(config.automix);
        assert_eq!(config.settle_delay, Duration::from_millis(20));
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = Config::parse("max_handles=0\nautomix=maybe\ncrossfade_secs=fast");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config {
            library_folder: Some(PathBuf::from("/test/path")),
            crossfade_secs: 3.0,
            automix: true,
            max_handles: 12,
            handle_ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(10),
            settle_delay: Duration::from_millis(75),
        };

        assert_eq!(Config::parse(&config.serialize()), config);
    }
}
