//! Track library for Cue - descriptors, file resolution, decoding, preferences

mod config;
mod files;
mod loader;
mod prefs;
mod track;

pub use config::Config;
pub use files::{FileIndex, FileSource, LocalFile, ResolveError, ScanConfig, AUDIO_EXTENSIONS};
pub use loader::{DecodedAudio, LoadError, TrackLoader};
pub use prefs::{MemoryPrefs, PrefStore, PrefsError, SqlitePrefs};
pub use track::{
    base_name, format_duration, is_camelot_key, is_canonical_name, TrackDescriptor, TrackError,
};
