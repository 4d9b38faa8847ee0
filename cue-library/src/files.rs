//! Name-indexed collection of local audio files and track resolution
//!
//! Scans directories for audio files and resolves a `TrackDescriptor` to the
//! file that actually backs it, tolerating renamed or re-tagged files.

use crate::track::{base_name, TrackDescriptor, NAME_SEPARATOR};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Audio extensions accepted by the library
pub const AUDIO_EXTENSIONS: [&str; 7] = ["mp3", "flac", "wav", "aiff", "aac", "ogg", "m4a"];

/// Number of candidate names included in a `NotFound` error
const CANDIDATE_SAMPLE: usize = 5;

/// Errors that can occur while resolving a track to a file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No file found for \"{name}\" (available: {})", .candidates.join(", "))]
    NotFound {
        name: String,
        candidates: Vec<String>,
    },
}

/// Where the bytes of a local file live
#[derive(Debug, Clone)]
pub enum FileSource {
    /// A file on disk, read on demand
    Disk(PathBuf),
    /// Bytes already in memory
    Memory(Arc<[u8]>),
}

/// A locally available playable file
#[derive(Debug, Clone)]
pub struct LocalFile {
    name: String,
    source: FileSource,
}

impl LocalFile {
    /// Reference a file on disk
    pub fn on_disk(path: PathBuf) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_string();
        Some(Self {
            name,
            source: FileSource::Disk(path),
        })
    }

    /// Wrap in-memory bytes under a file name
    pub fn in_memory(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Memory(bytes.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Lowercase extension, if any
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    /// Read the file contents
    pub fn read(&self) -> io::Result<Arc<[u8]>> {
        match &self.source {
            FileSource::Disk(path) => Ok(std::fs::read(path)?.into()),
            FileSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Configuration for a directory scan
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Directory to scan
    pub directory: PathBuf,
    /// File extensions to include
    pub extensions: Vec<String>,
    /// Whether to scan subdirectories recursively
    pub recursive: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::new(),
            extensions: AUDIO_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            recursive: true,
        }
    }
}

/// Local files indexed by file name
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    files: BTreeMap<String, LocalFile>,
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from a directory scan
    pub fn scan(config: &ScanConfig) -> Self {
        let mut index = Self::new();
        for path in collect_files(&config.directory, &config.extensions, config.recursive) {
            if let Some(file) = LocalFile::on_disk(path) {
                index.insert(file);
            }
        }
        debug!(
            "Indexed {} files from {}",
            index.len(),
            config.directory.display()
        );
        index
    }

    /// Add a file; a later file with the same name replaces the earlier one
    pub fn insert(&mut self, file: LocalFile) {
        if let Some(previous) = self.files.insert(file.name.clone(), file) {
            warn!("Duplicate file name in library: {}", previous.name);
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&LocalFile> {
        self.files.get(name)
    }

    /// File names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(|k| k.as_str())
    }

    /// Ingest every indexed file as a track, skipping names that fail validation
    pub fn tracks(&self) -> Vec<TrackDescriptor> {
        self.names()
            .filter_map(|name| match TrackDescriptor::from_file_name(name) {
                Ok(track) => Some(track),
                Err(e) => {
                    warn!("Skipping {}: {}", name, e);
                    None
                }
            })
            .collect()
    }

    /// Resolve a track to a local file
    ///
    /// Tries an exact file name match, then in order: exact base name,
    /// artist/title halves matched exactly, and a candidate containing both
    /// halves anywhere in its base name. The first strategy to match wins.
    pub fn resolve(&self, track: &TrackDescriptor) -> Result<&LocalFile, ResolveError> {
        let name = track.source_name();
        if let Some(file) = self.files.get(name) {
            return Ok(file);
        }

        let wanted_base = base_name(name);
        if let Some(file) = self.files.values().find(|f| base_name(&f.name) == wanted_base) {
            debug!("Resolved {} by base name -> {}", name, file.name);
            return Ok(file);
        }

        if let Some((artist, title)) = halves(track) {
            let exact = self.files.values().find(|f| {
                split_halves(base_name(&f.name))
                    .is_some_and(|(a, t)| a == artist && t == title)
            });
            if let Some(file) = exact {
                debug!("Resolved {} by artist/title -> {}", name, file.name);
                return Ok(file);
            }

            let artist_lower = artist.to_lowercase();
            let title_lower = title.to_lowercase();
            let contained = self.files.values().find(|f| {
                let candidate = base_name(&f.name).to_lowercase();
                candidate.contains(&artist_lower) && candidate.contains(&title_lower)
            });
            if let Some(file) = contained {
                debug!("Resolved {} by substring -> {}", name, file.name);
                return Ok(file);
            }
        }

        Err(ResolveError::NotFound {
            name: name.to_string(),
            candidates: self
                .names()
                .take(CANDIDATE_SAMPLE)
                .map(str::to_string)
                .collect(),
        })
    }
}

impl FromIterator<LocalFile> for FileIndex {
    fn from_iter<I: IntoIterator<Item = LocalFile>>(iter: I) -> Self {
        let mut index = Self::new();
        for file in iter {
            index.insert(file);
        }
        index
    }
}

/// Artist/title halves for a track: from the descriptor when it has an
/// artist, otherwise from its source name
fn halves(track: &TrackDescriptor) -> Option<(String, String)> {
    if !track.artist().is_empty() {
        return Some((track.artist().to_string(), track.title().to_string()));
    }
    split_halves(base_name(track.source_name())).map(|(a, t)| (a.to_string(), t.to_string()))
}

/// Split a base name into its first two `Artist - Title` parts
fn split_halves(base: &str) -> Option<(&str, &str)> {
    let mut parts = base.split(NAME_SEPARATOR);
    let artist = parts.next()?.trim();
    let title = parts.next()?.trim();
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some((artist, title))
}

/// Recursively collect audio files in a directory
fn collect_files(dir: &Path, extensions: &[String], recursive: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("Cannot read {}: {}", dir.display(), e);
            return files;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_file() {
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
                    files.push(path);
                }
            }
        } else if path.is_dir() && recursive {
            files.extend(collect_files(&path, extensions, recursive));
        }
    }

    // Sort by filename for consistent ordering
    files.sort();
    files
}
