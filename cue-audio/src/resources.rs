//! Resource lifecycle management
//!
//! Every binary blob handed to the media backend is registered here. The
//! registry reference-counts handles, caps how many may be outstanding and
//! reclaims unreferenced ones by eviction or TTL sweep.

use crate::error::PreviewError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default maximum number of outstanding handles
pub const DEFAULT_MAX_HANDLES: usize = 50;

/// Share of evictable handles reclaimed when the cap is hit
const EVICTION_SHARE: f64 = 0.25;

/// Audio extensions accepted as resources
const AUDIO_TYPES: [&str; 7] = ["mp3", "flac", "wav", "aiff", "aac", "ogg", "m4a"];
/// Image extensions accepted as resources
const IMAGE_TYPES: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Registry shared by every component that touches resources
pub type SharedRegistry = Arc<Mutex<ResourceRegistry>>;

/// Identifier of a registered resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blob:{}", self.0)
    }
}

/// Type tag of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Audio,
    Image,
}

impl ResourceKind {
    /// Classify a file extension against the allow-list
    pub fn from_extension(extension: &str) -> Option<Self> {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        if AUDIO_TYPES.contains(&ext.as_str()) {
            Some(ResourceKind::Audio)
        } else if IMAGE_TYPES.contains(&ext.as_str()) {
            Some(ResourceKind::Image)
        } else {
            None
        }
    }
}

/// Raw bytes plus the extension they were read with
#[derive(Debug, Clone)]
pub struct Blob {
    bytes: Arc<[u8]>,
    extension: String,
}

impl Blob {
    pub fn new(bytes: impl Into<Arc<[u8]>>, extension: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            extension: extension.into().to_ascii_lowercase(),
        }
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Creation options for a handle
#[derive(Debug, Clone, Copy)]
pub struct ResourceOptions {
    /// Age after which an unreferenced handle is swept
    pub ttl: Duration,
    /// Revoke as soon as the last reference is released
    pub immediate: bool,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            immediate: false,
        }
    }
}

#[derive(Debug)]
struct ResourceHandle {
    blob: Blob,
    kind: ResourceKind,
    created_at: Instant,
    ref_count: u32,
    ttl: Duration,
    immediate: bool,
}

/// Counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub live: usize,
    pub created: u64,
    pub revoked: u64,
    pub evicted: u64,
}

/// Owner of all resource handles
#[derive(Debug)]
pub struct ResourceRegistry {
    // Ids are allocated monotonically, so key order is creation order
    handles: BTreeMap<ResourceId, ResourceHandle>,
    next_id: u64,
    max_handles: usize,
    stats: RegistryStats,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HANDLES)
    }
}

impl ResourceRegistry {
    pub fn new(max_handles: usize) -> Self {
        Self {
            handles: BTreeMap::new(),
            next_id: 1,
            max_handles: max_handles.max(1),
            stats: RegistryStats::default(),
        }
    }

    /// Wrap in the shared form used by the player
    pub fn shared(max_handles: usize) -> SharedRegistry {
        Arc::new(Mutex::new(Self::new(max_handles)))
    }

    /// Register a blob and return its handle id
    ///
    /// When the cap is reached the oldest quarter of unreferenced handles is
    /// evicted first. Fails if the blob type is not allow-listed or nothing
    /// could be evicted.
    pub fn create(
        &mut self,
        blob: Blob,
        options: ResourceOptions,
        now: Instant,
    ) -> Result<ResourceId, PreviewError> {
        let kind = ResourceKind::from_extension(blob.extension())
            .ok_or_else(|| PreviewError::UnsupportedType(blob.extension().to_string()))?;

        if self.handles.len() >= self.max_handles {
            let evicted = self.evict();
            if self.handles.len() >= self.max_handles {
                warn!(
                    "Resource cap {} reached with every handle referenced",
                    self.max_handles
                );
                return Err(PreviewError::ResourceExhausted {
                    cap: self.max_handles,
                });
            }
            info!("Evicted {} idle resources at cap {}", evicted, self.max_handles);
        }

        let id = ResourceId(self.next_id);
        self.next_id += 1;
        self.handles.insert(
            id,
            ResourceHandle {
                blob,
                kind,
                created_at: now,
                ref_count: 0,
                ttl: options.ttl,
                immediate: options.immediate,
            },
        );
        self.stats.created += 1;
        debug!("Created {} ({:?})", id, kind);
        Ok(id)
    }

    /// Take a reference; false for unknown handles
    pub fn add_ref(&mut self, id: ResourceId) -> bool {
        match self.handles.get_mut(&id) {
            Some(handle) => {
                handle.ref_count += 1;
                true
            }
            None => false,
        }
    }

    /// Drop a reference; never goes below zero
    pub fn release(&mut self, id: ResourceId) {
        let Some(handle) = self.handles.get_mut(&id) else {
            return;
        };
        handle.ref_count = handle.ref_count.saturating_sub(1);
        if handle.ref_count == 0 && handle.immediate {
            self.revoke(id);
        }
    }

    /// Remove a handle and free its blob
    ///
    /// Unknown ids are a no-op. Handles with live references are kept.
    pub fn revoke(&mut self, id: ResourceId) -> bool {
        match self.handles.get(&id) {
            None => false,
            Some(handle) if handle.ref_count > 0 => {
                warn!("Refusing to revoke {} with {} references", id, handle.ref_count);
                false
            }
            Some(_) => {
                self.handles.remove(&id);
                self.stats.revoked += 1;
                debug!("Revoked {}", id);
                true
            }
        }
    }

    /// Revoke unreferenced handles older than their ttl
    pub fn sweep(&mut self, now: Instant) -> usize {
        let expired: Vec<ResourceId> = self
            .handles
            .iter()
            .filter(|(_, h)| {
                h.ref_count == 0 && now.saturating_duration_since(h.created_at) >= h.ttl
            })
            .map(|(id, _)| *id)
            .collect();

        let count = expired.iter().filter(|id| self.revoke(**id)).count();
        if count > 0 {
            debug!("Swept {} expired resources", count);
        }
        count
    }

    /// Revoke the oldest quarter (at least one) of unreferenced handles
    fn evict(&mut self) -> usize {
        let mut idle: Vec<(Instant, ResourceId)> = self
            .handles
            .iter()
            .filter(|(_, h)| h.ref_count == 0)
            .map(|(id, h)| (h.created_at, *id))
            .collect();
        if idle.is_empty() {
            return 0;
        }
        idle.sort();

        let quota = ((idle.len() as f64 * EVICTION_SHARE).ceil() as usize).max(1);
        let evicted = idle
            .into_iter()
            .take(quota)
            .filter(|(_, id)| self.revoke(*id))
            .count();
        self.stats.evicted += evicted as u64;
        evicted
    }

    pub fn blob(&self, id: ResourceId) -> Option<&Blob> {
        self.handles.get(&id).map(|h| &h.blob)
    }

    pub fn kind(&self, id: ResourceId) -> Option<ResourceKind> {
        self.handles.get(&id).map(|h| h.kind)
    }

    pub fn ref_count(&self, id: ResourceId) -> Option<u32> {
        self.handles.get(&id).map(|h| h.ref_count)
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.handles.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn max_handles(&self) -> usize {
        self.max_handles
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            live: self.handles.len(),
            ..self.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio() -> Blob {
        Blob::new(vec![0u8; 16], "mp3")
    }

    fn opts() -> ResourceOptions {
        ResourceOptions::default()
    }

    #[test]
    fn test_unsupported_type_rejected() {
        let mut registry = ResourceRegistry::default();
        let err = registry
            .create(Blob::new(vec![1u8], "exe"), opts(), Instant::now())
            .unwrap_err();
        assert_eq!(err, PreviewError::UnsupportedType("exe".into()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_image_types_allowed() {
        assert_eq!(ResourceKind::from_extension("PNG"), Some(ResourceKind::Image));
        assert_eq!(ResourceKind::from_extension(".flac"), Some(ResourceKind::Audio));
        assert_eq!(ResourceKind::from_extension("txt"), None);
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let mut registry = ResourceRegistry::default();
        let id = registry.create(audio(), opts(), Instant::now()).unwrap();
        assert!(registry.revoke(id));
        assert!(!registry.revoke(id));
        assert!(!registry.revoke(ResourceId(999)));
        assert_eq!(registry.stats().revoked, 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ref_count_never_negative() {
        let mut registry = ResourceRegistry::default();
        let id = registry.create(audio(), opts(), Instant::now()).unwrap();
        registry.release(id);
        registry.release(id);
        assert_eq!(registry.ref_count(id), Some(0));
        assert!(registry.add_ref(id));
        assert_eq!(registry.ref_count(id), Some(1));
    }

    #[test]
    fn test_referenced_handle_is_never_revoked() {
        let mut registry = ResourceRegistry::default();
        let start = Instant::now();
        let id = registry
            .create(
                audio(),
                ResourceOptions {
                    ttl: Duration::from_secs(1),
                    immediate: false,
                },
                start,
            )
            .unwrap();
        registry.add_ref(id);

        assert!(!registry.revoke(id));
        assert_eq!(registry.sweep(start + Duration::from_secs(60)), 0);
        assert!(registry.contains(id));

        registry.release(id);
        assert_eq!(registry.sweep(start + Duration::from_secs(60)), 1);
        assert!(!registry.contains(id));
    }

    #[test]
    fn test_immediate_revokes_on_last_release() {
        let mut registry = ResourceRegistry::default();
        let id = registry
            .create(
                audio(),
                ResourceOptions {
                    immediate: true,
                    ..opts()
                },
                Instant::now(),
            )
            .unwrap();
        registry.add_ref(id);
        registry.add_ref(id);
        registry.release(id);
        assert!(registry.contains(id));
        registry.release(id);
        assert!(!registry.contains(id));
    }

    #[test]
    fn test_sweep_respects_ttl() {
        let mut registry = ResourceRegistry::default();
        let start = Instant::now();
        let short = ResourceOptions {
            ttl: Duration::from_secs(10),
            immediate: false,
        };
        let long = ResourceOptions {
            ttl: Duration::from_secs(100),
            immediate: false,
        };
        let a = registry.create(audio(), short, start).unwrap();
        let b = registry.create(audio(), long, start).unwrap();

        assert_eq!(registry.sweep(start + Duration::from_secs(5)), 0);
        assert_eq!(registry.sweep(start + Duration::from_secs(30)), 1);
        assert!(!registry.contains(a));
        assert!(registry.contains(b));
    }

    #[test]
    fn test_cap_evicts_oldest_quarter() {
        let mut registry = ResourceRegistry::new(50);
        let start = Instant::now();
        let ids: Vec<ResourceId> = (0..50)
            .map(|i| {
                registry
                    .create(audio(), opts(), start + Duration::from_millis(i))
                    .unwrap()
            })
            .collect();

        let newest = registry
            .create(audio(), opts(), start + Duration::from_secs(1))
            .unwrap();

        // ceil(50 * 0.25) = 13 oldest gone
        assert_eq!(registry.len(), 50 - 13 + 1);
        assert!(registry.len() <= 50);
        assert!(ids[..13].iter().all(|id| !registry.contains(*id)));
        assert!(ids[13..].iter().all(|id| registry.contains(*id)));
        assert!(registry.contains(newest));
        assert_eq!(registry.stats().evicted, 13);
    }

    #[test]
    fn test_eviction_skips_referenced() {
        let mut registry = ResourceRegistry::new(4);
        let start = Instant::now();
        let ids: Vec<ResourceId> = (0..4)
            .map(|_| registry.create(audio(), opts(), start).unwrap())
            .collect();
        registry.add_ref(ids[0]);
        registry.add_ref(ids[1]);

        registry.create(audio(), opts(), start).unwrap();
        assert!(registry.contains(ids[0]));
        assert!(registry.contains(ids[1]));
        assert!(!registry.contains(ids[2]));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_exhausted_when_everything_referenced() {
        let mut registry = ResourceRegistry::new(2);
        let now = Instant::now();
        for _ in 0..2 {
            let id = registry.create(audio(), opts(), now).unwrap();
            registry.add_ref(id);
        }
        let err = registry.create(audio(), opts(), now).unwrap_err();
        assert_eq!(err, PreviewError::ResourceExhausted { cap: 2 });
        assert_eq!(registry.len(), 2);
    }
}
