//! Memoizing media cache keyed by URI string.
//!
//! Lookup: a read lock checks the memo map; a hit returns the descriptor, or
//! the memoized failure without decoding again. On a miss the decode runs
//! with no lock held and only the result is written back under the write
//! lock. Two concurrent first lookups of the same URI may both decode (no
//! single-flight); decoding has no side effects and the last write wins.
//!
//! No per-entry eviction: `invalidate()` swaps the whole map.
//!
//! Batch pre-caching runs on a rayon pool sized to the caller's worker
//! count, checks a cooperative cancel flag before every decode and is
//! serialized by its own mutex (one batch at a time).

use log::{debug, info, trace, warn};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::core::workers::build_pool;
use crate::entities::media::{CacheError, MediaDescriptor, decode_media};
use crate::entities::storage::{EntryKind, FsStorage, Storage, node_id};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Memoized lookup result
#[derive(Debug, Clone)]
enum CacheEntry {
    Valid(Arc<MediaDescriptor>),
    Invalid(String),
}

/// Cache statistics for monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    decodes: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of decode attempts actually performed
    pub fn decodes(&self) -> u64 {
        self.decodes.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }

    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Batch pre-caching progress
#[derive(Debug, Clone, PartialEq)]
pub enum BatchProgress {
    Started { total: usize },
    Processed { done: usize, total: usize },
    Finished { done: usize, total: usize, elapsed: Duration },
}

impl std::fmt::Display for BatchProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchProgress::Started { .. } => write!(f, "Caching process started!"),
            BatchProgress::Processed { done, total } => write!(f, "Processing: {}/{}", done, total),
            BatchProgress::Finished { elapsed, .. } => {
                write!(f, "Caching done, took {:.2} seconds", elapsed.as_secs_f64())
            }
        }
    }
}

pub struct MediaCache<S: Storage = FsStorage> {
    storage: S,
    entries: RwLock<HashMap<String, CacheEntry>>,
    stats: CacheStats,
    caching: AtomicBool,
    batch_lock: Mutex<()>,
}

impl MediaCache<FsStorage> {
    pub fn new() -> Self {
        Self::with_storage(FsStorage)
    }
}

impl Default for MediaCache<FsStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Storage> MediaCache<S> {
    pub fn with_storage(storage: S) -> Self {
        Self {
            storage,
            entries: RwLock::new(HashMap::new()),
            stats: CacheStats::default(),
            caching: AtomicBool::new(false),
            batch_lock: Mutex::new(()),
        }
    }

    /// Look up or decode `path`.
    ///
    /// Files larger than `max_file_size_mb` are rejected before any decode.
    /// Every outcome, failures included, is memoized.
    pub fn cache_image(&self, path: &Path, max_file_size_mb: u64) -> Result<Arc<MediaDescriptor>, CacheError> {
        let uri = node_id(path);

        let cached = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&uri)
            .cloned();
        if let Some(entry) = cached {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return match entry {
                CacheEntry::Valid(desc) => Ok(desc),
                CacheEntry::Invalid(reason) => Err(CacheError::InvalidCachedEntry { uri, reason }),
            };
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        let result = self.load(path, max_file_size_mb);
        let entry = match &result {
            Ok(desc) => {
                debug!("Cached {} ({} frame(s), {} KB)", uri, desc.frame_count(), desc.mem() / 1024);
                CacheEntry::Valid(Arc::clone(desc))
            }
            Err(e) => {
                debug!("Cached failure for {}: {}", uri, e);
                CacheEntry::Invalid(e.to_string())
            }
        };
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(uri, entry);
        result
    }

    /// Size gate + decode, no locks held
    fn load(&self, path: &Path, max_file_size_mb: u64) -> Result<Arc<MediaDescriptor>, CacheError> {
        let size = match self.storage.classify(path)? {
            EntryKind::File { size } => size,
            EntryKind::Dir => return Err(CacheError::Decode("is a directory".to_string())),
            EntryKind::Other => return Err(CacheError::Decode("not a regular file".to_string())),
        };
        if size > max_file_size_mb.saturating_mul(BYTES_PER_MB) {
            return Err(CacheError::TooLarge {
                size_mb: size / BYTES_PER_MB,
                limit_mb: max_file_size_mb,
            });
        }

        self.stats.decodes.fetch_add(1, Ordering::Relaxed);
        decode_media(&self.storage, path).map(Arc::new)
    }

    /// Decode a list of files on a pool of `concurrency` threads.
    ///
    /// Blocks until every job finished. Each job checks the cancel flag
    /// before decoding, so a cancelled batch drains without new decodes.
    /// A second call waits for the first to complete.
    pub fn cache_batch<P, F>(&self, paths: &[P], concurrency: usize, max_file_size_mb: u64, on_progress: F)
    where
        P: AsRef<Path> + Sync,
        F: Fn(BatchProgress) + Sync,
    {
        let _batch = self.batch_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.caching.store(true, Ordering::SeqCst);

        let total = paths.len();
        let start = Instant::now();
        let done = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);
        on_progress(BatchProgress::Started { total });

        let job = |path: &P| {
            if !self.caching.load(Ordering::SeqCst) {
                skipped.fetch_add(1, Ordering::Relaxed);
                return;
            }
            let path = path.as_ref();
            if let Err(e) = self.cache_image(path, max_file_size_mb) {
                trace!("Batch skip {}: {}", path.display(), e);
            }
            let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
            on_progress(BatchProgress::Processed { done: finished, total });
        };

        match build_pool("fic-cache", concurrency) {
            Some(pool) => {
                info!("Batch caching {} file(s) with {} worker(s)", total, pool.current_num_threads());
                pool.scope(|s| {
                    for path in paths {
                        let job = &job;
                        s.spawn(move |_| job(path));
                    }
                });
            }
            None => {
                info!("Batch caching {} file(s) on the calling thread", total);
                paths.iter().for_each(job);
            }
        }

        let skipped = skipped.load(Ordering::Relaxed);
        if skipped > 0 {
            info!("Batch caching cancelled, {} file(s) not decoded", skipped);
        }
        self.caching.store(false, Ordering::SeqCst);
        let done = done.load(Ordering::SeqCst);
        let elapsed = start.elapsed();
        info!("Batch caching finished: {}/{} in {:.2}s", done, total, elapsed.as_secs_f64());
        on_progress(BatchProgress::Finished { done, total, elapsed });
    }

    /// Stop admitting batch work and wait for the running batch to drain.
    pub fn cancel_batch(&self) {
        self.caching.store(false, Ordering::SeqCst);
        let _batch = self.batch_lock.lock().unwrap_or_else(|e| e.into_inner());
    }

    pub fn is_caching(&self) -> bool {
        self.caching.load(Ordering::SeqCst)
    }

    /// Drop every memoized entry (folder change, explicit clear)
    pub fn invalidate(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if !entries.is_empty() {
            debug!("Invalidating media cache ({} entries)", entries.len());
        }
        *entries = HashMap::new();
        self.stats.reset();
    }

    /// Is `path` memoized (valid or not)?
    pub fn contains(&self, path: &Path) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&node_id(path))
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Memory held by valid descriptors (bytes)
    pub fn mem(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|entry| match entry {
                CacheEntry::Valid(desc) => desc.mem(),
                CacheEntry::Invalid(_) => 0,
            })
            .sum()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl<S: Storage> Drop for MediaCache<S> {
    fn drop(&mut self) {
        if self.is_caching() {
            warn!("MediaCache dropped while a batch was running");
        }
    }
}
