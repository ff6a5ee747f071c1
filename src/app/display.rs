//! Decoding for display, folder previews, precaching, memory readings.

use log::{error, info, warn};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use super::{Context, PREVIEW_AMOUNT, Shown, Viewer};
use crate::core::media_cache::BatchProgress;
use crate::core::memory::MemoryUsage;
use crate::core::viewer_events::{CacheProgressEvent, MemoryEvent, StatusEvent};
use crate::entities::media::{CacheError, MediaDescriptor};
use crate::entities::preview::{Preview, gather_previews};
use crate::entities::tree::TreeIndex;

impl Context {
    /// Resolve a playlist key: folders yield previews, files their media
    pub(super) fn display(&self, key: &str) -> Result<Shown, CacheError> {
        let tree = self.tree();
        let Some(location) = tree.location(key) else {
            return Err(CacheError::Io(io::Error::new(io::ErrorKind::NotFound, "does not exist")));
        };
        if tree.is_branch(key) {
            return Ok(Shown::Previews(self.previews(&tree, tree.children(key), PREVIEW_AMOUNT)));
        }
        self.cache
            .cache_image(location, self.max_file_size_mb())
            .map(Shown::Media)
    }

    fn previews(&self, tree: &TreeIndex, items: &[String], amount: usize) -> Vec<Preview<Arc<MediaDescriptor>>> {
        let max_mb = self.max_file_size_mb();
        let previews = gather_previews(items, amount, |_, id| {
            if tree.is_branch(id) {
                return None;
            }
            let location = tree.location(id)?;
            self.cache.cache_image(location, max_mb).ok()
        });
        self.emitter.emit(StatusEvent::new("Previews finished Generating."));
        previews
    }

    /// Locations for playlist keys; keys missing from the index are dropped
    fn locations(&self, keys: &[String]) -> Vec<PathBuf> {
        let tree = self.tree();
        keys.iter()
            .filter_map(|key| tree.location(key).map(|p| p.to_path_buf()))
            .collect()
    }

    fn precache(&self, keys: &[String], workers: usize) {
        let paths = self.locations(keys);
        let emitter = self.emitter.clone();
        self.cache
            .cache_batch(&paths, workers, self.max_file_size_mb(), move |progress: BatchProgress| {
                emitter.emit(StatusEvent::new(progress.to_string()));
                emitter.emit(CacheProgressEvent(progress));
            });
    }
}

/// Precache `keys` on a background thread (fired when playback starts)
pub(super) fn precache_detached(ctx: &Arc<Context>, keys: &Arc<[String]>, workers: usize) {
    let ctx = Arc::clone(ctx);
    let keys = Arc::clone(keys);
    let spawned = std::thread::Builder::new()
        .name("fic-precache".into())
        .spawn(move || ctx.precache(&keys, workers));
    if let Err(e) = spawned {
        error!("Failed to spawn precache thread: {}", e);
    }
}

impl Viewer {
    /// Decode `key` for display (folders yield previews)
    pub fn display(&self, key: &str) -> Result<Shown, CacheError> {
        self.ctx.display(key)
    }

    /// Up to `amount` previews sampled from `folder`'s children
    pub fn gather_previews(&self, folder: &str, amount: usize) -> Vec<Preview<Arc<MediaDescriptor>>> {
        let tree = self.tree();
        self.ctx.previews(&tree, tree.children(folder), amount)
    }

    /// Decode the whole playlist with the configured worker count (blocking)
    pub fn precache(&self) {
        info!("Precaching {} item(s)", self.player.len());
        self.ctx.precache(&self.player.list(), self.settings.max_workers);
    }

    /// Same as [`Viewer::precache`] on a background thread
    pub fn precache_in_background(&self) {
        precache_detached(&self.ctx, &self.player.list(), self.settings.max_workers);
    }

    /// Stop admitting precache work and wait for the running batch
    pub fn cancel_precache(&self) {
        self.ctx.cache.cancel_batch();
    }

    pub fn is_caching(&self) -> bool {
        self.ctx.cache.is_caching()
    }

    /// Read memory usage, emit it and flag pressure
    pub fn refresh_memory_usage(&self) -> Option<MemoryUsage> {
        let Some(usage) = MemoryUsage::query() else {
            self.set_status("Failed to get Memory Info");
            return None;
        };
        let pressure = usage.under_pressure();
        if pressure {
            warn!("Memory pressure: {}", usage);
        }
        self.bus.emit(MemoryEvent {
            ram_percent: usage.ram_percent(),
            swap_percent: usage.swap_percent(),
            pressure,
        });
        Some(usage)
    }
}
