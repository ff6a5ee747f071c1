//! Viewer: explicit application state tying the core together.
//!
//! This module organizes the viewer into focused submodules:
//! - `browse` - tree refresh, folder selection, playlist flattening, search
//! - `display` - decoding for display, previews, precaching, memory readings
//!
//! Everything the playback thread needs (tree snapshot, media cache, size
//! budget, event emitter, presenter) lives in a shared [`Context`]; the
//! Viewer owns the rest. There are no globals: a front-end creates a Viewer,
//! subscribes to its [`EventBus`] and drives it.

mod browse;
mod display;

use log::{info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::config::Settings;
use crate::core::event_bus::{EventBus, EventEmitter};
use crate::core::list_player::ListPlayer;
use crate::core::media_cache::MediaCache;
use crate::core::viewer_events::{DataChangedEvent, FrameShownEvent, StatusEvent};
use crate::entities::indexer::DirectoryIndexer;
use crate::entities::media::MediaDescriptor;
use crate::entities::preview::Preview;
use crate::entities::tree::TreeIndex;

/// Previews shown for a folder entry
pub const PREVIEW_AMOUNT: usize = 4;

/// What a playlist entry resolves to
#[derive(Debug, Clone)]
pub enum Shown {
    Media(Arc<MediaDescriptor>),
    /// Folder entry (search results can contain folders)
    Previews(Vec<Preview<Arc<MediaDescriptor>>>),
}

/// Front-end hook receiving every displayed entry: (index, key, content)
pub type Presenter = Box<dyn FnMut(usize, &str, &Shown) + Send>;

/// State shared with the playback thread
pub(crate) struct Context {
    tree: RwLock<Arc<TreeIndex>>,
    cache: MediaCache,
    max_file_size_mb: AtomicU64,
    emitter: EventEmitter,
    presenter: Mutex<Option<Presenter>>,
}

impl Context {
    fn tree(&self) -> Arc<TreeIndex> {
        Arc::clone(&*self.tree.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn max_file_size_mb(&self) -> u64 {
        self.max_file_size_mb.load(Ordering::Relaxed)
    }

    /// Frame observer body: resolve, decode, present. Returns displayed.
    fn show(&self, index: usize, keys: &Arc<[String]>) -> bool {
        let key = &keys[index];
        let result = self.display(key);

        let error = match &result {
            Ok(shown) => {
                if let Some(presenter) = self.presenter.lock().unwrap_or_else(|e| e.into_inner()).as_mut() {
                    presenter(index, key, shown);
                }
                None
            }
            Err(e) => {
                warn!("{} failed: {}", key, e);
                self.emitter.emit(StatusEvent::new(format!("{} failed: {}", key, e)));
                Some(e.to_string())
            }
        };

        self.emitter.emit(FrameShownEvent {
            index,
            total: keys.len(),
            key: key.clone(),
            error,
        });
        result.is_ok()
    }
}

pub struct Viewer {
    settings: Settings,
    root: Option<PathBuf>,
    selected: Option<String>,
    indexer: DirectoryIndexer,
    player: ListPlayer,
    bus: EventBus,
    ctx: Arc<Context>,
}

impl Viewer {
    pub fn new(settings: Settings) -> Self {
        let settings = settings.sanitized();
        let bus = EventBus::new();
        let ctx = Arc::new(Context {
            tree: RwLock::new(Arc::new(TreeIndex::new())),
            cache: MediaCache::new(),
            max_file_size_mb: AtomicU64::new(settings.max_file_size_mb),
            emitter: bus.emitter(),
            presenter: Mutex::new(None),
        });

        let mut player = ListPlayer::new();
        let observer_ctx = Arc::clone(&ctx);
        player.set_on_frame(move |index, keys, _should_block| observer_ctx.show(index, keys));
        let emitter = bus.emitter();
        player.set_on_data_changed(move |len| emitter.emit(DataChangedEvent { len }));

        let mut viewer = Self {
            settings: Settings::default(),
            root: None,
            selected: None,
            indexer: DirectoryIndexer::new(),
            player,
            bus,
            ctx,
        };
        viewer.set_settings(settings);
        info!("Viewer initialized");
        viewer
    }

    /// Apply new settings to the cache budget, slideshow and precache hook
    pub fn set_settings(&mut self, settings: Settings) {
        let settings = settings.sanitized();
        self.ctx
            .max_file_size_mb
            .store(settings.max_file_size_mb, Ordering::Relaxed);
        self.player.set_interval(settings.interval());

        let ctx = Arc::clone(&self.ctx);
        let workers = settings.max_workers;
        self.player
            .set_on_play(move |keys| display::precache_detached(&ctx, keys, workers));
        self.settings = settings;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Register the front-end hook for displayed entries
    pub fn set_presenter(&self, presenter: impl FnMut(usize, &str, &Shown) + Send + 'static) {
        *self.ctx.presenter.lock().unwrap_or_else(|e| e.into_inner()) = Some(Box::new(presenter));
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn player(&self) -> &ListPlayer {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut ListPlayer {
        &mut self.player
    }

    pub fn cache(&self) -> &MediaCache {
        &self.ctx.cache
    }

    pub fn root(&self) -> Option<&PathBuf> {
        self.root.as_ref()
    }

    /// Currently selected folder id
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Snapshot of the current index
    pub fn tree(&self) -> Arc<TreeIndex> {
        self.ctx.tree()
    }

    fn set_status(&self, message: impl Into<String>) {
        self.bus.emit(StatusEvent::new(message));
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.player.stop();
        self.ctx.cache.cancel_batch();
    }
}
