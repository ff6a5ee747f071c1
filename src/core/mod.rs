//! Core engine modules - cache, events, playback, workers
//!
//! These modules form the viewer engine, independent of any front-end.

pub mod anim_player;
pub mod event_bus;
pub mod list_player;
pub mod media_cache;
pub mod memory;
pub mod player;
pub mod viewer_events;
pub mod workers;

// Re-exports for convenience
pub use anim_player::AnimationPlayer;
pub use event_bus::EventBus;
pub use list_player::ListPlayer;
pub use media_cache::{BatchProgress, CacheStats, MediaCache};
pub use memory::MemoryUsage;
pub use player::{Action, PlaybackEngine, PlaybackStatus};
pub use workers::{INDEXER_THREADS, build_pool};
