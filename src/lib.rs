//! FIC - folder image cycler library
//!
//! Re-exports all modules for use by the binary target.

// Core engine (cache, events, playback, workers)
pub mod core;

// App modules
pub mod app;
pub mod cli;
pub mod config;
pub mod entities;

// Re-export commonly used types
pub use app::{Shown, Viewer};
pub use config::{PathConfig, Settings};
pub use core::event_bus::{BoxedEvent, EventBus, EventEmitter, downcast_event};
pub use core::list_player::ListPlayer;
pub use core::media_cache::MediaCache;
pub use core::player::{Action, PlaybackEngine, PlaybackStatus};
pub use entities::{MediaDescriptor, TreeIndex};
