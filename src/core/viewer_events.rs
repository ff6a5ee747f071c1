//! Viewer events for the EventBus

use crate::core::media_cache::BatchProgress;

/// Human-readable status line
#[derive(Clone, Debug)]
pub struct StatusEvent {
    pub message: String,
}

impl StatusEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Playlist replaced
#[derive(Clone, Debug)]
pub struct DataChangedEvent {
    pub len: usize,
}

/// Playlist item shown (or failed to show)
#[derive(Clone, Debug)]
pub struct FrameShownEvent {
    pub index: usize,
    pub total: usize,
    pub key: String,
    pub error: Option<String>,
}

/// Batch precache progress
#[derive(Clone, Debug)]
pub struct CacheProgressEvent(pub BatchProgress);

/// Periodic memory reading
#[derive(Clone, Debug)]
pub struct MemoryEvent {
    pub ram_percent: f64,
    pub swap_percent: f64,
    pub pressure: bool,
}

/// Tree rebuilt
#[derive(Clone, Debug)]
pub struct TreeRefreshedEvent {
    pub nodes: usize,
    pub elapsed_secs: f64,
}
