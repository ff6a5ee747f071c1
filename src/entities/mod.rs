//! Entities module - the directory index and decoded media
//!
//! - `storage` lists, classifies and opens files
//! - `indexer` walks a root directory into a `tree::TreeIndex`
//! - `media` decodes stills and animations into descriptors
//! - `preview` samples folder contents for overviews

pub mod indexer;
pub mod media;
pub mod preview;
pub mod storage;
pub mod tree;

pub use indexer::DirectoryIndexer;
pub use media::{CacheError, MediaDescriptor, MediaKind};
pub use preview::Preview;
pub use storage::{FsStorage, Storage};
pub use tree::TreeIndex;
