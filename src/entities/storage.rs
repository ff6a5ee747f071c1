//! Storage capability consumed by the indexer and the media cache.
//!
//! The indexer only needs to list a directory and classify its entries; the
//! cache additionally opens byte streams. Both go through [`Storage`] so tests
//! can inject unreadable directories or count opens without touching disk.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::{Path, PathBuf};

/// Classification of a single directory entry (symlinks are never followed)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file with its size in bytes
    File { size: u64 },
    /// Directory (may still be empty)
    Dir,
    /// Symlink, device, socket, fifo...
    Other,
}

/// Readable + seekable byte stream handed to decoders
pub trait MediaStream: Read + Seek + Send {}

impl<T: Read + Seek + Send> MediaStream for T {}

/// Hierarchical storage the core walks and reads from.
pub trait Storage: Send + Sync {
    /// Immediate children of `dir`, in listing order.
    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// Classify `path` without following symbolic links.
    fn classify(&self, path: &Path) -> io::Result<EntryKind>;

    /// Open a fresh byte stream positioned at the start of `path`.
    fn open(&self, path: &Path) -> io::Result<Box<dyn MediaStream>>;
}

impl<T: Storage + ?Sized> Storage for &T {
    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        (**self).list(dir)
    }

    fn classify(&self, path: &Path) -> io::Result<EntryKind> {
        (**self).classify(path)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn MediaStream>> {
        (**self).open(path)
    }
}

impl<T: Storage + ?Sized> Storage for std::sync::Arc<T> {
    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        (**self).list(dir)
    }

    fn classify(&self, path: &Path) -> io::Result<EntryKind> {
        (**self).classify(path)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn MediaStream>> {
        (**self).open(path)
    }
}

/// Local filesystem storage.
///
/// Listing is sorted by file name: `read_dir` order is platform dependent and
/// playlist order has to be reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut items = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect::<Vec<_>>();
        items.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(items)
    }

    fn classify(&self, path: &Path) -> io::Result<EntryKind> {
        let meta = std::fs::symlink_metadata(path)?;
        let ft = meta.file_type();
        Ok(if ft.is_file() {
            EntryKind::File { size: meta.len() }
        } else if ft.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::Other
        })
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn MediaStream>> {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

/// Node id used by the index and the player for a location.
pub fn node_id(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
