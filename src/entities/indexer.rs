//! Concurrent directory indexer.
//!
//! Depth-first complete, breadth parallel: every directory task classifies its
//! entries, fans out one task per non-empty subdirectory, joins them all and
//! only then finalizes its own child list. The post-order join is what makes
//! pruning transitive: a folder is linked into its parent only once its own
//! subtree is known to hold at least one eligible file.
//!
//! Subdirectories are spawned into a `rayon::scope` on a pool of
//! [`INDEXER_THREADS`] workers built for the walk; the end of the scope is the
//! per-directory join. A parent waiting on its scope runs pending subwalks on
//! its own thread, so a deep tree never exhausts the pool.
//!
//! Each subtree is built in a private [`TreeIndex`] and merged into its
//! parent's under one lock per merge (once per directory, not per file).
//!
//! Child order: files appended in listing order, then surviving directories
//! prepended in reverse listing order, giving `[dirs...][files...]`.

use log::{debug, info, trace};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use super::storage::{EntryKind, FsStorage, Storage, node_id};
use super::tree::{ROOT_ID, TreeIndex};
use crate::core::workers::{INDEXER_THREADS, build_pool};

/// Entries of one directory, split by kind
struct Listing {
    folders: Vec<(String, PathBuf)>,
    files: Vec<(String, PathBuf)>,
}

pub struct DirectoryIndexer<S: Storage = FsStorage> {
    storage: S,
    threads: usize,
    walked: AtomicUsize,
    /// Directory listings in flight, and the most seen at once
    listing: AtomicUsize,
    peak_listing: AtomicUsize,
}

impl DirectoryIndexer<FsStorage> {
    pub fn new() -> Self {
        Self::with_storage(FsStorage)
    }
}

impl Default for DirectoryIndexer<FsStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Storage> DirectoryIndexer<S> {
    pub fn with_storage(storage: S) -> Self {
        Self::with_threads(storage, INDEXER_THREADS)
    }

    /// Custom walk pool size
    pub fn with_threads(storage: S, threads: usize) -> Self {
        Self {
            storage,
            threads: threads.max(1),
            walked: AtomicUsize::new(0),
            listing: AtomicUsize::new(0),
            peak_listing: AtomicUsize::new(0),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Walk `root` and build a fresh index.
    ///
    /// The root directory is always anchored under [`ROOT_ID`], even when it
    /// holds nothing eligible. Returns the index and wall-clock seconds spent.
    pub fn build_index(&self, root: &Path) -> (TreeIndex, f64) {
        let start = Instant::now();
        self.walked.store(0, Ordering::Relaxed);
        self.peak_listing.store(0, Ordering::Relaxed);

        let root_id = node_id(root);
        let mut tree = TreeIndex::new();
        tree.add_entry(ROOT_ID, root_id.clone(), root.to_path_buf(), true);
        let walked = match build_pool("fic-index", self.threads) {
            Some(pool) => pool.install(|| self.walk_directory(&root_id, root)),
            None => self.walk_directory(&root_id, root),
        };
        tree.merge(walked);

        let elapsed = start.elapsed().as_secs_f64();
        info!(
            "Indexed {}: {} nodes, {} dirs walked (peak {} concurrent listings) in {:.3}s",
            root.display(),
            tree.len(),
            self.walked.load(Ordering::Relaxed),
            self.peak_listing.load(Ordering::Relaxed),
            elapsed
        );
        (tree, elapsed)
    }

    /// Index one directory and everything below it.
    fn walk_directory(&self, dir_id: &str, dir: &Path) -> TreeIndex {
        self.walked.fetch_add(1, Ordering::Relaxed);
        let active = self.listing.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_listing.fetch_max(active, Ordering::SeqCst);
        let Listing { folders, files } = self.walk_folder(dir);
        self.listing.fetch_sub(1, Ordering::SeqCst);

        let local = Mutex::new(TreeIndex::new());
        rayon::scope(|s| {
            for (folder_id, folder) in &folders {
                let local = &local;
                s.spawn(move |_| {
                    let sub = self.walk_directory(folder_id, folder);
                    local.lock().unwrap_or_else(|e| e.into_inner()).merge(sub);
                });
            }
        });
        let mut local = local.into_inner().unwrap_or_else(|e| e.into_inner());

        for (id, path) in files {
            local.add_entry(dir_id, id, path, false);
        }
        for (id, path) in folders.into_iter().rev() {
            if local.is_branch(&id) {
                local.add_entry(dir_id, id, path, true);
            } else {
                trace!("Pruned empty folder: {}", path.display());
            }
        }
        local
    }

    /// Classify the immediate entries of `dir`.
    ///
    /// Unlistable directories and entries whose metadata can't be read are
    /// skipped. Symlinks and special files are never eligible; neither are
    /// zero-byte files.
    fn walk_folder(&self, dir: &Path) -> Listing {
        let mut listing = Listing { folders: Vec::new(), files: Vec::new() };

        let items = match self.storage.list(dir) {
            Ok(items) => items,
            Err(e) => {
                debug!("Cannot list {}: {}", dir.display(), e);
                return listing;
            }
        };

        for path in items {
            let kind = match self.storage.classify(&path) {
                Ok(kind) => kind,
                Err(e) => {
                    debug!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            match kind {
                EntryKind::Dir => {
                    let non_empty = self
                        .storage
                        .list(&path)
                        .map(|items| !items.is_empty())
                        .unwrap_or(false);
                    if non_empty {
                        listing.folders.push((node_id(&path), path));
                    }
                }
                EntryKind::File { size } if size > 0 => {
                    listing.files.push((node_id(&path), path));
                }
                EntryKind::File { .. } => trace!("Skipping empty file: {}", path.display()),
                EntryKind::Other => trace!("Skipping non-regular entry: {}", path.display()),
            }
        }
        listing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::storage::MediaStream;
    use std::collections::{HashMap, HashSet};
    use std::fs;
    use std::io;

    /// In-memory storage: directories with ordered children, files with sizes
    #[derive(Default)]
    struct MemStorage {
        dirs: HashMap<PathBuf, Vec<PathBuf>>,
        files: HashMap<PathBuf, u64>,
        broken: HashSet<PathBuf>,
    }

    impl MemStorage {
        fn dir(&mut self, path: &str) -> &mut Self {
            let path = PathBuf::from(path);
            if let Some(parent) = path.parent().filter(|p| self.dirs.contains_key(*p)) {
                let parent = parent.to_path_buf();
                self.dirs.get_mut(&parent).unwrap().push(path.clone());
            }
            self.dirs.entry(path).or_default();
            self
        }

        fn file(&mut self, path: &str, size: u64) -> &mut Self {
            let path = PathBuf::from(path);
            let parent = path.parent().unwrap().to_path_buf();
            self.dirs.get_mut(&parent).unwrap().push(path.clone());
            self.files.insert(path, size);
            self
        }
    }

    impl Storage for MemStorage {
        fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
            if self.broken.contains(dir) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            self.dirs
                .get(dir)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no dir"))
        }

        fn classify(&self, path: &Path) -> io::Result<EntryKind> {
            if self.dirs.contains_key(path) {
                Ok(EntryKind::Dir)
            } else if let Some(size) = self.files.get(path) {
                Ok(EntryKind::File { size: *size })
            } else {
                Err(io::Error::new(io::ErrorKind::NotFound, "gone"))
            }
        }

        fn open(&self, _path: &Path) -> io::Result<Box<dyn MediaStream>> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "no bytes"))
        }
    }

    fn ids(tree: &TreeIndex, id: &str) -> Vec<String> {
        tree.children(id).to_vec()
    }

    #[test]
    fn test_dirs_first_then_files_in_listing_order() {
        let mut mem = MemStorage::default();
        mem.dir("/r")
            .file("/r/b.png", 10)
            .dir("/r/zeta")
            .file("/r/zeta/1.png", 1)
            .file("/r/a.png", 10)
            .dir("/r/alpha")
            .file("/r/alpha/2.png", 1)
            .dir("/r/mid")
            .file("/r/mid/3.png", 1);

        for threads in [1, INDEXER_THREADS] {
            let indexer = DirectoryIndexer::with_threads(&mem, threads);
            let (tree, _) = indexer.build_index(Path::new("/r"));
            assert_eq!(
                ids(&tree, "/r"),
                ["/r/zeta", "/r/alpha", "/r/mid", "/r/b.png", "/r/a.png"]
            );
        }
    }

    #[test]
    fn test_transitive_pruning() {
        let mut mem = MemStorage::default();
        mem.dir("/r")
            .dir("/r/empty")
            .dir("/r/nested")
            .dir("/r/nested/deeper")
            .dir("/r/nested/deeper/void")
            .dir("/r/zero")
            .file("/r/zero/blank.png", 0)
            .dir("/r/keep")
            .dir("/r/keep/inner")
            .file("/r/keep/inner/ok.png", 5);

        let (tree, _) = DirectoryIndexer::with_storage(&mem).build_index(Path::new("/r"));

        assert_eq!(ids(&tree, "/r"), ["/r/keep"]);
        assert_eq!(ids(&tree, "/r/keep"), ["/r/keep/inner"]);
        for pruned in ["/r/empty", "/r/nested", "/r/nested/deeper", "/r/zero"] {
            assert!(!tree.contains(pruned), "{} should be pruned", pruned);
        }
    }

    #[test]
    fn test_unlistable_directory_contributes_nothing() {
        let mut mem = MemStorage::default();
        mem.dir("/r")
            .dir("/r/locked")
            .file("/r/locked/hidden.png", 3)
            .file("/r/ok.png", 3);
        mem.broken.insert(PathBuf::from("/r/locked"));

        let (tree, _) = DirectoryIndexer::with_storage(&mem).build_index(Path::new("/r"));
        assert_eq!(ids(&tree, "/r"), ["/r/ok.png"]);
    }

    #[test]
    fn test_every_node_has_one_parent() {
        let mut mem = MemStorage::default();
        mem.dir("/r");
        for d in 0..20 {
            let dir = format!("/r/d{:02}", d);
            mem.dir(&dir);
            for f in 0..5 {
                mem.file(&format!("{}/f{}.png", dir, f), 1);
            }
        }
        let (tree, _) = DirectoryIndexer::with_threads(&mem, 4).build_index(Path::new("/r"));

        let mut seen = HashSet::new();
        let mut stack = vec![ROOT_ID.to_string()];
        while let Some(id) = stack.pop() {
            for child in tree.children(&id) {
                assert!(seen.insert(child.clone()), "{} reached twice", child);
                assert_eq!(tree.parent(child), Some(id.as_str()));
                stack.push(child.clone());
            }
        }
        assert_eq!(seen.len(), tree.len());
        assert_eq!(seen.len(), 1 + 20 + 100);
    }

    /// (node, children) pairs in depth-first order from the synthetic root
    fn layout(tree: &TreeIndex) -> Vec<(String, Vec<String>)> {
        let mut out = Vec::new();
        let mut stack = vec![ROOT_ID.to_string()];
        while let Some(id) = stack.pop() {
            let children = ids(tree, &id);
            stack.extend(children.iter().rev().cloned());
            out.push((id, children));
        }
        out
    }

    #[test]
    fn test_listing_concurrency_bounded_by_pool() {
        let mut mem = MemStorage::default();
        mem.dir("/r");
        for d in 0..16 {
            let dir = format!("/r/d{:02}", d);
            mem.dir(&dir).dir(&format!("{}/inner", dir));
            mem.file(&format!("{}/inner/x.png", dir), 1);
            mem.file(&format!("{}/y.png", dir), 1);
        }

        let single = DirectoryIndexer::with_threads(&mem, 1);
        let (serial, _) = single.build_index(Path::new("/r"));
        assert_eq!(single.peak_listing.load(Ordering::SeqCst), 1);
        assert_eq!(single.walked.load(Ordering::SeqCst), 1 + 16 * 2);

        let pooled = DirectoryIndexer::with_threads(&mem, 3);
        let (parallel, _) = pooled.build_index(Path::new("/r"));
        let peak = pooled.peak_listing.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak {} listings on 3 threads", peak);
        assert_eq!(pooled.walked.load(Ordering::SeqCst), 1 + 16 * 2);

        assert_eq!(layout(&serial), layout(&parallel));
    }

    #[test]
    fn test_root_always_anchored() {
        let dir = tempfile::tempdir().unwrap();
        let (tree, _) = DirectoryIndexer::new().build_index(dir.path());
        assert_eq!(tree.root(), Some(node_id(dir.path()).as_str()));
        assert!(tree.walk_files(&node_id(dir.path())).is_empty());
    }

    #[test]
    fn test_filesystem_walk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub/empty")).unwrap();
        fs::write(root.join("sub/one.png"), b"1").unwrap();
        fs::write(root.join("two.png"), b"2").unwrap();
        fs::write(root.join("zero.png"), b"").unwrap();

        let (tree, elapsed) = DirectoryIndexer::new().build_index(root);
        assert!(elapsed >= 0.0);

        let root_id = node_id(root);
        let sub_id = node_id(&root.join("sub"));
        assert_eq!(tree.children(&root_id), [sub_id.clone(), node_id(&root.join("two.png"))]);
        assert_eq!(tree.children(&sub_id), [node_id(&root.join("sub/one.png"))]);
    }
}
