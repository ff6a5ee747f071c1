//! In-memory hierarchical index of a walked directory tree.
//!
//! Structure: two maps keyed by node id (the path string of the entry)
//! - `children`: node id -> ordered child ids (only directories have entries)
//! - `locations`: node id -> resolved path
//!
//! The synthetic [`ROOT_ID`] anchors the top level; its only child is the
//! indexed root directory. Built from scratch by the indexer and replaced
//! wholesale on every re-index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Id of the synthetic node anchoring the top level
pub const ROOT_ID: &str = "";

/// Minimum query length before [`TreeIndex::search`] returns anything
pub const MIN_SEARCH_LEN: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    children: HashMap<String, Vec<String>>,
    locations: HashMap<String, PathBuf>,
    parents: HashMap<String, String>,
}

impl TreeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` under `parent`. Prepending is how directories end up ahead of
    /// files in a parent's list.
    pub(crate) fn add_entry(&mut self, parent: &str, id: String, location: PathBuf, prepend: bool) {
        let list = self.children.entry(parent.to_string()).or_default();
        if prepend {
            list.insert(0, id.clone());
        } else {
            list.push(id.clone());
        }
        self.parents.insert(id.clone(), parent.to_string());
        self.locations.insert(id, location);
    }

    /// Absorb a finished subtree. Keys never collide: every directory is
    /// walked exactly once.
    pub(crate) fn merge(&mut self, other: TreeIndex) {
        self.children.extend(other.children);
        self.locations.extend(other.locations);
        self.parents.extend(other.parents);
    }

    /// The indexed root directory id, if any
    pub fn root(&self) -> Option<&str> {
        self.children(ROOT_ID).first().map(String::as_str)
    }

    /// Ordered children of `id` (empty for files and unknown ids)
    pub fn children(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn location(&self, id: &str) -> Option<&Path> {
        self.locations.get(id).map(PathBuf::as_path)
    }

    /// Parent id; the root directory's parent is [`ROOT_ID`]
    pub fn parent(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(String::as_str)
    }

    /// A node is a branch when it has at least one child
    pub fn is_branch(&self, id: &str) -> bool {
        !self.children(id).is_empty()
    }

    /// Display name (last path component)
    pub fn name(&self, id: &str) -> Option<String> {
        self.location(id)
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.locations.contains_key(id)
    }

    /// Number of indexed nodes (files and directories)
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Count of (folders, files) directly under `id`
    pub fn counts(&self, id: &str) -> (usize, usize) {
        self.children(id)
            .iter()
            .fold((0, 0), |(folders, files), child| {
                if self.is_branch(child) {
                    (folders + 1, files)
                } else {
                    (folders, files + 1)
                }
            })
    }

    /// All leaves below `folder`, depth first in child order.
    pub fn walk_files(&self, folder: &str) -> Vec<String> {
        let mut out = Vec::with_capacity(self.children(folder).len());
        self.walk_into(folder, &mut out);
        out
    }

    fn walk_into(&self, folder: &str, out: &mut Vec<String>) {
        for child in self.children(folder) {
            if self.is_branch(child) {
                self.walk_into(child, out);
            } else {
                out.push(child.clone());
            }
        }
    }

    /// Flatten `folder` into a playlist.
    ///
    /// With `include_subfolders` child folders are expanded in place, otherwise
    /// they are skipped. Returns the playlist and the seek offset for a player
    /// whose cursor was at `cursor`: the expanded sizes of the subfolders
    /// sitting before that position.
    pub fn playlist(&self, folder: &str, include_subfolders: bool, cursor: usize) -> (Vec<String>, usize) {
        let mut list = Vec::with_capacity(self.children(folder).len());
        let mut offset = 0;

        for (pos, child) in self.children(folder).iter().enumerate() {
            if self.is_branch(child) {
                if include_subfolders {
                    let sub = self.walk_files(child);
                    if cursor > pos {
                        offset += sub.len();
                    }
                    list.extend(sub);
                }
                continue;
            }
            list.push(child.clone());
        }

        (list, offset)
    }

    /// Ids whose name contains `query`, sorted by id.
    /// Queries shorter than [`MIN_SEARCH_LEN`] match nothing.
    pub fn search(&self, query: &str) -> Vec<String> {
        if query.chars().count() < MIN_SEARCH_LEN {
            return Vec::new();
        }
        let mut hits: Vec<String> = self
            .locations
            .iter()
            .filter(|(_, loc)| {
                loc.file_name()
                    .map(|n| n.to_string_lossy().contains(query))
                    .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();
        hits.sort();
        hits
    }

    /// Parent chain of `id`, nearest first, ending at the root directory.
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if parent == ROOT_ID {
                break;
            }
            chain.push(parent.to_string());
            current = parent;
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(tree: &mut TreeIndex, parent: &str, id: &str) {
        tree.add_entry(parent, id.to_string(), PathBuf::from(id), false);
    }

    /// /r
    /// ├── /r/a
    /// │   ├── /r/a/1.png
    /// │   └── /r/a/2.png
    /// ├── /r/b
    /// │   └── /r/b/3.png
    /// └── /r/x.png
    fn sample() -> TreeIndex {
        let mut tree = TreeIndex::new();
        add(&mut tree, ROOT_ID, "/r");
        add(&mut tree, "/r", "/r/a");
        add(&mut tree, "/r", "/r/b");
        add(&mut tree, "/r", "/r/x.png");
        add(&mut tree, "/r/a", "/r/a/1.png");
        add(&mut tree, "/r/a", "/r/a/2.png");
        add(&mut tree, "/r/b", "/r/b/3.png");
        tree
    }

    #[test]
    fn test_prepend_and_append() {
        let mut tree = TreeIndex::new();
        add(&mut tree, "p", "f1");
        add(&mut tree, "p", "f2");
        tree.add_entry("p", "d2".into(), PathBuf::from("d2"), true);
        tree.add_entry("p", "d1".into(), PathBuf::from("d1"), true);
        assert_eq!(tree.children("p"), ["d1", "d2", "f1", "f2"]);
    }

    #[test]
    fn test_playlist_with_and_without_subfolders() {
        let tree = sample();
        let (flat, _) = tree.playlist("/r", true, 0);
        assert_eq!(flat, ["/r/a/1.png", "/r/a/2.png", "/r/b/3.png", "/r/x.png"]);

        let (top, _) = tree.playlist("/r", false, 0);
        assert_eq!(top, ["/r/x.png"]);
    }

    #[test]
    fn test_playlist_offset_counts_preceding_subfolders() {
        let tree = sample();
        assert_eq!(tree.playlist("/r", true, 0).1, 0);
        assert_eq!(tree.playlist("/r", true, 1).1, 2);
        assert_eq!(tree.playlist("/r", true, 2).1, 3);
        assert_eq!(tree.playlist("/r", false, 2).1, 0);
    }

    #[test]
    fn test_search_threshold_and_order() {
        let tree = sample();
        assert!(tree.search("pn").is_empty());
        assert_eq!(
            tree.search(".png"),
            ["/r/a/1.png", "/r/a/2.png", "/r/b/3.png", "/r/x.png"]
        );
    }

    #[test]
    fn test_ancestors_and_counts() {
        let tree = sample();
        assert_eq!(tree.ancestors("/r/a/1.png"), ["/r/a", "/r"]);
        assert!(tree.ancestors("/r").is_empty());
        assert_eq!(tree.counts("/r"), (2, 1));
        assert_eq!(tree.root(), Some("/r"));
        assert!(tree.is_branch("/r/a"));
        assert!(!tree.is_branch("/r/x.png"));
    }
}
