//! Tree refresh, folder selection and search.

use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Viewer;
use crate::core::player::PlaybackStatus;
use crate::core::viewer_events::TreeRefreshedEvent;

impl Viewer {
    /// Index `root` and select it
    pub fn open(&mut self, root: &Path) -> f64 {
        self.root = Some(root.to_path_buf());
        self.refresh_tree().unwrap_or(0.0)
    }

    /// Re-walk the root directory, replacing the index wholesale.
    ///
    /// The media cache is invalidated and the root folder selected again.
    /// Returns the build time, `None` without a root.
    pub fn refresh_tree(&mut self) -> Option<f64> {
        let root: PathBuf = self.root.clone()?;
        if self.player.status() != PlaybackStatus::Stopped {
            self.player.stop();
        }

        self.set_status("Loading folder info...");
        let (tree, took) = self.indexer.build_index(&root);
        let nodes = tree.len();
        let root_id = tree.root().map(str::to_string);

        *self.ctx.tree.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(tree);
        self.ctx.cache.invalidate();
        self.bus.emit(TreeRefreshedEvent { nodes, elapsed_secs: took });
        self.set_status(format!("Loading finished! Took {:.3} sec", took));

        if let Some(root_id) = root_id {
            self.set_new_folder(&root_id, true, false);
        }
        Some(took)
    }

    /// Flatten `folder` into the playlist.
    ///
    /// No-op when `folder` is already selected unless `force`. With `seek`
    /// the cursor lands past the expanded subfolders that preceded it.
    pub fn set_new_folder(&mut self, folder: &str, force: bool, seek: bool) {
        if self.selected.as_deref() == Some(folder) && !force {
            return;
        }
        self.selected = Some(folder.to_string());

        let tree = self.tree();
        let cursor = usize::try_from(self.player.cursor()).unwrap_or(0);
        let (list, offset) = tree.playlist(folder, self.settings.include_subfolders, cursor);
        debug!("Folder {}: {} item(s), seek offset {}", folder, list.len(), offset);

        self.player.set_new_data(list);
        if seek {
            self.player.seek(offset as i64);
        }
    }

    /// Select a tree node: folders become the playlist, files select their
    /// folder and move the cursor onto themselves.
    pub fn select(&mut self, id: &str) -> bool {
        let tree = self.tree();
        let Some(location) = tree.location(id) else {
            self.set_status(format!("{} is not in the index", id));
            return false;
        };

        if tree.is_branch(id) {
            self.set_new_folder(id, false, true);
            self.set_status(format!("Selected Folder: {}/", location.display()));
            return true;
        }

        let Some(parent) = tree.parent(id) else {
            return false;
        };
        self.set_new_folder(parent, false, true);
        let found = self.player.seek_to_data(id);
        let folder = location.parent().unwrap_or(location);
        self.set_status(format!("Selected Folder: {}", folder.display()));
        found
    }

    /// Entries whose name contains `query`. Non-empty results replace the
    /// playlist; short queries (2 chars or less) match nothing.
    pub fn search(&mut self, query: &str) -> Vec<String> {
        let hits = self.tree().search(query);
        if !hits.is_empty() {
            info!("Search '{}': {} hit(s)", query, hits.len());
            self.player.set_new_data(hits.clone());
        }
        hits
    }

    /// Parent chain of `id`, nearest first (to reveal a file in a tree view)
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        self.tree().ancestors(id)
    }
}
