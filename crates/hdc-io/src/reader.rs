use std::collections::HashMap;

use tracing::debug;

use hdc_builder::{BuilderId, BuilderTree, DatasetValue, RefTarget, StoredHandle, ROOT_NAME};
use hdc_map::BuildManager;
use hdc_store::{basename, join_path, EntryKind, Storage};
use hdc_types::{Dtype, Selection, Value};

use crate::error::{IoError, IoResult};
use crate::session::ContainerSession;

impl<S: Storage> ContainerSession<S> {
    /// Walk the primary backend into a builder tree, returning the root.
    ///
    /// Every physical node becomes exactly one builder, keyed by
    /// `(file id, path)` in the build manager's cache, regardless of how
    /// many links lead to it or in which order they are traversed.
    /// Reading the same session twice returns the same root.
    pub fn read_builder(&mut self, tree: &mut BuilderTree) -> IoResult<BuilderId> {
        let file_id = self.store.file_id().to_string();
        if let Some(root) = self.manager.cached_builder(&file_id, "/") {
            return Ok(root);
        }
        let root = tree.add_root(Some(file_id.clone()));
        self.manager.cache_builder(&file_id, "/", root);

        let mut walker = ReadWalker {
            manager: &mut self.manager,
            externals: &self.externals,
        };
        walker.read_group_children(&self.store, tree, root, "/")?;
        walker.apply_attributes(&self.store, tree, root, "/")?;
        debug!(file = %file_id, nodes = tree.len(), "read container");
        Ok(root)
    }
}

/// Depth-first reader over one or more backends.
///
/// Per physical node the states are `unseen -> built`; the transition is
/// atomic from the caller's perspective because traversal is depth-first
/// and single-threaded.
struct ReadWalker<'a> {
    manager: &'a mut BuildManager,
    externals: &'a HashMap<String, Box<dyn Storage>>,
}

impl ReadWalker<'_> {
    fn read_group_children(
        &mut self,
        store: &dyn Storage,
        tree: &mut BuilderTree,
        group: BuilderId,
        path: &str,
    ) -> IoResult<()> {
        for (name, kind) in store.children(path)? {
            let child_path = join_path(path, &name);
            match kind {
                EntryKind::Group => {
                    if let Some(id) = self.manager.cached_builder(store.file_id(), &child_path) {
                        // Already read through a link; this is the owning
                        // position.
                        tree.attach(group, id)?;
                    } else {
                        let id = tree.add_group(group, &name)?;
                        self.manager
                            .cache_builder(store.file_id(), &child_path, id);
                        self.read_group_children(store, tree, id, &child_path)?;
                        self.apply_attributes(store, tree, id, &child_path)?;
                    }
                }
                EntryKind::Dataset => {
                    if let Some(id) = self.manager.cached_builder(store.file_id(), &child_path) {
                        tree.attach(group, id)?;
                    } else {
                        let id = self.read_dataset(store, tree, &name, &child_path)?;
                        self.manager
                            .cache_builder(store.file_id(), &child_path, id);
                        tree.attach(group, id)?;
                    }
                }
                EntryKind::SoftLink { target } => {
                    let target_id = self.resolve_target(store, tree, &target)?;
                    tree.add_link(group, &name, target_id)?;
                }
                EntryKind::ExternalLink { file, target } => {
                    let external = self
                        .externals
                        .get(&file)
                        .ok_or(IoError::ExternalFileUnavailable { file })?;
                    let target_id = self.resolve_target(external.as_ref(), tree, &target)?;
                    tree.add_link(group, &name, target_id)?;
                }
            }
        }
        Ok(())
    }

    /// Resolve a link or reference target path to its builder, reading it
    /// (detached) if this is the first encounter. The owning group adopts
    /// the node when regular traversal reaches it.
    fn resolve_target(
        &mut self,
        store: &dyn Storage,
        tree: &mut BuilderTree,
        target_path: &str,
    ) -> IoResult<BuilderId> {
        if let Some(id) = self.manager.cached_builder(store.file_id(), target_path) {
            return Ok(id);
        }
        let name = match basename(target_path) {
            "" => ROOT_NAME,
            n => n,
        };
        match store.kind(target_path)? {
            EntryKind::Group => {
                let id = tree.new_group(name, Some(store.file_id().to_string()));
                // Cache before descending so link cycles terminate.
                self.manager.cache_builder(store.file_id(), target_path, id);
                self.read_group_children(store, tree, id, target_path)?;
                self.apply_attributes(store, tree, id, target_path)?;
                Ok(id)
            }
            EntryKind::Dataset => {
                let id = self.read_dataset(store, tree, name, target_path)?;
                self.manager.cache_builder(store.file_id(), target_path, id);
                Ok(id)
            }
            // Link chains resolve through to the final object.
            EntryKind::SoftLink { target } => self.resolve_target(store, tree, &target),
            EntryKind::ExternalLink { file, target } => {
                let external = self
                    .externals
                    .get(&file)
                    .ok_or(IoError::ExternalFileUnavailable { file })?;
                self.resolve_target(external.as_ref(), tree, &target)
            }
        }
    }

    /// Classify and read one dataset, detached.
    ///
    /// Zero-dimensional scalars are read eagerly (a region-reference
    /// scalar also pulls in its referenced dataset); one-dimensional text
    /// is materialized as strings; anything else stays a lazy handle onto
    /// the stored array, since arrays may be arbitrarily large.
    fn read_dataset(
        &mut self,
        store: &dyn Storage,
        tree: &mut BuilderTree,
        name: &str,
        path: &str,
    ) -> IoResult<BuilderId> {
        let meta = store.dataset_meta(path)?;
        let data = if meta.shape.is_scalar() {
            match store.read_scalar(path)? {
                Value::RegionRef(region) => {
                    let target = self.resolve_target(store, tree, &region.path)?;
                    DatasetValue::Region {
                        target: RefTarget::Node(target),
                        selection: region.selection,
                    }
                }
                scalar => DatasetValue::Scalar(scalar),
            }
        } else if meta.shape.ndim() == 1 && meta.dtype == Dtype::Utf8 {
            DatasetValue::Array {
                values: store.read_selection(path, &Selection::All)?,
                shape: meta.shape.clone(),
            }
        } else {
            DatasetValue::Stored(StoredHandle {
                source: store.file_id().to_string(),
                path: path.to_string(),
                dtype: meta.dtype.clone(),
                shape: meta.shape.clone(),
                maxshape: Some(meta.maxshape.clone()),
            })
        };
        let id = tree.new_dataset(
            name,
            Some(store.file_id().to_string()),
            data,
            None,
            Some(meta.maxshape),
        );
        self.apply_attributes(store, tree, id, path)?;
        Ok(id)
    }

    fn apply_attributes(
        &mut self,
        store: &dyn Storage,
        tree: &mut BuilderTree,
        id: BuilderId,
        path: &str,
    ) -> IoResult<()> {
        for (name, value) in store.attributes(path)? {
            tree.set_attribute(id, &name, value);
        }
        Ok(())
    }
}
