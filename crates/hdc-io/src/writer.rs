use std::collections::BTreeMap;

use tracing::debug;

use hdc_builder::{
    BuilderId, BuilderPayload, BuilderTree, CellValue, DatasetValue, RefTarget, StoredHandle,
};
use hdc_store::{join_path, Storage};
use hdc_types::{
    resolve_dtype, AttributeValue, DtypeSpec, MaxShape, Nested, Selection, Shape, TypeError, Value,
};

use crate::error::{IoError, IoResult};
use crate::refqueue::DeferredRef;
use crate::session::ContainerSession;

/// Snapshot of one dataset's write dispatch, cloned out of the tree so
/// the arena can be re-borrowed while chunks are pulled.
enum WritePlan {
    Scalar(Value),
    Array { values: Vec<Value>, shape: Shape },
    Chunked,
    Stored(StoredHandle),
    DeferObject(RefTarget),
    DeferRegion {
        target: RefTarget,
        selection: Selection,
    },
    Compound { rows: Vec<Vec<CellValue>> },
}

impl<S: Storage> ContainerSession<S> {
    /// Walk a builder tree into the primary backend.
    ///
    /// Depth-first, parent before children; within each group: sub-groups,
    /// then datasets, then links, then attributes. Reference-bearing
    /// datasets are queued and written only after the whole tree is
    /// structurally in place.
    pub fn write_builder(&mut self, tree: &mut BuilderTree, root: BuilderId) -> IoResult<()> {
        if !tree.node(root).is_group() {
            return Err(IoError::RootNotAGroup);
        }
        // The written subtree now belongs to this file; links and
        // references decide same-file vs cross-file by source.
        let file_id = self.store.file_id().to_string();
        stamp_source(tree, root, &file_id);
        self.write_children(tree, root, "/")?;
        self.drain_ref_queue(tree)
    }

    fn write_children(&mut self, tree: &mut BuilderTree, id: BuilderId, path: &str) -> IoResult<()> {
        let (groups, datasets, links) = {
            let group = match tree.node(id).as_group() {
                Some(g) => g,
                None => unreachable!("group maps hold groups"),
            };
            (
                group.groups.clone(),
                group.datasets.clone(),
                group.links.clone(),
            )
        };
        for gid in groups.values() {
            self.write_group(tree, *gid, path)?;
        }
        for did in datasets.values() {
            self.write_dataset(tree, *did, path)?;
        }
        for lid in links.values() {
            self.write_link(tree, *lid, path)?;
        }
        let attributes = tree.node(id).attributes.clone();
        self.set_node_attributes(path, attributes)
    }

    fn write_group(&mut self, tree: &mut BuilderTree, id: BuilderId, parent_path: &str) -> IoResult<()> {
        let name = tree.node(id).name.clone();
        let path = join_path(parent_path, &name);
        self.store
            .create_group(&path)
            .map_err(|e| IoError::storage(&name, parent_path, e))?;
        debug!(path = %path, "wrote group");
        self.write_children(tree, id, &path)
    }

    fn write_dataset(&mut self, tree: &mut BuilderTree, id: BuilderId, parent_path: &str) -> IoResult<()> {
        let (name, attributes, dtype_spec, maxshape, plan) = {
            let node = tree.node(id);
            let dataset = match node.as_dataset() {
                Some(d) => d,
                None => unreachable!("dataset maps hold datasets"),
            };
            let plan = match &dataset.data {
                DatasetValue::Scalar(v) => WritePlan::Scalar(v.clone()),
                DatasetValue::Array { values, shape } => WritePlan::Array {
                    values: values.clone(),
                    shape: shape.clone(),
                },
                DatasetValue::Chunked(_) => WritePlan::Chunked,
                DatasetValue::Stored(handle) => WritePlan::Stored(handle.clone()),
                DatasetValue::ObjectRef(target) => WritePlan::DeferObject(target.clone()),
                DatasetValue::Region { target, selection } => WritePlan::DeferRegion {
                    target: target.clone(),
                    selection: selection.clone(),
                },
                DatasetValue::CompoundRows(rows) => WritePlan::Compound { rows: rows.clone() },
            };
            (
                node.name.clone(),
                node.attributes.clone(),
                dataset.dtype.clone(),
                dataset.maxshape.clone(),
                plan,
            )
        };
        let path = join_path(parent_path, &name);

        match plan {
            WritePlan::Scalar(value) => {
                let sample = Nested::Scalar(value.clone());
                let dtype = resolve_dtype(dtype_spec.as_ref(), Some(&sample))?;
                self.store
                    .create_dataset(&path, dtype, &Shape::scalar(), None, None)
                    .map_err(|e| IoError::storage(&name, parent_path, e))?;
                self.store
                    .write_scalar(&path, value)
                    .map_err(|e| IoError::storage(&name, parent_path, e))?;
                self.set_node_attributes(&path, attributes)?;
            }
            WritePlan::Array { values, shape } => {
                self.list_fill(&name, parent_path, &path, values, shape, dtype_spec, maxshape)?;
                self.set_node_attributes(&path, attributes)?;
            }
            WritePlan::Chunked => {
                self.chunked_fill(tree, id, &name, parent_path, &path)?;
                self.set_node_attributes(&path, attributes)?;
            }
            WritePlan::Stored(handle) => {
                // Shared data that already lives in storage: link, never
                // copy the bytes.
                if handle.source == self.store.file_id() {
                    self.store
                        .create_soft_link(&path, &handle.path)
                        .map_err(|e| IoError::storage(&name, parent_path, e))?;
                } else {
                    self.store
                        .create_external_link(&path, &handle.source, &handle.path)
                        .map_err(|e| IoError::storage(&name, parent_path, e))?;
                }
            }
            WritePlan::DeferObject(target) => {
                debug!(path = %path, "queued object reference");
                self.ref_queue.push(DeferredRef::ScalarObject {
                    path,
                    target,
                    attributes,
                });
            }
            WritePlan::DeferRegion { target, selection } => {
                debug!(path = %path, "queued region reference");
                self.ref_queue.push(DeferredRef::ScalarRegion {
                    path,
                    target,
                    selection,
                    attributes,
                });
            }
            WritePlan::Compound { rows } => {
                let spec = dtype_spec.ok_or(IoError::Type(TypeError::CompoundWithoutDtype))?;
                let dtype = resolve_dtype(Some(&spec), None)?;
                let has_refs = spec.has_refs()
                    || rows
                        .iter()
                        .any(|row| row.iter().any(|cell| matches!(cell, CellValue::Ref(_))));
                if has_refs {
                    debug!(path = %path, rows = rows.len(), "queued compound reference rows");
                    self.ref_queue.push(DeferredRef::CompoundRows {
                        path,
                        rows,
                        dtype,
                        attributes,
                    });
                } else {
                    let values: Vec<Value> = rows
                        .into_iter()
                        .map(|row| {
                            Value::Compound(
                                row.into_iter()
                                    .map(|cell| match cell {
                                        CellValue::Plain(v) => v,
                                        CellValue::Ref(_) => unreachable!("checked above"),
                                    })
                                    .collect(),
                            )
                        })
                        .collect();
                    let shape = Shape(vec![values.len() as u64]);
                    self.store
                        .create_dataset(&path, dtype, &shape, maxshape.as_ref(), None)
                        .map_err(|e| IoError::storage(&name, parent_path, e))?;
                    self.store
                        .write_selection(&path, &Selection::All, &values)
                        .map_err(|e| IoError::storage(&name, parent_path, e))?;
                    self.set_node_attributes(&path, attributes)?;
                }
            }
        }
        Ok(())
    }

    /// Create a dataset at the exact extent of an in-memory sequence and
    /// copy the values in.
    #[allow(clippy::too_many_arguments)]
    fn list_fill(
        &mut self,
        name: &str,
        parent_path: &str,
        path: &str,
        values: Vec<Value>,
        shape: Shape,
        dtype_spec: Option<DtypeSpec>,
        maxshape: Option<MaxShape>,
    ) -> IoResult<()> {
        let sample = match values.first() {
            Some(first) => Nested::Scalar(first.clone()),
            None => Nested::Seq(Vec::new()),
        };
        let dtype = resolve_dtype(dtype_spec.as_ref(), Some(&sample))?;
        self.store
            .create_dataset(path, dtype, &shape, maxshape.as_ref(), None)
            .map_err(|e| IoError::storage(name, parent_path, e))?;
        self.store
            .write_selection(path, &Selection::All, &values)
            .map_err(|e| IoError::storage(name, parent_path, e))?;
        Ok(())
    }

    /// Create a growable dataset from a chunk source's declared shapes,
    /// then pull chunks one at a time, growing any dimension the chunk's
    /// selection reaches past.
    fn chunked_fill(
        &mut self,
        tree: &mut BuilderTree,
        id: BuilderId,
        name: &str,
        parent_path: &str,
        path: &str,
    ) -> IoResult<()> {
        let (dtype, initial, max_shape, chunk_shape) = {
            let source = chunk_source(tree, id);
            (
                source.dtype(),
                source.recommended_shape(),
                source.max_shape(),
                source.chunk_shape(),
            )
        };
        self.store
            .create_dataset(path, dtype, &initial, Some(&max_shape), chunk_shape.as_ref())
            .map_err(|e| IoError::storage(name, parent_path, e))?;

        loop {
            let chunk = chunk_source(tree, id).next_chunk();
            let Some(chunk) = chunk else { break };

            // Grow any dimension the chunk's selection reaches past.
            let current = self.store.dataset_meta(path)?.shape;
            let bounds = chunk.selection.upper_bounds();
            let mut new_shape = current.clone();
            let mut grow = false;
            for (axis, bound) in bounds.iter().enumerate() {
                if let (Some(bound), Some(extent)) = (bound, new_shape.0.get_mut(axis)) {
                    if *bound > *extent {
                        *extent = *bound;
                        grow = true;
                    }
                }
            }
            if grow {
                self.store
                    .resize(path, &new_shape)
                    .map_err(|e| IoError::storage(name, parent_path, e))?;
            }
            self.store
                .write_selection(path, &chunk.selection, &chunk.values)
                .map_err(|e| IoError::storage(name, parent_path, e))?;
        }
        Ok(())
    }

    fn write_link(&mut self, tree: &BuilderTree, id: BuilderId, parent_path: &str) -> IoResult<()> {
        let node = tree.node(id);
        let name = node.name.clone();
        let target = match node.as_link() {
            Some(l) => l.target,
            None => unreachable!("link maps hold links"),
        };
        let target_path = tree.path(target);
        let target_source = tree.node(target).source.clone();
        let path = join_path(parent_path, &name);
        match target_source {
            Some(source) if source == self.store.file_id() => self
                .store
                .create_soft_link(&path, &target_path)
                .map_err(|e| IoError::storage(&name, parent_path, e)),
            Some(source) => self
                .store
                .create_external_link(&path, &source, &target_path)
                .map_err(|e| IoError::storage(&name, parent_path, e)),
            None => Err(IoError::LinkTarget { path: target_path }),
        }
    }

    pub(crate) fn set_node_attributes(
        &mut self,
        path: &str,
        attributes: BTreeMap<String, AttributeValue>,
    ) -> IoResult<()> {
        for (name, value) in attributes {
            self.store
                .set_attribute(path, &name, value)
                .map_err(|e| IoError::storage(&name, path, e))?;
        }
        Ok(())
    }
}

/// Stamp the written subtree with the primary file's id. Nodes outside
/// the subtree (other roots, previously read builders) keep their own
/// sources.
fn stamp_source(tree: &mut BuilderTree, id: BuilderId, file_id: &str) {
    tree.node_mut(id).source = Some(file_id.to_string());
    let children: Vec<BuilderId> = match tree.node(id).as_group() {
        Some(group) => group
            .groups
            .values()
            .chain(group.datasets.values())
            .chain(group.links.values())
            .copied()
            .collect(),
        None => Vec::new(),
    };
    for child in children {
        stamp_source(tree, child, file_id);
    }
}

fn chunk_source<'t>(
    tree: &'t mut BuilderTree,
    id: BuilderId,
) -> &'t mut Box<dyn hdc_builder::ChunkSource> {
    match &mut tree.node_mut(id).payload {
        BuilderPayload::Dataset(dataset) => match &mut dataset.data {
            DatasetValue::Chunked(source) => source,
            _ => unreachable!("chunked plan only for chunked data"),
        },
        _ => unreachable!("dataset maps hold datasets"),
    }
}
