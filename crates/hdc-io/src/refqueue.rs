use std::collections::BTreeMap;

use tracing::debug;

use hdc_builder::{BuilderTree, CellValue, RefTarget};
use hdc_store::{basename, parent_path, Storage};
use hdc_types::{AttributeValue, Dtype, ObjectRef, RegionRef, Selection, Shape, Value};

use crate::error::{IoError, IoResult};
use crate::session::ContainerSession;

/// One deferred reference write.
///
/// Deferred actions are plain data records rather than closures so that
/// each one is demonstrably self-contained: it carries everything needed
/// to resolve and write its reference, and can not observe whether other
/// queued actions have run.
#[derive(Debug)]
pub(crate) enum DeferredRef {
    /// A zero-dimensional object reference dataset.
    ScalarObject {
        path: String,
        target: RefTarget,
        attributes: BTreeMap<String, AttributeValue>,
    },
    /// A zero-dimensional region reference dataset.
    ScalarRegion {
        path: String,
        target: RefTarget,
        selection: Selection,
        attributes: BTreeMap<String, AttributeValue>,
    },
    /// A compound dataset with one or more reference columns; created and
    /// filled in one action once its targets are resolvable.
    CompoundRows {
        path: String,
        rows: Vec<Vec<CellValue>>,
        dtype: Dtype,
        attributes: BTreeMap<String, AttributeValue>,
    },
}

impl<S: Storage> ContainerSession<S> {
    /// Drain the deferred reference queue, last-in-first-out, until empty.
    ///
    /// Runs strictly after the structural pass: a reference value can only
    /// be written once its target physically exists with a stable path,
    /// which tree traversal order does not guarantee at enqueue time.
    pub(crate) fn drain_ref_queue(&mut self, tree: &mut BuilderTree) -> IoResult<()> {
        debug!(queued = self.ref_queue.len(), "draining reference queue");
        while let Some(action) = self.ref_queue.pop() {
            match action {
                DeferredRef::ScalarObject {
                    path,
                    target,
                    attributes,
                } => {
                    let target_path = self.resolve_ref_target(tree, &target)?;
                    self.create_scalar_ref(&path, Dtype::ObjectRef)?;
                    self.store
                        .write_scalar(&path, Value::ObjectRef(ObjectRef::new(target_path)))
                        .map_err(|e| IoError::storage(basename(&path), parent_path(&path), e))?;
                    self.set_node_attributes(&path, attributes)?;
                }
                DeferredRef::ScalarRegion {
                    path,
                    target,
                    selection,
                    attributes,
                } => {
                    let target_path = self.resolve_ref_target(tree, &target)?;
                    self.create_scalar_ref(&path, Dtype::RegionRef)?;
                    self.store
                        .write_scalar(
                            &path,
                            Value::RegionRef(RegionRef::new(target_path, selection)),
                        )
                        .map_err(|e| IoError::storage(basename(&path), parent_path(&path), e))?;
                    self.set_node_attributes(&path, attributes)?;
                }
                DeferredRef::CompoundRows {
                    path,
                    rows,
                    dtype,
                    attributes,
                } => {
                    let mut values = Vec::with_capacity(rows.len());
                    for row in rows {
                        let mut cells = Vec::with_capacity(row.len());
                        for cell in row {
                            match cell {
                                CellValue::Plain(v) => cells.push(v),
                                CellValue::Ref(target) => {
                                    let target_path = self.resolve_ref_target(tree, &target)?;
                                    cells.push(Value::ObjectRef(ObjectRef::new(target_path)));
                                }
                            }
                        }
                        values.push(Value::Compound(cells));
                    }
                    let shape = Shape(vec![values.len() as u64]);
                    self.store
                        .create_dataset(&path, dtype, &shape, None, None)
                        .map_err(|e| IoError::storage(basename(&path), parent_path(&path), e))?;
                    self.store
                        .write_selection(&path, &Selection::All, &values)
                        .map_err(|e| IoError::storage(basename(&path), parent_path(&path), e))?;
                    self.set_node_attributes(&path, attributes)?;
                }
            }
        }
        Ok(())
    }

    /// Resolve a reference target to its final path, materializing a
    /// domain-object target through the build manager if it was never
    /// built.
    fn resolve_ref_target(&mut self, tree: &mut BuilderTree, target: &RefTarget) -> IoResult<String> {
        let id = match target {
            RefTarget::Node(id) => *id,
            RefTarget::Object(container) => self.manager.get_or_build(container, tree)?,
        };
        Ok(tree.path(id))
    }

    fn create_scalar_ref(&mut self, path: &str, dtype: Dtype) -> IoResult<()> {
        self.store
            .create_dataset(path, dtype, &Shape::scalar(), None, None)
            .map_err(|e| IoError::storage(basename(path), parent_path(path), e))
    }
}
