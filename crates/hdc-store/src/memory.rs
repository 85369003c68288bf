use std::collections::{BTreeMap, HashMap};

use hdc_types::{AttributeValue, Dtype, MaxShape, Selection, Shape, Value};

use crate::error::{StorageError, StorageResult};
use crate::meta::{parent_path, DatasetMeta, EntryKind};
use crate::traits::Storage;

#[derive(Debug)]
struct MemDataset {
    dtype: Dtype,
    shape: Shape,
    maxshape: MaxShape,
    chunk_shape: Option<Shape>,
    /// Sparse cell storage keyed by index tuple; unwritten cells read as
    /// the dtype's fill value, so growth never re-layouts data.
    cells: HashMap<Vec<u64>, Value>,
}

#[derive(Debug)]
enum MemPayload {
    Group,
    Dataset(MemDataset),
    SoftLink { target: String },
    ExternalLink { file: String, target: String },
}

#[derive(Debug)]
struct MemNode {
    attributes: BTreeMap<String, AttributeValue>,
    payload: MemPayload,
}

impl MemNode {
    fn group() -> Self {
        Self {
            attributes: BTreeMap::new(),
            payload: MemPayload::Group,
        }
    }
}

/// Map-based hierarchical store.
///
/// Intended for tests and embedding; also the in-session representation
/// behind the file-backed store. Nodes are keyed by absolute path in a
/// `BTreeMap`, so enumeration order is deterministic.
#[derive(Debug)]
pub struct MemoryStore {
    file_id: String,
    nodes: BTreeMap<String, MemNode>,
}

impl MemoryStore {
    /// Create an empty store with the given file identifier and a root
    /// group at `"/"`.
    pub fn new(file_id: impl Into<String>) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), MemNode::group());
        Self {
            file_id: file_id.into(),
            nodes,
        }
    }

    /// Number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// All node paths in sorted order.
    pub fn paths(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    /// The explicitly written cells of a dataset, sorted by index tuple.
    ///
    /// Fill values synthesized for unwritten cells are not included; this
    /// is the export surface for persistence backends.
    pub fn written_cells(&self, path: &str) -> StorageResult<Vec<(Vec<u64>, Value)>> {
        let dataset = self.dataset(path)?;
        let mut cells: Vec<(Vec<u64>, Value)> = dataset
            .cells
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        cells.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(cells)
    }

    fn node(&self, path: &str) -> StorageResult<&MemNode> {
        self.nodes.get(path).ok_or_else(|| StorageError::NotFound {
            path: path.to_string(),
        })
    }

    fn node_mut(&mut self, path: &str) -> StorageResult<&mut MemNode> {
        self.nodes
            .get_mut(path)
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_string(),
            })
    }

    fn dataset(&self, path: &str) -> StorageResult<&MemDataset> {
        match &self.node(path)?.payload {
            MemPayload::Dataset(d) => Ok(d),
            _ => Err(StorageError::NotADataset {
                path: path.to_string(),
            }),
        }
    }

    fn dataset_mut(&mut self, path: &str) -> StorageResult<&mut MemDataset> {
        match &mut self.node_mut(path)?.payload {
            MemPayload::Dataset(d) => Ok(d),
            _ => Err(StorageError::NotADataset {
                path: path.to_string(),
            }),
        }
    }

    fn require_vacant(&self, path: &str) -> StorageResult<()> {
        if self.nodes.contains_key(path) {
            return Err(StorageError::AlreadyExists {
                path: path.to_string(),
            });
        }
        let parent = parent_path(path);
        match self.nodes.get(parent) {
            Some(node) => match node.payload {
                MemPayload::Group => Ok(()),
                _ => Err(StorageError::NotAGroup {
                    path: parent.to_string(),
                }),
            },
            None => Err(StorageError::MissingParent {
                path: path.to_string(),
            }),
        }
    }

    /// Reference values are only accepted once their target physically
    /// exists; this is the addressing constraint that forces deferred
    /// reference writes.
    fn validate_value(&self, value: &Value) -> StorageResult<()> {
        match value {
            Value::ObjectRef(r) => {
                if !self.nodes.contains_key(&r.path) {
                    return Err(StorageError::DanglingReference {
                        path: r.path.clone(),
                    });
                }
            }
            Value::RegionRef(r) => match self.nodes.get(&r.path) {
                Some(node) => {
                    if !matches!(node.payload, MemPayload::Dataset(_)) {
                        return Err(StorageError::NotADataset {
                            path: r.path.clone(),
                        });
                    }
                }
                None => {
                    return Err(StorageError::DanglingReference {
                        path: r.path.clone(),
                    })
                }
            },
            Value::Compound(cells) => {
                for cell in cells {
                    self.validate_value(cell)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Expand a selection against a dataset extent into explicit index
    /// tuples, row-major.
    fn expand_selection(
        path: &str,
        shape: &Shape,
        selection: &Selection,
    ) -> StorageResult<Vec<Vec<u64>>> {
        if shape.is_scalar() {
            return match selection {
                Selection::All => Ok(vec![Vec::new()]),
                _ => Err(StorageError::DimensionMismatch {
                    path: path.to_string(),
                    expected: 0,
                    actual: 1,
                }),
            };
        }
        let dims = selection.per_dim(shape.ndim());
        if dims.len() != shape.ndim() {
            return Err(StorageError::DimensionMismatch {
                path: path.to_string(),
                expected: shape.ndim(),
                actual: dims.len(),
            });
        }
        let mut per_axis: Vec<Vec<u64>> = Vec::with_capacity(dims.len());
        for (axis, sel) in dims.iter().enumerate() {
            let extent = shape.0[axis];
            let indices = sel.expand(extent);
            if let Some(&max) = indices.iter().max() {
                if max >= extent {
                    return Err(StorageError::OutOfBounds {
                        path: path.to_string(),
                        axis,
                        required: max + 1,
                        extent,
                    });
                }
            }
            per_axis.push(indices);
        }
        Ok(cartesian(&per_axis))
    }
}

/// Row-major cartesian product of per-axis index lists.
fn cartesian(per_axis: &[Vec<u64>]) -> Vec<Vec<u64>> {
    let mut out: Vec<Vec<u64>> = vec![Vec::new()];
    for axis in per_axis {
        let mut next = Vec::with_capacity(out.len() * axis.len());
        for prefix in &out {
            for &i in axis {
                let mut tuple = prefix.clone();
                tuple.push(i);
                next.push(tuple);
            }
        }
        out = next;
    }
    out
}

impl Storage for MemoryStore {
    fn file_id(&self) -> &str {
        &self.file_id
    }

    fn create_group(&mut self, path: &str) -> StorageResult<()> {
        self.require_vacant(path)?;
        self.nodes.insert(path.to_string(), MemNode::group());
        Ok(())
    }

    fn ensure_group(&mut self, path: &str) -> StorageResult<()> {
        match self.nodes.get(path) {
            Some(node) => match node.payload {
                MemPayload::Group => Ok(()),
                _ => Err(StorageError::NotAGroup {
                    path: path.to_string(),
                }),
            },
            None => self.create_group(path),
        }
    }

    fn create_dataset(
        &mut self,
        path: &str,
        dtype: Dtype,
        shape: &Shape,
        maxshape: Option<&MaxShape>,
        chunk_shape: Option<&Shape>,
    ) -> StorageResult<()> {
        self.require_vacant(path)?;
        let maxshape = match maxshape {
            Some(max) => {
                if max.len() != shape.ndim() {
                    return Err(StorageError::DimensionMismatch {
                        path: path.to_string(),
                        expected: shape.ndim(),
                        actual: max.len(),
                    });
                }
                max.clone()
            }
            // Not growable unless a maximum shape says so.
            None => shape.0.iter().map(|&d| Some(d)).collect(),
        };
        self.nodes.insert(
            path.to_string(),
            MemNode {
                attributes: BTreeMap::new(),
                payload: MemPayload::Dataset(MemDataset {
                    dtype,
                    shape: shape.clone(),
                    maxshape,
                    chunk_shape: chunk_shape.cloned(),
                    cells: HashMap::new(),
                }),
            },
        );
        Ok(())
    }

    fn write_scalar(&mut self, path: &str, value: Value) -> StorageResult<()> {
        self.validate_value(&value)?;
        let dataset = self.dataset_mut(path)?;
        if !dataset.shape.is_scalar() {
            return Err(StorageError::DimensionMismatch {
                path: path.to_string(),
                expected: 0,
                actual: dataset.shape.ndim(),
            });
        }
        dataset.cells.insert(Vec::new(), value);
        Ok(())
    }

    fn write_selection(
        &mut self,
        path: &str,
        selection: &Selection,
        values: &[Value],
    ) -> StorageResult<()> {
        let shape = self.dataset(path)?.shape.clone();
        let indices = Self::expand_selection(path, &shape, selection)?;
        if indices.len() != values.len() {
            return Err(StorageError::CountMismatch {
                path: path.to_string(),
                expected: indices.len() as u64,
                actual: values.len() as u64,
            });
        }
        for value in values {
            self.validate_value(value)?;
        }
        let dataset = self.dataset_mut(path)?;
        for (tuple, value) in indices.into_iter().zip(values.iter().cloned()) {
            dataset.cells.insert(tuple, value);
        }
        Ok(())
    }

    fn resize(&mut self, path: &str, new_shape: &Shape) -> StorageResult<()> {
        let dataset = self.dataset_mut(path)?;
        if new_shape.ndim() != dataset.shape.ndim() {
            return Err(StorageError::DimensionMismatch {
                path: path.to_string(),
                expected: dataset.shape.ndim(),
                actual: new_shape.ndim(),
            });
        }
        for (axis, (&old, &new)) in dataset.shape.0.iter().zip(&new_shape.0).enumerate() {
            if new < old {
                return Err(StorageError::ShrinkNotAllowed {
                    path: path.to_string(),
                    axis,
                    from: old,
                    to: new,
                });
            }
            if let Some(max) = dataset.maxshape[axis] {
                if new > max {
                    return Err(StorageError::MaxShapeExceeded {
                        path: path.to_string(),
                        axis,
                    });
                }
            }
        }
        dataset.shape = new_shape.clone();
        Ok(())
    }

    fn set_attribute(
        &mut self,
        path: &str,
        name: &str,
        value: AttributeValue,
    ) -> StorageResult<()> {
        if let AttributeValue::Scalar(v) = &value {
            self.validate_value(v)?;
        }
        let node = self.node_mut(path)?;
        node.attributes.insert(name.to_string(), value);
        Ok(())
    }

    fn create_soft_link(&mut self, path: &str, target_path: &str) -> StorageResult<()> {
        self.require_vacant(path)?;
        self.nodes.insert(
            path.to_string(),
            MemNode {
                attributes: BTreeMap::new(),
                payload: MemPayload::SoftLink {
                    target: target_path.to_string(),
                },
            },
        );
        Ok(())
    }

    fn create_external_link(
        &mut self,
        path: &str,
        file: &str,
        target_path: &str,
    ) -> StorageResult<()> {
        self.require_vacant(path)?;
        self.nodes.insert(
            path.to_string(),
            MemNode {
                attributes: BTreeMap::new(),
                payload: MemPayload::ExternalLink {
                    file: file.to_string(),
                    target: target_path.to_string(),
                },
            },
        );
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    fn kind(&self, path: &str) -> StorageResult<EntryKind> {
        let node = self.node(path)?;
        Ok(match &node.payload {
            MemPayload::Group => EntryKind::Group,
            MemPayload::Dataset(_) => EntryKind::Dataset,
            MemPayload::SoftLink { target } => EntryKind::SoftLink {
                target: target.clone(),
            },
            MemPayload::ExternalLink { file, target } => EntryKind::ExternalLink {
                file: file.clone(),
                target: target.clone(),
            },
        })
    }

    fn children(&self, path: &str) -> StorageResult<Vec<(String, EntryKind)>> {
        match self.node(path)?.payload {
            MemPayload::Group => {}
            _ => {
                return Err(StorageError::NotAGroup {
                    path: path.to_string(),
                })
            }
        }
        let mut out = Vec::new();
        for key in self.nodes.keys() {
            if key != "/" && parent_path(key) == path {
                let name = crate::meta::basename(key).to_string();
                out.push((name, self.kind(key)?));
            }
        }
        Ok(out)
    }

    fn attributes(&self, path: &str) -> StorageResult<BTreeMap<String, AttributeValue>> {
        Ok(self.node(path)?.attributes.clone())
    }

    fn dataset_meta(&self, path: &str) -> StorageResult<DatasetMeta> {
        let dataset = self.dataset(path)?;
        Ok(DatasetMeta {
            dtype: dataset.dtype.clone(),
            shape: dataset.shape.clone(),
            maxshape: dataset.maxshape.clone(),
            chunk_shape: dataset.chunk_shape.clone(),
        })
    }

    fn read_scalar(&self, path: &str) -> StorageResult<Value> {
        let dataset = self.dataset(path)?;
        if !dataset.shape.is_scalar() {
            return Err(StorageError::DimensionMismatch {
                path: path.to_string(),
                expected: 0,
                actual: dataset.shape.ndim(),
            });
        }
        Ok(dataset
            .cells
            .get(&Vec::new())
            .cloned()
            .unwrap_or_else(|| dataset.dtype.fill_value()))
    }

    fn read_selection(&self, path: &str, selection: &Selection) -> StorageResult<Vec<Value>> {
        let dataset = self.dataset(path)?;
        let indices = Self::expand_selection(path, &dataset.shape, selection)?;
        Ok(indices
            .into_iter()
            .map(|tuple| {
                dataset
                    .cells
                    .get(&tuple)
                    .cloned()
                    .unwrap_or_else(|| dataset.dtype.fill_value())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdc_types::{ObjectRef, RegionRef};

    fn store() -> MemoryStore {
        MemoryStore::new("test.hdc")
    }

    fn int_values(values: &[i32]) -> Vec<Value> {
        values.iter().map(|&v| Value::Int32(v)).collect()
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    #[test]
    fn create_nested_groups() {
        let mut s = store();
        s.create_group("/a").unwrap();
        s.create_group("/a/b").unwrap();
        assert_eq!(s.kind("/a/b").unwrap(), EntryKind::Group);
    }

    #[test]
    fn create_requires_parent() {
        let mut s = store();
        let err = s.create_group("/missing/child").unwrap_err();
        assert!(matches!(err, StorageError::MissingParent { .. }));
    }

    #[test]
    fn sibling_collision_is_an_error() {
        let mut s = store();
        s.create_group("/a").unwrap();
        let err = s.create_group("/a").unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
    }

    #[test]
    fn ensure_group_is_idempotent() {
        let mut s = store();
        s.ensure_group("/specs").unwrap();
        s.ensure_group("/specs").unwrap();
        assert_eq!(s.kind("/specs").unwrap(), EntryKind::Group);
    }

    #[test]
    fn children_report_kinds() {
        let mut s = store();
        s.create_group("/g").unwrap();
        s.create_dataset("/d", Dtype::Int32, &Shape(vec![2]), None, None)
            .unwrap();
        s.create_soft_link("/l", "/d").unwrap();
        let children = s.children("/").unwrap();
        assert_eq!(children.len(), 3);
        assert!(children.contains(&("g".to_string(), EntryKind::Group)));
        assert!(children.contains(&("d".to_string(), EntryKind::Dataset)));
        assert!(children.contains(&(
            "l".to_string(),
            EntryKind::SoftLink {
                target: "/d".to_string()
            }
        )));
    }

    #[test]
    fn children_does_not_recurse() {
        let mut s = store();
        s.create_group("/g").unwrap();
        s.create_group("/g/inner").unwrap();
        let children = s.children("/").unwrap();
        assert_eq!(children.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Datasets
    // -----------------------------------------------------------------------

    #[test]
    fn write_and_read_full_selection() {
        let mut s = store();
        s.create_dataset("/d", Dtype::Int32, &Shape(vec![2, 2]), None, None)
            .unwrap();
        s.write_selection("/d", &Selection::All, &int_values(&[1, 2, 3, 4]))
            .unwrap();
        let values = s.read_selection("/d", &Selection::All).unwrap();
        assert_eq!(values, int_values(&[1, 2, 3, 4]));
    }

    #[test]
    fn row_major_cell_addressing() {
        let mut s = store();
        s.create_dataset("/d", Dtype::Int32, &Shape(vec![2, 3]), None, None)
            .unwrap();
        s.write_selection("/d", &Selection::All, &int_values(&[0, 1, 2, 3, 4, 5]))
            .unwrap();
        let cell = s
            .read_selection(
                "/d",
                &Selection::Multi(vec![Selection::Index(1), Selection::Index(2)]),
            )
            .unwrap();
        assert_eq!(cell, int_values(&[5]));
    }

    #[test]
    fn unwritten_cells_read_fill_values() {
        let mut s = store();
        s.create_dataset("/d", Dtype::Float64, &Shape(vec![3]), None, None)
            .unwrap();
        s.write_selection("/d", &Selection::Index(1), &[Value::Float64(7.0)])
            .unwrap();
        let values = s.read_selection("/d", &Selection::All).unwrap();
        assert_eq!(
            values,
            vec![Value::Float64(0.0), Value::Float64(7.0), Value::Float64(0.0)]
        );
    }

    #[test]
    fn scalar_roundtrip_and_fill() {
        let mut s = store();
        s.create_dataset("/s", Dtype::Utf8, &Shape::scalar(), None, None)
            .unwrap();
        assert_eq!(s.read_scalar("/s").unwrap(), Value::Text(String::new()));
        s.write_scalar("/s", Value::Text("hello".into())).unwrap();
        assert_eq!(s.read_scalar("/s").unwrap(), Value::Text("hello".into()));
    }

    #[test]
    fn out_of_bounds_selection() {
        let mut s = store();
        s.create_dataset("/d", Dtype::Int32, &Shape(vec![2]), None, None)
            .unwrap();
        let err = s
            .write_selection("/d", &Selection::Index(5), &int_values(&[1]))
            .unwrap_err();
        assert!(matches!(err, StorageError::OutOfBounds { axis: 0, .. }));
    }

    #[test]
    fn count_mismatch() {
        let mut s = store();
        s.create_dataset("/d", Dtype::Int32, &Shape(vec![3]), None, None)
            .unwrap();
        let err = s
            .write_selection("/d", &Selection::All, &int_values(&[1]))
            .unwrap_err();
        assert!(matches!(err, StorageError::CountMismatch { .. }));
    }

    // -----------------------------------------------------------------------
    // Growth
    // -----------------------------------------------------------------------

    #[test]
    fn grow_within_maxshape() {
        let mut s = store();
        s.create_dataset("/d", Dtype::Int32, &Shape(vec![0]), Some(&vec![None]), None)
            .unwrap();
        s.resize("/d", &Shape(vec![50])).unwrap();
        s.write_selection("/d", &Selection::slice(0, 50), &int_values(&vec![9; 50]))
            .unwrap();
        assert_eq!(s.dataset_meta("/d").unwrap().shape, Shape(vec![50]));
    }

    #[test]
    fn default_maxshape_is_not_growable() {
        let mut s = store();
        s.create_dataset("/d", Dtype::Int32, &Shape(vec![2]), None, None)
            .unwrap();
        let err = s.resize("/d", &Shape(vec![3])).unwrap_err();
        assert!(matches!(err, StorageError::MaxShapeExceeded { axis: 0, .. }));
    }

    #[test]
    fn shrinking_is_rejected() {
        let mut s = store();
        s.create_dataset("/d", Dtype::Int32, &Shape(vec![4]), Some(&vec![None]), None)
            .unwrap();
        let err = s.resize("/d", &Shape(vec![2])).unwrap_err();
        assert!(matches!(err, StorageError::ShrinkNotAllowed { .. }));
    }

    #[test]
    fn values_survive_growth() {
        let mut s = store();
        s.create_dataset("/d", Dtype::Int32, &Shape(vec![2]), Some(&vec![None]), None)
            .unwrap();
        s.write_selection("/d", &Selection::All, &int_values(&[1, 2]))
            .unwrap();
        s.resize("/d", &Shape(vec![4])).unwrap();
        let values = s.read_selection("/d", &Selection::All).unwrap();
        assert_eq!(values, int_values(&[1, 2, 0, 0]));
    }

    // -----------------------------------------------------------------------
    // References
    // -----------------------------------------------------------------------

    #[test]
    fn object_ref_requires_existing_target() {
        let mut s = store();
        s.create_dataset("/r", Dtype::ObjectRef, &Shape::scalar(), None, None)
            .unwrap();
        let err = s
            .write_scalar("/r", Value::ObjectRef(ObjectRef::new("/nowhere")))
            .unwrap_err();
        assert!(matches!(err, StorageError::DanglingReference { .. }));

        s.create_group("/target").unwrap();
        s.write_scalar("/r", Value::ObjectRef(ObjectRef::new("/target")))
            .unwrap();
    }

    #[test]
    fn region_ref_requires_dataset_target() {
        let mut s = store();
        s.create_group("/g").unwrap();
        s.create_dataset("/r", Dtype::RegionRef, &Shape::scalar(), None, None)
            .unwrap();
        let err = s
            .write_scalar(
                "/r",
                Value::RegionRef(RegionRef::new("/g", Selection::All)),
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::NotADataset { .. }));
    }

    // -----------------------------------------------------------------------
    // Attributes and links
    // -----------------------------------------------------------------------

    #[test]
    fn attributes_roundtrip() {
        let mut s = store();
        s.create_group("/g").unwrap();
        s.set_attribute("/g", "unit", AttributeValue::from("volt"))
            .unwrap();
        let attrs = s.attributes("/g").unwrap();
        assert_eq!(attrs.get("unit"), Some(&AttributeValue::from("volt")));
    }

    #[test]
    fn external_link_kind() {
        let mut s = store();
        s.create_external_link("/ext", "other.hdc", "/shared").unwrap();
        assert_eq!(
            s.kind("/ext").unwrap(),
            EntryKind::ExternalLink {
                file: "other.hdc".to_string(),
                target: "/shared".to_string()
            }
        );
    }
}
