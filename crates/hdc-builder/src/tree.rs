use std::collections::BTreeMap;

use tracing::debug;

use hdc_types::{AttributeValue, DtypeSpec, MaxShape, Selection};

use crate::data::{DatasetValue, RefTarget};
use crate::error::{BuilderError, BuilderResult};

/// Name of the synthetic root node; excluded from computed paths.
pub const ROOT_NAME: &str = "root";

/// Handle to a node in a [`BuilderTree`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuilderId(u32);

impl BuilderId {
    pub(crate) fn from_index(index: usize) -> Self {
        BuilderId(index as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Child maps of a group node. Names are unique across all three maps.
#[derive(Debug, Default)]
pub struct GroupNode {
    pub groups: BTreeMap<String, BuilderId>,
    pub datasets: BTreeMap<String, BuilderId>,
    pub links: BTreeMap<String, BuilderId>,
}

impl GroupNode {
    fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name)
            || self.datasets.contains_key(name)
            || self.links.contains_key(name)
    }

    fn child(&self, name: &str) -> Option<BuilderId> {
        self.groups
            .get(name)
            .or_else(|| self.datasets.get(name))
            .or_else(|| self.links.get(name))
            .copied()
    }
}

/// Payload of a dataset node.
#[derive(Debug)]
pub struct DatasetNode {
    pub data: DatasetValue,
    pub dtype: Option<DtypeSpec>,
    pub maxshape: Option<MaxShape>,
}

/// Payload of a link node. The target may live under a different root
/// (a different physical file) in the same arena.
#[derive(Debug)]
pub struct LinkNode {
    pub target: BuilderId,
}

/// Kind-specific payload of a builder node.
#[derive(Debug)]
pub enum BuilderPayload {
    Group(GroupNode),
    Dataset(DatasetNode),
    Link(LinkNode),
}

/// A single node of the builder tree.
#[derive(Debug)]
pub struct BuilderNode {
    pub name: String,
    /// Non-owning back-reference used for path computation.
    pub parent: Option<BuilderId>,
    /// Identifier of the physical file this node originates from, or
    /// `None` for purely in-memory nodes.
    pub source: Option<String>,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub payload: BuilderPayload,
}

impl BuilderNode {
    pub fn is_group(&self) -> bool {
        matches!(self.payload, BuilderPayload::Group(_))
    }

    pub fn is_dataset(&self) -> bool {
        matches!(self.payload, BuilderPayload::Dataset(_))
    }

    pub fn is_link(&self) -> bool {
        matches!(self.payload, BuilderPayload::Link(_))
    }

    pub fn as_group(&self) -> Option<&GroupNode> {
        match &self.payload {
            BuilderPayload::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_dataset(&self) -> Option<&DatasetNode> {
        match &self.payload {
            BuilderPayload::Dataset(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<&LinkNode> {
        match &self.payload {
            BuilderPayload::Link(l) => Some(l),
            _ => None,
        }
    }
}

/// Session-scoped arena of builder nodes.
///
/// The arena owns every node; handles stay valid for the arena's lifetime
/// (nodes are never removed -- a session consumes the tree exactly once).
#[derive(Debug, Default)]
pub struct BuilderTree {
    nodes: Vec<BuilderNode>,
}

impl BuilderTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the arena, across all roots.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a root group. An arena may hold one root per physical file.
    pub fn add_root(&mut self, source: Option<String>) -> BuilderId {
        self.push(BuilderNode {
            name: ROOT_NAME.to_string(),
            parent: None,
            source,
            attributes: BTreeMap::new(),
            payload: BuilderPayload::Group(GroupNode::default()),
        })
    }

    /// Create a detached group node. Used by the read walker, which may
    /// reach a link's target before the group that owns it; [`attach`]
    /// wires the node into its owner later.
    ///
    /// [`attach`]: Self::attach
    pub fn new_group(&mut self, name: &str, source: Option<String>) -> BuilderId {
        self.push(BuilderNode {
            name: name.to_string(),
            parent: None,
            source,
            attributes: BTreeMap::new(),
            payload: BuilderPayload::Group(GroupNode::default()),
        })
    }

    /// Create a detached dataset node; see [`new_group`](Self::new_group).
    pub fn new_dataset(
        &mut self,
        name: &str,
        source: Option<String>,
        data: DatasetValue,
        dtype: Option<DtypeSpec>,
        maxshape: Option<MaxShape>,
    ) -> BuilderId {
        self.push(BuilderNode {
            name: name.to_string(),
            parent: None,
            source,
            attributes: BTreeMap::new(),
            payload: BuilderPayload::Dataset(DatasetNode {
                data,
                dtype,
                maxshape,
            }),
        })
    }

    /// Attach a detached node under its owning group, registering it by
    /// its own name and kind.
    pub fn attach(&mut self, parent: BuilderId, child: BuilderId) -> BuilderResult<()> {
        let name = self.node(child).name.clone();
        self.ensure_can_add(parent, &name)?;
        let kind = match self.node(child).payload {
            BuilderPayload::Group(_) => ChildKind::Group,
            BuilderPayload::Dataset(_) => ChildKind::Dataset,
            BuilderPayload::Link(_) => ChildKind::Link,
        };
        self.nodes[child.index()].parent = Some(parent);
        self.register_child(parent, &name, child, kind);
        Ok(())
    }

    /// Add a sub-group under `parent`.
    pub fn add_group(&mut self, parent: BuilderId, name: &str) -> BuilderResult<BuilderId> {
        self.ensure_can_add(parent, name)?;
        let source = self.node(parent).source.clone();
        let id = self.new_group(name, source);
        self.nodes[id.index()].parent = Some(parent);
        self.register_child(parent, name, id, ChildKind::Group);
        Ok(id)
    }

    /// Add a dataset under `parent`.
    pub fn add_dataset(
        &mut self,
        parent: BuilderId,
        name: &str,
        data: DatasetValue,
        dtype: Option<DtypeSpec>,
        maxshape: Option<MaxShape>,
    ) -> BuilderResult<BuilderId> {
        self.ensure_can_add(parent, name)?;
        let source = self.node(parent).source.clone();
        let id = self.new_dataset(name, source, data, dtype, maxshape);
        self.nodes[id.index()].parent = Some(parent);
        self.register_child(parent, name, id, ChildKind::Dataset);
        Ok(id)
    }

    /// Add a region-reference dataset under `parent`, pointing at a
    /// sub-region of `target`'s extent.
    ///
    /// Fails with [`BuilderError::InvalidRegionTarget`] unless `target` is
    /// a dataset node.
    pub fn add_region(
        &mut self,
        parent: BuilderId,
        name: &str,
        target: BuilderId,
        selection: Selection,
    ) -> BuilderResult<BuilderId> {
        if !self.node(target).is_dataset() {
            return Err(BuilderError::InvalidRegionTarget {
                path: self.path(target),
            });
        }
        self.add_dataset(
            parent,
            name,
            DatasetValue::Region {
                target: RefTarget::Node(target),
                selection,
            },
            None,
            None,
        )
    }

    /// Add a link under `parent` pointing at `target`. The target keeps
    /// its single owning parent; the link is a non-owning relation.
    pub fn add_link(
        &mut self,
        parent: BuilderId,
        name: &str,
        target: BuilderId,
    ) -> BuilderResult<BuilderId> {
        self.ensure_can_add(parent, name)?;
        let source = self.node(parent).source.clone();
        let id = self.push(BuilderNode {
            name: name.to_string(),
            parent: Some(parent),
            source,
            attributes: BTreeMap::new(),
            payload: BuilderPayload::Link(LinkNode { target }),
        });
        self.register_child(parent, name, id, ChildKind::Link);
        Ok(id)
    }

    /// Set an attribute on any node.
    pub fn set_attribute(
        &mut self,
        id: BuilderId,
        name: &str,
        value: impl Into<AttributeValue>,
    ) {
        self.nodes[id.index()]
            .attributes
            .insert(name.to_string(), value.into());
    }

    pub fn node(&self, id: BuilderId) -> &BuilderNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: BuilderId) -> &mut BuilderNode {
        &mut self.nodes[id.index()]
    }

    /// The absolute path of a node: "/"-joined ancestor names with the
    /// root excluded. The root itself is `"/"`.
    pub fn path(&self, id: BuilderId) -> String {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.node(current);
            if node.parent.is_none() {
                break;
            }
            names.push(node.name.as_str());
            cursor = node.parent;
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    /// Resolve an absolute path below `root` to a node handle.
    pub fn find(&self, root: BuilderId, path: &str) -> Option<BuilderId> {
        let mut cursor = root;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let group = self.node(cursor).as_group()?;
            cursor = group.child(segment)?;
        }
        Some(cursor)
    }

    fn push(&mut self, node: BuilderNode) -> BuilderId {
        let id = BuilderId::from_index(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn ensure_can_add(&self, parent: BuilderId, name: &str) -> BuilderResult<()> {
        let group = match self.node(parent).as_group() {
            Some(g) => g,
            None => {
                return Err(BuilderError::NotAGroup {
                    path: self.path(parent),
                })
            }
        };
        if group.contains(name) {
            return Err(BuilderError::NameCollision {
                name: name.to_string(),
                parent_path: self.path(parent),
            });
        }
        Ok(())
    }

    fn register_child(&mut self, parent: BuilderId, name: &str, child: BuilderId, kind: ChildKind) {
        let parent_path = self.path(parent);
        let group = match &mut self.nodes[parent.index()].payload {
            BuilderPayload::Group(g) => g,
            // ensure_can_add ran first
            _ => unreachable!("parent validated as group"),
        };
        let map = match kind {
            ChildKind::Group => &mut group.groups,
            ChildKind::Dataset => &mut group.datasets,
            ChildKind::Link => &mut group.links,
        };
        map.insert(name.to_string(), child);
        debug!(name, parent = %parent_path, "registered builder node");
    }
}

enum ChildKind {
    Group,
    Dataset,
    Link,
}
