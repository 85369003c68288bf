use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use hdc_builder::{BuilderId, BuilderTree, Container, ContainerKey};

use crate::error::{MapError, MapResult};

/// The schema-layer boundary.
///
/// `build` materializes a domain object as a builder sub-tree; `construct`
/// reconstructs a domain object from a builder node. The engine never
/// interprets domain objects itself.
pub trait ObjectMapper {
    fn build(&self, container: &dyn Container, tree: &mut BuilderTree) -> MapResult<BuilderId>;

    fn construct(&self, tree: &BuilderTree, node: BuilderId) -> MapResult<Arc<dyn Container>>;
}

/// Session-scoped identity cache between domain objects and builders.
///
/// A pure caching layer: it has no failure modes of its own and never
/// evicts an entry for the lifetime of the session.
#[derive(Default)]
pub struct BuildManager {
    mapper: Option<Box<dyn ObjectMapper>>,
    /// Write side: logical object -> builder.
    built: HashMap<ContainerKey, BuilderId>,
    /// Read side: (file id, path) -> builder.
    builders: HashMap<(String, String), BuilderId>,
    /// Read side: (file id, path) -> reconstructed object.
    constructed: HashMap<(String, String), Arc<dyn Container>>,
}

impl BuildManager {
    /// A manager with no schema layer attached. Sessions that never defer
    /// a reference to an unbuilt domain object do not need one.
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager delegating object materialization to the given mapper.
    pub fn with_mapper(mapper: Box<dyn ObjectMapper>) -> Self {
        Self {
            mapper: Some(mapper),
            ..Self::default()
        }
    }

    /// Return the cached builder for this object, materializing and
    /// caching it through the mapper on first sight.
    pub fn get_or_build(
        &mut self,
        container: &Arc<dyn Container>,
        tree: &mut BuilderTree,
    ) -> MapResult<BuilderId> {
        let key = container.container_key();
        if let Some(&id) = self.built.get(&key) {
            return Ok(id);
        }
        let mapper = self.mapper.as_ref().ok_or(MapError::MapperMissing)?;
        let id = mapper.build(container.as_ref(), tree)?;
        debug!(%key, ty = container.container_type(), "materialized container");
        self.built.insert(key, id);
        Ok(id)
    }

    /// Return the cached reconstructed object for this physical node,
    /// constructing and caching it through the mapper on first sight.
    pub fn get_or_construct(
        &mut self,
        source: &str,
        path: &str,
        node: BuilderId,
        tree: &BuilderTree,
    ) -> MapResult<Arc<dyn Container>> {
        let key = (source.to_string(), path.to_string());
        if let Some(container) = self.constructed.get(&key) {
            return Ok(Arc::clone(container));
        }
        let mapper = self.mapper.as_ref().ok_or(MapError::MapperMissing)?;
        let container = mapper.construct(tree, node)?;
        self.constructed.insert(key, Arc::clone(&container));
        Ok(container)
    }

    /// The builder previously cached for `(source, path)`, if any.
    pub fn cached_builder(&self, source: &str, path: &str) -> Option<BuilderId> {
        self.builders
            .get(&(source.to_string(), path.to_string()))
            .copied()
    }

    /// Cache the builder for `(source, path)`. First entry wins; the cache
    /// never replaces an existing entry mid-session.
    pub fn cache_builder(&mut self, source: &str, path: &str, id: BuilderId) {
        self.builders
            .entry((source.to_string(), path.to_string()))
            .or_insert(id);
    }

    /// The builder cached for a write-side object, if any.
    pub fn built(&self, key: ContainerKey) -> Option<BuilderId> {
        self.built.get(&key).copied()
    }
}

impl std::fmt::Debug for BuildManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildManager")
            .field("has_mapper", &self.mapper.is_some())
            .field("built", &self.built.len())
            .field("builders", &self.builders.len())
            .field("constructed", &self.constructed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use hdc_builder::DatasetValue;

    #[derive(Debug)]
    struct Probe {
        key: ContainerKey,
        name: String,
    }

    impl Container for Probe {
        fn container_key(&self) -> ContainerKey {
            self.key
        }

        fn container_type(&self) -> &str {
            "Probe"
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct CountingMapper {
        root: BuilderId,
        builds: Rc<Cell<u32>>,
    }

    impl ObjectMapper for CountingMapper {
        fn build(&self, container: &dyn Container, tree: &mut BuilderTree) -> MapResult<BuilderId> {
            self.builds.set(self.builds.get() + 1);
            let group = tree.add_group(self.root, container.name())?;
            tree.add_dataset(
                group,
                "data",
                DatasetValue::from_values([1i32, 2, 3]),
                None,
                None,
            )?;
            Ok(group)
        }

        fn construct(&self, _tree: &BuilderTree, _node: BuilderId) -> MapResult<Arc<dyn Container>> {
            Ok(Arc::new(Probe {
                key: ContainerKey(99),
                name: "constructed".into(),
            }))
        }
    }

    #[test]
    fn get_or_build_materializes_once() {
        let mut tree = BuilderTree::new();
        let root = tree.add_root(Some("main".into()));
        let builds = Rc::new(Cell::new(0));
        let mut manager = BuildManager::with_mapper(Box::new(CountingMapper {
            root,
            builds: Rc::clone(&builds),
        }));

        let probe: Arc<dyn Container> = Arc::new(Probe {
            key: ContainerKey(1),
            name: "probe0".into(),
        });
        let first = manager.get_or_build(&probe, &mut tree).unwrap();
        let second = manager.get_or_build(&probe, &mut tree).unwrap();
        assert_eq!(first, second);
        assert_eq!(builds.get(), 1);
        assert_eq!(manager.built(ContainerKey(1)), Some(first));
    }

    #[test]
    fn get_or_build_without_mapper_fails() {
        let mut tree = BuilderTree::new();
        tree.add_root(None);
        let mut manager = BuildManager::new();
        let probe: Arc<dyn Container> = Arc::new(Probe {
            key: ContainerKey(1),
            name: "probe0".into(),
        });
        let err = manager.get_or_build(&probe, &mut tree).unwrap_err();
        assert!(matches!(err, MapError::MapperMissing));
    }

    #[test]
    fn builder_cache_first_entry_wins() {
        let mut tree = BuilderTree::new();
        let root = tree.add_root(Some("main".into()));
        let a = tree.add_group(root, "a").unwrap();
        let b = tree.add_group(root, "b").unwrap();

        let mut manager = BuildManager::new();
        assert_eq!(manager.cached_builder("main", "/x"), None);
        manager.cache_builder("main", "/x", a);
        manager.cache_builder("main", "/x", b);
        assert_eq!(manager.cached_builder("main", "/x"), Some(a));
    }

    #[test]
    fn builder_cache_is_keyed_by_file() {
        let mut tree = BuilderTree::new();
        let root = tree.add_root(Some("main".into()));
        let a = tree.add_group(root, "a").unwrap();

        let mut manager = BuildManager::new();
        manager.cache_builder("main", "/x", a);
        assert_eq!(manager.cached_builder("other", "/x"), None);
    }

    #[test]
    fn get_or_construct_caches_by_path() {
        let mut tree = BuilderTree::new();
        let root = tree.add_root(Some("main".into()));
        let node = tree.add_group(root, "n").unwrap();
        let mut manager = BuildManager::with_mapper(Box::new(CountingMapper {
            root,
            builds: Rc::new(Cell::new(0)),
        }));

        let first = manager.get_or_construct("main", "/n", node, &tree).unwrap();
        let second = manager.get_or_construct("main", "/n", node, &tree).unwrap();
        assert_eq!(first.container_key(), second.container_key());
        assert!(Arc::ptr_eq(&first, &second));
    }
}
