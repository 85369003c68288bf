use hdc_map::{Namespace, NamespaceCatalog};
use hdc_store::{basename, join_path, parent_path, EntryKind, Storage};
use hdc_types::{AttributeValue, Dtype, ObjectRef, Shape, Value};

use crate::error::{IoError, IoResult};
use crate::session::ContainerSession;

/// Reserved root attribute recording the location of the schema cache
/// group, stored as an object-reference value.
pub const SCHEMA_LOC_ATTR: &str = ".schema_loc";

/// Default path (under the root) of the schema cache group.
pub const DEFAULT_SCHEMA_GROUP: &str = "schemas";

/// Name of the scalar text dataset holding a namespace's own metadata.
pub const NAMESPACE_DATASET: &str = "namespace";

impl<S: Storage> ContainerSession<S> {
    /// Cache machine-readable type definitions alongside the data.
    ///
    /// Layout: one child group per namespace and version
    /// (`<cache>/<name>/<version>`) containing one scalar text dataset per
    /// type (compact JSON) plus a [`NAMESPACE_DATASET`] text dataset with
    /// the namespace's own metadata.
    pub fn cache_schema(&mut self, catalog: &NamespaceCatalog) -> IoResult<()> {
        let group_path = self.schema_group_path()?;
        for namespace in catalog.iter() {
            let ns_path = join_path(&group_path, &namespace.name);
            self.store.ensure_group(&ns_path)?;
            let version_path = join_path(&ns_path, &namespace.version);
            self.store.ensure_group(&version_path)?;

            let doc = serde_json::json!({
                "name": namespace.name,
                "version": namespace.version,
                "metadata": namespace.metadata,
            });
            self.write_text_dataset(&join_path(&version_path, NAMESPACE_DATASET), doc.to_string())?;

            for (type_name, definition) in namespace.types() {
                self.write_text_dataset(&join_path(&version_path, type_name), definition.to_string())?;
            }
        }
        Ok(())
    }

    /// Load the cached type definitions, or an empty catalog if this
    /// container carries none.
    pub fn load_schema(&mut self) -> IoResult<NamespaceCatalog> {
        let mut catalog = NamespaceCatalog::new();
        let group_path = match self.store.attributes("/")?.get(SCHEMA_LOC_ATTR).cloned() {
            Some(AttributeValue::Scalar(Value::ObjectRef(r))) => r.path,
            _ => return Ok(catalog),
        };

        for (ns_name, kind) in self.store.children(&group_path)? {
            if kind != EntryKind::Group {
                continue;
            }
            let ns_path = join_path(&group_path, &ns_name);
            for (version, version_kind) in self.store.children(&ns_path)? {
                if version_kind != EntryKind::Group {
                    continue;
                }
                let version_path = join_path(&ns_path, &version);
                let doc = self.read_json(&join_path(&version_path, NAMESPACE_DATASET))?;
                let metadata = doc
                    .get("metadata")
                    .cloned()
                    .unwrap_or(serde_json::Value::Null);
                let mut namespace = Namespace::new(ns_name.clone(), version.clone(), metadata);

                for (type_name, type_kind) in self.store.children(&version_path)? {
                    if type_kind != EntryKind::Dataset || type_name == NAMESPACE_DATASET {
                        continue;
                    }
                    let definition = self.read_json(&join_path(&version_path, &type_name))?;
                    namespace.add_type(type_name, definition);
                }
                catalog.register(namespace);
            }
        }
        Ok(catalog)
    }

    /// The schema cache group recorded on the root, created (and
    /// recorded) on first use.
    fn schema_group_path(&mut self) -> IoResult<String> {
        if let Some(AttributeValue::Scalar(Value::ObjectRef(r))) =
            self.store.attributes("/")?.get(SCHEMA_LOC_ATTR)
        {
            return Ok(r.path.clone());
        }
        let path = format!("/{DEFAULT_SCHEMA_GROUP}");
        self.store.ensure_group(&path)?;
        self.store.set_attribute(
            "/",
            SCHEMA_LOC_ATTR,
            AttributeValue::Scalar(Value::ObjectRef(ObjectRef::new(path.clone()))),
        )?;
        Ok(path)
    }

    fn write_text_dataset(&mut self, path: &str, text: String) -> IoResult<()> {
        if !self.store.exists(path) {
            self.store
                .create_dataset(path, Dtype::Utf8, &Shape::scalar(), None, None)
                .map_err(|e| IoError::storage(basename(path), parent_path(path), e))?;
        }
        self.store
            .write_scalar(path, Value::Text(text))
            .map_err(|e| IoError::storage(basename(path), parent_path(path), e))?;
        Ok(())
    }

    fn read_json(&self, path: &str) -> IoResult<serde_json::Value> {
        match self.store.read_scalar(path)? {
            Value::Text(text) => serde_json::from_str(&text)
                .map_err(|e| IoError::SchemaCache(format!("invalid JSON in {path}: {e}"))),
            other => Err(IoError::SchemaCache(format!(
                "expected text dataset at {path}, found {}",
                other.kind_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdc_store::MemoryStore;
    use serde_json::json;

    fn catalog() -> NamespaceCatalog {
        let mut core = Namespace::new("core", "1.2.0", json!({"doc": "core types"}));
        core.add_type("TimeSeries", json!({"fields": ["data", "timestamps"]}));
        core.add_type("ElectrodeTable", json!({"fields": ["x", "y", "z"]}));
        let mut ext = Namespace::new("ext", "0.1.0", json!({"author": "lab"}));
        ext.add_type("Widget", json!({"doc": "a widget"}));

        let mut catalog = NamespaceCatalog::new();
        catalog.register(core);
        catalog.register(ext);
        catalog
    }

    #[test]
    fn cache_then_load_roundtrips() {
        let mut session = ContainerSession::new(MemoryStore::new("main.hdc"));
        let original = catalog();
        session.cache_schema(&original).unwrap();
        let loaded = session.load_schema().unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn cache_records_location_on_the_root() {
        let mut session = ContainerSession::new(MemoryStore::new("main.hdc"));
        session.cache_schema(&catalog()).unwrap();

        let attrs = session.store().attributes("/").unwrap();
        assert_eq!(
            attrs.get(SCHEMA_LOC_ATTR),
            Some(&AttributeValue::Scalar(Value::ObjectRef(ObjectRef::new(
                "/schemas"
            ))))
        );
        assert!(session.store().exists("/schemas/core/1.2.0/namespace"));
        assert!(session.store().exists("/schemas/core/1.2.0/TimeSeries"));
        assert!(session.store().exists("/schemas/ext/0.1.0/Widget"));
    }

    #[test]
    fn caching_twice_overwrites_in_place() {
        let mut session = ContainerSession::new(MemoryStore::new("main.hdc"));
        session.cache_schema(&catalog()).unwrap();
        session.cache_schema(&catalog()).unwrap();
        assert_eq!(session.load_schema().unwrap(), catalog());
    }

    #[test]
    fn container_without_cache_loads_empty() {
        let mut session = ContainerSession::new(MemoryStore::new("bare.hdc"));
        let loaded = session.load_schema().unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn malformed_cache_is_reported() {
        let mut session = ContainerSession::new(MemoryStore::new("main.hdc"));
        session.cache_schema(&catalog()).unwrap();
        session
            .store_mut()
            .write_scalar(
                "/schemas/core/1.2.0/TimeSeries",
                Value::Text("{not json".into()),
            )
            .unwrap();
        let err = session.load_schema().unwrap_err();
        assert!(matches!(err, IoError::SchemaCache(_)));
    }
}
