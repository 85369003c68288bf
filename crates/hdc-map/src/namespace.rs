use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A versioned collection of machine-readable type definitions.
///
/// Type definitions are opaque JSON documents as far as the engine is
/// concerned; the schema layer owns their meaning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    pub version: String,
    /// The namespace's own metadata document.
    pub metadata: serde_json::Value,
    types: BTreeMap<String, serde_json::Value>,
}

impl Namespace {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            metadata,
            types: BTreeMap::new(),
        }
    }

    /// Register a type definition under its type name.
    pub fn add_type(&mut self, type_name: impl Into<String>, definition: serde_json::Value) {
        self.types.insert(type_name.into(), definition);
    }

    pub fn get_type(&self, type_name: &str) -> Option<&serde_json::Value> {
        self.types.get(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// (name, definition) pairs, sorted by name.
    pub fn types(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

/// All namespaces known to a session, keyed by namespace name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceCatalog {
    namespaces: BTreeMap<String, Namespace>,
}

impl NamespaceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a namespace, replacing any previous registration of the
    /// same name.
    pub fn register(&mut self, namespace: Namespace) {
        self.namespaces.insert(namespace.name.clone(), namespace);
    }

    pub fn get(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Namespace> {
        self.namespaces.get_mut(name)
    }

    /// All namespaces, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Namespace> {
        self.namespaces.values()
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_and_lookup_types() {
        let mut ns = Namespace::new("core", "1.2.0", json!({"doc": "core types"}));
        ns.add_type("TimeSeries", json!({"fields": ["data", "timestamps"]}));
        ns.add_type("ElectrodeTable", json!({"fields": ["x", "y", "z"]}));

        assert_eq!(ns.type_count(), 2);
        assert!(ns.get_type("TimeSeries").is_some());
        assert!(ns.get_type("Missing").is_none());
        let names: Vec<_> = ns.type_names().collect();
        assert_eq!(names, vec!["ElectrodeTable", "TimeSeries"]);
    }

    #[test]
    fn catalog_replaces_same_name() {
        let mut catalog = NamespaceCatalog::new();
        catalog.register(Namespace::new("core", "1.0.0", json!({})));
        catalog.register(Namespace::new("core", "2.0.0", json!({})));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("core").unwrap().version, "2.0.0");
    }

    #[test]
    fn namespace_serializes_to_json() {
        let mut ns = Namespace::new("ext", "0.1.0", json!({"author": "lab"}));
        ns.add_type("Thing", json!({"doc": "a thing"}));
        let text = serde_json::to_string(&ns).unwrap();
        let back: Namespace = serde_json::from_str(&text).unwrap();
        assert_eq!(ns, back);
    }
}
