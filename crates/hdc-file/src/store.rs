use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use hdc_store::{DatasetMeta, EntryKind, MemoryStore, Storage, StorageResult};
use hdc_types::{AttributeValue, Dtype, MaxShape, Selection, Shape, Value};

use crate::error::FileResult;
use crate::format::{decode_store, encode_store};

/// A [`Storage`] backend persisted as a single binary container file.
///
/// Session state lives in an in-memory store; [`FileStore::persist`]
/// encodes it and atomically replaces the target file (temporary file,
/// then rename), so a failed write never leaves a half-written container
/// behind. Dropping a store with unpersisted changes logs a warning --
/// persistence is always an explicit, fallible step.
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
    dirty: bool,
}

impl FileStore {
    /// Create a new, empty container for the given path. Nothing is
    /// written until [`persist`](Self::persist).
    pub fn create(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_id = path.display().to_string();
        Self {
            path,
            inner: MemoryStore::new(file_id),
            dirty: false,
        }
    }

    /// Open an existing container file, verifying its checksum.
    pub fn open(path: impl Into<PathBuf>) -> FileResult<Self> {
        let path = path.into();
        let data = std::fs::read(&path)?;
        let file_id = path.display().to_string();
        let inner = decode_store(&data, &file_id)?;
        debug!(file = %file_id, nodes = inner.len(), "opened container");
        Ok(Self {
            path,
            inner,
            dirty: false,
        })
    }

    /// Encode the current state and atomically replace the target file.
    pub fn persist(&mut self) -> FileResult<()> {
        let data = encode_store(&self.inner)?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&data)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        self.dirty = false;
        debug!(file = %self.path.display(), bytes = data.len(), "persisted container");
        Ok(())
    }

    /// Persist pending changes (if any) and release the store.
    pub fn close(mut self) -> FileResult<()> {
        if self.dirty {
            self.persist()?;
        }
        Ok(())
    }

    /// The target path of this container.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether there are changes not yet persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if self.dirty {
            warn!(
                file = %self.path.display(),
                "container dropped with unpersisted changes"
            );
        }
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("nodes", &self.inner.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Storage for FileStore {
    fn file_id(&self) -> &str {
        self.inner.file_id()
    }

    fn create_group(&mut self, path: &str) -> StorageResult<()> {
        self.inner.create_group(path)?;
        self.dirty = true;
        Ok(())
    }

    fn ensure_group(&mut self, path: &str) -> StorageResult<()> {
        self.inner.ensure_group(path)?;
        self.dirty = true;
        Ok(())
    }

    fn create_dataset(
        &mut self,
        path: &str,
        dtype: Dtype,
        shape: &Shape,
        maxshape: Option<&MaxShape>,
        chunk_shape: Option<&Shape>,
    ) -> StorageResult<()> {
        self.inner
            .create_dataset(path, dtype, shape, maxshape, chunk_shape)?;
        self.dirty = true;
        Ok(())
    }

    fn write_scalar(&mut self, path: &str, value: Value) -> StorageResult<()> {
        self.inner.write_scalar(path, value)?;
        self.dirty = true;
        Ok(())
    }

    fn write_selection(
        &mut self,
        path: &str,
        selection: &Selection,
        values: &[Value],
    ) -> StorageResult<()> {
        self.inner.write_selection(path, selection, values)?;
        self.dirty = true;
        Ok(())
    }

    fn resize(&mut self, path: &str, new_shape: &Shape) -> StorageResult<()> {
        self.inner.resize(path, new_shape)?;
        self.dirty = true;
        Ok(())
    }

    fn set_attribute(
        &mut self,
        path: &str,
        name: &str,
        value: AttributeValue,
    ) -> StorageResult<()> {
        self.inner.set_attribute(path, name, value)?;
        self.dirty = true;
        Ok(())
    }

    fn create_soft_link(&mut self, path: &str, target_path: &str) -> StorageResult<()> {
        self.inner.create_soft_link(path, target_path)?;
        self.dirty = true;
        Ok(())
    }

    fn create_external_link(
        &mut self,
        path: &str,
        file: &str,
        target_path: &str,
    ) -> StorageResult<()> {
        self.inner.create_external_link(path, file, target_path)?;
        self.dirty = true;
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.inner.exists(path)
    }

    fn kind(&self, path: &str) -> StorageResult<EntryKind> {
        self.inner.kind(path)
    }

    fn children(&self, path: &str) -> StorageResult<Vec<(String, EntryKind)>> {
        self.inner.children(path)
    }

    fn attributes(&self, path: &str) -> StorageResult<BTreeMap<String, AttributeValue>> {
        self.inner.attributes(path)
    }

    fn dataset_meta(&self, path: &str) -> StorageResult<DatasetMeta> {
        self.inner.dataset_meta(path)
    }

    fn read_scalar(&self, path: &str) -> StorageResult<Value> {
        self.inner.read_scalar(path)
    }

    fn read_selection(&self, path: &str, selection: &Selection) -> StorageResult<Vec<Value>> {
        self.inner.read_selection(path, selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persist_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("session.hdc");

        let mut store = FileStore::create(&target);
        store.create_group("/acquisition").unwrap();
        store
            .create_dataset("/acquisition/d", Dtype::Int32, &Shape(vec![3]), None, None)
            .unwrap();
        store
            .write_selection(
                "/acquisition/d",
                &Selection::All,
                &[Value::Int32(1), Value::Int32(2), Value::Int32(3)],
            )
            .unwrap();
        store
            .set_attribute("/", "version", AttributeValue::from("0.1"))
            .unwrap();
        assert!(store.is_dirty());
        store.persist().unwrap();
        assert!(!store.is_dirty());
        drop(store);

        let reopened = FileStore::open(&target).unwrap();
        assert_eq!(
            reopened
                .read_selection("/acquisition/d", &Selection::All)
                .unwrap(),
            vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]
        );
        assert_eq!(
            reopened.attributes("/").unwrap().get("version"),
            Some(&AttributeValue::from("0.1"))
        );
        assert_eq!(reopened.file_id(), target.display().to_string());
    }

    #[test]
    fn close_persists_pending_changes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("pending.hdc");

        let mut store = FileStore::create(&target);
        store.create_group("/g").unwrap();
        store.close().unwrap();

        let reopened = FileStore::open(&target).unwrap();
        assert_eq!(reopened.kind("/g").unwrap(), EntryKind::Group);
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileStore::open(dir.path().join("absent.hdc")).unwrap_err();
        assert!(matches!(err, crate::error::FileError::Io(_)));
    }

    #[test]
    fn persist_overwrites_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("twice.hdc");

        let mut store = FileStore::create(&target);
        store.create_group("/first").unwrap();
        store.persist().unwrap();

        store.create_group("/second").unwrap();
        store.persist().unwrap();
        drop(store);

        let reopened = FileStore::open(&target).unwrap();
        assert!(reopened.exists("/first"));
        assert!(reopened.exists("/second"));
    }
}
