use std::collections::HashMap;

use hdc_map::BuildManager;
use hdc_store::Storage;

use crate::refqueue::DeferredRef;

/// One read or write session against a primary backend.
///
/// The session owns the backend for its duration, the build manager's
/// identity caches, the deferred reference queue, and a registry of
/// secondary read-only backends for resolving external link targets.
/// Everything is single-threaded and synchronous; the caches live exactly
/// as long as the session.
pub struct ContainerSession<S: Storage> {
    pub(crate) store: S,
    pub(crate) manager: BuildManager,
    pub(crate) externals: HashMap<String, Box<dyn Storage>>,
    pub(crate) ref_queue: Vec<DeferredRef>,
}

impl<S: Storage> ContainerSession<S> {
    /// A session with a fresh, mapper-less build manager.
    pub fn new(store: S) -> Self {
        Self::with_manager(store, BuildManager::new())
    }

    /// A session using the given build manager (typically one carrying
    /// the schema layer's object mapper).
    pub fn with_manager(store: S, manager: BuildManager) -> Self {
        Self {
            store,
            manager,
            externals: HashMap::new(),
            ref_queue: Vec::new(),
        }
    }

    /// Attach a secondary backend so external link targets in its file
    /// can be resolved on read. Keyed by the backend's file id.
    pub fn attach_external(&mut self, store: Box<dyn Storage>) {
        self.externals.insert(store.file_id().to_string(), store);
    }

    /// The primary backend.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// The session's build manager.
    pub fn manager(&self) -> &BuildManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut BuildManager {
        &mut self.manager
    }

    /// Release the session and hand the backend back (e.g. to persist a
    /// file store).
    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S: Storage> std::fmt::Debug for ContainerSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerSession")
            .field("file", &self.store.file_id())
            .field("externals", &self.externals.len())
            .field("queued_refs", &self.ref_queue.len())
            .finish()
    }
}
