use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hk_core::DisplayProjection;

/// Handle returned by `on_projection_changed`, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type ProjectionCallback = Arc<dyn Fn(&DisplayProjection) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<(ListenerId, ProjectionCallback)>,
}

/// Projection listeners shared between the controller handle and its worker.
#[derive(Clone, Default)]
pub(crate) struct ProjectionListeners {
    inner: Arc<Mutex<Registry>>,
}

impl ProjectionListeners {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        // A panicking callback never runs under the lock, so the registry stays consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add(&self, callback: ProjectionCallback) -> ListenerId {
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry.entries.push((id, callback));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut registry = self.lock();
        let before = registry.entries.len();
        registry.entries.retain(|(entry_id, _)| *entry_id != id);
        registry.entries.len() != before
    }

    /// Invoke every listener outside the lock so callbacks may (un)register.
    pub(crate) fn notify(&self, projection: &DisplayProjection) {
        let callbacks: Vec<ProjectionCallback> = self
            .lock()
            .entries
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(projection);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }
}
