use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;

use super::control::RunningTaskControl;

struct InFlightEntry {
    control: Arc<RunningTaskControl>,
    scope: String,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<String, InFlightEntry>,
    /// Units whose entry is gone but which may still be winding down, such as
    /// a force-stopped process inside its termination grace period.
    detached: Vec<JoinHandle<()>>,
}

impl RegistryState {
    fn detach(&mut self, handle: JoinHandle<()>) {
        self.detached.retain(|h| !h.is_finished());
        if !handle.is_finished() {
            self.detached.push(handle);
        }
    }
}

/// Single record per running task: control handle, scope key, unit-of-work
/// handle. `register` and `unregister*` are the only mutation points.
#[derive(Clone, Default)]
pub struct InFlightRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, control: Arc<RunningTaskControl>, scope: String) {
        let id = control.task_id().to_string();
        self.lock().entries.insert(
            id,
            InFlightEntry {
                control,
                scope,
                handle: None,
            },
        );
    }

    /// Stores the unit-of-work handle. If the entry is already gone the handle
    /// is kept aside so `take_handles` still returns it.
    pub fn attach_handle(&self, task_id: &str, handle: JoinHandle<()>) -> bool {
        let mut state = self.lock();
        match state.entries.get_mut(task_id) {
            Some(entry) => {
                entry.handle = Some(handle);
                true
            }
            None => {
                state.detach(handle);
                false
            }
        }
    }

    pub fn control(&self, task_id: &str) -> Option<Arc<RunningTaskControl>> {
        self.lock().entries.get(task_id).map(|e| e.control.clone())
    }

    /// Removes the entry only if it still belongs to `control`. Its unit
    /// handle stays reachable through `take_handles`.
    pub fn unregister_if(&self, task_id: &str, control: &RunningTaskControl) -> bool {
        let mut state = self.lock();
        let owned = state
            .entries
            .get(task_id)
            .map(|e| std::ptr::eq(Arc::as_ptr(&e.control), control))
            .unwrap_or(false);
        if owned {
            if let Some(handle) = state.entries.remove(task_id).and_then(|e| e.handle) {
                state.detach(handle);
            }
        }
        owned
    }

    pub fn active_scopes(&self) -> HashSet<String> {
        self.lock().entries.values().map(|e| e.scope.clone()).collect()
    }

    pub fn scope_of(&self, task_id: &str) -> Option<String> {
        self.lock().entries.get(task_id).map(|e| e.scope.clone())
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.lock().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Takes every unit-of-work handle: those attached to live entries and
    /// those of units already unregistered. Entries stay in place.
    pub fn take_handles(&self) -> Vec<JoinHandle<()>> {
        let mut state = self.lock();
        let mut handles = std::mem::take(&mut state.detached);
        handles.extend(state.entries.values_mut().filter_map(|e| e.handle.take()));
        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Weak;

    fn control(id: &str) -> Arc<RunningTaskControl> {
        Arc::new(RunningTaskControl::new(id, Weak::new()))
    }

    #[test]
    fn register_and_lookup() {
        let reg = InFlightRegistry::new();
        reg.register(control("a"), "project:p".into());
        assert_eq!(reg.len(), 1);
        assert!(reg.control("a").is_some());
        assert_eq!(reg.scope_of("a").as_deref(), Some("project:p"));
        assert!(reg.active_scopes().contains("project:p"));
    }

    #[test]
    fn unregister_requires_matching_control() {
        let reg = InFlightRegistry::new();
        let first = control("a");
        reg.register(first.clone(), "s".into());
        let stranger = control("a");
        assert!(!reg.unregister_if("a", &stranger));
        assert!(reg.unregister_if("a", &first));
        assert!(reg.is_empty());
        assert!(!reg.unregister_if("a", &first));
    }

    #[tokio::test]
    async fn unregistered_unit_handle_is_still_drained() {
        let reg = InFlightRegistry::new();
        let c = control("a");
        reg.register(c.clone(), "s".into());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        reg.attach_handle(
            "a",
            tokio::spawn(async move {
                let _ = rx.await;
            }),
        );

        assert!(reg.unregister_if("a", &c));
        assert!(reg.is_empty());
        let handles = reg.take_handles();
        assert_eq!(handles.len(), 1);
        tx.send(()).unwrap();
        for h in handles {
            h.await.unwrap();
        }
        assert!(reg.take_handles().is_empty());
    }

    #[tokio::test]
    async fn attach_after_removal_is_kept_aside() {
        let reg = InFlightRegistry::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = rx.await;
        });
        assert!(!reg.attach_handle("missing", handle));
        assert_eq!(reg.take_handles().len(), 1);
        drop(tx);

        let c = control("b");
        reg.register(c.clone(), "s".into());
        assert!(reg.attach_handle("b", tokio::spawn(async {})));
        let handles = reg.take_handles();
        assert_eq!(handles.len(), 1);
        assert!(reg.take_handles().is_empty());
        assert_eq!(reg.len(), 1);
    }
}
