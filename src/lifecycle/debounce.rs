//! Per-key cancellable delayed tasks

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

type Tasks<K> = Arc<Mutex<HashMap<K, (u64, JoinHandle<()>)>>>;

fn lock<K>(tasks: &Tasks<K>) -> MutexGuard<'_, HashMap<K, (u64, JoinHandle<()>)>> {
    tasks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs the latest action scheduled for a key once the key has been quiet for
/// `delay`. Scheduling again for the same key replaces the previous action.
pub struct Debouncer<K> {
    delay: Duration,
    tasks: Tasks<K>,
    generation: Arc<Mutex<u64>>,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(Mutex::new(0)),
        }
    }

    /// Schedule `action` for `key`, cancelling anything pending for it.
    ///
    /// Outside a tokio runtime the action runs immediately.
    pub fn schedule<F>(&self, key: K, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            self.cancel(&key);
            action();
            return;
        };

        let generation = {
            let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
            *generation += 1;
            *generation
        };

        // Spawn and register under the same lock so the task cannot look
        // itself up before it is registered.
        let mut tasks = lock(&self.tasks);
        let registry = Arc::clone(&self.tasks);
        let delay = self.delay;
        let task_key = key.clone();
        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let current = {
                let mut tasks = lock(&registry);
                match tasks.get(&task_key) {
                    Some((g, _)) if *g == generation => {
                        tasks.remove(&task_key);
                        true
                    }
                    _ => false,
                }
            };
            if current {
                action();
            }
        });

        if let Some((_, previous)) = tasks.insert(key, (generation, task)) {
            previous.abort();
        }
    }

    /// Cancel the pending action for `key`. Returns `true` if one was pending.
    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.tasks).remove(key) {
            Some((_, task)) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (_, (_, task)) in lock(&self.tasks).drain() {
            task.abort();
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.tasks).contains_key(key)
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        for (_, (_, task)) in lock(&self.tasks).drain() {
            task.abort();
        }
    }
}
