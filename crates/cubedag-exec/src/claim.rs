//! Claim-or-join: at most one computation per key, shared by all callers.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OnceCell;

/// Hands out one completion cell per key. The first caller to drive a cell
/// runs the computation; later and concurrent callers await the same cell
/// and get a clone of its outcome (errors included).
#[derive(Debug)]
pub struct ClaimTable<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for ClaimTable<K, V> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> ClaimTable<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<OnceCell<V>>>> {
        // the map stays consistent even if a holder panicked
        self.cells.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The completion cell of `key`, created on first touch.
    pub fn handle(&self, key: &K) -> Arc<OnceCell<V>> {
        let mut cells = self.lock();
        if let Some(cell) = cells.get(key) {
            return Arc::clone(cell);
        }
        let cell = Arc::new(OnceCell::new());
        cells.insert(key.clone(), Arc::clone(&cell));
        cell
    }

    /// Run `compute` unless someone else already claimed `key`; either way,
    /// return the single outcome for `key`.
    pub async fn claim_or_join<F, Fut>(&self, key: &K, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = self.handle(key);
        cell.get_or_init(compute).await.clone()
    }

    /// The outcome of `key`, if it is complete.
    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).and_then(|cell| cell.get().cloned())
    }

    /// Completed entries.
    pub fn completed(&self) -> Vec<(K, V)> {
        self.lock()
            .iter()
            .filter_map(|(k, cell)| cell.get().map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Keys touched so far, complete or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
