use std::{
    collections::{HashMap, hash_map::Entry},
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use crate::TimeSeries;

/// Shared handle to one live series.
///
/// The registry owns the entry; anything holding a clone keeps the series
/// alive even if the entry is deleted underneath it. Only the operation
/// actor ever locks the contents, so the mutex is uncontended in practice.
pub type SeriesHandle = Arc<Mutex<TimeSeries>>;

/// Process wide name to series map.
///
/// Called concurrently from every connection reader; internally
/// synchronised for lookup, conditional insert and delete.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<HashMap<String, SeriesHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `series` under its name unless an entry already exists.
    /// Returns whether the insert happened.
    pub fn insert_if_absent(&self, series: TimeSeries) -> bool {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match map.entry(series.name().to_owned()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(series)));
                true
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<SeriesHandle> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    /// Idempotent, deleting a missing entry is a no-op.
    pub fn delete(&self, name: &str) {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).remove(name);
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::Record;

    #[test]
    fn insert_is_first_writer_wins() {
        let registry = Registry::new();
        assert!(registry.insert_if_absent(TimeSeries::new("cpu", 0)));
        assert!(!registry.insert_if_absent(TimeSeries::new("cpu", 9000)));
        assert_eq!(registry.len(), 1);
        // the original retention survives the losing insert
        let handle = registry.get("cpu").unwrap();
        assert_eq!(handle.lock().unwrap().retention(), 0);
    }

    #[test]
    fn delete_is_idempotent() {
        let registry = Registry::new();
        registry.insert_if_absent(TimeSeries::new("cpu", 0));
        registry.delete("cpu");
        registry.delete("cpu");
        assert!(registry.get("cpu").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn handle_outlives_delete() {
        let registry = Registry::new();
        registry.insert_if_absent(TimeSeries::new("cpu", 0));
        let handle = registry.get("cpu").unwrap();
        registry.delete("cpu");
        handle.lock().unwrap().add_record(Record::new(1, 1.0));
        assert_eq!(handle.lock().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_inserts_register_once() {
        let registry = Arc::new(Registry::new());
        let inserted: usize = thread::scope(|scope| {
            (0..8)
                .map(|_| {
                    let registry = Arc::clone(&registry);
                    scope.spawn(move || usize::from(registry.insert_if_absent(TimeSeries::new("cpu", 0))))
                })
                .collect::<Vec<_>>()
                .into_iter()
                .map(|h| h.join().unwrap())
                .sum()
        });
        assert_eq!(inserted, 1);
        assert_eq!(registry.len(), 1);
    }
}
