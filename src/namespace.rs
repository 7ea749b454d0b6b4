use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::errors::TripleStoreError;

/// Prefix to namespace-name mappings shared by the explicit and inferred
/// sources of one store.
///
/// Every method takes the internal lock for its whole duration, so
/// concurrent mutations are serialized.
#[derive(Default)]
pub struct NamespaceStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl NamespaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, prefix: &str) -> Option<String> {
        self.entries.lock().get(prefix).cloned()
    }

    /// Bind `prefix` to `name`, replacing any previous binding. The empty
    /// prefix is the default namespace.
    pub fn set(&self, prefix: &str, name: &str) -> Result<(), TripleStoreError> {
        if name.is_empty() {
            return Err(TripleStoreError::invalid_input(format!(
                "namespace name for prefix {prefix:?} must not be empty"
            )));
        }
        self.entries
            .lock()
            .insert(prefix.to_string(), name.to_string());
        Ok(())
    }

    pub fn remove(&self, prefix: &str) -> Option<String> {
        self.entries.lock().remove(prefix)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// All bindings, ordered by prefix.
    pub fn list(&self) -> Vec<(String, String)> {
        self.entries
            .lock()
            .iter()
            .map(|(prefix, name)| (prefix.clone(), name.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
