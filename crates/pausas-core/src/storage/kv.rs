//! Key-value storage seam shared by timer persistence and exercise rotation.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use super::Database;
use crate::error::Result;

/// A string-keyed, string-valued store.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl KvStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.kv_get(key)?)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        Ok(self.kv_set(key, value)?)
    }

    fn remove(&self, key: &str) -> Result<()> {
        Ok(self.kv_delete(key)?)
    }
}

impl<S: KvStore + ?Sized> KvStore for Rc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// In-process store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_clones_share_entries() {
        let store = MemoryKvStore::new();
        let other = store.clone();
        store.set("a", "1").unwrap();
        assert_eq!(other.get("a").unwrap().as_deref(), Some("1"));
        other.remove("a").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn rc_database_is_a_store() {
        let db = Rc::new(Database::open_memory().unwrap());
        let handle = Rc::clone(&db);
        handle.set("k", "v").unwrap();
        assert_eq!(KvStore::get(&db, "k").unwrap().as_deref(), Some("v"));
    }
}
