use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AstoundError, Result};

/// Persistent kind-label → comma-joined field list store.
///
/// Usage is append-only: callers read first and only insert on a miss.
pub trait FieldCache {
    fn get(&self, kind: &str) -> Result<Option<String>>;
    fn put(&self, kind: &str, fields: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Flat-file store
//
// Storage layout:  <path>
//   { "entries": { "<KindLabel>": "field,field,..." } }
//
// Loaded on open. Misses re-read the file, and every insert merges into the
// current file contents before rewriting it, so keys inserted by other
// processes survive.
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct FieldStore {
    entries: BTreeMap<String, String>,
}

impl FieldStore {
    fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(_) => return Self::default(), // file doesn't exist yet
        };
        match serde_json::from_str::<Self>(&text) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "field cache corrupted, starting empty");
                Self::default()
            }
        }
    }

    /// Add entries from `other` this store lacks. Existing entries win.
    fn merge(&mut self, other: FieldStore) {
        for (kind, fields) in other.entries {
            self.entries.entry(kind).or_insert(fields);
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| AstoundError::io(dir, e))?;
        }
        let text = serde_json::to_string_pretty(self).map_err(|e| AstoundError::Cache(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| AstoundError::io(path, e))
    }
}

pub struct JsonFieldCache {
    path: PathBuf,
    store: RefCell<FieldStore>,
}

impl JsonFieldCache {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let store = FieldStore::load(&path);
        tracing::debug!(path = %path.display(), kinds = store.entries.len(), "opened field cache");
        Self {
            path,
            store: RefCell::new(store),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FieldCache for JsonFieldCache {
    fn get(&self, kind: &str) -> Result<Option<String>> {
        if let Some(hit) = self.store.borrow().entries.get(kind) {
            return Ok(Some(hit.clone()));
        }
        let mut store = self.store.borrow_mut();
        store.merge(FieldStore::load(&self.path));
        Ok(store.entries.get(kind).cloned())
    }

    fn put(&self, kind: &str, fields: &str) -> Result<()> {
        let mut store = self.store.borrow_mut();
        store.merge(FieldStore::load(&self.path));
        store
            .entries
            .entry(kind.to_string())
            .or_insert_with(|| fields.to_string());
        store.save(&self.path)
    }
}

#[derive(Debug, Default)]
pub struct MemoryFieldCache {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryFieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl FieldCache for MemoryFieldCache {
    fn get(&self, kind: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(kind).cloned())
    }

    fn put(&self, kind: &str, fields: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .entry(kind.to_string())
            .or_insert_with(|| fields.to_string());
        Ok(())
    }
}
