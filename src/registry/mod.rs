//! Named, path-scoped directories of stores and streams
//!
//! Each registry maps a (name, path) pair to a live value. Pairs are unique
//! within a registry; lookup is exact match; enumeration supports a path
//! prefix filter with early termination and an explicit truncation cap.
//!
//! Store removal is conditional on liveness: the registry holds one
//! [`StoreHandle`] and every attached reader stream holds another, so a store
//! is deletable only while the registry is the sole owner. Stream removal is
//! unconditional; dropping the stream releases its store handles transitively.

use std::rc::Rc;

use thiserror::Error;

use crate::store::StoreHandle;
use crate::stream::Stream;

/// Longest accepted entry name, in bytes.
pub const MAX_NAME_LEN: usize = 31;
/// Longest accepted entry path, in bytes.
pub const MAX_PATH_LEN: usize = 127;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("entry '{path}/{name}' already exists")]
    AlreadyExists { name: String, path: String },

    #[error("entry '{path}/{name}' not found")]
    NotFound { name: String, path: String },

    #[error("store '{path}/{name}' is still in use by a stream")]
    StillInUse { name: String, path: String },

    #[error("name exceeds {MAX_NAME_LEN} bytes")]
    NameTooLong,

    #[error("path exceeds {MAX_PATH_LEN} bytes")]
    PathTooLong,
}

/// Directory of registered stores.
pub type StoreRegistry = Registry<StoreHandle>;
/// Directory of registered streams.
pub type StreamRegistry = Registry<Stream>;

struct Entry<T> {
    name: String,
    path: String,
    value: T,
}

/// A (name, path)-keyed directory.
pub struct Registry<T> {
    entries: Vec<Entry<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str, path: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.name == name && e.path == path)
    }

    /// Registers a value under (name, path).
    ///
    /// Over-length names and paths are rejected rather than truncated:
    /// truncation could silently alias two distinct keys.
    pub fn add(&mut self, name: &str, path: &str, value: T) -> RegistryResult<()> {
        if name.len() > MAX_NAME_LEN {
            return Err(RegistryError::NameTooLong);
        }
        if path.len() > MAX_PATH_LEN {
            return Err(RegistryError::PathTooLong);
        }
        if self.position(name, path).is_some() {
            return Err(RegistryError::AlreadyExists {
                name: name.to_string(),
                path: path.to_string(),
            });
        }

        self.entries.push(Entry {
            name: name.to_string(),
            path: path.to_string(),
            value,
        });
        Ok(())
    }

    /// Exact-match lookup.
    pub fn find(&self, name: &str, path: &str) -> Option<&T> {
        self.position(name, path).map(|i| &self.entries[i].value)
    }

    /// Exact-match lookup, mutable.
    pub fn find_mut(&mut self, name: &str, path: &str) -> Option<&mut T> {
        self.position(name, path)
            .map(|i| &mut self.entries[i].value)
    }

    /// Removes and returns an entry unconditionally.
    pub fn remove(&mut self, name: &str, path: &str) -> RegistryResult<T> {
        match self.position(name, path) {
            Some(i) => Ok(self.entries.remove(i).value),
            None => Err(RegistryError::NotFound {
                name: name.to_string(),
                path: path.to_string(),
            }),
        }
    }

    /// Iterates all entries as (name, path, value).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &T)> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.path.as_str(), &e.value))
    }

    /// Visits entries whose path starts with `prefix` (empty prefix matches
    /// all). The callback returns whether to continue.
    pub fn for_each<F>(&self, prefix: &str, mut f: F)
    where
        F: FnMut(&str, &str, &T) -> bool,
    {
        for e in &self.entries {
            if prefix.is_empty() || e.path.starts_with(prefix) {
                if !f(&e.name, &e.path, &e.value) {
                    break;
                }
            }
        }
    }

    /// Collects up to `cap` matching entries, reporting whether further
    /// matches were left out. The cap is a pagination contract, not a silent
    /// drop.
    pub fn list(&self, prefix: &str, cap: usize) -> (Vec<(&str, &str, &T)>, bool) {
        let mut out = Vec::new();
        let mut truncated = false;
        for e in &self.entries {
            if !prefix.is_empty() && !e.path.starts_with(prefix) {
                continue;
            }
            if out.len() == cap {
                truncated = true;
                break;
            }
            out.push((e.name.as_str(), e.path.as_str(), &e.value));
        }
        (out, truncated)
    }
}

impl Registry<StoreHandle> {
    /// Removes a store, refusing while any stream still holds its handle.
    pub fn remove_store(&mut self, name: &str, path: &str) -> RegistryResult<()> {
        let i = self
            .position(name, path)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
                path: path.to_string(),
            })?;

        if Rc::strong_count(&self.entries[i].value) > 1 {
            return Err(RegistryError::StillInUse {
                name: name.to_string(),
                path: path.to_string(),
            });
        }

        self.entries.remove(i);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn registry_with(entries: &[(&str, &str)]) -> Registry<u32> {
        let mut r = Registry::new();
        for (i, (name, path)) in entries.iter().enumerate() {
            r.add(name, path, i as u32).unwrap();
        }
        r
    }

    #[test]
    fn test_add_find_remove() {
        let mut r = registry_with(&[("samples", ""), ("samples", "testing")]);
        assert_eq!(r.find("samples", ""), Some(&0));
        assert_eq!(r.find("samples", "testing"), Some(&1));
        assert_eq!(r.find("samples", "other"), None);

        assert_eq!(r.remove("samples", "").unwrap(), 0);
        assert_eq!(r.find("samples", ""), None);
        assert!(r.find("samples", "testing").is_some());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut r = registry_with(&[("samples", "rf")]);
        assert_eq!(
            r.add("samples", "rf", 9),
            Err(RegistryError::AlreadyExists {
                name: "samples".into(),
                path: "rf".into(),
            })
        );
        // Same name under a different path is a different key.
        assert!(r.add("samples", "rf2", 9).is_ok());
    }

    #[test]
    fn test_remove_missing() {
        let mut r: Registry<u32> = Registry::new();
        assert!(matches!(
            r.remove("x", ""),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_length_limits() {
        let mut r: Registry<u32> = Registry::new();
        assert_eq!(r.add(&"n".repeat(32), "", 1), Err(RegistryError::NameTooLong));
        assert_eq!(r.add("n", &"p".repeat(128), 1), Err(RegistryError::PathTooLong));
        assert!(r.add(&"n".repeat(31), &"p".repeat(127), 1).is_ok());
    }

    #[test]
    fn test_prefix_filter_and_early_termination() {
        let r = registry_with(&[("a", "rf/band1"), ("b", "rf/band2"), ("c", "audio")]);

        let mut seen = Vec::new();
        r.for_each("rf", |name, _, _| {
            seen.push(name.to_string());
            true
        });
        assert_eq!(seen, vec!["a", "b"]);

        // Empty prefix matches everything; callback stops after the first.
        let mut count = 0;
        r.for_each("", |_, _, _| {
            count += 1;
            false
        });
        assert_eq!(count, 1);
    }

    #[test]
    fn test_list_cap_reports_truncation() {
        let mut r: Registry<u32> = Registry::new();
        for i in 0..5 {
            r.add(&format!("s{}", i), "rf", i).unwrap();
        }

        let (entries, truncated) = r.list("rf", 3);
        assert_eq!(entries.len(), 3);
        assert!(truncated);

        let (entries, truncated) = r.list("rf", 5);
        assert_eq!(entries.len(), 5);
        assert!(!truncated);

        let (entries, truncated) = r.list("audio", 3);
        assert!(entries.is_empty());
        assert!(!truncated);
    }

    #[test]
    fn test_store_removal_refused_while_shared() {
        let mut stores = StoreRegistry::new();
        let handle = Store::memory(4).unwrap().into_handle();
        stores.add("samples", "", Rc::clone(&handle)).unwrap();

        // `handle` stands in for a reader stream's reference.
        assert!(matches!(
            stores.remove_store("samples", ""),
            Err(RegistryError::StillInUse { .. })
        ));

        drop(handle);
        assert!(stores.remove_store("samples", "").is_ok());
        assert!(stores.find("samples", "").is_none());
    }
}
