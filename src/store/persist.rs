//! Persisted store list
//!
//! One line per store, semicolon-delimited:
//!
//! ```text
//! name;path;store_type;block_count;write_offset;file_path
//! ```
//!
//! `store_type` is 0 for memory and 1 for file stores; `file_path` is empty
//! for memory stores. On load, a file-backed store is initialized fresh only
//! when its persisted write offset is zero, otherwise the backing file is
//! opened without truncation.
//!
//! Persistence is an explicit collaborator: the engine's flush operation is
//! handed a [`StorePersister`] rather than resolving one globally.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{Store, StoreError, StoreKind, StoreResult};
use crate::observability::Logger;
use crate::registry::StoreRegistry;

/// Saves one line per registered store to `out`.
pub fn save_store_list<W: Write>(out: &mut W, stores: &StoreRegistry) -> io::Result<()> {
    for (name, path, handle) in stores.iter() {
        let store = handle.borrow();
        let file_path = store
            .file_path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        writeln!(
            out,
            "{};{};{};{};{};{}",
            name,
            path,
            store.kind() as u8,
            store.block_count(),
            store.write_offset(),
            file_path
        )?;
    }
    Ok(())
}

/// Loads a persisted store list into `stores`.
///
/// Malformed lines and stores that fail to open are skipped with a logged
/// warning; a missing list file is an error.
pub fn load_store_list(list_path: &Path, stores: &mut StoreRegistry) -> StoreResult<()> {
    let contents = fs::read_to_string(list_path).map_err(|_| StoreError::ListNotFound {
        path: list_path.to_path_buf(),
    })?;

    for (lineno, line) in contents.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        if let Err(reason) = load_line(line, stores) {
            Logger::warn(
                "STORE_LIST_LINE_SKIPPED",
                &[
                    ("file", &list_path.display().to_string()),
                    ("line", &(lineno + 1).to_string()),
                    ("reason", &reason),
                ],
            );
        }
    }

    Ok(())
}

fn load_line(line: &str, stores: &mut StoreRegistry) -> Result<(), String> {
    let mut fields = line.split(';');
    let name = fields.next().unwrap_or_default();
    let path = fields.next().unwrap_or_default();
    let store_type: u32 = fields
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(|_| "bad store type")?;
    let block_count: u32 = fields
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(|_| "bad block count")?;
    let write_offset: u32 = fields
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(|_| "bad write offset")?;
    let file_path = fields.next().unwrap_or_default();

    let kind = StoreKind::from_tag(store_type).ok_or_else(|| format!("bad store type {}", store_type))?;
    let mut store = match kind {
        StoreKind::Memory => Store::memory(block_count),
        // A non-zero persisted cursor means the backing file already holds
        // data; only a fresh store truncates.
        StoreKind::File => Store::file(Path::new(file_path), block_count, write_offset == 0),
    }
    .map_err(|e| e.to_string())?;
    store.set_write_offset(write_offset);

    stores
        .add(name, path, store.into_handle())
        .map_err(|e| e.to_string())
}

/// Collaborator interface for persisting the store registry.
pub trait StorePersister {
    /// Persists a snapshot of the store registry.
    fn persist(&mut self, stores: &StoreRegistry) -> StoreResult<()>;
}

/// Persists the store list to a file, overwriting it in place.
pub struct FilePersister {
    path: PathBuf,
}

impl FilePersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StorePersister for FilePersister {
    fn persist(&mut self, stores: &StoreRegistry) -> StoreResult<()> {
        let mut file = File::create(&self.path).map_err(|source| StoreError::ListWrite {
            path: self.path.clone(),
            source,
        })?;
        save_store_list(&mut file, stores).map_err(|source| StoreError::ListWrite {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use tempfile::TempDir;

    #[test]
    fn test_save_format() {
        let mut stores = StoreRegistry::new();
        stores
            .add("samples", "rf", Store::memory(16).unwrap().into_handle())
            .unwrap();

        let mut out = Vec::new();
        save_store_list(&mut out, &stores).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "samples;rf;0;16;0;\n");
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let list_path = dir.path().join("stores.txt");
        let data_path = dir.path().join("fs.dat");

        let mut stores = StoreRegistry::new();
        stores
            .add("mem", "", Store::memory(8).unwrap().into_handle())
            .unwrap();
        let file_store = Store::file(&data_path, 4, true).unwrap().into_handle();
        file_store.borrow_mut().set_write_offset(3);
        stores.add("disk", "rf", file_store).unwrap();

        let mut persister = FilePersister::new(&list_path);
        persister.persist(&stores).unwrap();

        let mut loaded = StoreRegistry::new();
        load_store_list(&list_path, &mut loaded).unwrap();

        let mem = loaded.find("mem", "").unwrap().borrow();
        assert_eq!(mem.kind(), StoreKind::Memory);
        assert_eq!(mem.block_count(), 8);
        drop(mem);

        let disk = loaded.find("disk", "rf").unwrap().borrow();
        assert_eq!(disk.kind(), StoreKind::File);
        assert_eq!(disk.write_offset(), 3);
        assert_eq!(disk.file_path(), Some(data_path.as_path()));
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let list_path = dir.path().join("stores.txt");
        fs::write(&list_path, "good;;0;4;0;\nnot a store line\nbad;;9;4;0;\n").unwrap();

        let mut stores = StoreRegistry::new();
        load_store_list(&list_path, &mut stores).unwrap();
        assert!(stores.find("good", "").is_some());
        assert_eq!(stores.iter().count(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut stores = StoreRegistry::new();
        let err = load_store_list(&dir.path().join("absent.txt"), &mut stores).unwrap_err();
        assert!(matches!(err, StoreError::ListNotFound { .. }));
    }

    #[test]
    fn test_nonzero_offset_reopens_without_truncation() {
        let dir = TempDir::new().unwrap();
        let data_path = dir.path().join("fs.dat");
        let list_path = dir.path().join("stores.txt");

        // Write one block, persist, drop everything.
        {
            let mut stores = StoreRegistry::new();
            let handle = Store::file(&data_path, 4, true).unwrap().into_handle();
            stores.add("disk", "", Rc::clone(&handle)).unwrap();
            let mut block = crate::block::Block::default();
            block.set_i16_samples(&[42]);
            handle
                .borrow_mut()
                .write_block(&mut block, crate::store::WriteOffset::Append)
                .unwrap();
            FilePersister::new(&list_path).persist(&stores).unwrap();
        }

        let mut loaded = StoreRegistry::new();
        load_store_list(&list_path, &mut loaded).unwrap();
        let handle = loaded.find("disk", "").unwrap();
        let block = handle.borrow_mut().read_block(0).unwrap();
        assert_eq!(block.decode_samples().unwrap()[0], 42.0);
    }
}
