//! Catalog of open table files.
//!
//! The catalog maps [`FileId`]s and table names to the [`DbFile`] handles
//! behind them. The buffer pool consults it on every cache miss and flush to
//! route page I/O to the right file, so files must be registered before any
//! of their pages are fetched.
//!
//! Registration is keyed by file identity: re-registering a name replaces
//! the previous file under that name, and re-registering a file under a new
//! name drops its old name.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::heap::DbFile;
use crate::storage::FileId;
use crate::tuple::Schema;

struct TableEntry {
    file: Arc<dyn DbFile>,
    name: String,
}

#[derive(Default)]
struct CatalogState {
    /// file_id -> open file handle plus its registered name.
    tables: HashMap<FileId, TableEntry>,
    /// Name -> file_id index for lookups by table name.
    by_name: HashMap<String, FileId>,
}

/// Registry of the table files a database is made of.
///
/// Shared behind an `Arc` between the buffer pool and callers that open
/// files at runtime. All lookups are synchronous.
#[derive(Default)]
pub struct Catalog {
    state: RwLock<CatalogState>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `file` under `name`, returning its [`FileId`].
    ///
    /// An existing table with the same name or the same file id is
    /// replaced.
    pub fn register(&self, name: impl Into<String>, file: Arc<dyn DbFile>) -> FileId {
        let name = name.into();
        let file_id = file.file_id();
        let mut state = self.state.write();
        if let Some(old_id) = state.by_name.insert(name.clone(), file_id) {
            if old_id != file_id {
                state.tables.remove(&old_id);
            }
        }
        let entry = TableEntry {
            file,
            name: name.clone(),
        };
        if let Some(old) = state.tables.insert(file_id, entry) {
            if old.name != name {
                state.by_name.remove(&old.name);
            }
        }
        debug!(%file_id, table = %name, "registered table file");
        file_id
    }

    /// Looks up the file handle for `file_id`.
    pub fn db_file(&self, file_id: FileId) -> Option<Arc<dyn DbFile>> {
        self.state.read().tables.get(&file_id).map(|e| e.file.clone())
    }

    /// Looks up the schema of the table stored in `file_id`.
    pub fn schema(&self, file_id: FileId) -> Option<Schema> {
        self.state
            .read()
            .tables
            .get(&file_id)
            .map(|e| e.file.schema().clone())
    }

    /// Resolves a table name to its file id.
    pub fn table_id(&self, name: &str) -> Option<FileId> {
        self.state.read().by_name.get(name).copied()
    }

    /// Returns the registered name of `file_id`.
    pub fn table_name(&self, file_id: FileId) -> Option<String> {
        self.state.read().tables.get(&file_id).map(|e| e.name.clone())
    }

    /// Returns the ids of all registered tables, in no particular order.
    pub fn table_ids(&self) -> Vec<FileId> {
        self.state.read().tables.keys().copied().collect()
    }
}
