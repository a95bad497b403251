//! Registry of open tables.
//!
//! The [`Catalog`] maps table ids and names to the [`DbFile`] storing each
//! table. The page pool resolves a [`PageId`](crate::storage::PageId) to its
//! file through it on every cache miss and flush.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::heap::{DbFile, HeapError};
use crate::storage::TableId;
use crate::tuple::TupleDesc;

/// A registered table.
struct TableEntry {
    name: String,
    file: Arc<dyn DbFile>,
}

#[derive(Default)]
struct CatalogState {
    /// table_id → table entry.
    tables: HashMap<TableId, TableEntry>,
    /// Name → table_id index for O(1) name lookups.
    table_ids: HashMap<String, TableId>,
}

/// Thread-safe table registry.
#[derive(Default)]
pub struct Catalog {
    state: RwLock<CatalogState>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `file` under `name`.
    ///
    /// A table already registered with the same name or the same id is
    /// replaced.
    pub fn add_table(&self, file: Arc<dyn DbFile>, name: impl Into<String>) {
        let name = name.into();
        let table_id = file.id();
        let mut state = self.state.write();

        if let Some(old_id) = state.table_ids.remove(&name) {
            state.tables.remove(&old_id);
        }
        if let Some(old) = state.tables.remove(&table_id) {
            state.table_ids.remove(&old.name);
        }

        state.table_ids.insert(name.clone(), table_id);
        state.tables.insert(table_id, TableEntry { name, file });
    }

    /// Returns the file storing table `table_id`.
    pub fn file(&self, table_id: TableId) -> Result<Arc<dyn DbFile>, HeapError> {
        self.state
            .read()
            .tables
            .get(&table_id)
            .map(|entry| Arc::clone(&entry.file))
            .ok_or(HeapError::UnknownTable(table_id))
    }

    /// Returns the row schema of table `table_id`.
    pub fn tuple_desc(&self, table_id: TableId) -> Result<Arc<TupleDesc>, HeapError> {
        Ok(Arc::clone(self.file(table_id)?.tuple_desc()))
    }

    /// Resolves a table name to its id.
    pub fn table_id(&self, name: &str) -> Result<TableId, HeapError> {
        self.state
            .read()
            .table_ids
            .get(name)
            .copied()
            .ok_or_else(|| HeapError::UnknownTableName(name.to_string()))
    }

    /// Returns the name table `table_id` is registered under.
    pub fn table_name(&self, table_id: TableId) -> Result<String, HeapError> {
        self.state
            .read()
            .tables
            .get(&table_id)
            .map(|entry| entry.name.clone())
            .ok_or(HeapError::UnknownTable(table_id))
    }

    /// Returns the ids of all registered tables, in ascending order.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<_> = self.state.read().tables.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Unregisters every table.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.tables.clear();
        state.table_ids.clear();
    }
}
