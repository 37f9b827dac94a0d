//! Catalog - routes table ids to their page stores.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{Error, Result, TableId};
use crate::storage::PageStore;

/// Registry of every table the buffer pool can load pages from.
///
/// The catalog is populated before transactions start and is read on every
/// cache miss, so lookups take a shared lock only.
#[derive(Default)]
pub struct Catalog {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    by_id: HashMap<TableId, Arc<dyn PageStore>>,
    by_name: HashMap<String, TableId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` under `name`.
    ///
    /// A later table with the same name or id replaces the earlier one.
    pub fn add_table(&self, store: Arc<dyn PageStore>, name: &str) {
        let table_id = store.table_id();
        let mut tables = self.tables.write();
        tables.by_id.insert(table_id, store);
        tables.by_name.insert(name.to_string(), table_id);
        log::debug!("registered {} as {:?}", table_id, name);
    }

    /// Look up a table id by name.
    ///
    /// # Errors
    /// - `Error::TableNameNotFound` if no table has that name
    pub fn table_id(&self, name: &str) -> Result<TableId> {
        self.tables
            .read()
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::TableNameNotFound(name.to_string()))
    }

    /// The page store backing `table_id`.
    ///
    /// # Errors
    /// - `Error::TableNotFound` if the table was never registered
    pub fn database_file(&self, table_id: TableId) -> Result<Arc<dyn PageStore>> {
        self.tables
            .read()
            .by_id
            .get(&table_id)
            .cloned()
            .ok_or(Error::TableNotFound(table_id))
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
