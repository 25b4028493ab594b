//! Shared symbol tables available to a reader for resolving imports.

use std::collections::HashMap;
use std::sync::Arc;

use crate::import::SharedSymbolTable;

/// In-memory catalog of shared symbol tables, keyed by name and version.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: HashMap<String, Vec<Arc<SharedSymbolTable>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table, replacing any table with the same name and version.
    pub fn put_table(&mut self, table: Arc<SharedSymbolTable>) {
        let versions = self.tables.entry(table.name().to_owned()).or_default();
        versions.retain(|t| t.version() != table.version());
        versions.push(table);
        versions.sort_by_key(|t| t.version());
    }

    /// Exact match on name and version.
    pub fn get_exact(&self, name: &str, version: u32) -> Option<Arc<SharedSymbolTable>> {
        self.tables
            .get(name)?
            .iter()
            .find(|t| t.version() == version)
            .cloned()
    }

    /// Exact match if present, otherwise the highest version with that name.
    pub fn get_table(&self, name: &str, version: u32) -> Option<Arc<SharedSymbolTable>> {
        self.get_exact(name, version)
            .or_else(|| self.tables.get(name)?.last().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_highest_version() {
        let mut catalog = Catalog::new();
        catalog.put_table(Arc::new(SharedSymbolTable::new("t", 1, ["a"])));
        catalog.put_table(Arc::new(SharedSymbolTable::new("t", 3, ["a", "b", "c"])));

        assert_eq!(catalog.get_exact("t", 1).unwrap().max_id(), 1);
        assert!(catalog.get_exact("t", 2).is_none());
        assert_eq!(catalog.get_table("t", 2).unwrap().version(), 3);
        assert!(catalog.get_table("missing", 1).is_none());
    }
}
