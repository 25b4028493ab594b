//! Session symbol table: imports plus append-only local symbols.

use std::collections::HashMap;
use std::sync::Arc;

use crate::import::{Import, SharedSymbolTable};

/// Bidirectional text ↔ SID mapping for one encoding or decoding session.
///
/// SIDs up to [`imports().max_id()`](Import::max_id) belong to the read-only
/// import chain; local SIDs follow, assigned in order of first use.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    imports: Arc<Import>,
    local: Vec<Option<String>>,
    /// Local text → SID of its first occurrence.
    lookup: HashMap<String, u32>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::system()
    }
}

impl SymbolTable {
    /// A table with only the system symbols.
    pub fn system() -> Self {
        Self::new(Import::system())
    }

    pub fn new(imports: Arc<Import>) -> Self {
        Self {
            imports,
            local: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// A table importing `tables` on top of the system table.
    pub fn with_imports(tables: &[Arc<SharedSymbolTable>]) -> Self {
        Self::new(Import::chain(tables))
    }

    pub fn imports(&self) -> &Arc<Import> {
        &self.imports
    }

    pub fn first_local_sid(&self) -> u32 {
        self.imports.max_id() + 1
    }

    /// Highest SID defined by this table.
    pub fn max_id(&self) -> u32 {
        self.imports.max_id() + self.local.len() as u32
    }

    /// Local symbols in SID order.
    pub fn local_symbols(&self) -> &[Option<String>] {
        &self.local
    }

    /// Looks up `text` without interning it. Imports are checked first.
    pub fn find(&self, text: &str) -> Option<u32> {
        self.imports
            .get_id(text)
            .or_else(|| self.lookup.get(text).copied())
    }

    /// Returns the SID for `text`, allocating the next local SID if needed.
    pub fn intern(&mut self, text: &str) -> u32 {
        if let Some(id) = self.find(text) {
            return id;
        }
        self.push_local(Some(text.to_owned()))
    }

    /// Appends a local slot unconditionally, as a decoded symbol table does.
    pub fn push_local(&mut self, text: Option<String>) -> u32 {
        let id = self.max_id() + 1;
        if let Some(text) = &text {
            self.lookup.entry(text.clone()).or_insert(id);
        }
        self.local.push(text);
        id
    }

    /// Text for `sid`; `None` for SID 0, out-of-range IDs and slots without text.
    pub fn text_for(&self, sid: u32) -> Option<&str> {
        if sid <= self.imports.max_id() {
            return self.imports.get_text(sid);
        }
        let idx = (sid - self.first_local_sid()) as usize;
        self.local.get(idx).and_then(|s| s.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_assigns_sequential_local_ids() {
        let mut table = SymbolTable::system();
        assert_eq!(table.first_local_sid(), 10);
        assert_eq!(table.intern("foo"), 10);
        assert_eq!(table.intern("bar"), 11);
        assert_eq!(table.intern("foo"), 10);
        assert_eq!(table.text_for(11), Some("bar"));
        assert_eq!(table.max_id(), 11);
    }

    #[test]
    fn imported_text_is_not_reinterned() {
        let shared = Arc::new(SharedSymbolTable::new("s", 1, ["foo"]));
        let mut table = SymbolTable::with_imports(&[shared]);
        assert_eq!(table.intern("foo"), 10);
        assert_eq!(table.intern("name"), 4);
        assert!(table.local_symbols().is_empty());
        assert_eq!(table.intern("baz"), 11);
    }

    #[test]
    fn unknown_ids_have_no_text() {
        let mut table = SymbolTable::system();
        table.push_local(None);
        assert_eq!(table.text_for(0), None);
        assert_eq!(table.text_for(10), None);
        assert_eq!(table.text_for(11), None);
        assert_eq!(table.text_for(u32::MAX), None);
    }
}
