//! Shared symbol tables and the read-only import chain layered beneath a
//! session's local symbols.

use std::collections::HashMap;
use std::sync::Arc;

use crate::constants::SYSTEM_SYMBOLS;

/// A named, versioned, read-only symbol table.
///
/// Slots may lack text (`None`). A table the reader could not find keeps no
/// slots at all, only its declared size.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedSymbolTable {
    name: String,
    version: u32,
    symbols: Vec<Option<String>>,
    max_id: u32,
    /// Text → 1-based position of its first occurrence.
    by_text: HashMap<String, u32>,
}

impl SharedSymbolTable {
    pub fn new<I, S>(name: impl Into<String>, version: u32, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_slots(
            name.into(),
            version,
            symbols.into_iter().map(|s| Some(s.into())).collect(),
        )
    }

    fn from_slots(name: String, version: u32, symbols: Vec<Option<String>>) -> Self {
        let mut by_text = HashMap::with_capacity(symbols.len());
        for (i, symbol) in symbols.iter().enumerate() {
            if let Some(text) = symbol {
                by_text.entry(text.clone()).or_insert(i as u32 + 1);
            }
        }
        Self {
            name,
            version,
            max_id: symbols.len() as u32,
            symbols,
            by_text,
        }
    }

    /// The Ion 1.0 system table (`$ion`, version 1, SIDs 1..=9).
    pub fn system() -> Arc<Self> {
        Arc::new(Self::new("$ion", 1, SYSTEM_SYMBOLS.iter().skip(1).copied()))
    }

    /// A table of `max_id` unknown slots, used for imports missing from a catalog.
    pub fn placeholder(name: impl Into<String>, version: u32, max_id: u32) -> Self {
        Self {
            max_id,
            ..Self::from_slots(name.into(), version, Vec::new())
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of slots in this table.
    pub fn max_id(&self) -> u32 {
        self.max_id
    }

    /// 1-based position of `text` in this table.
    pub fn position_of(&self, text: &str) -> Option<u32> {
        self.by_text.get(text).copied()
    }

    /// Text at a 1-based position; `None` past the stored slots.
    pub fn text_at(&self, position: u32) -> Option<&str> {
        let idx = position.checked_sub(1)? as usize;
        self.symbols.get(idx).and_then(|s| s.as_deref())
    }
}

/// One layer of the import chain: a shared table mapped onto a SID range.
///
/// The root layer is always the system table, starting at SID 1.
#[derive(Debug, Clone)]
pub struct Import {
    parent: Option<Arc<Import>>,
    pub table: Arc<SharedSymbolTable>,
    /// First SID owned by this layer.
    pub offset: u32,
    /// Number of SIDs owned by this layer (the declared `max_id`).
    pub length: u32,
}

impl Import {
    /// Creates a layer covering the whole of `table`.
    pub fn new(parent: Option<Arc<Import>>, table: Arc<SharedSymbolTable>) -> Self {
        let length = table.max_id();
        Self::with_max_id(parent, table, length)
    }

    /// Creates a layer declaring `max_id` SIDs, which may be fewer or more than
    /// the table holds; IDs past the table's end have no text.
    pub fn with_max_id(parent: Option<Arc<Import>>, table: Arc<SharedSymbolTable>, max_id: u32) -> Self {
        let offset = parent.as_ref().map(|p| p.max_id() + 1).unwrap_or(1);
        Self {
            parent,
            table,
            offset,
            length: max_id,
        }
    }

    /// Like [`with_max_id`](Self::with_max_id), but `None` when the layer's
    /// range would run past `u32::MAX - 1`, leaving no room for local SIDs.
    pub fn checked(parent: Option<Arc<Import>>, table: Arc<SharedSymbolTable>, max_id: u32) -> Option<Self> {
        let offset = match &parent {
            Some(p) => p.max_id().checked_add(1)?,
            None => 1,
        };
        offset.checked_add(max_id)?;
        Some(Self {
            parent,
            table,
            offset,
            length: max_id,
        })
    }

    /// The chain holding only the system table.
    pub fn system() -> Arc<Import> {
        Arc::new(Import::new(None, SharedSymbolTable::system()))
    }

    /// The system table followed by `tables`, in order.
    pub fn chain(tables: &[Arc<SharedSymbolTable>]) -> Arc<Import> {
        tables.iter().fold(Import::system(), |parent, table| {
            Arc::new(Import::new(Some(parent), Arc::clone(table)))
        })
    }

    /// Last SID covered by this layer and everything beneath it.
    pub fn max_id(&self) -> u32 {
        self.offset + self.length - 1
    }

    /// Lowest SID whose text is `symbol`.
    pub fn get_id(&self, symbol: &str) -> Option<u32> {
        if let Some(id) = self.parent.as_ref().and_then(|p| p.get_id(symbol)) {
            return Some(id);
        }
        self.table
            .position_of(symbol)
            .filter(|pos| *pos <= self.length)
            .map(|pos| self.offset + pos - 1)
    }

    /// Text for `id`, or `None` when the ID is out of range or has no text.
    pub fn get_text(&self, id: u32) -> Option<&str> {
        if id < self.offset {
            return self.parent.as_ref().and_then(|parent| parent.get_text(id));
        }
        if id > self.max_id() {
            return None;
        }
        self.table.text_at(id - self.offset + 1)
    }

    /// Layers from the root (system) upwards.
    pub fn layers(&self) -> Vec<&Import> {
        let mut layers = match &self.parent {
            Some(parent) => parent.layers(),
            None => Vec::new(),
        };
        layers.push(self);
        layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_chain_covers_nine_symbols() {
        let system = Import::system();
        assert_eq!(system.max_id(), 9);
        assert_eq!(system.get_id("$ion_symbol_table"), Some(3));
        assert_eq!(system.get_text(7), Some("symbols"));
        assert_eq!(system.get_text(0), None);
        assert_eq!(system.get_text(10), None);
    }

    #[test]
    fn shared_layer_follows_system() {
        let shared = Arc::new(SharedSymbolTable::new("shared", 1, ["foo", "bar"]));
        let chain = Import::chain(&[shared]);
        assert_eq!(chain.get_id("foo"), Some(10));
        assert_eq!(chain.get_id("bar"), Some(11));
        assert_eq!(chain.get_text(11), Some("bar"));
        assert_eq!(chain.max_id(), 11);
        assert_eq!(chain.layers().len(), 2);
    }

    #[test]
    fn declared_max_id_shadows_table_size() {
        let shared = Arc::new(SharedSymbolTable::new("shared", 1, ["a", "b", "c"]));
        let short = Import::with_max_id(Some(Import::system()), Arc::clone(&shared), 2);
        assert_eq!(short.get_id("c"), None);
        assert_eq!(short.max_id(), 11);

        let long = Import::with_max_id(Some(Import::system()), shared, 5);
        assert_eq!(long.get_text(12), Some("c"));
        assert_eq!(long.get_text(13), None);
        assert_eq!(long.max_id(), 14);
    }

    #[test]
    fn placeholder_reserves_ids_without_slots() {
        let missing = Arc::new(SharedSymbolTable::placeholder("missing", 1, 3_000_000_000));
        assert_eq!(missing.max_id(), 3_000_000_000);
        assert_eq!(missing.text_at(2_999_999_999), None);
        let layer = Import::checked(Some(Import::system()), missing, 3_000_000_000).unwrap();
        assert_eq!(layer.max_id(), 3_000_000_009);
        assert_eq!(layer.get_text(10), None);
    }

    #[test]
    fn checked_layer_rejects_overflowing_range() {
        let shared = Arc::new(SharedSymbolTable::new("shared", 1, ["a"]));
        assert!(Import::checked(Some(Import::system()), Arc::clone(&shared), u32::MAX).is_none());
        assert!(Import::checked(Some(Import::system()), Arc::clone(&shared), u32::MAX - 10).is_some());
        let full = Import::checked(Some(Import::system()), shared, u32::MAX - 10).unwrap();
        assert_eq!(full.max_id(), u32::MAX - 1);
        assert_eq!(full.get_text(10), Some("a"));
        assert_eq!(full.get_text(u32::MAX), None);
    }

    #[test]
    fn lowest_id_wins_for_duplicate_text() {
        let first = Arc::new(SharedSymbolTable::new("a", 1, ["dup"]));
        let second = Arc::new(SharedSymbolTable::new("b", 1, ["dup", "name"]));
        let chain = Import::chain(&[first, second]);
        assert_eq!(chain.get_id("dup"), Some(10));
        assert_eq!(chain.get_id("name"), Some(4));
    }
}
