//! Text-level Ion binary writer with local symbol table management.

use std::io::Write;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use ion_buffers::DEFAULT_BLOCK_SIZE;
use log::debug;
use num_bigint::BigInt;

use crate::constants::{SID_IMPORTS, SID_ION_SYMBOL_TABLE, SID_MAX_ID, SID_NAME, SID_SYMBOLS, SID_VERSION};
use crate::error::{IonError, IonResult};
use crate::import::{Import, SharedSymbolTable};
use crate::raw_writer::RawBinaryWriter;
use crate::symbols::SymbolTable;
use crate::timestamp::Timestamp;
use crate::types::{IonType, SymbolToken};

/// Writer configuration.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Block size of the segment pool backing each buffer.
    pub block_size: usize,
    /// Shared tables imported by every local symbol table, in order.
    pub imports: Vec<Arc<SharedSymbolTable>>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            imports: Vec::new(),
        }
    }
}

/// Ion binary writer accepting text field names, annotations and symbols.
///
/// Text is interned into the session's [`SymbolTable`]. On [`flush`](Self::flush)
/// the writer emits the version marker (once per session), a local symbol
/// table declaring any symbols new since the previous flush, then the
/// buffered values. [`finish`](Self::finish) also ends the session, so the
/// next value starts a fresh datagram over the same imports.
///
/// ```
/// use ion_binary::{BinaryReader, BinaryWriter, IonType};
///
/// let mut writer = BinaryWriter::new();
/// writer.step_in(IonType::Struct).unwrap();
/// writer.set_field_name("greeting").unwrap();
/// writer.write_string("hello").unwrap();
/// writer.step_out().unwrap();
/// let mut bytes = Vec::new();
/// writer.finish(&mut bytes).unwrap();
///
/// let mut reader = BinaryReader::new(&bytes).unwrap();
/// assert_eq!(reader.move_next().unwrap(), Some(IonType::Struct));
/// reader.step_in().unwrap();
/// reader.move_next().unwrap();
/// assert_eq!(reader.current_field_name(), Some("greeting"));
/// assert_eq!(reader.string_value().unwrap(), "hello");
/// ```
#[derive(Debug)]
pub struct BinaryWriter {
    user: RawBinaryWriter,
    /// Receives the version marker and local symbol tables.
    system: RawBinaryWriter,
    imports: Arc<Import>,
    symbols: SymbolTable,
    /// Local symbols already declared in the output.
    declared: usize,
    table_written: bool,
    session_open: bool,
}

impl Default for BinaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::with_options(WriterOptions::default())
    }

    pub fn with_options(options: WriterOptions) -> Self {
        let imports = Import::chain(&options.imports);
        Self {
            user: RawBinaryWriter::with_block_size(options.block_size),
            system: RawBinaryWriter::with_block_size(options.block_size),
            symbols: SymbolTable::new(Arc::clone(&imports)),
            imports,
            declared: 0,
            table_written: false,
            session_open: false,
        }
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbols
    }

    fn resolve(&mut self, token: &SymbolToken) -> IonResult<u32> {
        match (token.sid, token.text.as_deref()) {
            (Some(sid), _) => Ok(sid),
            (None, Some(text)) => Ok(self.symbols.intern(text)),
            (None, None) => Err(IonError::InvalidSymbolToken),
        }
    }

    pub fn is_in_struct(&self) -> bool {
        self.user.is_in_struct()
    }

    pub fn depth(&self) -> usize {
        self.user.depth()
    }

    pub fn set_field_name(&mut self, name: &str) -> IonResult<()> {
        if !self.user.is_in_struct() {
            // Routed through the raw writer so the failure poisons it.
            return self.user.set_field_name_sid(0);
        }
        let sid = self.symbols.intern(name);
        self.user.set_field_name_sid(sid)
    }

    pub fn set_field_name_symbol(&mut self, name: &SymbolToken) -> IonResult<()> {
        let sid = self.resolve(name)?;
        self.user.set_field_name_sid(sid)
    }

    pub fn add_annotation(&mut self, annotation: &str) -> IonResult<()> {
        let sid = self.symbols.intern(annotation);
        self.user.add_annotation_sid(sid)
    }

    pub fn add_annotation_symbol(&mut self, annotation: &SymbolToken) -> IonResult<()> {
        let sid = self.resolve(annotation)?;
        self.user.add_annotation_sid(sid)
    }

    /// Replaces the pending annotations.
    pub fn set_annotations<I, S>(&mut self, annotations: I) -> IonResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sids: Vec<u32> = annotations
            .into_iter()
            .map(|a| self.symbols.intern(a.as_ref()))
            .collect();
        self.user.set_annotation_sids(&sids)
    }

    pub fn clear_annotations(&mut self) {
        self.user.clear_annotations();
    }

    pub fn step_in(&mut self, ion_type: IonType) -> IonResult<()> {
        self.user.step_in(ion_type)
    }

    pub fn step_out(&mut self) -> IonResult<()> {
        self.user.step_out()
    }

    pub fn write_null(&mut self) -> IonResult<()> {
        self.user.write_null()
    }

    pub fn write_null_typed(&mut self, ion_type: IonType) -> IonResult<()> {
        self.user.write_null_typed(ion_type)
    }

    pub fn write_bool(&mut self, value: bool) -> IonResult<()> {
        self.user.write_bool(value)
    }

    pub fn write_int(&mut self, value: i64) -> IonResult<()> {
        self.user.write_int(value)
    }

    pub fn write_big_int(&mut self, value: &BigInt) -> IonResult<()> {
        self.user.write_big_int(value)
    }

    pub fn write_float(&mut self, value: f64) -> IonResult<()> {
        self.user.write_float(value)
    }

    pub fn write_decimal(&mut self, value: &BigDecimal) -> IonResult<()> {
        self.user.write_decimal(value)
    }

    pub fn write_timestamp(&mut self, value: &Timestamp) -> IonResult<()> {
        self.user.write_timestamp(value)
    }

    pub fn write_string(&mut self, value: &str) -> IonResult<()> {
        self.user.write_string(value)
    }

    pub fn write_symbol(&mut self, text: &str) -> IonResult<()> {
        let sid = self.symbols.intern(text);
        self.user.write_symbol_sid(sid)
    }

    pub fn write_symbol_token(&mut self, token: &SymbolToken) -> IonResult<()> {
        let sid = self.resolve(token)?;
        self.user.write_symbol_sid(sid)
    }

    pub fn write_blob(&mut self, value: &[u8]) -> IonResult<()> {
        self.user.write_blob(value)
    }

    pub fn write_clob(&mut self, value: &[u8]) -> IonResult<()> {
        self.user.write_clob(value)
    }

    fn needs_symbol_table(&self) -> bool {
        let has_imports = self.imports.layers().len() > 1;
        (!self.table_written && has_imports) || self.symbols.local_symbols().len() > self.declared
    }

    /// Buffers `$ion_symbol_table::{...}` for the symbols not yet declared.
    fn write_local_symbol_table(&mut self) -> IonResult<()> {
        let sys = &mut self.system;
        sys.add_annotation_sid(SID_ION_SYMBOL_TABLE)?;
        sys.step_in(IonType::Struct)?;
        if self.table_written {
            sys.set_field_name_sid(SID_IMPORTS)?;
            sys.write_symbol_sid(SID_ION_SYMBOL_TABLE)?;
        } else {
            let layers = self.imports.layers();
            if layers.len() > 1 {
                sys.set_field_name_sid(SID_IMPORTS)?;
                sys.step_in(IonType::List)?;
                for layer in layers.iter().skip(1) {
                    sys.step_in(IonType::Struct)?;
                    sys.set_field_name_sid(SID_NAME)?;
                    sys.write_string(layer.table.name())?;
                    sys.set_field_name_sid(SID_VERSION)?;
                    sys.write_int(layer.table.version() as i64)?;
                    sys.set_field_name_sid(SID_MAX_ID)?;
                    sys.write_int(layer.length as i64)?;
                    sys.step_out()?;
                }
                sys.step_out()?;
            }
        }
        let new_symbols = &self.symbols.local_symbols()[self.declared..];
        if !new_symbols.is_empty() {
            sys.set_field_name_sid(SID_SYMBOLS)?;
            sys.step_in(IonType::List)?;
            for symbol in new_symbols {
                match symbol {
                    Some(text) => sys.write_string(text)?,
                    None => sys.write_null_typed(IonType::String)?,
                }
            }
            sys.step_out()?;
        }
        sys.step_out()?;
        debug!(
            "emitting local symbol table: {} new symbol(s), append = {}",
            new_symbols.len(),
            self.table_written
        );
        self.declared = self.symbols.local_symbols().len();
        self.table_written = true;
        Ok(())
    }

    /// Writes buffered values, preceded by any pending system values, to `sink`.
    ///
    /// Returns the number of bytes written.
    pub fn flush<W: Write>(&mut self, sink: &mut W) -> IonResult<usize> {
        self.user.check_flushable()?;
        if !self.session_open {
            self.system.write_ion_version_marker()?;
            self.session_open = true;
        }
        if self.needs_symbol_table() {
            self.write_local_symbol_table()?;
        }
        let mut written = self.system.flush_to(sink)?;
        written += self.user.flush_to(sink)?;
        sink.flush()?;
        debug!("flushed {} bytes", written);
        Ok(written)
    }

    /// Flushes and ends the session.
    pub fn finish<W: Write>(&mut self, sink: &mut W) -> IonResult<usize> {
        let written = self.flush(sink)?;
        self.end_session();
        Ok(written)
    }

    /// Drops buffered data, ends the session and clears a poisoned state.
    pub fn reset(&mut self) {
        self.user.reset();
        self.system.reset();
        self.end_session();
    }

    fn end_session(&mut self) {
        self.symbols = SymbolTable::new(Arc::clone(&self.imports));
        self.declared = 0;
        self.table_written = false;
        self.session_open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ION_BVM;

    #[test]
    fn empty_datagram_is_version_marker() {
        let mut writer = BinaryWriter::new();
        let mut out = Vec::new();
        writer.finish(&mut out).unwrap();
        assert_eq!(out, ION_BVM);
    }

    #[test]
    fn local_symbols_are_declared_before_data() {
        let mut writer = BinaryWriter::new();
        writer.write_symbol("foo").unwrap();
        let mut out = Vec::new();
        writer.finish(&mut out).unwrap();
        assert_eq!(
            out,
            [
                0xe0, 0x01, 0x00, 0xea, // version marker
                0xe9, 0x81, 0x83, // $ion_symbol_table::
                0xd6, 0x87, 0xb4, 0x83, b'f', b'o', b'o', // {symbols:["foo"]}
                0x71, 0x0a, // foo
            ]
        );
    }

    #[test]
    fn later_flushes_append() {
        let mut writer = BinaryWriter::new();
        let mut out = Vec::new();
        writer.write_symbol("a").unwrap();
        writer.flush(&mut out).unwrap();
        let first = out.len();
        writer.write_symbol("a").unwrap();
        writer.flush(&mut out).unwrap();
        // No new symbols: only the value.
        assert_eq!(&out[first..], &[0x71, 0x0a]);

        let second = out.len();
        writer.write_symbol("b").unwrap();
        writer.flush(&mut out).unwrap();
        // $ion_symbol_table::{imports:$ion_symbol_table, symbols:["b"]} b
        assert_eq!(
            &out[second..],
            &[0xea, 0x81, 0x83, 0xd7, 0x86, 0x71, 0x03, 0x87, 0xb2, 0x81, b'b', 0x71, 0x0b]
        );
    }

    #[test]
    fn finish_starts_new_session() {
        let mut writer = BinaryWriter::new();
        let mut out = Vec::new();
        writer.write_symbol("a").unwrap();
        writer.finish(&mut out).unwrap();
        let first = out.clone();
        out.clear();
        writer.write_symbol("a").unwrap();
        writer.finish(&mut out).unwrap();
        assert_eq!(out, first);
    }

    #[test]
    fn imports_are_listed_in_first_table() {
        let shared = Arc::new(SharedSymbolTable::new("shared", 2, ["x"]));
        let mut writer = BinaryWriter::with_options(WriterOptions {
            imports: vec![shared],
            ..WriterOptions::default()
        });
        writer.write_symbol("x").unwrap();
        assert_eq!(writer.symbol_table().first_local_sid(), 11);
        let mut out = Vec::new();
        writer.finish(&mut out).unwrap();
        assert_eq!(out[out.len() - 2..], [0x71, 0x0a]);
    }

    #[test]
    fn field_name_outside_struct_poisons() {
        let mut writer = BinaryWriter::new();
        assert!(matches!(
            writer.set_field_name("a"),
            Err(IonError::FieldNameOutsideStruct)
        ));
        assert!(matches!(writer.write_int(1), Err(IonError::Poisoned)));
        assert!(writer.symbol_table().local_symbols().is_empty());
        writer.reset();
        writer.write_int(1).unwrap();
    }
}
