//! Cursor-style Ion binary reader.
//!
//! The reader walks one container level at a time. [`move_next`](BinaryReader::move_next)
//! only decodes a value's type descriptor, field name and annotations; the
//! payload is decoded on the first getter call and cached in a [`ValueVariant`].

use std::mem;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use ion_buffers::{BufferError, Reader};
use log::{debug, trace, warn};
use num_bigint::{BigInt, Sign};

use crate::catalog::Catalog;
use crate::constants::{
    Type, ION_BVM, LN_IS_NULL, LN_IS_VAR_LEN, SID_IMPORTS, SID_ION_SYMBOL_TABLE, SID_MAX_ID, SID_NAME, SID_SYMBOLS,
    SID_VERSION,
};
use crate::error::{IonError, IonResult};
use crate::import::{Import, SharedSymbolTable};
use crate::symbols::SymbolTable;
use crate::timestamp::{Timestamp, TimestampPrecision};
use crate::types::{IntegerSize, IonType, SymbolToken};
use crate::variant::{Scalar, ValueVariant};

/// Where the cursor is relative to the values of the current container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Before the next value; its type is not known yet.
    BeforeValue,
    /// On a value whose header has been read.
    OnValue,
    /// Past the last value of the current container.
    Exhausted,
}

#[derive(Debug, Clone)]
struct ValueHeader {
    ion_type: IonType,
    /// High nibble of the type descriptor.
    type_code: u8,
    /// Low nibble of the type descriptor.
    length_code: u8,
    is_null: bool,
    field_sid: Option<u32>,
    annotations: Vec<u32>,
    /// Payload bounds.
    start: usize,
    end: usize,
}

#[derive(Debug, Clone, Copy)]
struct ContainerFrame {
    ion_type: IonType,
    /// End of the parent container.
    parent_end: usize,
    /// Position right after this container.
    resume: usize,
}

/// An import declared by a local symbol table.
#[derive(Debug, Default)]
struct ImportDecl {
    name: Option<String>,
    version: Option<i64>,
    max_id: Option<i64>,
}

/// Ion binary reader over an in-memory datagram.
#[derive(Debug)]
pub struct BinaryReader<'a> {
    input: Reader<'a>,
    catalog: Catalog,
    symbols: SymbolTable,
    stack: Vec<ContainerFrame>,
    state: ReaderState,
    current: Option<ValueHeader>,
    variant: ValueVariant,
}

impl<'a> BinaryReader<'a> {
    /// Creates a reader; `data` must start with the Ion 1.0 version marker.
    pub fn new(data: &'a [u8]) -> IonResult<Self> {
        Self::with_catalog(data, Catalog::new())
    }

    /// Creates a reader resolving shared symbol table imports from `catalog`.
    pub fn with_catalog(data: &'a [u8], catalog: Catalog) -> IonResult<Self> {
        if !data.starts_with(&ION_BVM) {
            return Err(IonError::InvalidVersionMarker);
        }
        Ok(Self {
            input: Reader::new(data),
            catalog,
            symbols: SymbolTable::system(),
            stack: Vec::new(),
            state: ReaderState::BeforeValue,
            current: None,
            variant: ValueVariant::new(),
        })
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Symbols in effect at the current position.
    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn in_struct(&self) -> bool {
        matches!(self.stack.last(), Some(f) if f.ion_type == IonType::Struct)
    }

    /// Advances to the next value of the current container.
    ///
    /// Returns `None` at the end of the container. Version markers, NOP
    /// padding and local symbol tables are consumed without being surfaced.
    pub fn move_next(&mut self) -> IonResult<Option<IonType>> {
        if self.state == ReaderState::Exhausted {
            return Ok(None);
        }
        if let Some(current) = self.current.take() {
            self.input.x = current.end;
        }
        self.variant.clear();
        self.state = ReaderState::BeforeValue;
        loop {
            if self.input.x >= self.input.end {
                self.state = ReaderState::Exhausted;
                return Ok(None);
            }
            let offset = self.input.x;
            let header = match self.read_header() {
                Err(IonError::Buffer(BufferError::EndOfBuffer)) if !self.stack.is_empty() => {
                    return Err(IonError::LengthMismatch { offset })
                }
                other => other?,
            };
            let Some(header) = header else {
                continue;
            };
            if self.stack.is_empty() && is_symbol_table(&header) {
                self.current = Some(header);
                self.state = ReaderState::OnValue;
                self.load_symbol_table()?;
                continue;
            }
            let ion_type = header.ion_type;
            self.current = Some(header);
            self.state = ReaderState::OnValue;
            return Ok(Some(ion_type));
        }
    }

    /// Reads the next header. `None` means a version marker or padding was skipped.
    fn read_header(&mut self) -> IonResult<Option<ValueHeader>> {
        let offset = self.input.x;
        if self.stack.is_empty() && self.input.peek()? == ION_BVM[0] {
            if self.input.buf(4)? != ION_BVM {
                return Err(IonError::InvalidVersionMarker);
            }
            self.symbols = SymbolTable::system();
            trace!("version marker at {}", offset);
            return Ok(None);
        }
        let field_sid = if self.in_struct() {
            Some(self.read_sid()?)
        } else {
            None
        };
        let td = self.input.u8()?;
        let (type_code, length_code) = (td >> 4, td & 0x0f);
        match type_code {
            Type::NULL if length_code != LN_IS_NULL => {
                let len = self.read_length(length_code)?;
                let end = self.end_of(len, offset)?;
                self.input.x = end;
                Ok(None)
            }
            Type::ANNO => {
                if length_code < 3 || length_code == LN_IS_NULL {
                    return Err(IonError::InvalidTypeDescriptor(td));
                }
                let len = self.read_length(length_code)?;
                let end = self.end_of(len, offset)?;
                let annot_len = self.input.var_uint()? as usize;
                let annot_end = self.end_of(annot_len, offset)?;
                if annot_len == 0 || annot_end > end {
                    return Err(IonError::LengthMismatch { offset });
                }
                let mut annotations = Vec::new();
                while self.input.x < annot_end {
                    annotations.push(self.read_sid()?);
                }
                if self.input.x != annot_end {
                    return Err(IonError::LengthMismatch { offset });
                }
                let inner = self.input.u8()?;
                let inner_code = inner >> 4;
                if inner_code == Type::ANNO || (inner_code == Type::NULL && inner & 0x0f != LN_IS_NULL) {
                    return Err(IonError::InvalidTypeDescriptor(inner));
                }
                let mut header = self.value_header(inner, offset)?;
                if header.end != end {
                    return Err(IonError::LengthMismatch { offset });
                }
                header.field_sid = field_sid;
                header.annotations = annotations;
                Ok(Some(header))
            }
            _ => {
                let mut header = self.value_header(td, offset)?;
                header.field_sid = field_sid;
                Ok(Some(header))
            }
        }
    }

    fn value_header(&mut self, td: u8, offset: usize) -> IonResult<ValueHeader> {
        let (type_code, length_code) = (td >> 4, td & 0x0f);
        let ion_type = IonType::from_type_code(type_code).ok_or(IonError::InvalidTypeDescriptor(td))?;
        let is_null = length_code == LN_IS_NULL;
        let len = match ion_type {
            _ if is_null => 0,
            IonType::Bool if length_code > 1 => return Err(IonError::InvalidBool(length_code)),
            IonType::Bool => 0,
            IonType::Int if type_code == Type::NINT && length_code == 0 => {
                return Err(IonError::NegativeZeroInt)
            }
            // Sorted struct: the length always follows as a VarUInt.
            IonType::Struct if length_code == 1 => self.input.var_uint()? as usize,
            _ => self.read_length(length_code)?,
        };
        let start = self.input.x;
        let end = self.end_of(len, offset)?;
        Ok(ValueHeader {
            ion_type,
            type_code,
            length_code,
            is_null,
            field_sid: None,
            annotations: Vec::new(),
            start,
            end,
        })
    }

    fn read_length(&mut self, length_code: u8) -> IonResult<usize> {
        if length_code == LN_IS_VAR_LEN {
            Ok(self.input.var_uint()? as usize)
        } else {
            Ok(length_code as usize)
        }
    }

    fn read_sid(&mut self) -> IonResult<u32> {
        u32::try_from(self.input.var_uint()?).map_err(|_| IonError::NumericOverflow)
    }

    /// End of `len` bytes from the cursor, which must stay inside the container.
    fn end_of(&self, len: usize, offset: usize) -> IonResult<usize> {
        match self.input.x.checked_add(len) {
            Some(end) if end <= self.input.end => Ok(end),
            _ if self.stack.is_empty() => Err(BufferError::EndOfBuffer.into()),
            _ => Err(IonError::LengthMismatch { offset }),
        }
    }

    pub fn step_in(&mut self) -> IonResult<()> {
        let current = self.current.as_ref().ok_or(IonError::NotOnValue)?;
        if !current.ion_type.is_container() {
            return Err(IonError::NotAContainer(current.ion_type));
        }
        if current.is_null {
            return Err(IonError::NullValue);
        }
        self.stack.push(ContainerFrame {
            ion_type: current.ion_type,
            parent_end: self.input.end,
            resume: current.end,
        });
        self.input.x = current.start;
        self.input.end = current.end;
        self.current = None;
        self.variant.clear();
        self.state = ReaderState::BeforeValue;
        Ok(())
    }

    /// Leaves the current container, skipping any unread values.
    pub fn step_out(&mut self) -> IonResult<()> {
        let frame = self.stack.pop().ok_or(IonError::StepOutAtTopLevel)?;
        self.input.x = frame.resume;
        self.input.end = frame.parent_end;
        self.current = None;
        self.variant.clear();
        self.state = ReaderState::BeforeValue;
        Ok(())
    }

    pub fn current_type(&self) -> Option<IonType> {
        self.current.as_ref().map(|h| h.ion_type)
    }

    pub fn current_is_null(&self) -> bool {
        self.current.as_ref().is_some_and(|h| h.is_null)
    }

    /// Field name text; `None` outside a struct or when the SID has no text.
    pub fn current_field_name(&self) -> Option<&str> {
        let sid = self.current.as_ref()?.field_sid?;
        self.symbols.text_for(sid)
    }

    pub fn current_field_name_symbol(&self) -> Option<SymbolToken> {
        let sid = self.current.as_ref()?.field_sid?;
        Some(self.token(sid))
    }

    pub fn annotations(&self) -> Vec<SymbolToken> {
        match &self.current {
            Some(h) => h.annotations.iter().map(|sid| self.token(*sid)).collect(),
            None => Vec::new(),
        }
    }

    fn token(&self, sid: u32) -> SymbolToken {
        SymbolToken::new(self.symbols.text_for(sid).map(str::to_owned), Some(sid))
    }

    /// Current header, checked against the requested type.
    fn typed_header(&self, ion_type: IonType) -> IonResult<&ValueHeader> {
        let header = self.current.as_ref().ok_or(IonError::NotOnValue)?;
        if header.ion_type != ion_type {
            return Err(IonError::TypeMismatch {
                expected: ion_type.name(),
                actual: header.ion_type,
            });
        }
        if header.is_null {
            return Err(IonError::NullValue);
        }
        Ok(header)
    }

    fn payload(&self, header: &ValueHeader) -> &'a [u8] {
        let data: &'a [u8] = self.input.uint8;
        &data[header.start..header.end]
    }

    /// Decodes the current payload into the variant unless already cached.
    fn materialize(&mut self, ion_type: IonType) -> IonResult<()> {
        let header = self.typed_header(ion_type)?;
        if !self.variant.is_empty() {
            return Ok(());
        }
        let bytes = self.payload(header);
        let scalar = match ion_type {
            IonType::Bool => Scalar::Bool(header.length_code == 1),
            IonType::Int => decode_int(bytes, header.type_code == Type::NINT)?,
            IonType::Float => Scalar::Double(decode_float(bytes)?),
            IonType::Decimal => Scalar::Decimal(decode_decimal(bytes)?),
            IonType::Timestamp => Scalar::Timestamp(decode_timestamp(bytes)?),
            IonType::String => Scalar::String(
                std::str::from_utf8(bytes)
                    .map_err(|_| BufferError::InvalidUtf8)?
                    .to_owned(),
            ),
            other => {
                return Err(IonError::TypeMismatch {
                    expected: "scalar",
                    actual: other,
                })
            }
        };
        self.variant.set(scalar);
        Ok(())
    }

    /// Integer classification of the current value; `Unknown` unless on a
    /// non-null int.
    pub fn integer_size(&mut self) -> IonResult<IntegerSize> {
        match &self.current {
            Some(h) if h.ion_type == IonType::Int && !h.is_null => {
                self.materialize(IonType::Int)?;
                Ok(self.variant.integer_size())
            }
            _ => Ok(IntegerSize::Unknown),
        }
    }

    pub fn bool_value(&mut self) -> IonResult<bool> {
        self.materialize(IonType::Bool)?;
        self.variant.as_bool().ok_or(IonError::NullValue)
    }

    pub fn int_value(&mut self) -> IonResult<i32> {
        self.materialize(IonType::Int)?;
        self.variant.as_i32().ok_or(IonError::NumericOverflow)
    }

    pub fn long_value(&mut self) -> IonResult<i64> {
        self.materialize(IonType::Int)?;
        self.variant.as_i64().ok_or(IonError::NumericOverflow)
    }

    pub fn big_integer_value(&mut self) -> IonResult<BigInt> {
        self.materialize(IonType::Int)?;
        self.variant.as_big_integer().ok_or(IonError::NumericOverflow)
    }

    pub fn double_value(&mut self) -> IonResult<f64> {
        self.materialize(IonType::Float)?;
        self.variant.as_f64().ok_or(IonError::NullValue)
    }

    pub fn decimal_value(&mut self) -> IonResult<BigDecimal> {
        self.materialize(IonType::Decimal)?;
        self.variant.as_decimal().cloned().ok_or(IonError::NullValue)
    }

    pub fn timestamp_value(&mut self) -> IonResult<Timestamp> {
        self.materialize(IonType::Timestamp)?;
        self.variant.as_timestamp().cloned().ok_or(IonError::NullValue)
    }

    pub fn string_value(&mut self) -> IonResult<&str> {
        self.materialize(IonType::String)?;
        self.variant.as_str().ok_or(IonError::NullValue)
    }

    /// The symbol's ID and, when known, its text.
    pub fn symbol_value(&self) -> IonResult<SymbolToken> {
        let header = self.typed_header(IonType::Symbol)?;
        let bytes = self.payload(header);
        if bytes.len() > 4 {
            return Err(IonError::NumericOverflow);
        }
        let sid = bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
        Ok(self.token(sid))
    }

    fn lob_header(&self) -> IonResult<&ValueHeader> {
        let header = self.current.as_ref().ok_or(IonError::NotOnValue)?;
        if !header.ion_type.is_lob() {
            return Err(IonError::TypeMismatch {
                expected: "blob or clob",
                actual: header.ion_type,
            });
        }
        if header.is_null {
            return Err(IonError::NullValue);
        }
        Ok(header)
    }

    pub fn lob_byte_size(&self) -> IonResult<usize> {
        let header = self.lob_header()?;
        Ok(header.end - header.start)
    }

    /// Blob or clob bytes, borrowed from the input.
    pub fn lob_bytes(&self) -> IonResult<&'a [u8]> {
        let header = self.lob_header()?;
        Ok(self.payload(header))
    }

    /// Installs the local symbol table the reader is positioned on.
    fn load_symbol_table(&mut self) -> IonResult<()> {
        let mut append = false;
        let mut imports: Vec<ImportDecl> = Vec::new();
        let mut symbols: Vec<Option<String>> = Vec::new();

        self.step_in()?;
        while let Some(ion_type) = self.move_next()? {
            let field = self.current.as_ref().and_then(|h| h.field_sid);
            match (field, ion_type) {
                (Some(SID_IMPORTS), IonType::Symbol) if !self.current_is_null() => {
                    append = self.symbol_value()?.sid == Some(SID_ION_SYMBOL_TABLE);
                }
                (Some(SID_IMPORTS), IonType::List) if !self.current_is_null() => {
                    imports = self.read_imports()?;
                }
                (Some(SID_SYMBOLS), IonType::List) if !self.current_is_null() => {
                    symbols.clear();
                    self.step_in()?;
                    while let Some(t) = self.move_next()? {
                        let text = match t {
                            IonType::String if !self.current_is_null() => Some(self.string_value()?.to_owned()),
                            _ => None,
                        };
                        symbols.push(text);
                    }
                    self.step_out()?;
                }
                _ => {}
            }
        }
        self.step_out()?;

        let chain = if append {
            None
        } else {
            Some(self.resolve_imports(imports)?)
        };
        let base = chain.as_ref().map_or_else(|| self.symbols.max_id(), |c| c.max_id());
        let added = symbols.len();
        if u32::try_from(added).ok().and_then(|n| base.checked_add(n)).is_none() {
            return Err(IonError::InvalidSymbolTable(format!(
                "{} local symbol(s) after SID {} overflow the SID range",
                added, base
            )));
        }
        let mut table = match chain {
            Some(chain) => SymbolTable::new(chain),
            None => mem::take(&mut self.symbols),
        };
        for symbol in symbols {
            table.push_local(symbol);
        }
        debug!(
            "loaded local symbol table: {} new symbol(s), append = {}, max id {}",
            added,
            append,
            table.max_id()
        );
        self.symbols = table;
        Ok(())
    }

    fn read_imports(&mut self) -> IonResult<Vec<ImportDecl>> {
        let mut imports = Vec::new();
        self.step_in()?;
        while let Some(t) = self.move_next()? {
            if t != IonType::Struct || self.current_is_null() {
                continue;
            }
            let mut decl = ImportDecl::default();
            self.step_in()?;
            while let Some(ft) = self.move_next()? {
                if self.current_is_null() {
                    continue;
                }
                let field = self.current.as_ref().and_then(|h| h.field_sid);
                match (field, ft) {
                    (Some(SID_NAME), IonType::String) => decl.name = Some(self.string_value()?.to_owned()),
                    (Some(SID_VERSION), IonType::Int) => decl.version = self.long_value().ok(),
                    (Some(SID_MAX_ID), IonType::Int) => decl.max_id = self.long_value().ok(),
                    _ => {}
                }
            }
            self.step_out()?;
            imports.push(decl);
        }
        self.step_out()?;
        Ok(imports)
    }

    /// Builds the import chain, reserving unknown slots for missing tables.
    fn resolve_imports(&self, imports: Vec<ImportDecl>) -> IonResult<Arc<Import>> {
        let mut chain = Import::system();
        for decl in imports {
            let name = match decl.name {
                Some(name) if !name.is_empty() && name != "$ion" => name,
                _ => continue,
            };
            let version = decl
                .version
                .filter(|v| *v >= 1)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(1);
            let max_id = match decl.max_id {
                Some(m) => Some(u32::try_from(m).map_err(|_| {
                    IonError::InvalidSymbolTable(format!("invalid max_id {} for import {}", m, name))
                })?),
                None => None,
            };
            let (table, max_id) = match (self.catalog.get_exact(&name, version), max_id) {
                (Some(table), max_id) => {
                    let max_id = max_id.unwrap_or_else(|| table.max_id());
                    (table, max_id)
                }
                (None, None) => {
                    return Err(IonError::InvalidSymbolTable(format!(
                        "import {} version {} is not in the catalog and declares no max_id",
                        name, version
                    )))
                }
                (None, Some(max_id)) => match self.catalog.get_table(&name, version) {
                    Some(table) => {
                        warn!(
                            "import {} version {} not found, using version {}",
                            name,
                            version,
                            table.version()
                        );
                        (table, max_id)
                    }
                    None => {
                        warn!(
                            "import {} version {} not found, reserving {} unknown symbol(s)",
                            name, version, max_id
                        );
                        (Arc::new(SharedSymbolTable::placeholder(name.clone(), version, max_id)), max_id)
                    }
                },
            };
            let layer = Import::checked(Some(chain), table, max_id).ok_or_else(|| {
                IonError::InvalidSymbolTable(format!("max_id {} for import {} overflows the SID range", max_id, name))
            })?;
            chain = Arc::new(layer);
        }
        Ok(chain)
    }
}

fn is_symbol_table(header: &ValueHeader) -> bool {
    header.ion_type == IonType::Struct
        && !header.is_null
        && header.annotations.first() == Some(&SID_ION_SYMBOL_TABLE)
}

fn decode_int(bytes: &[u8], negative: bool) -> IonResult<Scalar> {
    if bytes.len() <= 8 {
        let magnitude = bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
        if negative && magnitude == 0 {
            return Err(IonError::NegativeZeroInt);
        }
        let value = if negative {
            -(magnitude as i128)
        } else {
            magnitude as i128
        };
        return Ok(if let Ok(v) = i32::try_from(value) {
            Scalar::Int(v)
        } else if let Ok(v) = i64::try_from(value) {
            Scalar::Long(v)
        } else {
            Scalar::BigInteger(BigInt::from(value))
        });
    }
    let sign = if negative { Sign::Minus } else { Sign::Plus };
    let value = BigInt::from_bytes_be(sign, bytes);
    if negative && value.sign() == Sign::NoSign {
        return Err(IonError::NegativeZeroInt);
    }
    Ok(Scalar::integer(value))
}

fn decode_float(bytes: &[u8]) -> IonResult<f64> {
    match bytes.len() {
        0 => Ok(0.0),
        4 => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(bytes);
            Ok(f32::from_be_bytes(buf) as f64)
        }
        8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(bytes);
            Ok(f64::from_be_bytes(buf))
        }
        n => Err(IonError::InvalidFloatLength(n)),
    }
}

/// Signed-magnitude `Int` field spanning all of `bytes`.
fn decode_signed_int(bytes: &[u8]) -> IonResult<BigInt> {
    let (negative, magnitude) = Reader::new(bytes).int(bytes.len())?;
    let sign = if negative { Sign::Minus } else { Sign::Plus };
    Ok(BigInt::from_bytes_be(sign, &magnitude))
}

fn var_int_value(negative: bool, magnitude: u64) -> IonResult<i64> {
    let value = i64::try_from(magnitude).map_err(|_| IonError::NumericOverflow)?;
    Ok(if negative { -value } else { value })
}

fn decode_decimal(bytes: &[u8]) -> IonResult<BigDecimal> {
    if bytes.is_empty() {
        return Ok(BigDecimal::from(0));
    }
    let mut reader = Reader::new(bytes);
    let (negative, magnitude) = reader.var_int()?;
    let exponent = var_int_value(negative, magnitude)?;
    let coefficient = decode_signed_int(&bytes[reader.x..])?;
    let scale = exponent.checked_neg().ok_or(IonError::NumericOverflow)?;
    Ok(BigDecimal::new(coefficient, scale))
}

fn decode_timestamp(bytes: &[u8]) -> IonResult<Timestamp> {
    let mut reader = Reader::new(bytes);
    let offset = match reader.var_int()? {
        (true, 0) => None,
        (negative, magnitude) => {
            let minutes = i32::try_from(magnitude).map_err(|_| IonError::InvalidTimestamp)?;
            Some(if negative { -minutes } else { minutes })
        }
    };
    let year = reader.var_uint()?;
    let mut fields = [1u64, 1, 0, 0, 0];
    let mut count = 0;
    while count < fields.len() && reader.size() > 0 {
        fields[count] = reader.var_uint()?;
        count += 1;
    }
    let [month, day, hour, minute, second] = fields;
    let mut precision = match count {
        0 => TimestampPrecision::Year,
        1 => TimestampPrecision::Month,
        2 => TimestampPrecision::Day,
        // Hour without minute.
        3 => return Err(IonError::InvalidTimestamp),
        4 => TimestampPrecision::Minute,
        _ => TimestampPrecision::Second,
    };

    let mut nanos = 0u32;
    if reader.size() > 0 {
        let (negative, magnitude) = reader.var_int()?;
        let exponent = var_int_value(negative, magnitude)?;
        let coefficient = decode_signed_int(&bytes[reader.x..])?;
        if coefficient.sign() == Sign::Minus {
            return Err(IonError::InvalidTimestamp);
        }
        if exponent >= 0 {
            if coefficient.sign() != Sign::NoSign {
                return Err(IonError::InvalidTimestamp);
            }
        } else {
            let digits = u32::try_from(-exponent)
                .ok()
                .filter(|d| *d <= 1000)
                .ok_or(IonError::InvalidTimestamp)?;
            let scale = BigInt::from(10u32).pow(digits);
            if coefficient >= scale {
                return Err(IonError::InvalidTimestamp);
            }
            let scaled = coefficient * BigInt::from(1_000_000_000u32) / scale;
            nanos = u32::try_from(&scaled).map_err(|_| IonError::InvalidTimestamp)?;
            precision = TimestampPrecision::Fraction(digits.min(9) as u8);
        }
    }

    let narrow = |v: u64| u32::try_from(v).map_err(|_| IonError::InvalidTimestamp);
    let year = i32::try_from(year).map_err(|_| IonError::InvalidTimestamp)?;
    let utc = NaiveDate::from_ymd_opt(year, narrow(month)?, narrow(day)?)
        .and_then(|d| d.and_hms_nano_opt(narrow(hour).ok()?, narrow(minute).ok()?, narrow(second).ok()?, nanos))
        .ok_or(IonError::InvalidTimestamp)?;
    Timestamp::new(utc, offset, precision)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datagram(body: &[u8]) -> Vec<u8> {
        let mut data = ION_BVM.to_vec();
        data.extend_from_slice(body);
        data
    }

    #[test]
    fn requires_version_marker() {
        assert!(matches!(
            BinaryReader::new(&[0x20]),
            Err(IonError::InvalidVersionMarker)
        ));
    }

    #[test]
    fn reads_scalars_lazily() {
        let data = datagram(&[0x21, 0x05, 0x11, 0x83, b'a', b'b', b'c', 0x8f]);
        let mut reader = BinaryReader::new(&data).unwrap();

        assert_eq!(reader.move_next().unwrap(), Some(IonType::Int));
        assert_eq!(reader.integer_size().unwrap(), IntegerSize::Int);
        assert_eq!(reader.int_value().unwrap(), 5);
        assert_eq!(reader.long_value().unwrap(), 5);

        assert_eq!(reader.move_next().unwrap(), Some(IonType::Bool));
        assert!(reader.bool_value().unwrap());
        assert!(matches!(
            reader.int_value(),
            Err(IonError::TypeMismatch { expected: "int", actual: IonType::Bool })
        ));

        assert_eq!(reader.move_next().unwrap(), Some(IonType::String));
        assert_eq!(reader.string_value().unwrap(), "abc");

        assert_eq!(reader.move_next().unwrap(), Some(IonType::String));
        assert!(reader.current_is_null());
        assert!(matches!(reader.string_value(), Err(IonError::NullValue)));

        assert_eq!(reader.move_next().unwrap(), None);
        assert_eq!(reader.state(), ReaderState::Exhausted);
        assert_eq!(reader.move_next().unwrap(), None);
    }

    #[test]
    fn skips_padding_and_unread_containers() {
        // nop pad, [1, 2], true
        let data = datagram(&[0x01, 0x00, 0xb4, 0x21, 0x01, 0x21, 0x02, 0x11]);
        let mut reader = BinaryReader::new(&data).unwrap();
        assert_eq!(reader.move_next().unwrap(), Some(IonType::List));
        assert_eq!(reader.move_next().unwrap(), Some(IonType::Bool));
    }

    #[test]
    fn step_in_and_out() {
        // {name: [1]}
        let data = datagram(&[0xd4, 0x84, 0xb2, 0x21, 0x01]);
        let mut reader = BinaryReader::new(&data).unwrap();
        assert!(matches!(reader.step_out(), Err(IonError::StepOutAtTopLevel)));
        assert!(matches!(reader.step_in(), Err(IonError::NotOnValue)));

        reader.move_next().unwrap();
        reader.step_in().unwrap();
        assert_eq!(reader.depth(), 1);
        assert_eq!(reader.move_next().unwrap(), Some(IonType::List));
        assert_eq!(reader.current_field_name(), Some("name"));
        reader.step_in().unwrap();
        assert_eq!(reader.move_next().unwrap(), Some(IonType::Int));
        assert!(matches!(reader.step_in(), Err(IonError::NotAContainer(IonType::Int))));
        reader.step_out().unwrap();
        assert_eq!(reader.move_next().unwrap(), None);
        reader.step_out().unwrap();
        assert_eq!(reader.depth(), 0);
        assert_eq!(reader.move_next().unwrap(), None);
    }

    #[test]
    fn rejects_child_overrunning_container() {
        // list declares 2 bytes but holds a 3-byte int
        let data = datagram(&[0xb2, 0x22, 0x01, 0x00]);
        let mut reader = BinaryReader::new(&data).unwrap();
        reader.move_next().unwrap();
        reader.step_in().unwrap();
        assert!(matches!(
            reader.move_next(),
            Err(IonError::LengthMismatch { offset: 5 })
        ));
    }

    #[test]
    fn rejects_annotation_wrapper_mismatch() {
        // wrapper declares 4 bytes but the wrapped int needs 3
        let data = datagram(&[0xe4, 0x81, 0x84, 0x20, 0x20]);
        let mut reader = BinaryReader::new(&data).unwrap();
        assert!(matches!(
            reader.move_next(),
            Err(IonError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn rejects_malformed_scalars() {
        let data = datagram(&[0x30]);
        let mut reader = BinaryReader::new(&data).unwrap();
        assert!(matches!(reader.move_next(), Err(IonError::NegativeZeroInt)));

        let data = datagram(&[0x12]);
        let mut reader = BinaryReader::new(&data).unwrap();
        assert!(matches!(reader.move_next(), Err(IonError::InvalidBool(2))));

        let data = datagram(&[0x42, 0x00, 0x00]);
        let mut reader = BinaryReader::new(&data).unwrap();
        reader.move_next().unwrap();
        assert!(matches!(
            reader.double_value(),
            Err(IonError::InvalidFloatLength(2))
        ));

        let data = datagram(&[0xf0]);
        let mut reader = BinaryReader::new(&data).unwrap();
        assert!(matches!(
            reader.move_next(),
            Err(IonError::InvalidTypeDescriptor(0xf0))
        ));
    }

    #[test]
    fn unknown_symbols_have_no_text() {
        let data = datagram(&[0x71, 0x63]);
        let mut reader = BinaryReader::new(&data).unwrap();
        reader.move_next().unwrap();
        assert_eq!(reader.symbol_value().unwrap(), SymbolToken::new(None, Some(99)));
    }

    #[test]
    fn decodes_timestamp_fields() {
        // 2000-11-11T11:11:11.5Z
        let body = [0x80, 0x0f, 0xd0, 0x8b, 0x8b, 0x8b, 0x8b, 0x8b, 0xc1, 0x05];
        let ts = decode_timestamp(&body).unwrap();
        assert_eq!(ts.precision(), TimestampPrecision::Fraction(1));
        assert_eq!(ts.offset_minutes(), Some(0));
        assert_eq!(ts.to_string(), "2000-11-11T11:11:11.5Z");

        // hour without minute
        let body = [0x80, 0x0f, 0xd0, 0x8b, 0x8b, 0x8b];
        assert!(matches!(decode_timestamp(&body), Err(IonError::InvalidTimestamp)));
    }
}
