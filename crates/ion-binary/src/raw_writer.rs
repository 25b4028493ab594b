//! SID-level Ion binary writer.
//!
//! Values are encoded as they arrive. Each open container owns a list of
//! segments in a shared [`SegmentBuffer`]; when the container is closed its
//! header is written to a side list and spliced in front of the body in the
//! parent's list, so container bodies are never copied.

use std::io::Write;
use std::mem;

use bigdecimal::BigDecimal;
use ion_buffers::{uint_len, var_int_len, var_uint_len, SegmentBuffer, SegmentList, DEFAULT_BLOCK_SIZE};
use log::trace;
use num_bigint::{BigInt, Sign};

use crate::constants::{
    TypeOverlay, BOOL_FALSE, BOOL_TRUE, FLOAT_ZERO, INT_ZERO, ION_BVM, LN_IS_VAR_LEN, MAX_ANNOTATIONS,
    MAX_SHORT_LENGTH, NULL_NULL,
};
use crate::error::{IonError, IonResult};
use crate::timestamp::{Timestamp, TimestampPrecision};
use crate::types::{ContainerKind, IonType};

#[derive(Debug)]
struct Frame {
    kind: ContainerKind,
    /// Bytes written into this frame so far, headers of closed children included.
    length: usize,
    /// Parked here while a child frame is streaking.
    segments: SegmentList,
}

/// Array-backed frame stack. Popped slots keep their allocations for reuse.
#[derive(Debug)]
struct ContainerStack {
    frames: Vec<Frame>,
    top: usize,
}

impl ContainerStack {
    fn new() -> Self {
        Self {
            frames: vec![Frame {
                kind: ContainerKind::Datagram,
                length: 0,
                segments: Vec::new(),
            }],
            top: 1,
        }
    }

    fn len(&self) -> usize {
        self.top
    }

    fn top(&self) -> &Frame {
        &self.frames[self.top - 1]
    }

    fn top_mut(&mut self) -> &mut Frame {
        &mut self.frames[self.top - 1]
    }

    fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames[..self.top].iter()
    }

    /// Pushes a frame and hands out its (empty) segment list.
    fn push(&mut self, kind: ContainerKind) -> SegmentList {
        if self.top == self.frames.len() {
            self.frames.push(Frame {
                kind,
                length: 0,
                segments: Vec::new(),
            });
        }
        let frame = &mut self.frames[self.top];
        frame.kind = kind;
        frame.length = 0;
        self.top += 1;
        mem::take(&mut frame.segments)
    }

    /// Pops the top frame, returning its kind and body length.
    fn pop(&mut self) -> (ContainerKind, usize) {
        debug_assert!(self.top > 1, "the datagram frame is never popped");
        self.top -= 1;
        let frame = &self.frames[self.top];
        (frame.kind, frame.length)
    }

    /// Returns a drained list to the slot that was popped last.
    fn recycle(&mut self, mut list: SegmentList) {
        list.clear();
        if let Some(slot) = self.frames.get_mut(self.top) {
            slot.segments = list;
        }
    }

    /// Drops everything but an empty datagram frame.
    fn clear(&mut self) {
        self.top = 1;
        let root = &mut self.frames[0];
        root.length = 0;
        root.segments.clear();
    }
}

/// Signed-magnitude `Int` field bytes; zero has no bytes.
fn signed_magnitude(value: &BigInt) -> Vec<u8> {
    let (sign, mut bytes) = value.to_bytes_be();
    if sign == Sign::NoSign {
        return Vec::new();
    }
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0);
    }
    if sign == Sign::Minus {
        bytes[0] |= 0x80;
    }
    bytes
}

/// One field of a timestamp body.
enum TimestampField {
    VarUInt(u64),
    VarInt { magnitude: u64, negative: bool },
    Int(Vec<u8>),
}

impl TimestampField {
    fn len(&self) -> usize {
        match self {
            TimestampField::VarUInt(v) => var_uint_len(*v),
            TimestampField::VarInt { magnitude, .. } => var_int_len(*magnitude),
            TimestampField::Int(bytes) => bytes.len(),
        }
    }
}

fn timestamp_fields(value: &Timestamp) -> Vec<TimestampField> {
    use chrono::{Datelike, Timelike};

    let precision = value.precision();
    let utc = value.utc();
    let mut fields = Vec::with_capacity(9);
    fields.push(match value.offset_minutes() {
        Some(m) => TimestampField::VarInt {
            magnitude: m.unsigned_abs() as u64,
            negative: m < 0,
        },
        None => TimestampField::VarInt {
            magnitude: 0,
            negative: true,
        },
    });
    fields.push(TimestampField::VarUInt(utc.year() as u64));
    if precision >= TimestampPrecision::Month {
        fields.push(TimestampField::VarUInt(utc.month() as u64));
    }
    if precision >= TimestampPrecision::Day {
        fields.push(TimestampField::VarUInt(utc.day() as u64));
    }
    if precision >= TimestampPrecision::Minute {
        fields.push(TimestampField::VarUInt(utc.hour() as u64));
        fields.push(TimestampField::VarUInt(utc.minute() as u64));
    }
    if precision >= TimestampPrecision::Second {
        fields.push(TimestampField::VarUInt(utc.second() as u64));
    }
    if let Some((digits, coefficient)) = value.fraction() {
        fields.push(TimestampField::VarInt {
            magnitude: digits as u64,
            negative: true,
        });
        fields.push(TimestampField::Int(signed_magnitude(&BigInt::from(coefficient))));
    }
    fields
}

/// Ion binary writer working purely in symbol IDs.
///
/// Field names, annotations and symbol values must already be resolved to
/// SIDs; [`BinaryWriter`](crate::BinaryWriter) does that and manages the
/// symbol table. A structural error poisons the writer until [`reset`](Self::reset).
#[derive(Debug)]
pub struct RawBinaryWriter {
    data: SegmentBuffer,
    stack: ContainerStack,
    /// Side list receiving container headers before they are spliced.
    length_segments: SegmentList,
    field_name: Option<u32>,
    annotations: Vec<u32>,
    poisoned: bool,
}

impl Default for RawBinaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl RawBinaryWriter {
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(block_size: usize) -> Self {
        let mut data = SegmentBuffer::with_block_size(block_size);
        data.start_streak(Vec::new());
        Self {
            data,
            stack: ContainerStack::new(),
            length_segments: Vec::new(),
            field_name: None,
            annotations: Vec::new(),
            poisoned: false,
        }
    }

    /// Runs `f` unless poisoned, poisoning on structural failure.
    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> IonResult<T>) -> IonResult<T> {
        if self.poisoned {
            return Err(IonError::Poisoned);
        }
        let res = f(self);
        if let Err(err) = &res {
            if err.is_structural() {
                self.poisoned = true;
            }
        }
        res
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn is_in_struct(&self) -> bool {
        self.stack.top().kind == ContainerKind::Struct
    }

    /// Number of open lists, sexps and structs.
    pub fn depth(&self) -> usize {
        self.stack.iter().filter(|f| f.kind.is_user_closable()).count()
    }

    /// Bytes buffered across all open frames, not counting unwritten headers.
    pub fn buffered_len(&self) -> usize {
        self.stack.iter().map(|f| f.length).sum()
    }

    pub fn has_field_name(&self) -> bool {
        self.field_name.is_some()
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    pub fn set_field_name_sid(&mut self, sid: u32) -> IonResult<()> {
        self.guarded(|w| {
            if !w.is_in_struct() {
                return Err(IonError::FieldNameOutsideStruct);
            }
            w.field_name = Some(sid);
            Ok(())
        })
    }

    pub fn add_annotation_sid(&mut self, sid: u32) -> IonResult<()> {
        self.guarded(|w| {
            if w.annotations.len() >= MAX_ANNOTATIONS {
                return Err(IonError::TooManyAnnotations(MAX_ANNOTATIONS));
            }
            w.annotations.push(sid);
            Ok(())
        })
    }

    /// Replaces the pending annotations.
    pub fn set_annotation_sids(&mut self, sids: &[u32]) -> IonResult<()> {
        self.guarded(|w| {
            if sids.len() > MAX_ANNOTATIONS {
                return Err(IonError::TooManyAnnotations(MAX_ANNOTATIONS));
            }
            w.annotations.clear();
            w.annotations.extend_from_slice(sids);
            Ok(())
        })
    }

    pub fn clear_annotations(&mut self) {
        self.annotations.clear();
    }

    #[inline]
    fn grow(&mut self, n: usize) {
        self.stack.top_mut().length += n;
    }

    /// Consumes the pending field name and annotations.
    ///
    /// Fails before writing anything when a struct member has no field name.
    fn prepare_value(&mut self) -> IonResult<()> {
        if self.is_in_struct() && self.field_name.is_none() {
            return Err(IonError::MissingFieldName);
        }
        if let Some(sid) = self.field_name.take() {
            let n = self.data.write_var_uint(sid as u64);
            self.grow(n);
        }
        if !self.annotations.is_empty() {
            self.push_container(ContainerKind::Annotation);
            let sids_len: usize = self.annotations.iter().map(|s| var_uint_len(*s as u64)).sum();
            let mut n = self.data.write_var_uint(sids_len as u64);
            for &sid in &self.annotations {
                n += self.data.write_var_uint(sid as u64);
            }
            self.grow(n);
            self.annotations.clear();
        }
        Ok(())
    }

    /// Closes the annotation wrapper around the value just written, if any.
    fn finish_value(&mut self) {
        if self.stack.top().kind == ContainerKind::Annotation {
            self.pop_container();
        }
    }

    fn push_container(&mut self, kind: ContainerKind) {
        let parked = self.data.wrapup().unwrap_or_default();
        self.stack.top_mut().segments = parked;
        let target = self.stack.push(kind);
        self.data.start_streak(target);
    }

    fn pop_container(&mut self) {
        let mut body = self.data.wrapup().unwrap_or_default();
        let (kind, length) = self.stack.pop();
        let Some(tid) = kind.type_overlay() else {
            self.data.start_streak(body);
            return;
        };

        self.data.start_streak(mem::take(&mut self.length_segments));
        let header_len = if length <= MAX_SHORT_LENGTH {
            self.data.write_u8(tid | length as u8)
        } else {
            self.data.write_u8(tid | LN_IS_VAR_LEN) + self.data.write_var_uint(length as u64)
        };
        let mut header = self.data.wrapup().unwrap_or_default();

        let parent = self.stack.top_mut();
        parent.length += header_len + length;
        let mut list = mem::take(&mut parent.segments);
        list.append(&mut header);
        list.append(&mut body);
        self.length_segments = header;
        self.stack.recycle(body);
        self.data.start_streak(list);
        trace!("closed {} with {} byte body", kind, length);
    }

    pub fn step_in(&mut self, ion_type: IonType) -> IonResult<()> {
        self.guarded(|w| {
            let kind = match ion_type {
                IonType::List => ContainerKind::List,
                IonType::Sexp => ContainerKind::Sexp,
                IonType::Struct => ContainerKind::Struct,
                other => return Err(IonError::NotAContainer(other)),
            };
            w.prepare_value()?;
            w.push_container(kind);
            Ok(())
        })
    }

    pub fn step_out(&mut self) -> IonResult<()> {
        self.guarded(|w| {
            if w.field_name.is_some() {
                return Err(IonError::PendingFieldName);
            }
            if !w.annotations.is_empty() {
                return Err(IonError::PendingAnnotations);
            }
            let kind = w.stack.top().kind;
            if !kind.is_user_closable() {
                return Err(IonError::CannotStepOut(kind));
            }
            w.pop_container();
            w.finish_value();
            Ok(())
        })
    }

    /// Writes a value whose bytes are all known up front.
    fn write_scalar(&mut self, f: impl FnOnce(&mut SegmentBuffer) -> usize) -> IonResult<()> {
        self.guarded(|w| {
            w.prepare_value()?;
            let n = f(&mut w.data);
            w.grow(n);
            w.finish_value();
            Ok(())
        })
    }

    pub fn write_null(&mut self) -> IonResult<()> {
        self.write_scalar(|data| data.write_u8(NULL_NULL))
    }

    pub fn write_null_typed(&mut self, ion_type: IonType) -> IonResult<()> {
        self.write_scalar(|data| data.write_u8(ion_type.null_byte()))
    }

    pub fn write_bool(&mut self, value: bool) -> IonResult<()> {
        self.write_scalar(|data| data.write_u8(if value { BOOL_TRUE } else { BOOL_FALSE }))
    }

    /// Writes an integer with a minimal big-endian magnitude.
    ///
    /// `i64::MIN` goes through `unsigned_abs`, so its magnitude is the
    /// 8-byte pattern `80 00 .. 00`.
    pub fn write_int(&mut self, value: i64) -> IonResult<()> {
        self.write_scalar(|data| {
            if value == 0 {
                return data.write_u8(INT_ZERO);
            }
            let tid = if value < 0 { TypeOverlay::NINT } else { TypeOverlay::UINT };
            let magnitude = value.unsigned_abs();
            let len = uint_len(magnitude);
            data.write_u8(tid | len as u8) + data.write_uint(magnitude, len)
        })
    }

    pub fn write_big_int(&mut self, value: &BigInt) -> IonResult<()> {
        if let Ok(v) = i64::try_from(value) {
            return self.write_int(v);
        }
        let (sign, magnitude) = value.to_bytes_be();
        let tid = if sign == Sign::Minus { TypeOverlay::NINT } else { TypeOverlay::UINT };
        self.write_scalar(|data| write_typed_bytes(data, tid, &magnitude))
    }

    /// Positive zero is the one-byte `0x40`; everything else is 8-byte IEEE-754.
    pub fn write_float(&mut self, value: f64) -> IonResult<()> {
        let bits = value.to_bits();
        self.write_scalar(|data| {
            if bits == 0 {
                return data.write_u8(FLOAT_ZERO);
            }
            data.write_u8(TypeOverlay::FLOT | 8) + data.write_uint(bits, 8)
        })
    }

    /// Writes `coefficient × 10^exponent` as a VarInt exponent and an Int coefficient.
    pub fn write_decimal(&mut self, value: &BigDecimal) -> IonResult<()> {
        let (coefficient, scale) = value.as_bigint_and_exponent();
        let exponent = scale.checked_neg().ok_or(IonError::NumericOverflow)?;
        let coefficient = signed_magnitude(&coefficient);
        self.write_scalar(|data| {
            if exponent == 0 && coefficient.is_empty() {
                return data.write_u8(TypeOverlay::DECI);
            }
            let len = var_int_len(exponent.unsigned_abs()) + coefficient.len();
            write_header(data, TypeOverlay::DECI, len)
                + data.write_var_int(exponent)
                + data.write_bytes(&coefficient)
        })
    }

    pub fn write_timestamp(&mut self, value: &Timestamp) -> IonResult<()> {
        let fields = timestamp_fields(value);
        let len: usize = fields.iter().map(TimestampField::len).sum();
        self.write_scalar(|data| {
            let mut n = write_header(data, TypeOverlay::TIME, len);
            for field in &fields {
                n += match field {
                    TimestampField::VarUInt(v) => data.write_var_uint(*v),
                    TimestampField::VarInt { magnitude, negative } => {
                        data.write_var_int_parts(*magnitude, *negative)
                    }
                    TimestampField::Int(bytes) => data.write_bytes(bytes),
                };
            }
            n
        })
    }

    /// Writes a symbol value by ID; SID 0 is the zero-length `0x70`.
    pub fn write_symbol_sid(&mut self, sid: u32) -> IonResult<()> {
        self.write_scalar(|data| {
            let sid = sid as u64;
            let len = uint_len(sid);
            data.write_u8(TypeOverlay::SYMB | len as u8) + data.write_uint(sid, len)
        })
    }

    pub fn write_string(&mut self, value: &str) -> IonResult<()> {
        self.write_scalar(|data| {
            write_header(data, TypeOverlay::STRI, value.len()) + data.write_utf8(value)
        })
    }

    pub fn write_blob(&mut self, value: &[u8]) -> IonResult<()> {
        self.write_scalar(|data| write_typed_bytes(data, TypeOverlay::BINA, value))
    }

    pub fn write_clob(&mut self, value: &[u8]) -> IonResult<()> {
        self.write_scalar(|data| write_typed_bytes(data, TypeOverlay::CLOB, value))
    }

    /// Writes the 4-byte version marker at the top level.
    pub fn write_ion_version_marker(&mut self) -> IonResult<()> {
        self.guarded(|w| {
            if w.stack.len() > 1 {
                return Err(IonError::UnclosedContainers(w.depth()));
            }
            if !w.annotations.is_empty() {
                return Err(IonError::PendingAnnotations);
            }
            let n = w.data.write_bytes(&ION_BVM);
            w.grow(n);
            trace!("wrote version marker");
            Ok(())
        })
    }

    /// Fails if a container is still open or annotations are pending.
    pub fn check_flushable(&mut self) -> IonResult<()> {
        self.guarded(|w| {
            if w.stack.len() > 1 {
                return Err(IonError::UnclosedContainers(w.depth()));
            }
            if !w.annotations.is_empty() {
                return Err(IonError::PendingAnnotations);
            }
            Ok(())
        })
    }

    /// Writes every top-level value to `sink` and clears the buffers.
    ///
    /// Returns the number of bytes written.
    pub fn flush_to<W: Write>(&mut self, sink: &mut W) -> IonResult<usize> {
        self.check_flushable()?;
        self.guarded(|w| {
            let root = w.data.wrapup().unwrap_or_default();
            match w.data.write_to(&root, sink) {
                Ok(written) => {
                    w.restart(root);
                    Ok(written)
                }
                Err(err) => {
                    w.data.start_streak(root);
                    Err(err.into())
                }
            }
        })
    }

    /// Discards buffered data and pending state and clears the poisoned flag.
    pub fn reset(&mut self) {
        let root = self.data.wrapup().unwrap_or_default();
        self.restart(root);
        self.poisoned = false;
    }

    fn restart(&mut self, mut root: SegmentList) {
        self.data.reset();
        self.stack.clear();
        self.length_segments.clear();
        self.field_name = None;
        self.annotations.clear();
        root.clear();
        self.data.start_streak(root);
    }
}

/// Writes a type descriptor with a short or VarUInt length.
fn write_header(data: &mut SegmentBuffer, tid: u8, len: usize) -> usize {
    if len <= MAX_SHORT_LENGTH {
        data.write_u8(tid | len as u8)
    } else {
        data.write_u8(tid | LN_IS_VAR_LEN) + data.write_var_uint(len as u64)
    }
}

fn write_typed_bytes(data: &mut SegmentBuffer, tid: u8, bytes: &[u8]) -> usize {
    write_header(data, tid, bytes.len()) + data.write_bytes(bytes)
}
