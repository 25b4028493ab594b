//! Segmented write buffer.
//!
//! Bytes are appended into fixed-size blocks drawn from a reusable pool. A run
//! of writes aimed at one segment list (a "streak") is recorded as [`Segment`]
//! views over those blocks, so the bytes of one list can later be placed after
//! a header written elsewhere by splicing lists instead of copying data.

use std::io::Write;

/// Default block size of a [`SegmentBuffer`] (1KB).
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// A view over `len` bytes of one pooled block.
///
/// Segments stay valid until the owning buffer is [`reset`](SegmentBuffer::reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    block: usize,
    start: usize,
    len: usize,
}

impl Segment {
    /// Number of bytes covered by this segment.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Ordered segments; concatenating them yields the encoded bytes.
pub type SegmentList = Vec<Segment>;

/// An append-only byte sink backed by pooled blocks.
///
/// # Example
///
/// ```
/// use ion_buffers::SegmentBuffer;
///
/// let mut buffer = SegmentBuffer::with_block_size(16);
/// buffer.start_streak(Vec::new());
/// buffer.write_bytes(b"hello, segmented world");
/// let list = buffer.wrapup().unwrap();
/// assert_eq!(list.len(), 2);
/// assert_eq!(buffer.to_vec(&list), b"hello, segmented world");
/// ```
#[derive(Debug)]
pub struct SegmentBuffer {
    blocks: Vec<Box<[u8]>>,
    block_size: usize,
    /// Index of the block receiving writes.
    current: usize,
    /// Write cursor inside the current block.
    x: usize,
    /// Start of the bytes of the current block not yet recorded as a segment.
    x0: usize,
    streak: Option<SegmentList>,
}

impl Default for SegmentBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentBuffer {
    /// Creates a buffer with [`DEFAULT_BLOCK_SIZE`] blocks.
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    /// Creates a buffer with a custom block size (at least 16 bytes).
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            blocks: Vec::new(),
            block_size: block_size.max(16),
            current: 0,
            x: 0,
            x0: 0,
            streak: None,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks allocated so far. Blocks are recycled by [`reset`](Self::reset).
    pub fn allocated_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Directs subsequent writes into `target`.
    ///
    /// Segments already present in `target` are kept; new ones are appended.
    pub fn start_streak(&mut self, target: SegmentList) {
        debug_assert!(self.streak.is_none(), "streak already active");
        self.x0 = self.x;
        self.streak = Some(target);
    }

    /// Whether a streak is active.
    pub fn in_streak(&self) -> bool {
        self.streak.is_some()
    }

    /// Records the tail segment and returns the target list, detaching from it.
    ///
    /// Returns `None` when no streak is active, so a second call is a no-op.
    pub fn wrapup(&mut self) -> Option<SegmentList> {
        self.streak.as_ref()?;
        self.seal();
        self.streak.take()
    }

    /// Drops all recorded data and returns every block to the pool.
    ///
    /// All previously returned segments become invalid.
    pub fn reset(&mut self) {
        self.current = 0;
        self.x = 0;
        self.x0 = 0;
        self.streak = None;
    }

    /// Writes one byte.
    pub fn write_u8(&mut self, byte: u8) -> usize {
        self.expect_streak();
        self.ensure_room();
        self.blocks[self.current][self.x] = byte;
        self.x += 1;
        1
    }

    /// Writes a byte slice, spilling into as many blocks as needed.
    pub fn write_bytes(&mut self, mut data: &[u8]) -> usize {
        self.expect_streak();
        let written = data.len();
        while !data.is_empty() {
            self.ensure_room();
            let take = (self.block_size - self.x).min(data.len());
            let x = self.x;
            self.blocks[self.current][x..x + take].copy_from_slice(&data[..take]);
            self.x += take;
            data = &data[take..];
        }
        written
    }

    /// Writes the UTF-8 bytes of `s`. Returns the number of bytes written.
    pub fn write_utf8(&mut self, s: &str) -> usize {
        self.write_bytes(s.as_bytes())
    }

    /// Writes the low `width` bytes of `value` big-endian (`width` ≤ 8).
    pub fn write_uint(&mut self, value: u64, width: usize) -> usize {
        debug_assert!(width <= 8);
        let bytes = value.to_be_bytes();
        self.write_bytes(&bytes[8 - width..])
    }

    /// Writes an Ion VarUInt: 7 bits per byte, end flag on the last byte.
    pub fn write_var_uint(&mut self, value: u64) -> usize {
        let len = var_uint_len(value);
        let mut out = [0u8; 10];
        for (i, slot) in out[..len].iter_mut().enumerate() {
            let shift = 7 * (len - 1 - i);
            *slot = ((value >> shift) & 0x7f) as u8;
        }
        out[len - 1] |= 0x80;
        self.write_bytes(&out[..len])
    }

    /// Writes an Ion VarInt.
    pub fn write_var_int(&mut self, value: i64) -> usize {
        self.write_var_int_parts(value.unsigned_abs(), value < 0)
    }

    /// Writes an Ion VarInt from sign and magnitude; `(0, true)` is negative zero.
    pub fn write_var_int_parts(&mut self, magnitude: u64, negative: bool) -> usize {
        let len = var_int_len(magnitude);
        let mut out = [0u8; 10];
        for (i, slot) in out[..len].iter_mut().enumerate() {
            let shift = 7 * (len - 1 - i);
            *slot = ((magnitude >> shift) & 0x7f) as u8;
        }
        if negative {
            out[0] |= 0x40;
        }
        out[len - 1] |= 0x80;
        self.write_bytes(&out[..len])
    }

    /// Returns the bytes viewed by `segment`.
    pub fn bytes(&self, segment: &Segment) -> &[u8] {
        &self.blocks[segment.block][segment.start..segment.start + segment.len]
    }

    /// Total byte count of a segment list.
    pub fn total_len(list: &[Segment]) -> usize {
        list.iter().map(Segment::len).sum()
    }

    /// Writes every segment of `list`, in order, to `sink`.
    pub fn write_to<W: Write>(&self, list: &[Segment], sink: &mut W) -> std::io::Result<usize> {
        let mut written = 0;
        for segment in list {
            let bytes = self.bytes(segment);
            sink.write_all(bytes)?;
            written += bytes.len();
        }
        Ok(written)
    }

    /// Concatenates a segment list into a new vector.
    pub fn to_vec(&self, list: &[Segment]) -> Vec<u8> {
        let mut res = Vec::with_capacity(Self::total_len(list));
        for segment in list {
            res.extend_from_slice(self.bytes(segment));
        }
        res
    }

    fn expect_streak(&self) {
        assert!(
            self.streak.is_some(),
            "SegmentBuffer write issued without an active streak"
        );
    }

    /// Makes sure the current block has at least one free byte.
    fn ensure_room(&mut self) {
        if self.current < self.blocks.len() && self.x < self.block_size {
            return;
        }
        if self.current < self.blocks.len() {
            self.seal();
            self.current += 1;
            self.x = 0;
            self.x0 = 0;
        }
        if self.current == self.blocks.len() {
            self.blocks.push(vec![0u8; self.block_size].into_boxed_slice());
        }
    }

    /// Records `x0..x` of the current block into the active streak.
    fn seal(&mut self) {
        if self.x > self.x0 {
            if let Some(list) = self.streak.as_mut() {
                list.push(Segment {
                    block: self.current,
                    start: self.x0,
                    len: self.x - self.x0,
                });
            }
        }
        self.x0 = self.x;
    }
}

/// Byte count of `value` as an Ion VarUInt.
pub fn var_uint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Byte count of a magnitude as an Ion VarInt (first byte carries 6 bits).
pub fn var_int_len(magnitude: u64) -> usize {
    let bits = 64 - magnitude.leading_zeros() as usize;
    (bits + 1).div_ceil(7).max(1)
}

/// Minimal big-endian byte count of `value`; zero needs no bytes.
pub fn uint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streak(buffer: &mut SegmentBuffer, f: impl FnOnce(&mut SegmentBuffer) -> usize) -> Vec<u8> {
        buffer.start_streak(Vec::new());
        let written = f(buffer);
        let list = buffer.wrapup().unwrap();
        assert_eq!(SegmentBuffer::total_len(&list), written);
        buffer.to_vec(&list)
    }

    #[test]
    fn test_var_uint() {
        let mut buffer = SegmentBuffer::new();
        assert_eq!(streak(&mut buffer, |b| b.write_var_uint(0)), [0x80]);
        assert_eq!(streak(&mut buffer, |b| b.write_var_uint(127)), [0xff]);
        assert_eq!(streak(&mut buffer, |b| b.write_var_uint(128)), [0x01, 0x80]);
        assert_eq!(streak(&mut buffer, |b| b.write_var_uint(16383)), [0x7f, 0xff]);
    }

    #[test]
    fn test_var_int() {
        let mut buffer = SegmentBuffer::new();
        assert_eq!(streak(&mut buffer, |b| b.write_var_int(0)), [0x80]);
        assert_eq!(streak(&mut buffer, |b| b.write_var_int(-1)), [0xc1]);
        assert_eq!(streak(&mut buffer, |b| b.write_var_int(63)), [0xbf]);
        assert_eq!(streak(&mut buffer, |b| b.write_var_int(64)), [0x00, 0xc0]);
        assert_eq!(streak(&mut buffer, |b| b.write_var_int_parts(0, true)), [0xc0]);
    }

    #[test]
    fn test_lengths() {
        assert_eq!(var_uint_len(0), 1);
        assert_eq!(var_uint_len(127), 1);
        assert_eq!(var_uint_len(128), 2);
        assert_eq!(var_int_len(63), 1);
        assert_eq!(var_int_len(64), 2);
        assert_eq!(uint_len(0), 0);
        assert_eq!(uint_len(255), 1);
        assert_eq!(uint_len(256), 2);
        assert_eq!(uint_len(u64::MAX), 8);
    }

    #[test]
    fn test_write_spills_across_blocks() {
        let mut buffer = SegmentBuffer::with_block_size(16);
        let data: Vec<u8> = (0..40).collect();
        buffer.start_streak(Vec::new());
        buffer.write_bytes(&data);
        let list = buffer.wrapup().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(SegmentBuffer::total_len(&list), 40);
        assert_eq!(buffer.to_vec(&list), data);
    }

    #[test]
    fn test_interleaved_streaks_keep_their_bytes() {
        let mut buffer = SegmentBuffer::new();
        buffer.start_streak(Vec::new());
        buffer.write_utf8("body");
        let body = buffer.wrapup().unwrap();

        buffer.start_streak(Vec::new());
        buffer.write_u8(0x84);
        let mut spliced = buffer.wrapup().unwrap();
        spliced.extend(body);
        assert_eq!(buffer.to_vec(&spliced), b"\x84body");
    }

    #[test]
    fn test_wrapup_is_idempotent() {
        let mut buffer = SegmentBuffer::new();
        buffer.start_streak(Vec::new());
        buffer.write_u8(1);
        assert!(buffer.wrapup().is_some());
        assert!(buffer.wrapup().is_none());
        assert!(!buffer.in_streak());
    }

    #[test]
    fn test_reset_recycles_blocks() {
        let mut buffer = SegmentBuffer::with_block_size(16);
        for _ in 0..3 {
            buffer.start_streak(Vec::new());
            buffer.write_bytes(&[7u8; 64]);
            buffer.wrapup();
            buffer.reset();
        }
        assert_eq!(buffer.allocated_blocks(), 4);
    }

    #[test]
    fn test_write_to_sink() {
        let mut buffer = SegmentBuffer::with_block_size(16);
        buffer.start_streak(Vec::new());
        buffer.write_uint(0x0102_0304, 4);
        buffer.write_bytes(&[9u8; 20]);
        let list = buffer.wrapup().unwrap();
        let mut out = Vec::new();
        assert_eq!(buffer.write_to(&list, &mut out).unwrap(), 24);
        assert_eq!(&out[..4], &[1, 2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "without an active streak")]
    fn test_write_without_streak_panics() {
        let mut buffer = SegmentBuffer::new();
        buffer.write_u8(0);
    }
}
