//! Byte-level buffers for the Ion binary codec.
//!
//! - [`SegmentBuffer`]: pooled, segmented write buffer used by the writer's
//!   container stack.
//! - [`Reader`]: bounds-checked cursor with Ion primitive decoders.

mod reader;
mod segment;

pub use reader::Reader;
pub use segment::{
    uint_len, var_int_len, var_uint_len, Segment, SegmentBuffer, SegmentList, DEFAULT_BLOCK_SIZE,
};

/// Error returned by bounds-checked reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("unexpected end of buffer")]
    EndOfBuffer,
    #[error("invalid UTF-8")]
    InvalidUtf8,
    #[error("integer does not fit in 64 bits")]
    Overflow,
}
