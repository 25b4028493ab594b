//! Ion 1.0 binary codec.
//!
//! - [`RawBinaryWriter`] encodes values with symbol IDs, deferring container
//!   lengths until the container closes.
//! - [`BinaryWriter`] adds text symbols and local symbol table emission.
//! - [`BinaryReader`] is a cursor over a datagram that decodes scalars lazily.
//! - [`json`] converts between Ion and `serde_json::Value`.

mod catalog;
pub mod constants;
mod error;
mod import;
mod raw_writer;
mod reader;
mod symbols;
mod timestamp;
mod types;
mod variant;
mod writer;

pub mod json;

pub use catalog::Catalog;
pub use constants::{ION_BVM, MAX_ANNOTATIONS, SYSTEM_SYMBOLS};
pub use error::{IonError, IonResult};
pub use import::{Import, SharedSymbolTable};
pub use json::{decode_json_from_ion_bytes, encode_json_to_ion_bytes, reader_to_json, write_json};
pub use raw_writer::RawBinaryWriter;
pub use reader::{BinaryReader, ReaderState};
pub use symbols::SymbolTable;
pub use timestamp::{Timestamp, TimestampPrecision};
pub use types::{ContainerKind, IntegerSize, IonType, SymbolToken};
pub use variant::{Scalar, ScalarType, ValueVariant};
pub use writer::{BinaryWriter, WriterOptions};
