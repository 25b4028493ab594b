//! Value types shared by the writer and the reader.

use std::fmt;

use crate::constants::{TypeOverlay, LN_IS_NULL};

/// Ion value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IonType {
    Null,
    Bool,
    Int,
    Float,
    Decimal,
    Timestamp,
    Symbol,
    String,
    Clob,
    Blob,
    List,
    Sexp,
    Struct,
}

impl IonType {
    /// Every value type, in type-code order.
    pub const ALL: [IonType; 13] = [
        IonType::Null,
        IonType::Bool,
        IonType::Int,
        IonType::Float,
        IonType::Decimal,
        IonType::Timestamp,
        IonType::Symbol,
        IonType::String,
        IonType::Clob,
        IonType::Blob,
        IonType::List,
        IonType::Sexp,
        IonType::Struct,
    ];

    pub fn is_container(self) -> bool {
        matches!(self, IonType::List | IonType::Sexp | IonType::Struct)
    }

    pub fn is_lob(self) -> bool {
        matches!(self, IonType::Clob | IonType::Blob)
    }

    /// Type code in the high nibble (positive int for [`IonType::Int`]).
    pub fn type_overlay(self) -> u8 {
        match self {
            IonType::Null => TypeOverlay::NULL,
            IonType::Bool => TypeOverlay::BOOL,
            IonType::Int => TypeOverlay::UINT,
            IonType::Float => TypeOverlay::FLOT,
            IonType::Decimal => TypeOverlay::DECI,
            IonType::Timestamp => TypeOverlay::TIME,
            IonType::Symbol => TypeOverlay::SYMB,
            IonType::String => TypeOverlay::STRI,
            IonType::Clob => TypeOverlay::CLOB,
            IonType::Blob => TypeOverlay::BINA,
            IonType::List => TypeOverlay::LIST,
            IonType::Sexp => TypeOverlay::SEXP,
            IonType::Struct => TypeOverlay::STRU,
        }
    }

    /// The single-byte typed null, e.g. `0x8f` for `null.string`.
    pub fn null_byte(self) -> u8 {
        self.type_overlay() | LN_IS_NULL
    }

    /// Maps a type code (high nibble) to a value type.
    ///
    /// Returns `None` for annotation wrappers (14) and the reserved code (15).
    pub fn from_type_code(code: u8) -> Option<IonType> {
        Some(match code {
            0x0 => IonType::Null,
            0x1 => IonType::Bool,
            0x2 | 0x3 => IonType::Int,
            0x4 => IonType::Float,
            0x5 => IonType::Decimal,
            0x6 => IonType::Timestamp,
            0x7 => IonType::Symbol,
            0x8 => IonType::String,
            0x9 => IonType::Clob,
            0xa => IonType::Blob,
            0xb => IonType::List,
            0xc => IonType::Sexp,
            0xd => IonType::Struct,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            IonType::Null => "null",
            IonType::Bool => "bool",
            IonType::Int => "int",
            IonType::Float => "float",
            IonType::Decimal => "decimal",
            IonType::Timestamp => "timestamp",
            IonType::Symbol => "symbol",
            IonType::String => "string",
            IonType::Clob => "clob",
            IonType::Blob => "blob",
            IonType::List => "list",
            IonType::Sexp => "sexp",
            IonType::Struct => "struct",
        }
    }
}

impl fmt::Display for IonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kinds of frames on the writer's container stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Datagram,
    List,
    Sexp,
    Struct,
    /// Synthetic wrapper around an annotated value.
    Annotation,
}

impl ContainerKind {
    /// Header type code, `None` for the datagram which has no header.
    pub fn type_overlay(self) -> Option<u8> {
        match self {
            ContainerKind::Datagram => None,
            ContainerKind::List => Some(TypeOverlay::LIST),
            ContainerKind::Sexp => Some(TypeOverlay::SEXP),
            ContainerKind::Struct => Some(TypeOverlay::STRU),
            ContainerKind::Annotation => Some(TypeOverlay::ANNO),
        }
    }

    /// Whether user code may close this frame with `step_out`.
    pub fn is_user_closable(self) -> bool {
        matches!(
            self,
            ContainerKind::List | ContainerKind::Sexp | ContainerKind::Struct
        )
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContainerKind::Datagram => "datagram",
            ContainerKind::List => "list",
            ContainerKind::Sexp => "sexp",
            ContainerKind::Struct => "struct",
            ContainerKind::Annotation => "annotation wrapper",
        })
    }
}

/// How many bits an integer needs, as reported by the reader.
///
/// Callers check this before choosing between `int_value`, `long_value` and
/// `big_integer_value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerSize {
    /// Not positioned on a non-null integer.
    Unknown,
    /// Fits in `i32`.
    Int,
    /// Fits in `i64`.
    Long,
    /// Needs arbitrary precision.
    BigInteger,
}

/// Interned text paired with its symbol ID.
///
/// Either side may be absent: text is `None` for symbols whose ID has no
/// known text, and the ID is `None` for text not yet interned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolToken {
    pub text: Option<String>,
    pub sid: Option<u32>,
}

impl SymbolToken {
    pub fn new(text: Option<String>, sid: Option<u32>) -> Self {
        Self { text, sid }
    }

    /// A token carrying only text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            sid: None,
        }
    }

    /// A token carrying only a symbol ID.
    pub fn sid(sid: u32) -> Self {
        Self {
            text: None,
            sid: Some(sid),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.text.as_deref()
    }
}
