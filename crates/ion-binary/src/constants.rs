//! Ion 1.0 binary constants.

/// Ion Binary Version Marker for Ion 1.0.
pub const ION_BVM: [u8; 4] = [0xe0, 0x01, 0x00, 0xea];

/// Type codes (high nibble of a type descriptor).
pub struct Type;

impl Type {
    pub const NULL: u8 = 0x0;
    pub const BOOL: u8 = 0x1;
    pub const UINT: u8 = 0x2;
    pub const NINT: u8 = 0x3;
    pub const FLOT: u8 = 0x4;
    pub const DECI: u8 = 0x5;
    pub const TIME: u8 = 0x6;
    pub const SYMB: u8 = 0x7;
    pub const STRI: u8 = 0x8;
    pub const CLOB: u8 = 0x9;
    pub const BINA: u8 = 0xa;
    pub const LIST: u8 = 0xb;
    pub const SEXP: u8 = 0xc;
    pub const STRU: u8 = 0xd;
    pub const ANNO: u8 = 0xe;
}

/// Type codes pre-shifted into the high nibble.
pub struct TypeOverlay;

impl TypeOverlay {
    pub const NULL: u8 = 0x00;
    pub const BOOL: u8 = 0x10;
    pub const UINT: u8 = 0x20;
    pub const NINT: u8 = 0x30;
    pub const FLOT: u8 = 0x40;
    pub const DECI: u8 = 0x50;
    pub const TIME: u8 = 0x60;
    pub const SYMB: u8 = 0x70;
    pub const STRI: u8 = 0x80;
    pub const CLOB: u8 = 0x90;
    pub const BINA: u8 = 0xa0;
    pub const LIST: u8 = 0xb0;
    pub const SEXP: u8 = 0xc0;
    pub const STRU: u8 = 0xd0;
    pub const ANNO: u8 = 0xe0;
}

/// Low nibble: the length follows as a VarUInt.
pub const LN_IS_VAR_LEN: u8 = 0x0e;
/// Low nibble: typed null.
pub const LN_IS_NULL: u8 = 0x0f;
/// Largest length that fits in the low nibble.
pub const MAX_SHORT_LENGTH: usize = 0x0d;

pub const NULL_NULL: u8 = 0x0f;
pub const BOOL_FALSE: u8 = 0x10;
pub const BOOL_TRUE: u8 = 0x11;
pub const INT_ZERO: u8 = 0x20;
pub const FLOAT_ZERO: u8 = 0x40;

/// Most annotations a single value may carry.
pub const MAX_ANNOTATIONS: usize = 100;

/// Ion 1.0 system symbols; slot 0 is reserved (SID 0 has no text).
pub const SYSTEM_SYMBOLS: [&str; 10] = [
    "",
    "$ion",
    "$ion_1_0",
    "$ion_symbol_table",
    "name",
    "version",
    "imports",
    "symbols",
    "max_id",
    "$ion_shared_symbol_table",
];

pub const SID_ION: u32 = 1;
pub const SID_ION_1_0: u32 = 2;
pub const SID_ION_SYMBOL_TABLE: u32 = 3;
pub const SID_NAME: u32 = 4;
pub const SID_VERSION: u32 = 5;
pub const SID_IMPORTS: u32 = 6;
pub const SID_SYMBOLS: u32 = 7;
pub const SID_MAX_ID: u32 = 8;
pub const SID_ION_SHARED_SYMBOL_TABLE: u32 = 9;
