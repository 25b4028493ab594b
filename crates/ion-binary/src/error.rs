use ion_buffers::BufferError;
use thiserror::Error;

use crate::types::{ContainerKind, IonType};

/// Errors raised by the Ion binary writer and reader.
#[derive(Debug, Error)]
pub enum IonError {
    // Structural violations.
    #[error("a field name must be set before writing a value inside a struct")]
    MissingFieldName,
    #[error("field names can only be set inside a struct")]
    FieldNameOutsideStruct,
    #[error("cannot step out with a pending field name")]
    PendingFieldName,
    #[error("cannot step out with pending annotations")]
    PendingAnnotations,
    #[error("cannot step out of {0}")]
    CannotStepOut(ContainerKind),
    #[error("a value cannot carry more than {0} annotations")]
    TooManyAnnotations(usize),
    #[error("cannot flush with {0} open container(s)")]
    UnclosedContainers(usize),
    #[error("invalid Ion binary version marker")]
    InvalidVersionMarker,
    #[error("invalid type descriptor 0x{0:02x}")]
    InvalidTypeDescriptor(u8),
    #[error("declared length does not match content at offset {offset}")]
    LengthMismatch { offset: usize },
    #[error("reader is not positioned on a value")]
    NotOnValue,
    #[error("cannot step out at the top level")]
    StepOutAtTopLevel,

    #[error("cannot step into a value of type {0}")]
    NotAContainer(IonType),

    // Type mismatches.
    #[error("expected {expected}, found {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: IonType,
    },
    #[error("value is null")]
    NullValue,
    #[error("value does not fit in the requested numeric type")]
    NumericOverflow,

    // Malformed scalars.
    #[error("negative zero integer is illegal")]
    NegativeZeroInt,
    #[error("invalid bool representation: {0}")]
    InvalidBool(u8),
    #[error("unsupported float length: {0}")]
    InvalidFloatLength(usize),
    #[error("invalid timestamp")]
    InvalidTimestamp,
    #[error("invalid local symbol table: {0}")]
    InvalidSymbolTable(String),
    #[error("symbol token has neither text nor a symbol ID")]
    InvalidSymbolToken,

    // Misuse.
    #[error("writer is unusable after an earlier failure; reset it first")]
    Poisoned,

    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IonError {
    /// Structural violations leave a writer unusable until it is reset.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            IonError::NotAContainer(_)
                | IonError::MissingFieldName
                | IonError::FieldNameOutsideStruct
                | IonError::PendingFieldName
                | IonError::PendingAnnotations
                | IonError::CannotStepOut(_)
                | IonError::TooManyAnnotations(_)
                | IonError::UnclosedContainers(_)
                | IonError::InvalidVersionMarker
                | IonError::InvalidTypeDescriptor(_)
                | IonError::LengthMismatch { .. }
                | IonError::NotOnValue
                | IonError::StepOutAtTopLevel
        )
    }
}

pub type IonResult<T> = Result<T, IonError>;
