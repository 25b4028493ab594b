//! Decoded scalar storage for the reader's current value.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::timestamp::Timestamp;
use crate::types::IntegerSize;

/// One decoded scalar payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i32),
    Long(i64),
    BigInteger(BigInt),
    Double(f64),
    Decimal(BigDecimal),
    String(String),
    Timestamp(Timestamp),
}

impl Scalar {
    /// Stores an integer in the narrowest representation that holds it.
    pub fn integer(value: BigInt) -> Scalar {
        if let Ok(v) = i32::try_from(&value) {
            Scalar::Int(v)
        } else if let Ok(v) = i64::try_from(&value) {
            Scalar::Long(v)
        } else {
            Scalar::BigInteger(value)
        }
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Scalar::Bool(_) => ScalarType::Bool,
            Scalar::Int(_) => ScalarType::Int,
            Scalar::Long(_) => ScalarType::Long,
            Scalar::BigInteger(_) => ScalarType::BigInteger,
            Scalar::Double(_) => ScalarType::Double,
            Scalar::Decimal(_) => ScalarType::Decimal,
            Scalar::String(_) => ScalarType::String,
            Scalar::Timestamp(_) => ScalarType::Timestamp,
        }
    }
}

/// Which representation a [`ValueVariant`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Nothing,
    Bool,
    Int,
    Long,
    BigInteger,
    Double,
    Decimal,
    String,
    Timestamp,
}

/// Holds at most one scalar; the held variant is the authoritative type.
///
/// Integer widening (`Int` → `Long` → `BigInteger`) is computed on access, so
/// an integer decoded once never needs to be re-read from the stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueVariant {
    value: Option<Scalar>,
}

impl ValueVariant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, value: Scalar) {
        self.value = Some(value);
    }

    pub fn clear(&mut self) {
        self.value = None;
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    pub fn get(&self) -> Option<&Scalar> {
        self.value.as_ref()
    }

    pub fn authoritative_type(&self) -> ScalarType {
        self.value
            .as_ref()
            .map_or(ScalarType::Nothing, Scalar::scalar_type)
    }

    pub fn integer_size(&self) -> IntegerSize {
        match self.value {
            Some(Scalar::Int(_)) => IntegerSize::Int,
            Some(Scalar::Long(_)) => IntegerSize::Long,
            Some(Scalar::BigInteger(_)) => IntegerSize::BigInteger,
            _ => IntegerSize::Unknown,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            Some(Scalar::Bool(v)) => Some(v),
            _ => None,
        }
    }

    /// The integer as `i32`; `None` if it is not an integer or does not fit.
    pub fn as_i32(&self) -> Option<i32> {
        match &self.value {
            Some(Scalar::Int(v)) => Some(*v),
            Some(Scalar::Long(v)) => i32::try_from(*v).ok(),
            Some(Scalar::BigInteger(v)) => i32::try_from(v).ok(),
            _ => None,
        }
    }

    /// The integer as `i64`; `None` if it is not an integer or does not fit.
    pub fn as_i64(&self) -> Option<i64> {
        match &self.value {
            Some(Scalar::Int(v)) => Some(*v as i64),
            Some(Scalar::Long(v)) => Some(*v),
            Some(Scalar::BigInteger(v)) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_big_integer(&self) -> Option<BigInt> {
        match &self.value {
            Some(Scalar::Int(v)) => Some(BigInt::from(*v)),
            Some(Scalar::Long(v)) => Some(BigInt::from(*v)),
            Some(Scalar::BigInteger(v)) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            Some(Scalar::Double(v)) => Some(v),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<&BigDecimal> {
        match &self.value {
            Some(Scalar::Decimal(v)) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Some(Scalar::String(v)) => Some(v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&Timestamp> {
        match &self.value {
            Some(Scalar::Timestamp(v)) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_pick_narrowest_representation() {
        assert_eq!(Scalar::integer(BigInt::from(7)), Scalar::Int(7));
        assert_eq!(
            Scalar::integer(BigInt::from(i32::MAX as i64 + 1)),
            Scalar::Long(i32::MAX as i64 + 1)
        );
        assert_eq!(Scalar::integer(BigInt::from(i64::MIN)), Scalar::Long(i64::MIN));
        let big = BigInt::from(u64::MAX);
        assert_eq!(Scalar::integer(big.clone()), Scalar::BigInteger(big));
    }

    #[test]
    fn widening_is_computed_on_access() {
        let mut variant = ValueVariant::new();
        assert!(variant.is_empty());
        assert_eq!(variant.authoritative_type(), ScalarType::Nothing);

        variant.set(Scalar::Int(-5));
        assert_eq!(variant.authoritative_type(), ScalarType::Int);
        assert_eq!(variant.integer_size(), IntegerSize::Int);
        assert_eq!(variant.as_i64(), Some(-5));
        assert_eq!(variant.as_big_integer(), Some(BigInt::from(-5)));
        assert_eq!(variant.authoritative_type(), ScalarType::Int);
        assert_eq!(variant.as_f64(), None);
    }

    #[test]
    fn narrowing_fails_when_out_of_range() {
        let mut variant = ValueVariant::new();
        variant.set(Scalar::Long(1 << 40));
        assert_eq!(variant.as_i32(), None);
        assert_eq!(variant.as_i64(), Some(1 << 40));

        variant.clear();
        assert_eq!(variant.integer_size(), IntegerSize::Unknown);
    }
}
