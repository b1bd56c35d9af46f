//! Host-side field values.
//!
//! A [`Value`] is what crosses between host code and the accessor layer: one
//! variant per marshalable [`FieldKind`]. Declarers hand values in as field
//! defaults; accessors hand them back out of foreign memory.

use serde::{Deserialize, Serialize};
use strata_abi::FieldKind;

/// A single field's host-side value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Str(String),
    ArrayU32(Vec<u32>),
    ArrayF32(Vec<f32>),
}

impl Value {
    /// The exact kind of this variant.
    pub fn kind(&self) -> FieldKind {
        match self {
            Value::U8(_) => FieldKind::U8,
            Value::U16(_) => FieldKind::U16,
            Value::U32(_) => FieldKind::U32,
            Value::U64(_) => FieldKind::U64,
            Value::I8(_) => FieldKind::I8,
            Value::I16(_) => FieldKind::I16,
            Value::I32(_) => FieldKind::I32,
            Value::I64(_) => FieldKind::I64,
            Value::F32(_) => FieldKind::F32,
            Value::F64(_) => FieldKind::F64,
            Value::Bool(_) => FieldKind::Bool,
            Value::Str(_) => FieldKind::Str,
            Value::ArrayU32(_) => FieldKind::ArrayU32,
            Value::ArrayF32(_) => FieldKind::ArrayF32,
        }
    }

    /// The kind a declarer gets when they supply this value as a sample with
    /// no explicit kind: strings stay strings, booleans stay booleans, every
    /// numeric widens to `F64`. Arrays carry no inferrable encoding and must
    /// be declared explicitly.
    pub fn inferred_kind(&self) -> Option<FieldKind> {
        match self {
            Value::Str(_) => Some(FieldKind::Str),
            Value::Bool(_) => Some(FieldKind::Bool),
            Value::U8(_)
            | Value::U16(_)
            | Value::U32(_)
            | Value::U64(_)
            | Value::I8(_)
            | Value::I16(_)
            | Value::I32(_)
            | Value::I64(_)
            | Value::F32(_)
            | Value::F64(_) => Some(FieldKind::F64),
            Value::ArrayU32(_) | Value::ArrayF32(_) => None,
        }
    }

    /// The zero/empty value of a kind.
    pub fn zero_of(kind: FieldKind) -> Value {
        match kind {
            FieldKind::U8 => Value::U8(0),
            FieldKind::U16 => Value::U16(0),
            FieldKind::U32 => Value::U32(0),
            FieldKind::U64 => Value::U64(0),
            FieldKind::I8 => Value::I8(0),
            FieldKind::I16 => Value::I16(0),
            FieldKind::I32 => Value::I32(0),
            FieldKind::I64 => Value::I64(0),
            FieldKind::F32 => Value::F32(0.0),
            FieldKind::F64 => Value::F64(0.0),
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Str => Value::Str(String::new()),
            FieldKind::ArrayU32 => Value::ArrayU32(Vec::new()),
            FieldKind::ArrayF32 => Value::ArrayF32(Vec::new()),
        }
    }

    // -- numeric views ------------------------------------------------------

    /// Numeric value as `f64`, `None` for non-numeric variants.
    pub fn as_f64(&self) -> Option<f64> {
        Some(match *self {
            Value::U8(v) => v as f64,
            Value::U16(v) => v as f64,
            Value::U32(v) => v as f64,
            Value::U64(v) => v as f64,
            Value::I8(v) => v as f64,
            Value::I16(v) => v as f64,
            Value::I32(v) => v as f64,
            Value::I64(v) => v as f64,
            Value::F32(v) => v as f64,
            Value::F64(v) => v,
            _ => return None,
        })
    }

    /// Numeric value as `u64` (C-style cast), `None` for non-numeric variants.
    pub fn as_u64(&self) -> Option<u64> {
        Some(match *self {
            Value::U8(v) => v as u64,
            Value::U16(v) => v as u64,
            Value::U32(v) => v as u64,
            Value::U64(v) => v,
            Value::I8(v) => v as u64,
            Value::I16(v) => v as u64,
            Value::I32(v) => v as u64,
            Value::I64(v) => v as u64,
            Value::F32(v) => v as u64,
            Value::F64(v) => v as u64,
            _ => return None,
        })
    }

    /// Numeric value as `i64` (C-style cast), `None` for non-numeric variants.
    pub fn as_i64(&self) -> Option<i64> {
        Some(match *self {
            Value::U8(v) => v as i64,
            Value::U16(v) => v as i64,
            Value::U32(v) => v as i64,
            Value::U64(v) => v as i64,
            Value::I8(v) => v as i64,
            Value::I16(v) => v as i64,
            Value::I32(v) => v as i64,
            Value::I64(v) => v,
            Value::F32(v) => v as i64,
            Value::F64(v) => v as i64,
            _ => return None,
        })
    }

    // -- non-numeric views --------------------------------------------------

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array_u32(&self) -> Option<&[u32]> {
        match self {
            Value::ArrayU32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array_f32(&self) -> Option<&[f32]> {
        match self {
            Value::ArrayF32(v) => Some(v),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions -- let declarers write plain literals
// ---------------------------------------------------------------------------

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

value_from! {
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    bool => Bool,
    String => Str,
    Vec<u32> => ArrayU32,
    Vec<f32> => ArrayF32,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<&[u32]> for Value {
    fn from(v: &[u32]) -> Self {
        Value::ArrayU32(v.to_vec())
    }
}

impl From<&[f32]> for Value {
    fn from(v: &[f32]) -> Self {
        Value::ArrayF32(v.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_widens_numerics_to_f64() {
        assert_eq!(Value::from(1u8).inferred_kind(), Some(FieldKind::F64));
        assert_eq!(Value::from(1i64).inferred_kind(), Some(FieldKind::F64));
        assert_eq!(Value::from(1.5f32).inferred_kind(), Some(FieldKind::F64));
    }

    #[test]
    fn inference_keeps_strings_and_bools() {
        assert_eq!(Value::from("hi").inferred_kind(), Some(FieldKind::Str));
        assert_eq!(Value::from(true).inferred_kind(), Some(FieldKind::Bool));
    }

    #[test]
    fn arrays_have_no_inferred_kind() {
        assert_eq!(Value::from(vec![1u32]).inferred_kind(), None);
        assert_eq!(Value::from(vec![1.0f32]).inferred_kind(), None);
    }

    #[test]
    fn numeric_views_cast() {
        assert_eq!(Value::I32(-3).as_f64(), Some(-3.0));
        assert_eq!(Value::F64(7.9).as_u64(), Some(7));
        assert_eq!(Value::U64(u64::MAX).as_u64(), Some(u64::MAX));
        assert_eq!(Value::Str("x".into()).as_f64(), None);
    }

    #[test]
    fn zero_of_matches_kind() {
        for code in 0..=13u8 {
            let kind = FieldKind::from_code(code).expect("valid code");
            assert_eq!(Value::zero_of(kind).kind(), kind);
        }
    }

    #[test]
    fn serde_roundtrip() {
        let v = Value::ArrayF32(vec![1.0, 2.5]);
        let json = serde_json::to_string(&v).expect("serialize");
        let back: Value = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, v);
    }
}
