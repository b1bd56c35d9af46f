//! Field kinds and their packed-struct sizes.
//!
//! A [`FieldKind`] is both a host-side discriminant and a wire-level byte
//! code: registration hands the engine an ordered buffer of these codes, one
//! per declared field. Sizes define the packed layout -- offsets are the
//! running sum of the sizes of the preceding fields, with no padding.

use serde::{Deserialize, Serialize};

/// The marshalable kinds a component field can have.
///
/// Strings and the two fixed-element arrays occupy one 4-byte pointer-sized
/// slot in the packed struct; their payload lives in engine-owned buffers
/// reached through that slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FieldKind {
    U8 = 0,
    U16 = 1,
    U32 = 2,
    U64 = 3,
    I8 = 4,
    I16 = 5,
    I32 = 6,
    I64 = 7,
    F32 = 8,
    F64 = 9,
    Bool = 10,
    Str = 11,
    ArrayU32 = 12,
    ArrayF32 = 13,
}

impl FieldKind {
    /// The wire byte code sent to the engine at registration time.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a wire byte code. Unknown codes are `None`, never a panic.
    pub fn from_code(code: u8) -> Option<FieldKind> {
        Some(match code {
            0 => FieldKind::U8,
            1 => FieldKind::U16,
            2 => FieldKind::U32,
            3 => FieldKind::U64,
            4 => FieldKind::I8,
            5 => FieldKind::I16,
            6 => FieldKind::I32,
            7 => FieldKind::I64,
            8 => FieldKind::F32,
            9 => FieldKind::F64,
            10 => FieldKind::Bool,
            11 => FieldKind::Str,
            12 => FieldKind::ArrayU32,
            13 => FieldKind::ArrayF32,
            _ => return None,
        })
    }

    /// The field's size in the packed component struct, in bytes.
    pub fn size_bytes(self) -> u32 {
        match self {
            FieldKind::U8 | FieldKind::I8 | FieldKind::Bool => 1,
            FieldKind::U16 | FieldKind::I16 => 2,
            FieldKind::U32
            | FieldKind::I32
            | FieldKind::F32
            | FieldKind::Str
            | FieldKind::ArrayU32
            | FieldKind::ArrayF32 => 4,
            FieldKind::U64 | FieldKind::I64 | FieldKind::F64 => 8,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [FieldKind; 14] = [
        FieldKind::U8,
        FieldKind::U16,
        FieldKind::U32,
        FieldKind::U64,
        FieldKind::I8,
        FieldKind::I16,
        FieldKind::I32,
        FieldKind::I64,
        FieldKind::F32,
        FieldKind::F64,
        FieldKind::Bool,
        FieldKind::Str,
        FieldKind::ArrayU32,
        FieldKind::ArrayF32,
    ];

    #[test]
    fn code_roundtrip() {
        for kind in ALL {
            assert_eq!(FieldKind::from_code(kind.code()), Some(kind));
        }
    }

    #[test]
    fn unknown_code_is_none() {
        assert_eq!(FieldKind::from_code(14), None);
        assert_eq!(FieldKind::from_code(255), None);
    }

    #[test]
    fn pointer_slot_kinds_are_four_bytes() {
        assert_eq!(FieldKind::Str.size_bytes(), 4);
        assert_eq!(FieldKind::ArrayU32.size_bytes(), 4);
        assert_eq!(FieldKind::ArrayF32.size_bytes(), 4);
    }

    #[test]
    fn scalar_sizes() {
        assert_eq!(FieldKind::U8.size_bytes(), 1);
        assert_eq!(FieldKind::Bool.size_bytes(), 1);
        assert_eq!(FieldKind::U16.size_bytes(), 2);
        assert_eq!(FieldKind::F32.size_bytes(), 4);
        assert_eq!(FieldKind::U64.size_bytes(), 8);
        assert_eq!(FieldKind::F64.size_bytes(), 8);
    }
}
