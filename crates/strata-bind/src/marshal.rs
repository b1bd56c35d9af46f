//! The field codec: typed reads and writes through the foreign boundary.
//!
//! Every bound accessor funnels through [`read_field`]/[`write_field`],
//! dispatching on the field's [`FieldKind`] to the matching engine
//! primitive. String and array writes allocate transient foreign buffers;
//! [`ScopedBuffer`] makes their release unconditional -- the guard drops
//! (and releases) when the triggering call returns, whether or not the
//! payload was handed to a write primitive (write primitives copy, so the
//! release is always safe).
//!
//! # Defensive decode policy
//!
//! Array fields are count-prefixed: the first 32-bit slot of the payload
//! buffer is an unsigned element count, for both array kinds. A null payload
//! handle (slot never written) or a count above the configured bound decodes
//! as a zero-length array, never as garbage.

use strata_abi::{BufferHandle, EngineAbi, FieldKind, InstanceHandle};

use crate::layout::FieldDescriptor;
use crate::value::Value;

// ---------------------------------------------------------------------------
// ScopedBuffer -- unconditional release of transient foreign allocations
// ---------------------------------------------------------------------------

/// A caller-owned foreign buffer released on drop.
pub(crate) struct ScopedBuffer<'e> {
    engine: &'e dyn EngineAbi,
    handle: BufferHandle,
}

impl<'e> ScopedBuffer<'e> {
    /// Allocate a zero-filled foreign buffer of `size_bytes`.
    pub(crate) fn alloc(engine: &'e dyn EngineAbi, size_bytes: u32) -> Self {
        Self {
            engine,
            handle: engine.alloc_buffer(size_bytes),
        }
    }

    /// Allocate a foreign NUL-terminated UTF-8 buffer holding `s`.
    pub(crate) fn utf8(engine: &'e dyn EngineAbi, s: &str) -> Self {
        Self {
            engine,
            handle: engine.alloc_utf8(s),
        }
    }

    pub(crate) fn handle(&self) -> BufferHandle {
        self.handle
    }
}

impl Drop for ScopedBuffer<'_> {
    fn drop(&mut self) {
        self.engine.release_buffer(self.handle);
    }
}

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

/// Represent `value` as `kind`, or `None` if the value has no sensible
/// representation there. Numerics cast freely among each other (the host
/// side of this boundary historically treats every number as a double);
/// strings, bools, and arrays only match their own kind.
pub(crate) fn coerce(value: &Value, kind: FieldKind) -> Option<Value> {
    Some(match kind {
        FieldKind::U8 => Value::U8(value.as_u64()? as u8),
        FieldKind::U16 => Value::U16(value.as_u64()? as u16),
        FieldKind::U32 => Value::U32(value.as_u64()? as u32),
        FieldKind::U64 => Value::U64(value.as_u64()?),
        FieldKind::I8 => Value::I8(value.as_i64()? as i8),
        FieldKind::I16 => Value::I16(value.as_i64()? as i16),
        FieldKind::I32 => Value::I32(value.as_i64()? as i32),
        FieldKind::I64 => Value::I64(value.as_i64()?),
        FieldKind::F32 => Value::F32(value.as_f64()? as f32),
        FieldKind::F64 => Value::F64(value.as_f64()?),
        FieldKind::Bool => Value::Bool(value.as_bool()?),
        FieldKind::Str => Value::Str(value.as_str()?.to_owned()),
        FieldKind::ArrayU32 => Value::ArrayU32(value.as_array_u32()?.to_vec()),
        FieldKind::ArrayF32 => Value::ArrayF32(value.as_array_f32()?.to_vec()),
    })
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Read one field out of bound foreign memory.
pub(crate) fn read_field(
    engine: &dyn EngineAbi,
    handle: InstanceHandle,
    fd: &FieldDescriptor,
    max_array_len: u32,
) -> Value {
    match fd.kind {
        FieldKind::U8 => Value::U8(engine.get_field_u8(handle, fd.offset)),
        FieldKind::U16 => Value::U16(engine.get_field_u16(handle, fd.offset)),
        FieldKind::U32 => Value::U32(engine.get_field_u32(handle, fd.offset)),
        FieldKind::U64 => Value::U64(engine.get_field_u64(handle, fd.offset)),
        FieldKind::I8 => Value::I8(engine.get_field_i8(handle, fd.offset)),
        FieldKind::I16 => Value::I16(engine.get_field_i16(handle, fd.offset)),
        FieldKind::I32 => Value::I32(engine.get_field_i32(handle, fd.offset)),
        FieldKind::I64 => Value::I64(engine.get_field_i64(handle, fd.offset)),
        FieldKind::F32 => Value::F32(engine.get_field_f32(handle, fd.offset)),
        FieldKind::F64 => Value::F64(engine.get_field_f64(handle, fd.offset)),
        FieldKind::Bool => Value::Bool(engine.get_field_u8(handle, fd.offset) != 0),
        FieldKind::Str => {
            let payload = engine.get_field_str(handle, fd.offset);
            if payload.is_null() {
                Value::Str(String::new())
            } else {
                Value::Str(engine.decode_utf8(payload))
            }
        }
        FieldKind::ArrayU32 => {
            let payload = engine.get_field_array_u32(handle, fd.offset);
            Value::ArrayU32(
                array_count(engine, payload, fd, max_array_len)
                    .map(|count| {
                        (0..count).map(|i| engine.read_u32(payload, i + 1)).collect()
                    })
                    .unwrap_or_default(),
            )
        }
        FieldKind::ArrayF32 => {
            let payload = engine.get_field_array_f32(handle, fd.offset);
            Value::ArrayF32(
                array_count(engine, payload, fd, max_array_len)
                    .map(|count| {
                        (0..count).map(|i| engine.read_f32(payload, i + 1)).collect()
                    })
                    .unwrap_or_default(),
            )
        }
    }
}

/// Decode an array payload's count slot. `None` means "treat as empty":
/// a null payload handle, or a count beyond the configured bound (an
/// uninitialized or garbage slot).
fn array_count(
    engine: &dyn EngineAbi,
    payload: BufferHandle,
    fd: &FieldDescriptor,
    max_array_len: u32,
) -> Option<u32> {
    if payload.is_null() {
        return None;
    }
    let count = engine.read_u32(payload, 0);
    if count > max_array_len {
        tracing::warn!(
            field = %fd.name,
            count,
            max_array_len,
            "array count out of range; decoding as empty"
        );
        return None;
    }
    Some(count)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Write one field into bound foreign memory.
///
/// `value` must already be coerced to `fd.kind` (the accessor layer does
/// this); a mismatched pairing is skipped with a warning rather than
/// corrupting the slot.
pub(crate) fn write_field(
    engine: &dyn EngineAbi,
    handle: InstanceHandle,
    fd: &FieldDescriptor,
    value: &Value,
) {
    match (fd.kind, value) {
        (FieldKind::U8, Value::U8(v)) => engine.set_field_u8(handle, fd.offset, *v),
        (FieldKind::U16, Value::U16(v)) => engine.set_field_u16(handle, fd.offset, *v),
        (FieldKind::U32, Value::U32(v)) => engine.set_field_u32(handle, fd.offset, *v),
        (FieldKind::U64, Value::U64(v)) => engine.set_field_u64(handle, fd.offset, *v),
        (FieldKind::I8, Value::I8(v)) => engine.set_field_i8(handle, fd.offset, *v),
        (FieldKind::I16, Value::I16(v)) => engine.set_field_i16(handle, fd.offset, *v),
        (FieldKind::I32, Value::I32(v)) => engine.set_field_i32(handle, fd.offset, *v),
        (FieldKind::I64, Value::I64(v)) => engine.set_field_i64(handle, fd.offset, *v),
        (FieldKind::F32, Value::F32(v)) => engine.set_field_f32(handle, fd.offset, *v),
        (FieldKind::F64, Value::F64(v)) => engine.set_field_f64(handle, fd.offset, *v),
        (FieldKind::Bool, Value::Bool(v)) => engine.set_field_u8(handle, fd.offset, *v as u8),
        (FieldKind::Str, Value::Str(s)) => {
            let payload = ScopedBuffer::utf8(engine, s);
            engine.set_field_str(handle, fd.offset, payload.handle());
            // payload drops here -- the engine copied it.
        }
        (FieldKind::ArrayU32, Value::ArrayU32(items)) => {
            if let Some(payload) = count_prefixed(engine, fd, items.len()) {
                for (i, item) in items.iter().enumerate() {
                    engine.write_u32(payload.handle(), i as u32 + 1, *item);
                }
                engine.set_field_array_u32(handle, fd.offset, payload.handle());
            }
        }
        (FieldKind::ArrayF32, Value::ArrayF32(items)) => {
            if let Some(payload) = count_prefixed(engine, fd, items.len()) {
                for (i, item) in items.iter().enumerate() {
                    engine.write_f32(payload.handle(), i as u32 + 1, *item);
                }
                engine.set_field_array_f32(handle, fd.offset, payload.handle());
            }
        }
        _ => {
            tracing::warn!(
                field = %fd.name,
                kind = ?fd.kind,
                value_kind = ?value.kind(),
                "mismatched value for field kind; write skipped"
            );
        }
    }
}

/// Allocate a transient `len + 1`-slot payload buffer with the count in
/// slot 0. `None` (write skipped) if the length does not fit the count slot.
fn count_prefixed<'e>(
    engine: &'e dyn EngineAbi,
    fd: &FieldDescriptor,
    len: usize,
) -> Option<ScopedBuffer<'e>> {
    let bytes = u32::try_from(len)
        .ok()
        .and_then(|count| count.checked_add(1))
        .and_then(|slots| slots.checked_mul(4));
    let Some(bytes) = bytes else {
        tracing::warn!(field = %fd.name, len, "array too long for count slot; write skipped");
        return None;
    };
    let payload = ScopedBuffer::alloc(engine, bytes);
    engine.write_u32(payload.handle(), 0, len as u32);
    Some(payload)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
