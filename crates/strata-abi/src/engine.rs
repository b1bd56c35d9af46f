//! The [`EngineAbi`] trait -- one method per foreign engine call.
//!
//! Every operation is a direct synchronous call with no suspension point.
//! The binding is single-threaded; implementations take `&self` and may use
//! interior mutability (an FFI-backed implementation forwards into foreign
//! memory it does not own anyway).
//!
//! # Ownership across the boundary
//!
//! - Buffers from [`alloc_buffer`]/[`alloc_utf8`] are **caller-owned**: the
//!   caller must release them with [`release_buffer`] once the call they
//!   were allocated for has returned. Write primitives copy their payload,
//!   so releasing the input buffer afterwards is always safe.
//! - Buffers returned by reads ([`get_field_str`], the array getters,
//!   [`row_pointers`], [`child_ids`]) are **engine-owned borrows** and must
//!   not be released. They are only valid until the next call that can
//!   recycle engine storage (typically the next cursor advance).
//!
//! [`alloc_buffer`]: EngineAbi::alloc_buffer
//! [`alloc_utf8`]: EngineAbi::alloc_utf8
//! [`release_buffer`]: EngineAbi::release_buffer
//! [`get_field_str`]: EngineAbi::get_field_str
//! [`row_pointers`]: EngineAbi::row_pointers
//! [`child_ids`]: EngineAbi::child_ids

use crate::handle::{
    BufferHandle, CursorHandle, EntityId, InstanceHandle, QueryId, TagId, TypeId,
};

/// The foreign ECS engine's call surface.
///
/// Mirrors the engine's exported operations one-to-one. Anything the binding
/// layer does -- layout compilation, accessor dispatch, query decoding -- is
/// built strictly on top of these calls.
pub trait EngineAbi {
    // -- type creation ------------------------------------------------------

    /// Create a component type from a name buffer, a buffer of `field_count`
    /// field-name buffer handles (one `u32` handle per element), and a buffer
    /// of `field_count` field-kind byte codes.
    ///
    /// All three buffers are consumed synchronously; the caller releases them
    /// after this returns.
    fn create_component_type(
        &self,
        name: BufferHandle,
        field_names: BufferHandle,
        field_count: u32,
        field_kinds: BufferHandle,
        kind_count: u32,
    ) -> TypeId;

    /// Create a tag (a component type with no data) from a name buffer.
    fn create_tag(&self, name: BufferHandle) -> TagId;

    // -- entity operations --------------------------------------------------

    /// Create an entity with the given name buffer.
    fn create_entity(&self, name: BufferHandle) -> EntityId;

    /// Attach a component type to an entity, returning the handle to the
    /// entity's per-instance component memory. Attaching an already-present
    /// type returns the existing instance.
    fn add_component(&self, entity: EntityId, ty: TypeId) -> InstanceHandle;

    /// Attach a tag to an entity.
    fn add_tag(&self, entity: EntityId, tag: TagId);

    /// Fetch the handle to an entity's component memory, or
    /// [`InstanceHandle::NULL`] if the entity does not carry the type.
    fn get_component(&self, entity: EntityId, ty: TypeId) -> InstanceHandle;

    /// Link `child` under `parent` in the engine's hierarchy.
    fn set_parent(&self, child: EntityId, parent: EntityId);

    /// Start a cursor over `parent`'s direct children.
    fn iterate_children(&self, parent: EntityId) -> CursorHandle;

    /// Engine-owned buffer of `row_count(cursor)` packed `u64` child ids for
    /// the cursor's current group.
    fn child_ids(&self, cursor: CursorHandle) -> BufferHandle;

    // -- query operations ---------------------------------------------------

    /// Create a query matching entities that carry every type in `terms`.
    fn create_query(&self, terms: &[TypeId]) -> QueryId;

    /// Start (or restart) iteration over a query's matched row groups.
    fn start_iterator(&self, query: QueryId) -> CursorHandle;

    /// Advance a cursor to its next group. Returns `false` on exhaustion.
    fn advance(&self, cursor: CursorHandle) -> bool;

    /// Number of rows in the cursor's current group.
    fn row_count(&self, cursor: CursorHandle) -> u32;

    /// Engine-owned buffer of per-row instance pointers for one query term
    /// in the cursor's current group.
    fn row_pointers(&self, cursor: CursorHandle, term_index: u32) -> BufferHandle;

    /// Resolve one row's instance handle out of a [`row_pointers`] buffer.
    ///
    /// [`row_pointers`]: EngineAbi::row_pointers
    fn row_pointer(
        &self,
        pointers: BufferHandle,
        row: u32,
        count: u32,
        ty: TypeId,
    ) -> InstanceHandle;

    // -- scalar field access ------------------------------------------------
    //
    // One get/set pair per scalar kind, addressed by (instance, byte offset).
    // Bool marshals through the u8 pair as 0/1.

    fn get_field_u8(&self, handle: InstanceHandle, offset: u32) -> u8;
    fn set_field_u8(&self, handle: InstanceHandle, offset: u32, value: u8);
    fn get_field_u16(&self, handle: InstanceHandle, offset: u32) -> u16;
    fn set_field_u16(&self, handle: InstanceHandle, offset: u32, value: u16);
    fn get_field_u32(&self, handle: InstanceHandle, offset: u32) -> u32;
    fn set_field_u32(&self, handle: InstanceHandle, offset: u32, value: u32);
    fn get_field_u64(&self, handle: InstanceHandle, offset: u32) -> u64;
    fn set_field_u64(&self, handle: InstanceHandle, offset: u32, value: u64);
    fn get_field_i8(&self, handle: InstanceHandle, offset: u32) -> i8;
    fn set_field_i8(&self, handle: InstanceHandle, offset: u32, value: i8);
    fn get_field_i16(&self, handle: InstanceHandle, offset: u32) -> i16;
    fn set_field_i16(&self, handle: InstanceHandle, offset: u32, value: i16);
    fn get_field_i32(&self, handle: InstanceHandle, offset: u32) -> i32;
    fn set_field_i32(&self, handle: InstanceHandle, offset: u32, value: i32);
    fn get_field_i64(&self, handle: InstanceHandle, offset: u32) -> i64;
    fn set_field_i64(&self, handle: InstanceHandle, offset: u32, value: i64);
    fn get_field_f32(&self, handle: InstanceHandle, offset: u32) -> f32;
    fn set_field_f32(&self, handle: InstanceHandle, offset: u32, value: f32);
    fn get_field_f64(&self, handle: InstanceHandle, offset: u32) -> f64;
    fn set_field_f64(&self, handle: InstanceHandle, offset: u32, value: f64);

    // -- string and array field access --------------------------------------

    /// Read a string field's payload handle. Null if the slot was never
    /// written.
    fn get_field_str(&self, handle: InstanceHandle, offset: u32) -> BufferHandle;

    /// Write a string field from a caller-owned UTF-8 buffer. The engine
    /// copies the payload; the caller still owns (and releases) `value`.
    fn set_field_str(&self, handle: InstanceHandle, offset: u32, value: BufferHandle);

    /// Read a `u32`-array field's payload handle (count in the first 32-bit
    /// slot, elements after it). Null if the slot was never written.
    fn get_field_array_u32(&self, handle: InstanceHandle, offset: u32) -> BufferHandle;

    /// Write a `u32`-array field from a caller-owned count-prefixed buffer.
    /// The engine copies; the caller still owns (and releases) `value`.
    fn set_field_array_u32(&self, handle: InstanceHandle, offset: u32, value: BufferHandle);

    /// Read an `f32`-array field's payload handle. Count layout matches the
    /// `u32` variant: an unsigned count in the first 32-bit slot.
    fn get_field_array_f32(&self, handle: InstanceHandle, offset: u32) -> BufferHandle;

    /// Write an `f32`-array field from a caller-owned count-prefixed buffer.
    fn set_field_array_f32(&self, handle: InstanceHandle, offset: u32, value: BufferHandle);

    // -- buffer lifecycle ---------------------------------------------------

    /// Allocate a zero-filled foreign buffer. Caller-owned.
    fn alloc_buffer(&self, size_bytes: u32) -> BufferHandle;

    /// Release a caller-owned buffer.
    fn release_buffer(&self, buffer: BufferHandle);

    /// Allocate a foreign buffer holding `s` as NUL-terminated UTF-8.
    /// Caller-owned.
    fn alloc_utf8(&self, s: &str) -> BufferHandle;

    /// Decode a NUL-terminated UTF-8 buffer into a host string.
    fn decode_utf8(&self, buffer: BufferHandle) -> String;

    // -- buffer element access ----------------------------------------------
    //
    // Indexed element reads/writes used to fill registration buffers and to
    // decode count-prefixed array payloads and id buffers. Indices are in
    // elements of the accessed width, not bytes.

    fn read_u8(&self, buffer: BufferHandle, index: u32) -> u8;
    fn write_u8(&self, buffer: BufferHandle, index: u32, value: u8);
    fn read_u32(&self, buffer: BufferHandle, index: u32) -> u32;
    fn write_u32(&self, buffer: BufferHandle, index: u32, value: u32);
    fn read_f32(&self, buffer: BufferHandle, index: u32) -> f32;
    fn write_f32(&self, buffer: BufferHandle, index: u32, value: f32);
    fn read_u64(&self, buffer: BufferHandle, index: u32) -> u64;
}

// ---------------------------------------------------------------------------
// Shared-handle delegation
// ---------------------------------------------------------------------------

// The binding is single-threaded, so callers often want to keep their own
// handle to the engine (e.g. for test inspection) while also handing one to
// the world. `Rc<E>` delegates every call to the shared engine.
impl<E: EngineAbi + ?Sized> EngineAbi for std::rc::Rc<E> {
    fn create_component_type(
        &self,
        name: BufferHandle,
        field_names: BufferHandle,
        field_count: u32,
        field_kinds: BufferHandle,
        kind_count: u32,
    ) -> TypeId {
        (**self).create_component_type(name, field_names, field_count, field_kinds, kind_count)
    }

    fn create_tag(&self, name: BufferHandle) -> TagId {
        (**self).create_tag(name)
    }

    fn create_entity(&self, name: BufferHandle) -> EntityId {
        (**self).create_entity(name)
    }

    fn add_component(&self, entity: EntityId, ty: TypeId) -> InstanceHandle {
        (**self).add_component(entity, ty)
    }

    fn add_tag(&self, entity: EntityId, tag: TagId) {
        (**self).add_tag(entity, tag)
    }

    fn get_component(&self, entity: EntityId, ty: TypeId) -> InstanceHandle {
        (**self).get_component(entity, ty)
    }

    fn set_parent(&self, child: EntityId, parent: EntityId) {
        (**self).set_parent(child, parent)
    }

    fn iterate_children(&self, parent: EntityId) -> CursorHandle {
        (**self).iterate_children(parent)
    }

    fn child_ids(&self, cursor: CursorHandle) -> BufferHandle {
        (**self).child_ids(cursor)
    }

    fn create_query(&self, terms: &[TypeId]) -> QueryId {
        (**self).create_query(terms)
    }

    fn start_iterator(&self, query: QueryId) -> CursorHandle {
        (**self).start_iterator(query)
    }

    fn advance(&self, cursor: CursorHandle) -> bool {
        (**self).advance(cursor)
    }

    fn row_count(&self, cursor: CursorHandle) -> u32 {
        (**self).row_count(cursor)
    }

    fn row_pointers(&self, cursor: CursorHandle, term_index: u32) -> BufferHandle {
        (**self).row_pointers(cursor, term_index)
    }

    fn row_pointer(
        &self,
        pointers: BufferHandle,
        row: u32,
        count: u32,
        ty: TypeId,
    ) -> InstanceHandle {
        (**self).row_pointer(pointers, row, count, ty)
    }

    fn get_field_u8(&self, handle: InstanceHandle, offset: u32) -> u8 {
        (**self).get_field_u8(handle, offset)
    }

    fn set_field_u8(&self, handle: InstanceHandle, offset: u32, value: u8) {
        (**self).set_field_u8(handle, offset, value)
    }

    fn get_field_u16(&self, handle: InstanceHandle, offset: u32) -> u16 {
        (**self).get_field_u16(handle, offset)
    }

    fn set_field_u16(&self, handle: InstanceHandle, offset: u32, value: u16) {
        (**self).set_field_u16(handle, offset, value)
    }

    fn get_field_u32(&self, handle: InstanceHandle, offset: u32) -> u32 {
        (**self).get_field_u32(handle, offset)
    }

    fn set_field_u32(&self, handle: InstanceHandle, offset: u32, value: u32) {
        (**self).set_field_u32(handle, offset, value)
    }

    fn get_field_u64(&self, handle: InstanceHandle, offset: u32) -> u64 {
        (**self).get_field_u64(handle, offset)
    }

    fn set_field_u64(&self, handle: InstanceHandle, offset: u32, value: u64) {
        (**self).set_field_u64(handle, offset, value)
    }

    fn get_field_i8(&self, handle: InstanceHandle, offset: u32) -> i8 {
        (**self).get_field_i8(handle, offset)
    }

    fn set_field_i8(&self, handle: InstanceHandle, offset: u32, value: i8) {
        (**self).set_field_i8(handle, offset, value)
    }

    fn get_field_i16(&self, handle: InstanceHandle, offset: u32) -> i16 {
        (**self).get_field_i16(handle, offset)
    }

    fn set_field_i16(&self, handle: InstanceHandle, offset: u32, value: i16) {
        (**self).set_field_i16(handle, offset, value)
    }

    fn get_field_i32(&self, handle: InstanceHandle, offset: u32) -> i32 {
        (**self).get_field_i32(handle, offset)
    }

    fn set_field_i32(&self, handle: InstanceHandle, offset: u32, value: i32) {
        (**self).set_field_i32(handle, offset, value)
    }

    fn get_field_i64(&self, handle: InstanceHandle, offset: u32) -> i64 {
        (**self).get_field_i64(handle, offset)
    }

    fn set_field_i64(&self, handle: InstanceHandle, offset: u32, value: i64) {
        (**self).set_field_i64(handle, offset, value)
    }

    fn get_field_f32(&self, handle: InstanceHandle, offset: u32) -> f32 {
        (**self).get_field_f32(handle, offset)
    }

    fn set_field_f32(&self, handle: InstanceHandle, offset: u32, value: f32) {
        (**self).set_field_f32(handle, offset, value)
    }

    fn get_field_f64(&self, handle: InstanceHandle, offset: u32) -> f64 {
        (**self).get_field_f64(handle, offset)
    }

    fn set_field_f64(&self, handle: InstanceHandle, offset: u32, value: f64) {
        (**self).set_field_f64(handle, offset, value)
    }

    fn get_field_str(&self, handle: InstanceHandle, offset: u32) -> BufferHandle {
        (**self).get_field_str(handle, offset)
    }

    fn set_field_str(&self, handle: InstanceHandle, offset: u32, value: BufferHandle) {
        (**self).set_field_str(handle, offset, value)
    }

    fn get_field_array_u32(&self, handle: InstanceHandle, offset: u32) -> BufferHandle {
        (**self).get_field_array_u32(handle, offset)
    }

    fn set_field_array_u32(&self, handle: InstanceHandle, offset: u32, value: BufferHandle) {
        (**self).set_field_array_u32(handle, offset, value)
    }

    fn get_field_array_f32(&self, handle: InstanceHandle, offset: u32) -> BufferHandle {
        (**self).get_field_array_f32(handle, offset)
    }

    fn set_field_array_f32(&self, handle: InstanceHandle, offset: u32, value: BufferHandle) {
        (**self).set_field_array_f32(handle, offset, value)
    }

    fn alloc_buffer(&self, size_bytes: u32) -> BufferHandle {
        (**self).alloc_buffer(size_bytes)
    }

    fn release_buffer(&self, buffer: BufferHandle) {
        (**self).release_buffer(buffer)
    }

    fn alloc_utf8(&self, s: &str) -> BufferHandle {
        (**self).alloc_utf8(s)
    }

    fn decode_utf8(&self, buffer: BufferHandle) -> String {
        (**self).decode_utf8(buffer)
    }

    fn read_u8(&self, buffer: BufferHandle, index: u32) -> u8 {
        (**self).read_u8(buffer, index)
    }

    fn write_u8(&self, buffer: BufferHandle, index: u32, value: u8) {
        (**self).write_u8(buffer, index, value)
    }

    fn read_u32(&self, buffer: BufferHandle, index: u32) -> u32 {
        (**self).read_u32(buffer, index)
    }

    fn write_u32(&self, buffer: BufferHandle, index: u32, value: u32) {
        (**self).write_u32(buffer, index, value)
    }

    fn read_f32(&self, buffer: BufferHandle, index: u32) -> f32 {
        (**self).read_f32(buffer, index)
    }

    fn write_f32(&self, buffer: BufferHandle, index: u32, value: f32) {
        (**self).write_f32(buffer, index, value)
    }

    fn read_u64(&self, buffer: BufferHandle, index: u32) -> u64 {
        (**self).read_u64(buffer, index)
    }
}
