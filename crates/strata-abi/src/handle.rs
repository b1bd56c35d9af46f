//! Opaque handles crossing the foreign engine boundary.
//!
//! Every identifier the engine hands back is wrapped in a newtype so the
//! binding cannot accidentally mix namespaces (a tag id is not a component
//! type id, a buffer is not an instance). The binding records and forwards
//! these values; it never interprets their bits.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Engine-assigned identifiers
// ---------------------------------------------------------------------------

/// Foreign identifier of a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub u64);

impl TypeId {
    /// Raw `u64` representation.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

/// Foreign identifier of a registered tag.
///
/// Tags live in a separate identifier namespace from component types; a
/// `TagId` and a [`TypeId`] with the same bits are unrelated.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagId(pub u64);

impl TagId {
    /// Raw `u64` representation.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagId({})", self.0)
    }
}

/// Foreign identifier of an entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Raw `u64` representation.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Memory handles
// ---------------------------------------------------------------------------

/// Handle to one entity's component data inside engine-owned memory.
///
/// Borrowed, never owned: the engine controls the lifetime of the memory
/// behind it, and a handle is only valid until the engine moves or reuses
/// that storage (e.g. on the next query iteration step).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceHandle(pub u32);

impl InstanceHandle {
    /// The null instance (no component data).
    pub const NULL: InstanceHandle = InstanceHandle(0);

    /// Whether this is the null instance handle.
    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceHandle({:#x})", self.0)
    }
}

/// Handle to a foreign buffer allocation.
///
/// Buffers allocated through [`EngineAbi::alloc_buffer`] or
/// [`EngineAbi::alloc_utf8`] are caller-owned until released; buffers
/// returned by field or cursor reads are engine-owned borrows and must not
/// be released by the caller.
///
/// [`EngineAbi::alloc_buffer`]: crate::engine::EngineAbi::alloc_buffer
/// [`EngineAbi::alloc_utf8`]: crate::engine::EngineAbi::alloc_utf8
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferHandle(pub u32);

impl BufferHandle {
    /// The null buffer (no allocation).
    pub const NULL: BufferHandle = BufferHandle(0);

    /// Whether this is the null buffer handle.
    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Raw `u32` representation, used when a buffer handle itself must be
    /// written into another buffer (the field-name pointer array during
    /// component registration).
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferHandle({:#x})", self.0)
    }
}

/// Handle to a foreign iteration cursor (query or child iteration).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorHandle(pub u32);

impl fmt::Debug for CursorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CursorHandle({})", self.0)
    }
}

/// Handle to a foreign query.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryId(pub u32);

impl fmt::Debug for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
