//! Compiled type descriptors and live component instances.
//!
//! A [`ComponentInstance`] is the host's view of one component value. It is
//! a tagged accessor: `Unbound` instances are plain value holders over their
//! declared defaults; `Bound` instances redirect every field read and write
//! through the foreign handle they were bound to, via the codec in
//! [`marshal`](crate::marshal). Binding happens when a component is attached
//! to an entity or decoded out of a query row.
//!
//! The foreign handle is borrowed, never owned -- the engine controls the
//! lifetime of the memory behind it, and query-produced views are only valid
//! until the cursor advances again.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use strata_abi::{InstanceHandle, TagId, TypeId};

use crate::layout::FieldDescriptor;
use crate::marshal;
use crate::value::Value;
use crate::world::Ctx;

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// The compiled, offset-assigned layout of one registered component type.
/// Exactly one exists per declared name; it lives in the registry for the
/// owning world's lifetime and is shared by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentTypeDescriptor {
    /// Foreign-assigned type id.
    pub type_id: TypeId,
    /// Declared name.
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
}

impl ComponentTypeDescriptor {
    /// Look up a field by declared name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Total packed size of the component struct.
    pub fn size_bytes(&self) -> u32 {
        self.fields.iter().map(|f| f.kind.size_bytes()).sum()
    }
}

/// A registered tag: a name and its foreign id, no layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDescriptor {
    /// Foreign-assigned tag id (distinct namespace from component ids).
    pub tag_id: TagId,
    /// Declared name.
    pub name: String,
}

// ---------------------------------------------------------------------------
// ComponentInstance
// ---------------------------------------------------------------------------

/// Whether an instance reads its own stored values or foreign memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Plain value holder; reads and writes hit the stored defaults.
    Unbound,
    /// Live view; reads and writes go through the engine at this handle.
    Bound(InstanceHandle),
}

/// One component value, bound or unbound.
pub struct ComponentInstance {
    ctx: Rc<Ctx>,
    descriptor: Rc<ComponentTypeDescriptor>,
    binding: Binding,
    /// Stored values parallel to `descriptor.fields`; only consulted while
    /// unbound.
    stored: Vec<Value>,
}

impl ComponentInstance {
    /// An unbound instance over the given stored defaults. `stored` must be
    /// parallel to `descriptor.fields`.
    pub(crate) fn new(
        ctx: Rc<Ctx>,
        descriptor: Rc<ComponentTypeDescriptor>,
        stored: Vec<Value>,
    ) -> Self {
        debug_assert_eq!(stored.len(), descriptor.fields.len());
        Self {
            ctx,
            descriptor,
            binding: Binding::Unbound,
            stored,
        }
    }

    /// A bound view with zeroed fallback defaults, as produced by query
    /// decoding.
    pub(crate) fn bound(
        ctx: Rc<Ctx>,
        descriptor: Rc<ComponentTypeDescriptor>,
        handle: InstanceHandle,
    ) -> Self {
        let stored = descriptor
            .fields
            .iter()
            .map(|f| Value::zero_of(f.kind))
            .collect();
        let mut instance = Self::new(ctx, descriptor, stored);
        instance.bind(handle);
        instance
    }

    /// Redirect this instance's accessors through `handle`.
    pub(crate) fn bind(&mut self, handle: InstanceHandle) {
        self.binding = Binding::Bound(handle);
    }

    pub fn descriptor(&self) -> &ComponentTypeDescriptor {
        &self.descriptor
    }

    pub(crate) fn descriptor_rc(&self) -> Rc<ComponentTypeDescriptor> {
        Rc::clone(&self.descriptor)
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.binding, Binding::Bound(_))
    }

    // -- field access -------------------------------------------------------

    /// Read a field. `None` for a name the shape never declared.
    pub fn get(&self, field: &str) -> Option<Value> {
        let fd = self.descriptor.field(field)?;
        Some(match self.binding {
            Binding::Bound(handle) => marshal::read_field(
                self.ctx.engine.as_ref(),
                handle,
                fd,
                self.ctx.config.max_array_len,
            ),
            Binding::Unbound => self.stored[fd.index as usize].clone(),
        })
    }

    /// Write a field. Writes to undeclared names, and values that cannot be
    /// represented as the field's kind, are skipped with a warning -- never
    /// an error.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        let value = value.into();
        let Some(fd) = self.descriptor.field(field) else {
            tracing::warn!(
                component = %self.descriptor.name,
                field,
                "set on undeclared field ignored"
            );
            return;
        };
        let Some(coerced) = marshal::coerce(&value, fd.kind) else {
            tracing::warn!(
                component = %self.descriptor.name,
                field,
                kind = ?fd.kind,
                value_kind = ?value.kind(),
                "value not representable as field kind; write skipped"
            );
            return;
        };
        match self.binding {
            Binding::Bound(handle) => {
                marshal::write_field(self.ctx.engine.as_ref(), handle, fd, &coerced);
            }
            Binding::Unbound => self.stored[fd.index as usize] = coerced,
        }
    }

    // -- typed conveniences -------------------------------------------------

    pub fn get_f32(&self, field: &str) -> Option<f32> {
        self.get(field)?.as_f64().map(|v| v as f32)
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.get(field)?.as_f64()
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field)?.as_bool()
    }

    pub fn get_str(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("type", &self.descriptor.name)
            .field("binding", &self.binding)
            .field("fields", &self.descriptor.fields.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use strata_abi::FieldKind;
    use strata_testkit::MemEngine;

    use crate::layout::ComponentShape;
    use crate::world::World;

    fn position_shape() -> ComponentShape {
        ComponentShape::new("Position")
            .field("x", FieldKind::F32, 1.5f32)
            .field("y", FieldKind::F32, 0.0f32)
    }

    #[test]
    fn unbound_instance_holds_declared_defaults() {
        let world = World::new(MemEngine::new());
        let pos = world.instantiate(&position_shape()).expect("registers");
        assert!(!pos.is_bound());
        assert_eq!(pos.get("x"), Some(Value::F32(1.5)));
        assert_eq!(pos.get("y"), Some(Value::F32(0.0)));
    }

    #[test]
    fn unbound_set_stores_locally() {
        let world = World::new(MemEngine::new());
        let mut pos = world.instantiate(&position_shape()).expect("registers");
        pos.set("x", 9.0f32);
        assert_eq!(pos.get_f32("x"), Some(9.0));
    }

    #[test]
    fn undeclared_field_is_none_and_set_is_noop() {
        let world = World::new(MemEngine::new());
        let mut pos = world.instantiate(&position_shape()).expect("registers");
        assert_eq!(pos.get("z"), None);
        pos.set("z", 1.0f32); // ignored, no panic
        assert_eq!(pos.get("z"), None);
    }

    #[test]
    fn mismatched_value_keeps_old_stored_value() {
        let world = World::new(MemEngine::new());
        let mut pos = world.instantiate(&position_shape()).expect("registers");
        pos.set("x", "not a number");
        assert_eq!(pos.get_f32("x"), Some(1.5));
    }

    #[test]
    fn numeric_writes_coerce_to_field_kind() {
        let world = World::new(MemEngine::new());
        let mut pos = world.instantiate(&position_shape()).expect("registers");
        pos.set("x", 10i32);
        assert_eq!(pos.get("x"), Some(Value::F32(10.0)));
    }

    #[test]
    fn bound_instance_reads_foreign_memory() {
        let world = World::new(MemEngine::new());
        let entity = world.create_entity(Some("e"));
        let mut pos = world.instantiate(&position_shape()).expect("registers");
        world.attach(entity, &mut pos).expect("attaches");
        assert!(pos.is_bound());
        // Foreign memory starts zeroed; the stored default no longer shows.
        assert_eq!(pos.get("x"), Some(Value::F32(0.0)));
        pos.set("x", 4.5f32);
        assert_eq!(pos.get("x"), Some(Value::F32(4.5)));
    }

    #[test]
    fn descriptor_size_and_field_lookup() {
        let world = World::new(MemEngine::new());
        let pos = world.instantiate(&position_shape()).expect("registers");
        let descriptor = pos.descriptor();
        assert_eq!(descriptor.size_bytes(), 8);
        assert_eq!(descriptor.field("y").map(|f| f.offset), Some(4));
        assert!(descriptor.field("nope").is_none());
    }
}
