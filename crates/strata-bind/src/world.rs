//! The [`World`]: the binding's top-level context.
//!
//! A `World` owns the engine boundary and the type registry, and every
//! operation -- registration, entity creation, attachment, hierarchy walks,
//! query construction -- goes through it. There are no process-wide globals:
//! the type caches live in an explicit context object shared (single-
//! threaded, via `Rc`) with the instances and queries the world hands out.
//!
//! # Registration protocol
//!
//! [`World::register_component`] follows the engine's packed-struct
//! convention: compile the layout, allocate foreign buffers for the declared
//! name, the ordered field names, and the ordered field kind codes, issue
//! the foreign create call, publish the descriptor, and release every
//! transient buffer. Buffer release is structural -- scoped guards drop at
//! the end of the call -- not a code path anyone has to remember.
//! Registration is idempotent per declared name: a repeat registration
//! returns the cached descriptor without re-issuing foreign calls, after
//! recompiling the layout to check (and log) any shape divergence.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use strata_abi::{EngineAbi, EntityId, TypeId};

use crate::component::{ComponentInstance, ComponentTypeDescriptor, TagDescriptor};
use crate::layout::{compile_layout, layout_diverges, ComponentShape, FieldDescriptor};
use crate::marshal::ScopedBuffer;
use crate::query::Query;
use crate::registry::{NameEntry, TypeRegistry};
use crate::BindError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the binding layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindConfig {
    /// Upper bound on foreign type ids the registry caches. Foreign ids are
    /// small positive integers; ids at or beyond this are not cached.
    /// Default: 10,000.
    pub type_capacity: usize,

    /// Largest array element count accepted when decoding a count-prefixed
    /// array field. Larger counts are treated as uninitialized data and
    /// decode as empty. Default: 1,048,576.
    pub max_array_len: u32,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            type_capacity: 10_000,
            max_array_len: 1 << 20,
        }
    }
}

// ---------------------------------------------------------------------------
// Ctx -- the shared context behind every operation
// ---------------------------------------------------------------------------

/// Context shared between the world and everything it hands out.
pub(crate) struct Ctx {
    pub(crate) engine: Box<dyn EngineAbi>,
    pub(crate) config: BindConfig,
    pub(crate) registry: RefCell<TypeRegistry>,
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// An entity handle. The id is foreign-assigned and opaque; the binding
/// never interprets its bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The top-level binding context over one foreign engine.
pub struct World {
    ctx: Rc<Ctx>,
    /// Counter for generated entity names.
    entity_counter: Cell<u64>,
}

impl World {
    pub fn new(engine: impl EngineAbi + 'static) -> Self {
        Self::with_config(engine, BindConfig::default())
    }

    pub fn with_config(engine: impl EngineAbi + 'static, config: BindConfig) -> Self {
        let registry = RefCell::new(TypeRegistry::with_capacity(config.type_capacity));
        Self {
            ctx: Rc::new(Ctx {
                engine: Box::new(engine),
                config,
                registry,
            }),
            entity_counter: Cell::new(0),
        }
    }

    pub fn config(&self) -> &BindConfig {
        &self.ctx.config
    }

    // -- registration -------------------------------------------------------

    /// Register a component shape with the foreign engine, returning its
    /// compiled descriptor.
    ///
    /// Idempotent per declared name: re-registering returns the cached
    /// descriptor without foreign calls. A re-declaration whose layout
    /// diverges from the cached one is logged -- the cached layout stays
    /// authoritative.
    ///
    /// # Errors
    ///
    /// - [`BindError::UnsupportedFieldType`] if a field's kind cannot be
    ///   compiled (raised before any foreign call).
    /// - [`BindError::NameConflict`] if the name is already registered as a
    ///   tag.
    pub fn register_component(
        &self,
        shape: &ComponentShape,
    ) -> Result<Rc<ComponentTypeDescriptor>, BindError> {
        let mut fields = compile_layout(shape, &[])?;

        {
            let registry = self.ctx.registry.borrow();
            match registry.entry(shape.name()) {
                Some(NameEntry::Component(id)) => {
                    if let Some(cached) = registry.descriptor(id) {
                        if layout_diverges(&cached.fields, &fields) {
                            tracing::warn!(
                                component = %shape.name(),
                                "re-registration with a diverging layout; cached layout stays authoritative"
                            );
                        }
                        return Ok(cached);
                    }
                }
                Some(NameEntry::Tag(_)) => {
                    return Err(BindError::NameConflict {
                        name: shape.name().to_owned(),
                    });
                }
                None => {}
            }
        }

        let type_id = self.create_foreign_type(shape.name(), &mut fields);
        let descriptor = Rc::new(ComponentTypeDescriptor {
            type_id,
            name: shape.name().to_owned(),
            fields,
        });
        self.ctx
            .registry
            .borrow_mut()
            .publish_component(Rc::clone(&descriptor));
        tracing::debug!(
            component = %descriptor.name,
            ?type_id,
            fields = descriptor.fields.len(),
            size = descriptor.size_bytes(),
            "component type registered"
        );
        Ok(descriptor)
    }

    /// Steps 3-4 of the registration protocol: allocate the name buffer, the
    /// per-field name buffers, the pointer array over them, and the kind
    /// code buffer; then issue the foreign create call. Every buffer is
    /// scoped to this call and released when it returns.
    fn create_foreign_type(&self, name: &str, fields: &mut [FieldDescriptor]) -> TypeId {
        let engine = self.ctx.engine.as_ref();
        let count = fields.len() as u32;

        let name_buf = ScopedBuffer::utf8(engine, name);
        let field_names: Vec<ScopedBuffer<'_>> = fields
            .iter()
            .map(|fd| ScopedBuffer::utf8(engine, &fd.name))
            .collect();
        let names_arr = ScopedBuffer::alloc(engine, count * 4);
        let kinds_buf = ScopedBuffer::alloc(engine, count);
        for (i, (fd, buf)) in fields.iter_mut().zip(&field_names).enumerate() {
            fd.foreign_name = buf.handle();
            engine.write_u32(names_arr.handle(), i as u32, buf.handle().raw());
            engine.write_u8(kinds_buf.handle(), i as u32, fd.kind.code());
        }

        engine.create_component_type(
            name_buf.handle(),
            names_arr.handle(),
            count,
            kinds_buf.handle(),
            count,
        )
        // Guards drop here: name, field names, pointer array, kind codes.
    }

    /// Register a tag (a fieldless type). Idempotent per name; tags only
    /// enter the name index, never the descriptor cache.
    ///
    /// # Errors
    ///
    /// [`BindError::NameConflict`] if the name is already registered as a
    /// component.
    pub fn register_tag(&self, name: &str) -> Result<TagDescriptor, BindError> {
        match self.ctx.registry.borrow().entry(name) {
            Some(NameEntry::Tag(tag_id)) => {
                return Ok(TagDescriptor {
                    tag_id,
                    name: name.to_owned(),
                });
            }
            Some(NameEntry::Component(_)) => {
                return Err(BindError::NameConflict {
                    name: name.to_owned(),
                });
            }
            None => {}
        }

        let engine = self.ctx.engine.as_ref();
        let name_buf = ScopedBuffer::utf8(engine, name);
        let tag_id = engine.create_tag(name_buf.handle());
        drop(name_buf);

        self.ctx.registry.borrow_mut().publish_tag(name, tag_id);
        tracing::debug!(tag = %name, ?tag_id, "tag registered");
        Ok(TagDescriptor {
            tag_id,
            name: name.to_owned(),
        })
    }

    /// Build an unbound instance of a shape, registering the shape first if
    /// this world has not seen it.
    pub fn instantiate(&self, shape: &ComponentShape) -> Result<ComponentInstance, BindError> {
        let descriptor = self.register_component(shape)?;
        let stored = shape.defaults_for(&descriptor.fields);
        Ok(ComponentInstance::new(
            Rc::clone(&self.ctx),
            descriptor,
            stored,
        ))
    }

    // -- entity operations --------------------------------------------------

    /// Create an entity. Without a name, one is generated (`entity_<n>`);
    /// the foreign create primitive always receives a name buffer.
    pub fn create_entity(&self, name: Option<&str>) -> Entity {
        let generated;
        let name = match name {
            Some(name) => name,
            None => {
                let n = self.entity_counter.get();
                self.entity_counter.set(n + 1);
                generated = format!("entity_{n}");
                &generated
            }
        };
        let engine = self.ctx.engine.as_ref();
        let name_buf = ScopedBuffer::utf8(engine, name);
        let id = engine.create_entity(name_buf.handle());
        tracing::debug!(entity = %name, ?id, "entity created");
        Entity { id }
    }

    /// Attach a component instance to an entity and bind its accessors to
    /// the entity's foreign memory. The instance's stored values are not
    /// flushed into foreign memory -- once bound, reads and writes go to the
    /// engine.
    pub fn attach(
        &self,
        entity: Entity,
        component: &mut ComponentInstance,
    ) -> Result<(), BindError> {
        let descriptor = component.descriptor_rc();
        let handle = self.ctx.engine.add_component(entity.id, descriptor.type_id);
        component.bind(handle);
        Ok(())
    }

    /// Register (lazily) and attach a shape in one step, returning the bound
    /// instance.
    pub fn add(
        &self,
        entity: Entity,
        shape: &ComponentShape,
    ) -> Result<ComponentInstance, BindError> {
        let mut component = self.instantiate(shape)?;
        self.attach(entity, &mut component)?;
        Ok(component)
    }

    /// Attach a tag to an entity, registering the tag lazily.
    pub fn attach_tag(&self, entity: Entity, name: &str) -> Result<(), BindError> {
        let tag = self.register_tag(name)?;
        self.ctx.engine.add_tag(entity.id, tag.tag_id);
        Ok(())
    }

    /// Attach several tags.
    pub fn attach_tags(&self, entity: Entity, names: &[&str]) -> Result<(), BindError> {
        for name in names {
            self.attach_tag(entity, name)?;
        }
        Ok(())
    }

    /// Fetch an entity's component as a bound view.
    ///
    /// If the entity does not carry the component, the returned instance is
    /// unbound and reads the shape's defaults -- check
    /// [`ComponentInstance::is_bound`].
    ///
    /// # Errors
    ///
    /// [`BindError::UnregisteredComponent`] if the shape's name was never
    /// registered (raised before any foreign call).
    pub fn get(
        &self,
        entity: Entity,
        shape: &ComponentShape,
    ) -> Result<ComponentInstance, BindError> {
        let descriptor = self
            .ctx
            .registry
            .borrow()
            .descriptor_by_name(shape.name())
            .ok_or_else(|| self.unregistered(shape.name()))?;
        let handle = self.ctx.engine.get_component(entity.id, descriptor.type_id);
        let stored = shape.defaults_for(&descriptor.fields);
        let mut component = ComponentInstance::new(Rc::clone(&self.ctx), descriptor, stored);
        if !handle.is_null() {
            component.bind(handle);
        }
        Ok(component)
    }

    // -- hierarchy ----------------------------------------------------------

    /// Link `child` under `parent`.
    pub fn set_parent(&self, child: Entity, parent: Entity) {
        self.ctx.engine.set_parent(child.id, parent.id);
    }

    /// All direct children of `parent`, by driving the foreign child cursor
    /// to completion once. Order is whatever the engine yields.
    pub fn children(&self, parent: Entity) -> Vec<Entity> {
        let engine = self.ctx.engine.as_ref();
        let cursor = engine.iterate_children(parent.id);
        let mut out = Vec::new();
        while engine.advance(cursor) {
            let count = engine.row_count(cursor);
            let ids = engine.child_ids(cursor);
            for i in 0..count {
                out.push(Entity {
                    id: EntityId(engine.read_u64(ids, i)),
                });
            }
        }
        out
    }

    // -- queries ------------------------------------------------------------

    /// Create a query over the named component shapes.
    ///
    /// # Errors
    ///
    /// [`BindError::UnregisteredComponent`] if any name was never registered
    /// as a component -- raised before any foreign call, so no partial
    /// foreign query state is created.
    pub fn query(&self, names: &[&str]) -> Result<Query, BindError> {
        let mut terms = Vec::with_capacity(names.len());
        {
            let registry = self.ctx.registry.borrow();
            for name in names {
                let descriptor = registry
                    .descriptor_by_name(name)
                    .ok_or_else(|| self.unregistered(name))?;
                terms.push(descriptor);
            }
        }
        let ids: Vec<TypeId> = terms.iter().map(|d| d.type_id).collect();
        let query = self.ctx.engine.create_query(&ids);
        tracing::debug!(?query, terms = names.len(), "query created");
        Ok(Query::new(Rc::clone(&self.ctx), query, terms))
    }

    fn unregistered(&self, name: &str) -> BindError {
        BindError::UnregisteredComponent {
            name: name.to_owned(),
            registered: self.ctx.registry.borrow().registered_names().join(", "),
        }
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("config", &self.ctx.config)
            .field(
                "registered",
                &self.ctx.registry.borrow().registered_names().len(),
            )
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

    fn position_shape() -> ComponentShape {
        ComponentShape::new("Position")
            .field("x", FieldKind::F32, 0.0f32)
            .field("y", FieldKind::F32, 0.0f32)
    }

    #[test]
    fn registration_publishes_descriptor() {
        let engine = MemEngine::new();
        let world = World::new(engine);
        let descriptor = world
            .register_component(&position_shape())
            .expect("registers");
        assert_eq!(descriptor.name, "Position");
        assert_eq!(descriptor.fields.len(), 2);
        assert_eq!(descriptor.fields[1].offset, 4);
    }

    #[test]
    fn registration_wire_protocol_carries_names_and_kinds() {
        // Build the world around a shared engine reference so we can inspect
        // what crossed the boundary.
        let engine = Rc::new(MemEngine::new());
        let world = World::new(Rc::clone(&engine));
        world
            .register_component(&position_shape())
            .expect("registers");
        let (names, kinds) = engine.type_info("Position").expect("engine saw the type");
        assert_eq!(names, vec!["x", "y"]);
        assert_eq!(kinds, vec![FieldKind::F32, FieldKind::F32]);
        assert_eq!(engine.outstanding_host_buffers(), 0);
    }

    #[test]
    fn re_registration_is_idempotent_and_foreign_free() {
        let engine = Rc::new(MemEngine::new());
        let world = World::new(Rc::clone(&engine));
        let first = world
            .register_component(&position_shape())
            .expect("registers");
        let second = world
            .register_component(&position_shape())
            .expect("idempotent");
        assert!(Rc::ptr_eq(&first, &second));
        // Only one foreign type was ever created.
        assert_eq!(engine.type_count(), 1);
    }

    #[test]
    fn re_registration_layouts_match_exactly() {
        let world = World::new(MemEngine::new());
        let first = world
            .register_component(&position_shape())
            .expect("registers");
        let second = world
            .register_component(&position_shape())
            .expect("idempotent");
        let offsets_a: Vec<u32> = first.fields.iter().map(|f| f.offset).collect();
        let offsets_b: Vec<u32> = second.fields.iter().map(|f| f.offset).collect();
        assert_eq!(offsets_a, offsets_b);
    }

    #[test]
    fn tag_and_component_names_conflict() {
        let world = World::new(MemEngine::new());
        world.register_tag("Enemy").expect("tag registers");
        let clash = ComponentShape::new("Enemy").field("x", FieldKind::F32, 0.0f32);
        assert!(matches!(
            world.register_component(&clash),
            Err(BindError::NameConflict { ref name }) if name == "Enemy"
        ));
        world
            .register_component(&position_shape())
            .expect("registers");
        assert!(matches!(
            world.register_tag("Position"),
            Err(BindError::NameConflict { .. })
        ));
    }

    #[test]
    fn tag_registration_is_idempotent() {
        let engine = Rc::new(MemEngine::new());
        let world = World::new(Rc::clone(&engine));
        let a = world.register_tag("Enemy").expect("tag registers");
        let b = world.register_tag("Enemy").expect("idempotent");
        assert_eq!(a, b);
        assert_eq!(engine.tag_count(), 1);
        assert_eq!(engine.outstanding_host_buffers(), 0);
    }

    #[test]
    fn generated_entity_names_are_unique() {
        let engine = Rc::new(MemEngine::new());
        let world = World::new(Rc::clone(&engine));
        let a = world.create_entity(None);
        let b = world.create_entity(None);
        assert_ne!(a, b);
        assert_eq!(engine.entity_count(), 2);
        assert_eq!(engine.outstanding_host_buffers(), 0);
    }

    #[test]
    fn get_on_unregistered_shape_fails_fast() {
        let world = World::new(MemEngine::new());
        let entity = world.create_entity(None);
        let err = world
            .get(entity, &position_shape())
            .expect_err("must fail before foreign calls");
        assert!(matches!(err, BindError::UnregisteredComponent { .. }));
    }

    #[test]
    fn get_on_missing_component_returns_unbound() {
        let world = World::new(MemEngine::new());
        world
            .register_component(&position_shape())
            .expect("registers");
        let entity = world.create_entity(None);
        let view = world.get(entity, &position_shape()).expect("resolves");
        assert!(!view.is_bound());
    }

    #[test]
    fn get_returns_live_view_of_attached_component() {
        let world = World::new(MemEngine::new());
        let entity = world.create_entity(None);
        let mut pos = world.add(entity, &position_shape()).expect("adds");
        pos.set("x", 3.25f32);
        let view = world.get(entity, &position_shape()).expect("resolves");
        assert!(view.is_bound());
        assert_eq!(view.get_f32("x"), Some(3.25));
    }

    #[test]
    fn children_roundtrip() {
        let world = World::new(MemEngine::new());
        let parent = world.create_entity(Some("parent"));
        let c1 = world.create_entity(Some("c1"));
        let c2 = world.create_entity(Some("c2"));
        let _unrelated = world.create_entity(Some("x"));
        world.set_parent(c1, parent);
        world.set_parent(c2, parent);

        let mut children = world.children(parent);
        children.sort_by_key(|e| e.id.raw());
        assert_eq!(children, vec![c1, c2]);
        assert!(world.children(c1).is_empty());
    }

    #[test]
    fn query_on_unregistered_name_fails_fast() {
        let world = World::new(MemEngine::new());
        let err = world.query(&["Position"]).expect_err("must fail");
        assert!(matches!(
            err,
            BindError::UnregisteredComponent { ref name, .. } if name == "Position"
        ));
    }

    #[test]
    fn query_on_tag_name_fails_fast() {
        let world = World::new(MemEngine::new());
        world.register_tag("Enemy").expect("tag registers");
        // Tags carry no layout, so they are not queryable shapes.
        assert!(world.query(&["Enemy"]).is_err());
    }
}
