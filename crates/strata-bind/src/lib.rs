//! Strata Bind -- host-side binding layer over a foreign ECS engine.
//!
//! The engine (archetype storage, query matching, entity indexing) lives
//! behind the opaque call boundary in `strata-abi`; this crate makes it feel
//! like ordinary Rust values. It compiles declared component shapes into the
//! engine's packed field layout, registers them across the boundary, binds
//! live accessors over per-instance foreign memory, and decodes query
//! cursors into sequences of typed component views.
//!
//! # Architecture
//!
//! - **`registry`**: dense/sparse descriptor cache keyed by foreign type id,
//!   plus the name index shared by components and tags.
//! - **`layout`**: shape declaration and the deterministic offset compiler.
//! - **`value`** / **`marshal`**: the host value union and the typed codec
//!   that moves it through the boundary, with scoped release of every
//!   transient foreign buffer.
//! - **`component`**: descriptors and the `Stored`/`Bound` tagged accessor.
//! - **`world`**: the context object owning the engine and registry;
//!   registration protocol and entity/hierarchy operations.
//! - **`query`**: the `Created -> Iterating -> Exhausted` cursor protocol.
//!
//! Everything is single-threaded and synchronous: each operation is a direct
//! foreign call with no suspension point.
//!
//! # Quick Start
//!
//! ```
//! use strata_abi::FieldKind;
//! use strata_bind::{ComponentShape, World};
//! use strata_testkit::MemEngine;
//!
//! let world = World::new(MemEngine::new());
//!
//! let position = ComponentShape::new("Position")
//!     .field("x", FieldKind::F32, 0.0f32)
//!     .field("y", FieldKind::F32, 0.0f32);
//!
//! for _ in 0..5 {
//!     let entity = world.create_entity(None);
//!     world.add(entity, &position).unwrap();
//! }
//!
//! let mut query = world.query(&["Position"]).unwrap();
//! query.iter();
//! while query.next() {
//!     for view in query.field("Position").unwrap() {
//!         assert_eq!(view.get_f32("x"), Some(0.0));
//!     }
//! }
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod layout;
mod marshal;
pub mod query;
pub mod registry;
pub mod value;
pub mod world;

pub use component::{Binding, ComponentInstance, ComponentTypeDescriptor, TagDescriptor};
pub use layout::{compile_layout, ComponentShape, FieldDescriptor};
pub use query::{Query, QueryState};
pub use registry::{NameEntry, SparseMap, TypeRegistry};
pub use value::Value;
pub use world::{BindConfig, Entity, World};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the binding layer.
///
/// Declaration errors are raised synchronously, before any foreign call, so
/// a failed operation leaves no partial foreign state. Runtime decode of
/// malformed foreign data never errors -- it degrades (empty array, default
/// value) with a log line instead.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// A declared field has no marshalable encoding: no explicit kind and a
    /// default value the compiler cannot infer one from, or a default that
    /// cannot be represented as the declared kind.
    #[error("field '{field}' on component '{component}' has no marshalable encoding -- declare an explicit kind")]
    UnsupportedFieldType {
        component: String,
        field: String,
    },

    /// A query or lookup referenced a name never registered as a component.
    #[error("component type '{name}' has not been registered. Registered names: [{registered}]")]
    UnregisteredComponent {
        name: String,
        registered: String,
    },

    /// `Query::field` named a shape that is not among the query's declared
    /// terms.
    #[error("'{name}' is not a term of this query. Declared terms: [{terms}]")]
    UnresolvedTerm {
        name: String,
        terms: String,
    },

    /// `Query::field` was called while the cursor was not positioned on a
    /// matched row group.
    #[error("query cursor is not positioned on a row group -- call iter() and next() before field()")]
    InactiveCursor,

    /// A name was registered in both the component and tag namespaces.
    #[error("name '{name}' is already registered in the other namespace (component vs tag)")]
    NameConflict {
        name: String,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Binding, ComponentInstance, ComponentTypeDescriptor, TagDescriptor};
    pub use crate::layout::{ComponentShape, FieldDescriptor};
    pub use crate::query::{Query, QueryState};
    pub use crate::value::Value;
    pub use crate::world::{BindConfig, Entity, World};
    pub use crate::BindError;
    pub use strata_abi::{EngineAbi, FieldKind};
}

// ---------------------------------------------------------------------------
// Integration tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use strata_testkit::MemEngine;

    use crate::prelude::*;

    fn position() -> ComponentShape {
        ComponentShape::new("Position")
            .field("x", FieldKind::F32, 0.0f32)
            .field("y", FieldKind::F32, 0.0f32)
    }

    fn velocity() -> ComponentShape {
        ComponentShape::new("Velocity")
            .field("dx", FieldKind::F32, 0.0f32)
            .field("dy", FieldKind::F32, 0.0f32)
    }

    // -- end-to-end movement integration ------------------------------------

    #[test]
    fn movement_system_over_bound_views() {
        let world = World::new(MemEngine::new());

        for i in 0..10 {
            let entity = world.create_entity(None);
            let mut pos = world.add(entity, &position()).expect("adds");
            pos.set("x", i as f32);
            let mut vel = world.add(entity, &velocity()).expect("adds");
            vel.set("dx", 1.0f32);
            vel.set("dy", -0.5f32);
        }

        let mut query = world.query(&["Position", "Velocity"]).expect("creates");

        // One integration step through live views.
        query.iter();
        while query.next() {
            let positions = query.field("Position").expect("decodes");
            let velocities = query.field("Velocity").expect("decodes");
            for (mut pos, vel) in positions.into_iter().zip(&velocities) {
                let x = pos.get_f32("x").expect("declared") + vel.get_f32("dx").expect("declared");
                let y = pos.get_f32("y").expect("declared") + vel.get_f32("dy").expect("declared");
                pos.set("x", x);
                pos.set("y", y);
            }
        }

        // A second pass observes the writes.
        query.iter();
        let mut xs = Vec::new();
        while query.next() {
            for view in query.field("Position").expect("decodes") {
                assert_eq!(view.get_f32("y"), Some(-0.5));
                xs.push(view.get_f32("x").expect("declared"));
            }
        }
        xs.sort_by(f32::total_cmp);
        let expected: Vec<f32> = (0..10).map(|i| i as f32 + 1.0).collect();
        assert_eq!(xs, expected);
    }

    // -- buffer discipline across the whole surface --------------------------

    #[test]
    fn no_transient_buffer_outlives_its_call() {
        let engine = Rc::new(MemEngine::new());
        let world = World::new(Rc::clone(&engine));

        let label = ComponentShape::new("Label")
            .field("text", FieldKind::Str, "")
            .field("weights", FieldKind::ArrayF32, Vec::<f32>::new());
        world.register_component(&label).expect("registers");
        assert_eq!(engine.outstanding_host_buffers(), 0);

        world.register_tag("Marker").expect("tag registers");
        assert_eq!(engine.outstanding_host_buffers(), 0);

        let entity = world.create_entity(Some("labeled"));
        assert_eq!(engine.outstanding_host_buffers(), 0);

        let mut instance = world.add(entity, &label).expect("adds");
        instance.set("text", "hello world");
        instance.set("weights", vec![0.25f32, 0.5, 0.75]);
        assert_eq!(
            engine.outstanding_host_buffers(),
            0,
            "string/array writes must release their transient buffers"
        );

        assert_eq!(instance.get_str("text"), Some("hello world".to_owned()));
        assert_eq!(
            instance.get("weights"),
            Some(Value::ArrayF32(vec![0.25, 0.5, 0.75]))
        );
        assert_eq!(engine.outstanding_host_buffers(), 0);
    }

    // -- mixed kinds end to end ----------------------------------------------

    #[test]
    fn every_kind_marshals_through_an_entity() {
        let world = World::new(MemEngine::new());
        let kitchen_sink = ComponentShape::new("KitchenSink")
            .field("a", FieldKind::U8, 0u8)
            .field("b", FieldKind::U16, 0u16)
            .field("c", FieldKind::U32, 0u32)
            .field("d", FieldKind::U64, 0u64)
            .field("e", FieldKind::I8, 0i8)
            .field("f", FieldKind::I16, 0i16)
            .field("g", FieldKind::I32, 0i32)
            .field("h", FieldKind::I64, 0i64)
            .field("i", FieldKind::F32, 0.0f32)
            .field("j", FieldKind::F64, 0.0f64)
            .field("k", FieldKind::Bool, false)
            .field("l", FieldKind::Str, "")
            .field("m", FieldKind::ArrayU32, Vec::<u32>::new())
            .field("n", FieldKind::ArrayF32, Vec::<f32>::new());

        let entity = world.create_entity(None);
        let mut sink = world.add(entity, &kitchen_sink).expect("adds");

        sink.set("a", u8::MAX);
        sink.set("b", u16::MAX);
        sink.set("c", u32::MAX);
        sink.set("d", u64::MAX);
        sink.set("e", i8::MIN);
        sink.set("f", i16::MIN);
        sink.set("g", i32::MIN);
        sink.set("h", i64::MIN);
        sink.set("i", 1.5f32);
        sink.set("j", -2.25f64);
        sink.set("k", true);
        sink.set("l", "packed");
        sink.set("m", vec![1u32, 2, 3]);
        sink.set("n", vec![0.5f32]);

        assert_eq!(sink.get("a"), Some(Value::U8(u8::MAX)));
        assert_eq!(sink.get("b"), Some(Value::U16(u16::MAX)));
        assert_eq!(sink.get("c"), Some(Value::U32(u32::MAX)));
        assert_eq!(sink.get("d"), Some(Value::U64(u64::MAX)));
        assert_eq!(sink.get("e"), Some(Value::I8(i8::MIN)));
        assert_eq!(sink.get("f"), Some(Value::I16(i16::MIN)));
        assert_eq!(sink.get("g"), Some(Value::I32(i32::MIN)));
        assert_eq!(sink.get("h"), Some(Value::I64(i64::MIN)));
        assert_eq!(sink.get("i"), Some(Value::F32(1.5)));
        assert_eq!(sink.get("j"), Some(Value::F64(-2.25)));
        assert_eq!(sink.get("k"), Some(Value::Bool(true)));
        assert_eq!(sink.get("l"), Some(Value::Str("packed".to_owned())));
        assert_eq!(sink.get("m"), Some(Value::ArrayU32(vec![1, 2, 3])));
        assert_eq!(sink.get("n"), Some(Value::ArrayF32(vec![0.5])));

        // A fresh view over the same entity sees the same memory.
        let view = world.get(entity, &kitchen_sink).expect("resolves");
        assert_eq!(view.get("i"), Some(Value::F32(1.5)));
        assert_eq!(view.get_bool("k"), Some(true));
    }
}
