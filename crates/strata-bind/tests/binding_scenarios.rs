//! End-to-end scenarios over the full binding surface, driven against the
//! in-memory engine.

use std::rc::Rc;

use strata_bind::prelude::*;
use strata_testkit::MemEngine;

fn position() -> ComponentShape {
    ComponentShape::new("Position")
        .field("x", FieldKind::F32, 0.0f32)
        .field("y", FieldKind::F32, 0.0f32)
}

// ---------------------------------------------------------------------------
// Scenario: one archetype of five, write-through views
// ---------------------------------------------------------------------------

#[test]
fn five_identical_entities_iterate_as_one_group() {
    let world = World::new(MemEngine::new());
    world.register_component(&position()).expect("registers");

    let entities: Vec<Entity> = (0..5)
        .map(|_| {
            let entity = world.create_entity(None);
            world.add(entity, &position()).expect("adds");
            entity
        })
        .collect();

    let mut query = world.query(&["Position"]).expect("creates");
    query.iter();

    // All five share a signature: exactly one row group of five.
    assert!(query.next());
    let views = query.field("Position").expect("decodes");
    assert_eq!(views.len(), 5);
    assert!(!query.next());

    // Writes through a view land in foreign memory and read back in the
    // same pass.
    query.iter();
    assert!(query.next());
    let mut views = query.field("Position").expect("decodes");
    for view in &mut views {
        view.set("x", 10.0f32);
    }
    for view in &views {
        assert_eq!(view.get_f32("x"), Some(10.0));
    }

    // And they are visible through per-entity lookups afterwards.
    for entity in entities {
        let view = world.get(entity, &position()).expect("resolves");
        assert_eq!(view.get_f32("x"), Some(10.0));
    }
}

// ---------------------------------------------------------------------------
// Scenario: tags and hierarchy
// ---------------------------------------------------------------------------

#[test]
fn tagged_children_roundtrip_as_a_set() {
    let world = World::new(MemEngine::new());
    world.register_component(&position()).expect("registers");
    world.register_tag("Enemy").expect("tag registers");

    let parent = world.create_entity(Some("squad"));
    let mut tagged = Vec::new();
    for i in 0..5 {
        let entity = world.create_entity(None);
        world.add(entity, &position()).expect("adds");
        if i < 3 {
            world.attach_tag(entity, "Enemy").expect("tags");
            world.set_parent(entity, parent);
            tagged.push(entity);
        }
    }

    let mut children = world.children(parent);
    children.sort_by_key(|e| e.id.raw());
    tagged.sort_by_key(|e| e.id.raw());
    assert_eq!(children, tagged, "children must be exactly the linked three");

    // Tagged and untagged entities carry different signatures, so the
    // Position query now sees two row groups.
    let mut query = world.query(&["Position"]).expect("creates");
    query.iter();
    let mut group_sizes = Vec::new();
    while query.next() {
        group_sizes.push(query.field("Position").expect("decodes").len());
    }
    group_sizes.sort();
    assert_eq!(group_sizes, vec![2, 3]);
}

// ---------------------------------------------------------------------------
// Scenario: misdirected field() never decodes another term
// ---------------------------------------------------------------------------

#[test]
fn field_for_undeclared_term_fails_instead_of_decoding() {
    let world = World::new(MemEngine::new());
    world.register_component(&position()).expect("registers");
    let health = ComponentShape::new("Health").field("hp", FieldKind::U32, 100u32);
    world.register_component(&health).expect("registers");

    let entity = world.create_entity(None);
    world.add(entity, &position()).expect("adds");
    world.add(entity, &health).expect("adds");

    let mut query = world.query(&["Position"]).expect("creates");
    query.iter();
    assert!(query.next());

    // "Health" is registered and even present on the row's entity -- but it
    // was never passed to query(), so it must not decode.
    let err = query.field("Health").expect_err("must not decode");
    assert!(matches!(err, BindError::UnresolvedTerm { ref name, .. } if name == "Health"));

    // A name nobody ever registered behaves the same.
    assert!(matches!(
        query.field("Mystery"),
        Err(BindError::UnresolvedTerm { .. })
    ));
}

// ---------------------------------------------------------------------------
// Iteration exhaustion across several groups
// ---------------------------------------------------------------------------

#[test]
fn exhaustion_counts_groups_and_resets_identically() {
    let world = World::new(MemEngine::new());
    let velocity = ComponentShape::new("Velocity")
        .field("dx", FieldKind::F32, 0.0f32)
        .field("dy", FieldKind::F32, 0.0f32);
    world.register_component(&position()).expect("registers");
    world.register_component(&velocity).expect("registers");
    world.register_tag("Frozen").expect("tag registers");

    // Three distinct signatures, all carrying Position.
    let a = world.create_entity(None);
    world.add(a, &position()).expect("adds");

    let b = world.create_entity(None);
    world.add(b, &position()).expect("adds");
    world.add(b, &velocity).expect("adds");

    let c = world.create_entity(None);
    world.add(c, &position()).expect("adds");
    world.attach_tag(c, "Frozen").expect("tags");

    let mut query = world.query(&["Position"]).expect("creates");

    let count_groups = |query: &mut Query| {
        query.iter();
        let mut groups = 0;
        while query.next() {
            groups += 1;
        }
        groups
    };

    let first = count_groups(&mut query);
    assert_eq!(first, 3);
    // A fresh pass repeats the count exactly.
    assert_eq!(count_groups(&mut query), first);
    assert!(!query.next(), "exhausted stays exhausted");
}

// ---------------------------------------------------------------------------
// Registration protocol observed from the engine side
// ---------------------------------------------------------------------------

#[test]
fn registration_is_idempotent_under_load() {
    let engine = Rc::new(MemEngine::new());
    let world = World::new(Rc::clone(&engine));

    for _ in 0..50 {
        world.register_component(&position()).expect("registers");
        world.register_tag("Enemy").expect("tag registers");
    }

    assert_eq!(engine.type_count(), 1, "one foreign type across 50 calls");
    assert_eq!(engine.tag_count(), 1, "one foreign tag across 50 calls");
    assert_eq!(engine.outstanding_host_buffers(), 0);
}
