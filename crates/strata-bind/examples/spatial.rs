//! A small spatial simulation over the binding: registers Position/Velocity,
//! spawns a parented squad of movers, runs a few integration ticks through
//! query views, and prints the result.
//!
//! Run with: `cargo run --example spatial` (set `RUST_LOG=debug` to watch
//! registration and query traffic).

use strata_bind::prelude::*;
use strata_testkit::MemEngine;

fn main() -> Result<(), BindError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let world = World::new(MemEngine::new());

    let position = ComponentShape::new("Position")
        .field("x", FieldKind::F32, 0.0f32)
        .field("y", FieldKind::F32, 0.0f32);
    let velocity = ComponentShape::new("Velocity")
        .field("dx", FieldKind::F32, 0.0f32)
        .field("dy", FieldKind::F32, 0.0f32);
    world.register_component(&position)?;
    world.register_component(&velocity)?;
    world.register_tag("Mover")?;

    let squad = world.create_entity(Some("squad"));
    for i in 0..8 {
        let entity = world.create_entity(None);
        let mut pos = world.add(entity, &position)?;
        pos.set("x", i as f32 * 2.0);
        let mut vel = world.add(entity, &velocity)?;
        vel.set("dx", 1.0f32);
        vel.set("dy", 0.25f32 * i as f32);
        world.attach_tag(entity, "Mover")?;
        world.set_parent(entity, squad);
    }
    tracing::info!(members = world.children(squad).len(), "squad assembled");

    let mut movers = world.query(&["Position", "Velocity"])?;
    for tick in 0..10 {
        movers.iter();
        while movers.next() {
            let positions = movers.field("Position")?;
            let velocities = movers.field("Velocity")?;
            for (mut pos, vel) in positions.into_iter().zip(&velocities) {
                let x = pos.get_f32("x").unwrap_or(0.0) + vel.get_f32("dx").unwrap_or(0.0);
                let y = pos.get_f32("y").unwrap_or(0.0) + vel.get_f32("dy").unwrap_or(0.0);
                pos.set("x", x);
                pos.set("y", y);
            }
        }
        tracing::debug!(tick, "integration step complete");
    }

    for (i, member) in world.children(squad).iter().enumerate() {
        let view = world.get(*member, &position)?;
        println!(
            "mover {i}: x={:.1} y={:.1}",
            view.get_f32("x").unwrap_or(0.0),
            view.get_f32("y").unwrap_or(0.0)
        );
    }
    Ok(())
}
