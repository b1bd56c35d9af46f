//! Strata ABI -- the opaque call boundary to the foreign ECS engine.
//!
//! The Strata binding layer never touches engine memory directly. Everything
//! it needs from the engine -- type creation, entity operations, query
//! cursors, field-level reads and writes, buffer lifecycle -- goes through
//! the [`EngineAbi`] trait defined here. Handles crossing the boundary are
//! opaque newtypes whose bits the binding never interprets.
//!
//! # Architecture
//!
//! - **`handle`**: opaque identifier newtypes ([`TypeId`], [`TagId`],
//!   [`EntityId`], [`InstanceHandle`], [`BufferHandle`], [`CursorHandle`],
//!   [`QueryId`]).
//! - **`kind`**: the wire-level field kind codes and their packed-struct
//!   byte sizes ([`FieldKind`]).
//! - **`engine`**: the [`EngineAbi`] trait, one method per foreign call.
//!
//! This crate contains no marshaling logic. Layout compilation, accessor
//! binding, and query decoding all live in `strata-bind`; in-memory test
//! doubles live in `strata-testkit`.

#![deny(unsafe_code)]

pub mod engine;
pub mod handle;
pub mod kind;

pub use engine::EngineAbi;
pub use handle::{BufferHandle, CursorHandle, EntityId, InstanceHandle, QueryId, TagId, TypeId};
pub use kind::FieldKind;
