//! Strata Testkit -- an in-memory foreign engine for tests and examples.
//!
//! [`MemEngine`] implements the full [`EngineAbi`](strata_abi::EngineAbi)
//! surface against a flat byte heap, the way the real engine's exports
//! behave: packed per-instance component memory, copy-on-write string and
//! array fields, signature-grouped query cursors, and a parent/child
//! hierarchy.
//!
//! It also keeps allocation accounting so tests can assert the binding's
//! buffer discipline: every caller-owned buffer the binding allocates must
//! be released by the time the triggering call returns
//! ([`MemEngine::outstanding_host_buffers`] must be 0 between operations).
//!
//! # Panics
//!
//! The testkit is deliberately strict where the real engine would corrupt
//! memory: releasing an unknown or already-released buffer, or reading
//! outside the heap, panics so the offending test fails loudly.

#![deny(unsafe_code)]

mod engine;
mod heap;

pub use engine::MemEngine;
