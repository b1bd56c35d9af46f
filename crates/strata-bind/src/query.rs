//! The query iteration protocol.
//!
//! A [`Query`] drives one foreign cursor through matched row groups:
//! [`iter`](Query::iter) starts (or restarts) the pass, [`next`](Query::next)
//! advances one group, and [`field`](Query::field) decodes the current
//! group's rows for one term into bound component views.
//!
//! ## Cursor discipline
//!
//! One cursor per query, one logical flow: `iter()` -> repeated
//! `next()`/`field()` strictly in sequence. Views returned by `field()` are
//! scoped to the current group -- the next `next()` lets the engine recycle
//! the memory behind them, so do not hold them across steps. `iter()` is
//! always legal and always resets, whatever state the query is in.

use std::rc::Rc;

use strata_abi::CursorHandle;

use crate::component::{ComponentInstance, ComponentTypeDescriptor};
use crate::world::Ctx;
use crate::BindError;

/// Where a query is in its iteration lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// No pass started yet.
    Created,
    /// A pass is underway.
    Iterating,
    /// The last `next()` reported exhaustion; `iter()` starts over.
    Exhausted,
}

/// A live query over registered component shapes.
pub struct Query {
    ctx: Rc<Ctx>,
    query: strata_abi::QueryId,
    cursor: Option<CursorHandle>,
    state: QueryState,
    /// Whether the cursor is positioned on a row group (a `next()` returned
    /// `true` more recently than any `iter()`/exhaustion).
    positioned: bool,
    /// Term descriptors in declaration order; term index == position.
    terms: Vec<Rc<ComponentTypeDescriptor>>,
}

impl Query {
    pub(crate) fn new(
        ctx: Rc<Ctx>,
        query: strata_abi::QueryId,
        terms: Vec<Rc<ComponentTypeDescriptor>>,
    ) -> Self {
        Self {
            ctx,
            query,
            cursor: None,
            state: QueryState::Created,
            positioned: false,
            terms,
        }
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    /// Declared term names, in term order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|d| d.name.as_str())
    }

    /// Start a new pass. Always legal; resets the cursor from any state.
    pub fn iter(&mut self) {
        self.cursor = Some(self.ctx.engine.start_iterator(self.query));
        self.state = QueryState::Iterating;
        self.positioned = false;
    }

    /// Advance to the next matched row group. Returns `true` while groups
    /// remain; after `false`, the query is exhausted until the next
    /// [`iter`](Query::iter).
    pub fn next(&mut self) -> bool {
        let Some(cursor) = self.cursor else {
            tracing::warn!("next() before iter(); no pass to advance");
            return false;
        };
        if self.state == QueryState::Exhausted {
            return false;
        }
        let more = self.ctx.engine.advance(cursor);
        if more {
            self.positioned = true;
        } else {
            self.state = QueryState::Exhausted;
            self.positioned = false;
        }
        more
    }

    /// Decode the current row group for one term into bound views, one per
    /// row. Only meaningful after a `true` from [`next`](Query::next); the
    /// views are invalidated by the following `next()`.
    ///
    /// # Errors
    ///
    /// - [`BindError::UnresolvedTerm`] if `name` is not one of this query's
    ///   declared terms (checked before anything else, so a mistyped name
    ///   never decodes another term's buffer).
    /// - [`BindError::InactiveCursor`] if the cursor is not positioned on a
    ///   row group.
    pub fn field(&self, name: &str) -> Result<Vec<ComponentInstance>, BindError> {
        let term_index = self
            .terms
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| BindError::UnresolvedTerm {
                name: name.to_owned(),
                terms: self.terms().collect::<Vec<_>>().join(", "),
            })?;
        let (Some(cursor), true) = (self.cursor, self.positioned) else {
            return Err(BindError::InactiveCursor);
        };

        let engine = self.ctx.engine.as_ref();
        let descriptor = &self.terms[term_index];
        let count = engine.row_count(cursor);
        let pointers = engine.row_pointers(cursor, term_index as u32);

        let views = (0..count)
            .map(|row| {
                let handle = engine.row_pointer(pointers, row, count, descriptor.type_id);
                ComponentInstance::bound(Rc::clone(&self.ctx), Rc::clone(descriptor), handle)
            })
            .collect();
        Ok(views)
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("query", &self.query)
            .field("state", &self.state)
            .field("terms", &self.terms().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
