//! The type registry: a dense/sparse cache of compiled descriptors keyed by
//! foreign-assigned ids, with a name index on the side.
//!
//! Foreign type ids are small positive integers, so the cache is a
//! [`SparseMap`]: a `dense` array of live ids, a `sparse` array mapping an
//! id to its position in `dense`, and a parallel values array. `has`, `get`,
//! `set`, and `delete` are all O(1); `delete` swaps the last dense slot into
//! the freed position.
//!
//! Invariant: for every id within capacity, `dense[sparse[id]] == id` iff
//! the id is present.

use std::collections::HashMap;
use std::rc::Rc;

use strata_abi::{TagId, TypeId};

use crate::component::ComponentTypeDescriptor;

// ---------------------------------------------------------------------------
// SparseMap
// ---------------------------------------------------------------------------

/// Fixed-capacity sparse-set map from a small integer key to a value.
#[derive(Debug, Clone)]
pub struct SparseMap<T> {
    size: usize,
    dense: Vec<u32>,
    sparse: Vec<u32>,
    vals: Vec<Option<T>>,
}

impl<T> SparseMap<T> {
    /// Create a map accepting keys in `0..capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut vals = Vec::new();
        vals.resize_with(capacity, || None);
        Self {
            size: 0,
            dense: vec![0; capacity],
            sparse: vec![0; capacity],
            vals,
        }
    }

    pub fn capacity(&self) -> usize {
        self.dense.len()
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        for i in 0..self.size {
            self.vals[i] = None;
        }
        self.size = 0;
    }

    pub fn has(&self, member: u32) -> bool {
        let m = member as usize;
        m < self.sparse.len() && {
            let index = self.sparse[m] as usize;
            index < self.size && self.dense[index] == member
        }
    }

    pub fn get(&self, member: u32) -> Option<&T> {
        let m = member as usize;
        if m >= self.sparse.len() {
            return None;
        }
        let index = self.sparse[m] as usize;
        if index < self.size && self.dense[index] == member {
            self.vals[index].as_ref()
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, member: u32) -> Option<&mut T> {
        let m = member as usize;
        if m >= self.sparse.len() {
            return None;
        }
        let index = self.sparse[m] as usize;
        if index < self.size && self.dense[index] == member {
            self.vals[index].as_mut()
        } else {
            None
        }
    }

    /// Insert or overwrite. Returns `false` (and stores nothing) for a key
    /// at or beyond capacity.
    pub fn set(&mut self, member: u32, value: T) -> bool {
        let m = member as usize;
        if m >= self.sparse.len() {
            return false;
        }
        let index = self.sparse[m] as usize;
        if index < self.size && self.dense[index] == member {
            self.vals[index] = Some(value);
            return true;
        }
        self.dense[self.size] = member;
        self.sparse[m] = self.size as u32;
        self.vals[self.size] = Some(value);
        self.size += 1;
        true
    }

    /// Remove a key, swapping the last dense slot into its position.
    /// Returns whether the key was present.
    pub fn delete(&mut self, member: u32) -> bool {
        let m = member as usize;
        if m >= self.sparse.len() {
            return false;
        }
        let index = self.sparse[m] as usize;
        if index >= self.size || self.dense[index] != member {
            return false;
        }
        let last = self.size - 1;
        if index != last {
            let moved = self.dense[last];
            self.dense[index] = moved;
            self.vals[index] = self.vals[last].take();
            self.sparse[moved as usize] = index as u32;
        } else {
            self.vals[last] = None;
        }
        self.size -= 1;
        true
    }

    /// Live `(key, value)` pairs in dense (insertion-ish) order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        (0..self.size).filter_map(move |i| self.vals[i].as_ref().map(|v| (self.dense[i], v)))
    }
}

// ---------------------------------------------------------------------------
// TypeRegistry
// ---------------------------------------------------------------------------

/// What a declared name resolves to. Components and tags have distinct
/// foreign id namespaces but share this one lookup surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameEntry {
    Component(TypeId),
    Tag(TagId),
}

/// Process-wide cache of registered types: id -> descriptor, plus the
/// name -> id side index. Tags carry no layout and never enter the
/// descriptor cache; they only appear in the name index.
#[derive(Debug)]
pub struct TypeRegistry {
    descriptors: SparseMap<Rc<ComponentTypeDescriptor>>,
    names: HashMap<String, NameEntry>,
}

impl TypeRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            descriptors: SparseMap::with_capacity(capacity),
            names: HashMap::new(),
        }
    }

    /// Publish a component descriptor under both its id and its name.
    pub fn publish_component(&mut self, descriptor: Rc<ComponentTypeDescriptor>) {
        let id = descriptor.type_id;
        let name = descriptor.name.clone();
        if !self.descriptors.set(id.raw() as u32, descriptor) {
            tracing::warn!(
                ?id,
                name = %name,
                capacity = self.descriptors.capacity(),
                "foreign type id beyond registry capacity; descriptor not cached"
            );
            return;
        }
        self.names.insert(name, NameEntry::Component(id));
    }

    /// Publish a tag id under its name.
    pub fn publish_tag(&mut self, name: &str, tag: TagId) {
        self.names.insert(name.to_owned(), NameEntry::Tag(tag));
    }

    pub fn entry(&self, name: &str) -> Option<NameEntry> {
        self.names.get(name).copied()
    }

    pub fn descriptor(&self, id: TypeId) -> Option<Rc<ComponentTypeDescriptor>> {
        self.descriptors.get(id.raw() as u32).cloned()
    }

    pub fn descriptor_by_name(&self, name: &str) -> Option<Rc<ComponentTypeDescriptor>> {
        match self.entry(name)? {
            NameEntry::Component(id) => self.descriptor(id),
            NameEntry::Tag(_) => None,
        }
    }

    pub fn tag_id(&self, name: &str) -> Option<TagId> {
        match self.entry(name)? {
            NameEntry::Tag(id) => Some(id),
            NameEntry::Component(_) => None,
        }
    }

    /// Every registered name (components and tags), sorted -- for error
    /// messages.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
