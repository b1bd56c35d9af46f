//! In-memory [`EngineAbi`] implementation.
//!
//! Models the foreign engine's observable behavior: component types are
//! packed structs in a flat heap, entities with the same component/tag
//! signature iterate as one row group, and string/array field writes copy
//! their payload into engine-owned storage.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use strata_abi::{
    BufferHandle, CursorHandle, EngineAbi, EntityId, FieldKind, InstanceHandle, QueryId, TagId,
    TypeId,
};

use crate::heap::{Heap, Owner};

// ---------------------------------------------------------------------------
// Internal records
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct TypeDef {
    name: String,
    field_names: Vec<String>,
    kinds: Vec<FieldKind>,
    size: u32,
}

#[derive(Debug, Default)]
struct EntityRec {
    name: String,
    /// Component type id -> instance memory offset.
    components: BTreeMap<u64, u32>,
    tags: BTreeSet<u64>,
    parent: Option<u64>,
}

#[derive(Debug)]
enum CursorKind {
    /// Row groups of entity ids, plus the query's term type ids.
    Query { terms: Vec<TypeId> },
    /// One group of direct children.
    Children,
}

#[derive(Debug)]
struct Cursor {
    kind: CursorKind,
    groups: Vec<Vec<u64>>,
    /// `None` before the first `advance`.
    pos: Option<usize>,
}

impl Cursor {
    fn current(&self) -> Option<&Vec<u64>> {
        self.pos.and_then(|p| self.groups.get(p))
    }
}

#[derive(Debug)]
struct Inner {
    heap: Heap,
    types: Vec<TypeDef>,
    tags: Vec<String>,
    entities: HashMap<u64, EntityRec>,
    /// Entity ids in creation order, for deterministic grouping.
    order: Vec<u64>,
    next_entity: u64,
    queries: Vec<Vec<TypeId>>,
    cursors: Vec<Cursor>,
}

// ---------------------------------------------------------------------------
// MemEngine
// ---------------------------------------------------------------------------

/// An in-memory foreign engine.
///
/// Interior-mutable so it satisfies the `&self` ABI surface; the binding is
/// single-threaded, so a [`RefCell`] is sufficient.
#[derive(Debug)]
pub struct MemEngine {
    inner: RefCell<Inner>,
}

impl MemEngine {
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(Inner {
                heap: Heap::new(),
                types: Vec::new(),
                tags: Vec::new(),
                entities: HashMap::new(),
                order: Vec::new(),
                next_entity: 1,
                queries: Vec::new(),
                cursors: Vec::new(),
            }),
        }
    }

    /// Live buffers allocated through `alloc_buffer`/`alloc_utf8` that the
    /// binding has not released. Zero between binding operations means the
    /// binding's transient-buffer discipline holds.
    pub fn outstanding_host_buffers(&self) -> usize {
        self.inner.borrow().heap.outstanding_host()
    }

    /// Number of component types created so far.
    pub fn type_count(&self) -> usize {
        self.inner.borrow().types.len()
    }

    /// Number of tags created so far.
    pub fn tag_count(&self) -> usize {
        self.inner.borrow().tags.len()
    }

    /// Number of entities created so far.
    pub fn entity_count(&self) -> usize {
        self.inner.borrow().entities.len()
    }

    /// The field names and kinds the engine received for a component type,
    /// looked up by declared name. Lets tests assert what actually crossed
    /// the registration wire.
    pub fn type_info(&self, name: &str) -> Option<(Vec<String>, Vec<FieldKind>)> {
        let inner = self.inner.borrow();
        inner
            .types
            .iter()
            .find(|t| t.name == name)
            .map(|t| (t.field_names.clone(), t.kinds.clone()))
    }
}

impl Default for MemEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn type_def(&self, ty: TypeId) -> &TypeDef {
        let index = ty.raw() as usize;
        assert!(
            index >= 1 && index <= self.types.len(),
            "unknown component type {ty:?}"
        );
        &self.types[index - 1]
    }

    fn entity(&self, id: EntityId) -> &EntityRec {
        self.entities
            .get(&id.raw())
            .unwrap_or_else(|| panic!("unknown entity {id:?}"))
    }

    fn entity_mut(&mut self, id: EntityId) -> &mut EntityRec {
        self.entities
            .get_mut(&id.raw())
            .unwrap_or_else(|| panic!("unknown entity {id:?}"))
    }

    /// Copy a caller-owned payload buffer into engine-owned storage and
    /// store the copy's handle in the instance's pointer slot.
    fn copy_into_slot(&mut self, handle: InstanceHandle, offset: u32, value: BufferHandle) {
        let size = self.heap.size_of(value.raw());
        let copy = self.heap.alloc(size, Owner::Engine);
        self.heap.copy(value.raw(), copy, size);
        self.heap.write_u32(handle.0 + offset, copy);
    }

    fn cursor(&self, cursor: CursorHandle) -> &Cursor {
        self.cursors
            .get(cursor.0 as usize)
            .unwrap_or_else(|| panic!("unknown cursor {cursor:?}"))
    }
}

impl EngineAbi for MemEngine {
    // -- type creation ------------------------------------------------------

    fn create_component_type(
        &self,
        name: BufferHandle,
        field_names: BufferHandle,
        field_count: u32,
        field_kinds: BufferHandle,
        kind_count: u32,
    ) -> TypeId {
        assert_eq!(field_count, kind_count, "field/kind count mismatch");
        let mut inner = self.inner.borrow_mut();
        let type_name = inner.heap.read_cstr(name.raw());

        let mut names = Vec::with_capacity(field_count as usize);
        let mut kinds = Vec::with_capacity(field_count as usize);
        for i in 0..field_count {
            let name_ptr = inner.heap.read_u32(field_names.raw() + 4 * i);
            names.push(inner.heap.read_cstr(name_ptr));
            let code = inner.heap.read_u8(field_kinds.raw() + i);
            let kind = FieldKind::from_code(code)
                .unwrap_or_else(|| panic!("unknown field kind code {code} for '{type_name}'"));
            kinds.push(kind);
        }

        let size = kinds.iter().map(|k| k.size_bytes()).sum();
        tracing::debug!(name = %type_name, fields = field_count, size, "component type created");
        inner.types.push(TypeDef {
            name: type_name,
            field_names: names,
            kinds,
            size,
        });
        TypeId(inner.types.len() as u64)
    }

    fn create_tag(&self, name: BufferHandle) -> TagId {
        let mut inner = self.inner.borrow_mut();
        let tag_name = inner.heap.read_cstr(name.raw());
        inner.tags.push(tag_name);
        TagId(inner.tags.len() as u64)
    }

    // -- entity operations --------------------------------------------------

    fn create_entity(&self, name: BufferHandle) -> EntityId {
        let mut inner = self.inner.borrow_mut();
        let entity_name = if name.is_null() {
            String::new()
        } else {
            inner.heap.read_cstr(name.raw())
        };
        let id = inner.next_entity;
        inner.next_entity += 1;
        inner.entities.insert(
            id,
            EntityRec {
                name: entity_name,
                ..EntityRec::default()
            },
        );
        inner.order.push(id);
        EntityId(id)
    }

    fn add_component(&self, entity: EntityId, ty: TypeId) -> InstanceHandle {
        let mut inner = self.inner.borrow_mut();
        if let Some(&offset) = inner.entity(entity).components.get(&ty.raw()) {
            return InstanceHandle(offset);
        }
        let size = inner.type_def(ty).size;
        let offset = inner.heap.alloc(size, Owner::Engine);
        inner.entity_mut(entity).components.insert(ty.raw(), offset);
        InstanceHandle(offset)
    }

    fn add_tag(&self, entity: EntityId, tag: TagId) {
        let mut inner = self.inner.borrow_mut();
        assert!(
            tag.raw() >= 1 && tag.raw() <= inner.tags.len() as u64,
            "unknown tag {tag:?}"
        );
        inner.entity_mut(entity).tags.insert(tag.raw());
    }

    fn get_component(&self, entity: EntityId, ty: TypeId) -> InstanceHandle {
        let inner = self.inner.borrow();
        match inner.entity(entity).components.get(&ty.raw()) {
            Some(&offset) => InstanceHandle(offset),
            None => InstanceHandle::NULL,
        }
    }

    fn set_parent(&self, child: EntityId, parent: EntityId) {
        let mut inner = self.inner.borrow_mut();
        inner.entity_mut(child).parent = Some(parent.raw());
    }

    fn iterate_children(&self, parent: EntityId) -> CursorHandle {
        let mut inner = self.inner.borrow_mut();
        let children: Vec<u64> = inner
            .order
            .iter()
            .copied()
            .filter(|id| inner.entities[id].parent == Some(parent.raw()))
            .collect();
        let groups = if children.is_empty() {
            Vec::new()
        } else {
            vec![children]
        };
        inner.cursors.push(Cursor {
            kind: CursorKind::Children,
            groups,
            pos: None,
        });
        CursorHandle(inner.cursors.len() as u32 - 1)
    }

    fn child_ids(&self, cursor: CursorHandle) -> BufferHandle {
        let mut inner = self.inner.borrow_mut();
        let ids = match inner.cursor(cursor).current() {
            Some(group) => group.clone(),
            None => return BufferHandle::NULL,
        };
        let buf = inner.heap.alloc(ids.len() as u32 * 8, Owner::Engine);
        for (i, id) in ids.iter().enumerate() {
            inner.heap.write_u64(buf + 8 * i as u32, *id);
        }
        BufferHandle(buf)
    }

    // -- query operations ---------------------------------------------------

    fn create_query(&self, terms: &[TypeId]) -> QueryId {
        let mut inner = self.inner.borrow_mut();
        for &ty in terms {
            inner.type_def(ty); // validate
        }
        inner.queries.push(terms.to_vec());
        QueryId(inner.queries.len() as u32 - 1)
    }

    fn start_iterator(&self, query: QueryId) -> CursorHandle {
        let mut inner = self.inner.borrow_mut();
        let terms = inner
            .queries
            .get(query.0 as usize)
            .unwrap_or_else(|| panic!("unknown query {query:?}"))
            .clone();

        // Group matching entities by their full component+tag signature, in
        // first-seen order -- one row group per signature.
        let mut groups: Vec<(Vec<u64>, Vec<u64>, Vec<u64>)> = Vec::new();
        for &id in &inner.order {
            let rec = &inner.entities[&id];
            if !terms.iter().all(|t| rec.components.contains_key(&t.raw())) {
                continue;
            }
            let comp_sig: Vec<u64> = rec.components.keys().copied().collect();
            let tag_sig: Vec<u64> = rec.tags.iter().copied().collect();
            match groups
                .iter_mut()
                .find(|(c, t, _)| *c == comp_sig && *t == tag_sig)
            {
                Some((_, _, members)) => members.push(id),
                None => groups.push((comp_sig, tag_sig, vec![id])),
            }
        }

        inner.cursors.push(Cursor {
            kind: CursorKind::Query { terms },
            groups: groups.into_iter().map(|(_, _, members)| members).collect(),
            pos: None,
        });
        CursorHandle(inner.cursors.len() as u32 - 1)
    }

    fn advance(&self, cursor: CursorHandle) -> bool {
        let mut inner = self.inner.borrow_mut();
        let total = inner.cursor(cursor).groups.len();
        let cur = inner
            .cursors
            .get_mut(cursor.0 as usize)
            .unwrap_or_else(|| panic!("unknown cursor {cursor:?}"));
        let next = cur.pos.map_or(0, |p| p.saturating_add(1));
        cur.pos = Some(next);
        next < total
    }

    fn row_count(&self, cursor: CursorHandle) -> u32 {
        let inner = self.inner.borrow();
        inner.cursor(cursor).current().map_or(0, |g| g.len() as u32)
    }

    fn row_pointers(&self, cursor: CursorHandle, term_index: u32) -> BufferHandle {
        let mut inner = self.inner.borrow_mut();
        let (terms, members) = {
            let cur = inner.cursor(cursor);
            let terms = match &cur.kind {
                CursorKind::Query { terms } => terms.clone(),
                CursorKind::Children => panic!("row_pointers on a child cursor"),
            };
            let members = match cur.current() {
                Some(group) => group.clone(),
                None => return BufferHandle::NULL,
            };
            (terms, members)
        };
        let ty = terms
            .get(term_index as usize)
            .copied()
            .unwrap_or_else(|| panic!("term index {term_index} out of range"));

        let buf = inner.heap.alloc(members.len() as u32 * 4, Owner::Engine);
        for (i, id) in members.iter().enumerate() {
            let offset = inner.entities[id].components[&ty.raw()];
            inner.heap.write_u32(buf + 4 * i as u32, offset);
        }
        BufferHandle(buf)
    }

    fn row_pointer(
        &self,
        pointers: BufferHandle,
        row: u32,
        count: u32,
        _ty: TypeId,
    ) -> InstanceHandle {
        assert!(row < count, "row {row} out of range (count {count})");
        let inner = self.inner.borrow();
        InstanceHandle(inner.heap.read_u32(pointers.raw() + 4 * row))
    }

    // -- scalar field access ------------------------------------------------

    fn get_field_u8(&self, handle: InstanceHandle, offset: u32) -> u8 {
        self.inner.borrow().heap.read_u8(handle.0 + offset)
    }

    fn set_field_u8(&self, handle: InstanceHandle, offset: u32, value: u8) {
        self.inner.borrow_mut().heap.write_u8(handle.0 + offset, value);
    }

    fn get_field_u16(&self, handle: InstanceHandle, offset: u32) -> u16 {
        self.inner.borrow().heap.read_u16(handle.0 + offset)
    }

    fn set_field_u16(&self, handle: InstanceHandle, offset: u32, value: u16) {
        self.inner.borrow_mut().heap.write_u16(handle.0 + offset, value);
    }

    fn get_field_u32(&self, handle: InstanceHandle, offset: u32) -> u32 {
        self.inner.borrow().heap.read_u32(handle.0 + offset)
    }

    fn set_field_u32(&self, handle: InstanceHandle, offset: u32, value: u32) {
        self.inner.borrow_mut().heap.write_u32(handle.0 + offset, value);
    }

    fn get_field_u64(&self, handle: InstanceHandle, offset: u32) -> u64 {
        self.inner.borrow().heap.read_u64(handle.0 + offset)
    }

    fn set_field_u64(&self, handle: InstanceHandle, offset: u32, value: u64) {
        self.inner.borrow_mut().heap.write_u64(handle.0 + offset, value);
    }

    fn get_field_i8(&self, handle: InstanceHandle, offset: u32) -> i8 {
        self.get_field_u8(handle, offset) as i8
    }

    fn set_field_i8(&self, handle: InstanceHandle, offset: u32, value: i8) {
        self.set_field_u8(handle, offset, value as u8);
    }

    fn get_field_i16(&self, handle: InstanceHandle, offset: u32) -> i16 {
        self.get_field_u16(handle, offset) as i16
    }

    fn set_field_i16(&self, handle: InstanceHandle, offset: u32, value: i16) {
        self.set_field_u16(handle, offset, value as u16);
    }

    fn get_field_i32(&self, handle: InstanceHandle, offset: u32) -> i32 {
        self.get_field_u32(handle, offset) as i32
    }

    fn set_field_i32(&self, handle: InstanceHandle, offset: u32, value: i32) {
        self.set_field_u32(handle, offset, value as u32);
    }

    fn get_field_i64(&self, handle: InstanceHandle, offset: u32) -> i64 {
        self.get_field_u64(handle, offset) as i64
    }

    fn set_field_i64(&self, handle: InstanceHandle, offset: u32, value: i64) {
        self.set_field_u64(handle, offset, value as u64);
    }

    fn get_field_f32(&self, handle: InstanceHandle, offset: u32) -> f32 {
        self.inner.borrow().heap.read_f32(handle.0 + offset)
    }

    fn set_field_f32(&self, handle: InstanceHandle, offset: u32, value: f32) {
        self.inner.borrow_mut().heap.write_f32(handle.0 + offset, value);
    }

    fn get_field_f64(&self, handle: InstanceHandle, offset: u32) -> f64 {
        self.inner.borrow().heap.read_f64(handle.0 + offset)
    }

    fn set_field_f64(&self, handle: InstanceHandle, offset: u32, value: f64) {
        self.inner.borrow_mut().heap.write_f64(handle.0 + offset, value);
    }

    // -- string and array field access --------------------------------------

    fn get_field_str(&self, handle: InstanceHandle, offset: u32) -> BufferHandle {
        BufferHandle(self.inner.borrow().heap.read_u32(handle.0 + offset))
    }

    fn set_field_str(&self, handle: InstanceHandle, offset: u32, value: BufferHandle) {
        self.inner
            .borrow_mut()
            .copy_into_slot(handle, offset, value);
    }

    fn get_field_array_u32(&self, handle: InstanceHandle, offset: u32) -> BufferHandle {
        BufferHandle(self.inner.borrow().heap.read_u32(handle.0 + offset))
    }

    fn set_field_array_u32(&self, handle: InstanceHandle, offset: u32, value: BufferHandle) {
        self.inner
            .borrow_mut()
            .copy_into_slot(handle, offset, value);
    }

    fn get_field_array_f32(&self, handle: InstanceHandle, offset: u32) -> BufferHandle {
        BufferHandle(self.inner.borrow().heap.read_u32(handle.0 + offset))
    }

    fn set_field_array_f32(&self, handle: InstanceHandle, offset: u32, value: BufferHandle) {
        self.inner
            .borrow_mut()
            .copy_into_slot(handle, offset, value);
    }

    // -- buffer lifecycle ---------------------------------------------------

    fn alloc_buffer(&self, size_bytes: u32) -> BufferHandle {
        BufferHandle(self.inner.borrow_mut().heap.alloc(size_bytes, Owner::Host))
    }

    fn release_buffer(&self, buffer: BufferHandle) {
        self.inner.borrow_mut().heap.release(buffer.raw());
    }

    fn alloc_utf8(&self, s: &str) -> BufferHandle {
        let mut inner = self.inner.borrow_mut();
        let buf = inner.heap.alloc(s.len() as u32 + 1, Owner::Host);
        inner.heap.write_bytes(buf, s.as_bytes());
        inner.heap.write_u8(buf + s.len() as u32, 0);
        BufferHandle(buf)
    }

    fn decode_utf8(&self, buffer: BufferHandle) -> String {
        self.inner.borrow().heap.read_cstr(buffer.raw())
    }

    // -- buffer element access ----------------------------------------------

    fn read_u8(&self, buffer: BufferHandle, index: u32) -> u8 {
        self.inner.borrow().heap.read_u8(buffer.raw() + index)
    }

    fn write_u8(&self, buffer: BufferHandle, index: u32, value: u8) {
        self.inner
            .borrow_mut()
            .heap
            .write_u8(buffer.raw() + index, value);
    }

    fn read_u32(&self, buffer: BufferHandle, index: u32) -> u32 {
        self.inner.borrow().heap.read_u32(buffer.raw() + 4 * index)
    }

    fn write_u32(&self, buffer: BufferHandle, index: u32, value: u32) {
        self.inner
            .borrow_mut()
            .heap
            .write_u32(buffer.raw() + 4 * index, value);
    }

    fn read_f32(&self, buffer: BufferHandle, index: u32) -> f32 {
        self.inner.borrow().heap.read_f32(buffer.raw() + 4 * index)
    }

    fn write_f32(&self, buffer: BufferHandle, index: u32, value: f32) {
        self.inner
            .borrow_mut()
            .heap
            .write_f32(buffer.raw() + 4 * index, value);
    }

    fn read_u64(&self, buffer: BufferHandle, index: u32) -> u64 {
        self.inner.borrow().heap.read_u64(buffer.raw() + 8 * index)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
