//! Flat byte heap backing [`MemEngine`](crate::MemEngine).
//!
//! A bump allocator over one growable `Vec<u8>`. Offset 0 is reserved as the
//! null handle, allocations are 8-byte aligned, and freed regions are never
//! reused -- so a stale handle reads zeroed-or-old data instead of silently
//! aliasing a newer allocation, and double-release is detectable.

use std::collections::HashMap;

/// Who is responsible for releasing an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Owner {
    /// Allocated through the ABI's `alloc_buffer`/`alloc_utf8` -- the
    /// binding must release it.
    Host,
    /// Engine-internal storage (instance memory, copied payloads, cursor
    /// scratch buffers) -- never released through the ABI.
    Engine,
}

#[derive(Debug)]
struct Allocation {
    size: u32,
    owner: Owner,
    live: bool,
}

#[derive(Debug)]
pub(crate) struct Heap {
    bytes: Vec<u8>,
    allocations: HashMap<u32, Allocation>,
    next: u32,
}

impl Heap {
    pub(crate) fn new() -> Self {
        Self {
            bytes: vec![0; 1024],
            allocations: HashMap::new(),
            // Offset 0 stays unallocated so it can serve as the null handle.
            next: 8,
        }
    }

    /// Allocate `size` zero-filled bytes, returning the offset.
    ///
    /// Zero-size allocations still get a distinct offset so handles stay
    /// unique keys in the accounting map.
    pub(crate) fn alloc(&mut self, size: u32, owner: Owner) -> u32 {
        let offset = self.next;
        let reserved = size.max(1);
        self.next = (offset + reserved + 7) & !7;
        let end = self.next as usize;
        if end > self.bytes.len() {
            self.bytes.resize(end.next_power_of_two(), 0);
        }
        self.allocations.insert(
            offset,
            Allocation {
                size,
                owner,
                live: true,
            },
        );
        offset
    }

    /// Release a host-owned allocation.
    ///
    /// # Panics
    ///
    /// Panics on an unknown offset, a double release, or an attempt to
    /// release engine-owned storage -- each of those is a binding bug the
    /// test should surface.
    pub(crate) fn release(&mut self, offset: u32) {
        let alloc = self
            .allocations
            .get_mut(&offset)
            .unwrap_or_else(|| panic!("release of unknown buffer {offset:#x}"));
        assert!(alloc.live, "double release of buffer {offset:#x}");
        assert_eq!(
            alloc.owner,
            Owner::Host,
            "release of engine-owned buffer {offset:#x}"
        );
        alloc.live = false;
    }

    /// Size recorded for an allocation (releasedness ignored).
    pub(crate) fn size_of(&self, offset: u32) -> u32 {
        self.allocations
            .get(&offset)
            .unwrap_or_else(|| panic!("size_of unknown buffer {offset:#x}"))
            .size
    }

    /// Number of live host-owned allocations.
    pub(crate) fn outstanding_host(&self) -> usize {
        self.allocations
            .values()
            .filter(|a| a.live && a.owner == Owner::Host)
            .count()
    }

    // -- raw access ---------------------------------------------------------

    fn slice(&self, offset: u32, len: u32) -> &[u8] {
        let start = offset as usize;
        let end = start + len as usize;
        assert!(
            offset != 0 && end <= self.bytes.len(),
            "read outside heap: offset={offset:#x} len={len}"
        );
        &self.bytes[start..end]
    }

    fn slice_mut(&mut self, offset: u32, len: u32) -> &mut [u8] {
        let start = offset as usize;
        let end = start + len as usize;
        assert!(
            offset != 0 && end <= self.bytes.len(),
            "write outside heap: offset={offset:#x} len={len}"
        );
        &mut self.bytes[start..end]
    }

    pub(crate) fn write_bytes(&mut self, offset: u32, data: &[u8]) {
        self.slice_mut(offset, data.len() as u32).copy_from_slice(data);
    }

    pub(crate) fn copy(&mut self, src: u32, dst: u32, len: u32) {
        let data = self.slice(src, len).to_vec();
        self.write_bytes(dst, &data);
    }

    // -- little-endian scalars ----------------------------------------------

    pub(crate) fn read_u8(&self, offset: u32) -> u8 {
        self.slice(offset, 1)[0]
    }

    pub(crate) fn write_u8(&mut self, offset: u32, value: u8) {
        self.slice_mut(offset, 1)[0] = value;
    }

    pub(crate) fn read_u16(&self, offset: u32) -> u16 {
        u16::from_le_bytes(self.slice(offset, 2).try_into().expect("2-byte slice"))
    }

    pub(crate) fn write_u16(&mut self, offset: u32, value: u16) {
        self.write_bytes(offset, &value.to_le_bytes());
    }

    pub(crate) fn read_u32(&self, offset: u32) -> u32 {
        u32::from_le_bytes(self.slice(offset, 4).try_into().expect("4-byte slice"))
    }

    pub(crate) fn write_u32(&mut self, offset: u32, value: u32) {
        self.write_bytes(offset, &value.to_le_bytes());
    }

    pub(crate) fn read_u64(&self, offset: u32) -> u64 {
        u64::from_le_bytes(self.slice(offset, 8).try_into().expect("8-byte slice"))
    }

    pub(crate) fn write_u64(&mut self, offset: u32, value: u64) {
        self.write_bytes(offset, &value.to_le_bytes());
    }

    pub(crate) fn read_f32(&self, offset: u32) -> f32 {
        f32::from_bits(self.read_u32(offset))
    }

    pub(crate) fn write_f32(&mut self, offset: u32, value: f32) {
        self.write_u32(offset, value.to_bits());
    }

    pub(crate) fn read_f64(&self, offset: u32) -> f64 {
        f64::from_bits(self.read_u64(offset))
    }

    pub(crate) fn write_f64(&mut self, offset: u32, value: f64) {
        self.write_u64(offset, value.to_bits());
    }

    // -- strings ------------------------------------------------------------

    /// Read a NUL-terminated string starting at `offset`.
    pub(crate) fn read_cstr(&self, offset: u32) -> String {
        let start = offset as usize;
        assert!(
            offset != 0 && start < self.bytes.len(),
            "read_cstr outside heap: offset={offset:#x}"
        );
        let tail = &self.bytes[start..];
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .unwrap_or_else(|| panic!("unterminated string at {offset:#x}"));
        String::from_utf8_lossy(&tail[..len]).into_owned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
