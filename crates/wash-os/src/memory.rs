//! Process linear memory with a bump allocator.
//!
//! ```text
//! 0 ........ heap_base ........ heap_top ........ size
//! | constant data | allocated   | free             |
//! ```
//!
//! Address 0 is never handed out, so callers may treat it as a null pointer.

use crate::error::{OsError, OsResult};

/// Size of one WebAssembly page.
pub const PAGE_SIZE: u32 = 65_536;

/// Bump allocator state.
///
/// Lives with the process rather than the bytes, so the same heap can be
/// driven over the process's own memory or over an engine's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heap {
    base: u32,
    /// Next free byte.
    top: u32,
}

impl Heap {
    pub fn new(base: u32) -> Self {
        Self { base, top: base }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn top(&self) -> u32 {
        self.top
    }
}

/// Memory bytes borrowed together with the heap that allocates from them.
#[derive(Debug)]
pub struct MemoryView<'m> {
    bytes: &'m mut [u8],
    heap: &'m mut Heap,
}

impl<'m> MemoryView<'m> {
    pub fn new(bytes: &'m mut [u8], heap: &'m mut Heap) -> Self {
        Self { bytes, heap }
    }

    pub fn size(&self) -> u32 {
        size_of(self.bytes)
    }

    pub fn heap_base(&self) -> u32 {
        self.heap.base
    }

    pub fn heap_top(&self) -> u32 {
        self.heap.top
    }

    /// Bytes still available to [`alloc`](Self::alloc).
    pub fn available(&self) -> u32 {
        self.size().saturating_sub(self.heap.top)
    }

    /// Check that `[addr, addr + len)` lies inside memory.
    pub fn check_range(&self, addr: u32, len: u32) -> OsResult<()> {
        check_range(self.bytes, addr, len)
    }

    pub fn read(&self, addr: u32, len: u32) -> OsResult<&[u8]> {
        read(self.bytes, addr, len)
    }

    pub fn write(&mut self, addr: u32, data: &[u8]) -> OsResult<()> {
        let len = u32::try_from(data.len()).map_err(|_| OsError::OutOfBounds {
            addr,
            len: u32::MAX,
            size: self.size(),
        })?;
        check_range(self.bytes, addr, len)?;
        self.bytes[addr as usize..(addr + len) as usize].copy_from_slice(data);
        Ok(())
    }

    /// Bump-allocate `len` bytes; returns the pointer.
    pub fn alloc(&mut self, len: u32) -> OsResult<u32> {
        if len > self.available() {
            return Err(OsError::OutOfMemory {
                requested: len,
                available: self.available(),
            });
        }
        let ptr = self.heap.top;
        self.heap.top += len;
        Ok(ptr)
    }
}

impl AsRef<[u8]> for MemoryView<'_> {
    fn as_ref(&self) -> &[u8] {
        self.bytes
    }
}

/// One process's own linear memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessMemory {
    bytes: Vec<u8>,
    heap: Heap,
}

impl ProcessMemory {
    /// Memory of `pages` WebAssembly pages with the heap starting at
    /// `heap_base`.
    pub fn new(pages: u32, heap_base: u32) -> Self {
        Self::with_size(pages.saturating_mul(PAGE_SIZE), heap_base)
    }

    /// Memory of exactly `size` bytes.
    pub fn with_size(size: u32, heap_base: u32) -> Self {
        let heap_base = heap_base.clamp(1, size.max(1));
        Self {
            bytes: vec![0; size as usize],
            heap: Heap::new(heap_base),
        }
    }

    pub fn size(&self) -> u32 {
        size_of(&self.bytes)
    }

    pub fn heap_base(&self) -> u32 {
        self.heap.base
    }

    pub fn heap_top(&self) -> u32 {
        self.heap.top
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Bytes still available to [`alloc`](Self::alloc).
    pub fn available(&self) -> u32 {
        self.size().saturating_sub(self.heap.top)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Borrow the bytes and heap together.
    pub fn view(&mut self) -> MemoryView<'_> {
        MemoryView::new(&mut self.bytes, &mut self.heap)
    }

    /// Check that `[addr, addr + len)` lies inside memory.
    pub fn check_range(&self, addr: u32, len: u32) -> OsResult<()> {
        check_range(&self.bytes, addr, len)
    }

    pub fn read(&self, addr: u32, len: u32) -> OsResult<&[u8]> {
        read(&self.bytes, addr, len)
    }

    pub fn write(&mut self, addr: u32, data: &[u8]) -> OsResult<()> {
        self.view().write(addr, data)
    }

    /// Bump-allocate `len` bytes; returns the pointer.
    pub fn alloc(&mut self, len: u32) -> OsResult<u32> {
        self.view().alloc(len)
    }
}

impl AsRef<[u8]> for ProcessMemory {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

fn size_of(bytes: &[u8]) -> u32 {
    u32::try_from(bytes.len()).unwrap_or(u32::MAX)
}

fn check_range(bytes: &[u8], addr: u32, len: u32) -> OsResult<()> {
    match addr.checked_add(len) {
        Some(end) if end <= size_of(bytes) => Ok(()),
        _ => Err(OsError::OutOfBounds {
            addr,
            len,
            size: size_of(bytes),
        }),
    }
}

fn read(bytes: &[u8], addr: u32, len: u32) -> OsResult<&[u8]> {
    check_range(bytes, addr, len)?;
    Ok(&bytes[addr as usize..(addr + len) as usize])
}
