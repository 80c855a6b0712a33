//! Bump-pointer block allocator backing [`crate::skiplist`].
//!
//! A memtable never frees individual nodes; it frees the whole arena at
//! once when the memtable itself is dropped. That lets insertion use a
//! trivial pointer-bump allocator instead of the system allocator per
//! node, and lets [`Arena::memory_usage`] report a cheap running total
//! instead of walking the skip list.

use std::alloc::{Layout, alloc};
use std::sync::atomic::{AtomicUsize, Ordering};

const BLOCK_SIZE: usize = 4096;

/// A growable, never-freed pool of memory. Allocations larger than 1/4 of
/// a block get their own dedicated block so a single oversized value
/// doesn't waste the rest of a shared block.
pub struct Arena {
    blocks: Vec<Vec<u8>>,
    ptr: *mut u8,
    bytes_remaining: usize,
    /// Total bytes handed out via [`Arena::allocate`]/[`Arena::allocate_aligned`],
    /// tracked independently of `blocks`' capacity so memory usage
    /// accounting doesn't depend on allocator internals.
    memory_usage: AtomicUsize,
}

// Safety: Arena is only ever accessed through `&mut` from the single
// writer that owns the memtable it backs; `memory_usage` is the one
// field read concurrently (for `ApproximateMemoryUsage`), hence atomic.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    pub fn new() -> Self {
        Arena {
            blocks: Vec::new(),
            ptr: std::ptr::null_mut(),
            bytes_remaining: 0,
            memory_usage: AtomicUsize::new(0),
        }
    }

    /// Allocates `bytes` with no particular alignment guarantee beyond
    /// byte alignment.
    pub fn allocate(&mut self, bytes: usize) -> *mut u8 {
        assert!(bytes > 0);
        if bytes <= self.bytes_remaining {
            let result = self.ptr;
            unsafe {
                self.ptr = self.ptr.add(bytes);
            }
            self.bytes_remaining -= bytes;
            return result;
        }
        self.allocate_fallback(bytes)
    }

    /// Allocates `bytes` aligned to the platform's pointer size, as the
    /// skip list's atomic node pointers require.
    pub fn allocate_aligned(&mut self, bytes: usize) -> *mut u8 {
        let align = std::mem::size_of::<usize>().max(8);
        assert!(align.is_power_of_two());
        let current_mod = (self.ptr as usize) & (align - 1);
        let slop = if current_mod == 0 { 0 } else { align - current_mod };
        let needed = bytes + slop;
        if needed <= self.bytes_remaining {
            let result = unsafe { self.ptr.add(slop) };
            unsafe {
                self.ptr = self.ptr.add(needed);
            }
            self.bytes_remaining -= needed;
            return result;
        }
        // AllocateFallback always returns aligned memory since it either
        // carves out of a fresh, page-aligned block or mallocs the
        // oversized request directly.
        self.allocate_fallback(bytes)
    }

    fn allocate_fallback(&mut self, bytes: usize) -> *mut u8 {
        if bytes > BLOCK_SIZE / 4 {
            // Object is more than a quarter of a block: give it its own
            // allocation so the rest of the current block isn't wasted
            // chasing it.
            return self.allocate_new_block(bytes);
        }

        let new_block_ptr = self.allocate_new_block(BLOCK_SIZE);
        self.ptr = unsafe { new_block_ptr.add(bytes) };
        self.bytes_remaining = BLOCK_SIZE - bytes;
        new_block_ptr
    }

    fn allocate_new_block(&mut self, block_bytes: usize) -> *mut u8 {
        let layout = Layout::from_size_align(block_bytes, 8).expect("valid layout");
        let raw = unsafe { alloc(layout) };
        assert!(!raw.is_null(), "system allocator exhausted");
        let block = unsafe { Vec::from_raw_parts(raw, 0, block_bytes) };
        self.blocks.push(block);
        self.memory_usage.fetch_add(
            block_bytes + std::mem::size_of::<Vec<u8>>(),
            Ordering::Relaxed,
        );
        raw
    }

    /// Approximate total bytes allocated, including per-block bookkeeping
    /// overhead. Safe to call from another thread while the owning
    /// memtable is being written to.
    pub fn memory_usage(&self) -> usize {
        self.memory_usage.load(Ordering::Relaxed)
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        for block in self.blocks.drain(..) {
            let mut block = std::mem::ManuallyDrop::new(block);
            let layout = Layout::from_size_align(block.capacity(), 8).expect("valid layout");
            unsafe {
                std::alloc::dealloc(block.as_mut_ptr(), layout);
            }
        }
    }
}
