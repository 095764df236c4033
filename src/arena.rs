//! Per-request bump allocator.
//!
//! A request produces many short-lived values at once: duplicated header
//! strings, scratch buffers, intermediate JSON fragments. An [`Arena`] turns
//! those N small allocations into pointer bumps inside a few large blocks,
//! and turns teardown into a single drop (or an O(blocks) [`reset`]) instead
//! of N individual frees.
//!
//! ```text
//! blocks:  [ block 0 ][ block 1 ][ block 2 ]
//!            used ███░░   ██████   ██░░░░░
//!                                  ↑ current
//! ```
//!
//! Allocation only ever moves `current` forward. When the current block is
//! full, the arena reuses a later block kept alive by [`reset`], and only
//! then asks the system allocator for a new one of
//! `max(aligned_size, block_size)` bytes.
//!
//! Every slice handed out borrows the arena. The borrow checker therefore
//! enforces the one rule that matters: nothing that points into arena memory
//! survives a [`reset`] or the arena itself.
//!
//! ```rust
//! use sprig::Arena;
//!
//! let arena = Arena::with_block_size(1024).unwrap();
//! let name = arena.strdup("alice").unwrap();
//! let scratch = arena.calloc(4, 8).unwrap();
//!
//! assert_eq!(name, "alice");
//! assert!(scratch.iter().all(|&b| b == 0));
//! assert_eq!(arena.used(), 8 + 32);
//! ```
//!
//! [`reset`]: Arena::reset

use std::alloc::{self, Layout};
use std::cell::RefCell;
use std::fmt;
use std::ptr::NonNull;

use tracing::{trace, warn};

use crate::error::{Error, ErrorKind};

/// Default size of each arena block (64 KiB).
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Alignment of every allocation and every block.
pub const ALIGNMENT: usize = 8;

fn align_up(size: usize) -> Option<usize> {
    Some(size.checked_add(ALIGNMENT - 1)? & !(ALIGNMENT - 1))
}

// ── Block ─────────────────────────────────────────────────────────────────────

/// One fixed-capacity, zero-initialised buffer.
struct Block {
    data: NonNull<u8>,
    size: usize,
    used: usize,
}

impl Block {
    /// Returns `None` when the system allocator is out of memory.
    fn new(size: usize) -> Option<Self> {
        let layout = Layout::from_size_align(size, ALIGNMENT).ok()?;
        // SAFETY: callers never pass a zero size, and ALIGNMENT is a power of two.
        let data = NonNull::new(unsafe { alloc::alloc_zeroed(layout) })?;
        Some(Self { data, size, used: 0 })
    }

    fn remaining(&self) -> usize {
        self.size - self.used
    }

    /// Hands out the next `len` bytes. `len` is already aligned.
    fn bump(&mut self, len: usize) -> NonNull<u8> {
        debug_assert!(len <= self.remaining());
        // SAFETY: used + len <= size, so the offset stays inside the allocation.
        let ptr = unsafe { self.data.add(self.used) };
        self.used += len;
        ptr
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: `data` was allocated in `Block::new` with exactly this layout.
        unsafe {
            alloc::dealloc(
                self.data.as_ptr(),
                Layout::from_size_align_unchecked(self.size, ALIGNMENT),
            );
        }
    }
}

// SAFETY: a Block uniquely owns its allocation; moving it to another thread
// moves that ownership with it.
unsafe impl Send for Block {}

struct Blocks {
    list: Vec<Block>,
    current: usize,
    total_allocated: usize,
}

// ── Arena ─────────────────────────────────────────────────────────────────────

/// A bump-pointer block allocator owning the memory of one request.
///
/// `Arena` is `Send` (a request may hop worker threads between polls) but not
/// `Sync`: it is owned by exactly one request at a time, so allocation takes
/// no lock.
pub struct Arena {
    blocks: RefCell<Blocks>,
    block_size: usize,
}

impl Arena {
    /// Creates an arena with one [`DEFAULT_BLOCK_SIZE`] block.
    pub fn new() -> Result<Self, Error> {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    /// Creates an arena with one block of `block_size` bytes; later blocks
    /// use the same size unless a single allocation needs more.
    ///
    /// Fails with [`ErrorKind::OutOfMemory`] if the first block cannot be
    /// allocated, or [`ErrorKind::InvalidArgument`] for a zero block size.
    pub fn with_block_size(block_size: usize) -> Result<Self, Error> {
        if block_size == 0 {
            return Err(ErrorKind::InvalidArgument.into());
        }
        let first = Block::new(block_size).ok_or(ErrorKind::OutOfMemory)?;
        Ok(Self {
            blocks: RefCell::new(Blocks {
                list: vec![first],
                current: 0,
                total_allocated: block_size,
            }),
            block_size,
        })
    }

    /// Allocates `size` bytes aligned to [`ALIGNMENT`].
    ///
    /// Returns `None` for `size == 0`, and otherwise only when the system
    /// allocator fails: a full block is never an error, the arena grows.
    /// The contents are unspecified (zero for fresh blocks, stale bytes after
    /// a [`reset`](Arena::reset)); use [`calloc`](Arena::calloc) for zeroes.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc(&self, size: usize) -> Option<&mut [u8]> {
        if size == 0 {
            return None;
        }
        let aligned = align_up(size)?;
        let ptr = self.bump(aligned)?;
        // SAFETY: `ptr` starts `aligned >= size` initialised bytes inside a
        // block owned by `self`. Blocks are only freed or rewound through
        // `&mut self` or by value, so the memory outlives this borrow, and
        // every range is handed out exactly once, so slices never alias.
        Some(unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), size) })
    }

    /// Allocates `count * size` zeroed bytes. Overflow yields `None`.
    #[allow(clippy::mut_from_ref)]
    pub fn calloc(&self, count: usize, size: usize) -> Option<&mut [u8]> {
        let region = self.alloc(count.checked_mul(size)?)?;
        region.fill(0);
        Some(region)
    }

    /// Copies `s` into the arena, NUL-terminated. The returned view excludes
    /// the terminator.
    pub fn strdup(&self, s: &str) -> Option<&str> {
        self.copy_str(s)
    }

    /// Like [`strdup`](Arena::strdup), keeping at most `max_len` bytes. The cut
    /// moves back to the nearest UTF-8 character boundary.
    pub fn strndup(&self, s: &str, max_len: usize) -> Option<&str> {
        let mut len = s.len().min(max_len);
        while !s.is_char_boundary(len) {
            len -= 1;
        }
        self.copy_str(&s[..len])
    }

    fn copy_str(&self, s: &str) -> Option<&str> {
        let len = s.len();
        let region = self.alloc(len.checked_add(1)?)?;
        let (text, terminator) = region.split_at_mut(len);
        text.copy_from_slice(s.as_bytes());
        terminator[0] = 0;
        let text: &[u8] = text;
        // SAFETY: the bytes were copied from a `&str` cut on a char boundary.
        Some(unsafe { std::str::from_utf8_unchecked(text) })
    }

    /// Marks every block unused and rewinds to the first block.
    ///
    /// No memory is returned to the system and [`total_allocated`] is
    /// unchanged, so a reset arena can serve the next request without
    /// touching the system allocator.
    ///
    /// [`total_allocated`]: Arena::total_allocated
    pub fn reset(&mut self) {
        let blocks = self.blocks.get_mut();
        for block in &mut blocks.list {
            block.used = 0;
        }
        blocks.current = 0;
    }

    /// Frees every block. Equivalent to dropping the arena.
    pub fn destroy(self) {
        trace!(
            blocks = self.block_count(),
            total_allocated = self.total_allocated(),
            used = self.used(),
            "arena destroyed"
        );
    }

    /// Sum of the capacities of every block ever created.
    pub fn total_allocated(&self) -> usize {
        self.blocks.borrow().total_allocated
    }

    /// Bytes currently handed out, including alignment padding.
    pub fn used(&self) -> usize {
        self.blocks.borrow().list.iter().map(|b| b.used).sum()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.borrow().list.len()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn bump(&self, aligned: usize) -> Option<NonNull<u8>> {
        let mut blocks = self.blocks.borrow_mut();
        let current = blocks.current;
        if blocks.list[current].remaining() >= aligned {
            return Some(blocks.list[current].bump(aligned));
        }

        // Blocks past `current` are untouched since the last reset.
        if let Some(offset) = blocks.list[current + 1..].iter().position(|b| b.size >= aligned) {
            let index = current + 1 + offset;
            blocks.current = index;
            return Some(blocks.list[index].bump(aligned));
        }

        let size = aligned.max(self.block_size);
        let Some(mut block) = Block::new(size) else {
            warn!(size, "arena block allocation failed");
            return None;
        };
        if blocks.list.try_reserve(1).is_err() {
            warn!(size, "arena block list could not grow");
            return None;
        }
        let ptr = block.bump(aligned);
        blocks.list.push(block);
        blocks.current = blocks.list.len() - 1;
        blocks.total_allocated += size;
        Some(ptr)
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("block_size", &self.block_size)
            .field("blocks", &self.block_count())
            .field("used", &self.used())
            .field("total_allocated", &self.total_allocated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_arena_has_one_default_block() {
        let arena = Arena::new().unwrap();
        assert_eq!(arena.total_allocated(), DEFAULT_BLOCK_SIZE);
        assert_eq!(arena.used(), 0);
        assert_eq!(arena.block_count(), 1);
    }

    #[test]
    fn custom_block_size() {
        let arena = Arena::with_block_size(1024).unwrap();
        assert_eq!(arena.total_allocated(), 1024);
        assert_eq!(arena.block_size(), 1024);
    }

    #[test]
    fn zero_block_size_is_rejected() {
        let err = Arena::with_block_size(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn alloc_zero_is_none() {
        let arena = Arena::new().unwrap();
        assert!(arena.alloc(0).is_none());
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn allocations_are_aligned_and_padded() {
        let arena = Arena::new().unwrap();
        let a = arena.alloc(3).unwrap();
        let b = arena.alloc(5).unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 5);
        assert_eq!(a.as_ptr() as usize % ALIGNMENT, 0);
        assert_eq!(b.as_ptr() as usize % ALIGNMENT, 0);
        assert_eq!(arena.used(), 16);
    }

    #[test]
    fn allocations_never_overlap() {
        let arena = Arena::with_block_size(256).unwrap();
        let mut regions = Vec::new();
        let mut expected_used = 0;

        for i in 0..300usize {
            let size = i % 200 + 1;
            let fill = (i % 251) as u8;
            let region = arena.alloc(size).unwrap();
            region.fill(fill);
            regions.push((region, fill));
            expected_used += align_up(size).unwrap();
        }

        assert_eq!(arena.used(), expected_used);

        let mut spans: Vec<_> = regions
            .iter()
            .map(|(r, _)| (r.as_ptr() as usize, r.as_ptr() as usize + r.len()))
            .collect();
        spans.sort_unstable();
        for pair in spans.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "{:?} and {:?} overlap", pair[0], pair[1]);
        }

        // Later allocations never clobbered earlier ones.
        for (region, fill) in &regions {
            assert!(region.iter().all(|b| b == fill));
        }
    }

    #[test]
    fn full_block_grows_the_chain() {
        let arena = Arena::with_block_size(64).unwrap();
        arena.alloc(48).unwrap();
        arena.alloc(48).unwrap();
        assert_eq!(arena.block_count(), 2);
        assert_eq!(arena.total_allocated(), 128);
        assert_eq!(arena.used(), 96);
    }

    #[test]
    fn oversized_allocation_gets_its_own_block() {
        let arena = Arena::with_block_size(1024).unwrap();
        let region = arena.alloc(2048).unwrap();
        assert_eq!(region.len(), 2048);
        assert!(arena.total_allocated() >= 1024 + 2048);
        assert_eq!(arena.block_count(), 2);
    }

    #[test]
    fn reset_keeps_capacity() {
        let mut arena = Arena::with_block_size(1024).unwrap();
        arena.alloc(1000).unwrap();
        arena.alloc(2000).unwrap();
        let total = arena.total_allocated();
        let blocks = arena.block_count();
        assert_ne!(arena.used(), 0);

        arena.reset();

        assert_eq!(arena.used(), 0);
        assert_eq!(arena.total_allocated(), total);
        assert_eq!(arena.block_count(), blocks);
    }

    #[test]
    fn reset_reuses_existing_blocks_before_growing() {
        let mut arena = Arena::with_block_size(64).unwrap();
        arena.alloc(64).unwrap();
        arena.alloc(64).unwrap();
        assert_eq!(arena.total_allocated(), 128);

        arena.reset();
        arena.alloc(64).unwrap();
        arena.alloc(64).unwrap();

        assert_eq!(arena.total_allocated(), 128);
        assert_eq!(arena.block_count(), 2);
        assert_eq!(arena.used(), 128);
    }

    #[test]
    fn calloc_zeroes_recycled_memory() {
        let mut arena = Arena::with_block_size(128).unwrap();
        arena.alloc(64).unwrap().fill(0xAB);
        arena.reset();

        let zeroed = arena.calloc(8, 8).unwrap();
        assert_eq!(zeroed.len(), 64);
        assert!(zeroed.iter().all(|&b| b == 0));
    }

    #[test]
    fn calloc_overflow_is_none() {
        let arena = Arena::new().unwrap();
        assert!(arena.calloc(usize::MAX, 2).is_none());
        assert!(arena.alloc(usize::MAX).is_none());
    }

    #[test]
    fn strdup_copies_and_terminates() {
        let arena = Arena::new().unwrap();
        let copy = arena.strdup("Hello, World!").unwrap();
        assert_eq!(copy, "Hello, World!");
        // 13 bytes + NUL, padded to 16.
        assert_eq!(arena.used(), 16);
    }

    #[test]
    fn strdup_of_empty_string() {
        let arena = Arena::new().unwrap();
        assert_eq!(arena.strdup("").unwrap(), "");
        assert_eq!(arena.used(), ALIGNMENT);
    }

    #[test]
    fn absent_input_stays_absent() {
        let arena = Arena::new().unwrap();
        let missing: Option<&str> = None;
        assert!(missing.and_then(|s| arena.strdup(s)).is_none());
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn strndup_truncates() {
        let arena = Arena::new().unwrap();
        assert_eq!(arena.strndup("Hello, World!", 5).unwrap(), "Hello");
        assert_eq!(arena.strndup("abc", 10).unwrap(), "abc");
    }

    #[test]
    fn strndup_respects_char_boundaries() {
        let arena = Arena::new().unwrap();
        // 'é' occupies bytes 1..3.
        assert_eq!(arena.strndup("héllo", 2).unwrap(), "h");
        assert_eq!(arena.strndup("héllo", 3).unwrap(), "hé");
    }

    #[test]
    fn many_small_allocations() {
        let arena = Arena::new().unwrap();
        for _ in 0..1000 {
            assert!(arena.alloc(64).is_some());
        }
        assert_eq!(arena.used(), 64_000);
        assert_eq!(arena.block_count(), 1);
    }

    #[test]
    fn destroy_fresh_arena() {
        let arena = Arena::new().unwrap();
        arena.destroy();
    }
}
