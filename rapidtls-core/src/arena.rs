//! Handshake-scoped arena allocation.
//!
//! The handshake allocates many short-lived odds and ends (transcript
//! chunks, parsed extensions, certificate scratch). An [`Arena`] hands
//! those out from one grow-only buffer and frees them all at once on
//! reset; the [`ArenaPool`] recycles arenas between handshakes with their
//! capacity retained.
//!
//! Arena memory is strictly handshake-scoped. The data plane never holds
//! arena allocations across a record boundary; its buffers come from the
//! record buffer pool instead, and the scoped handle is deliberately not
//! cloneable so an arena cannot leak across subsystem boundaries.

use std::ops::Range;
use std::sync::{Arc, Mutex};

/// Default initial arena capacity.
pub const DEFAULT_ARENA_CAPACITY: usize = 64 * 1024;

/// A grow-only bump allocator over one retained buffer.
///
/// Allocations are handed out as [`ArenaRef`] ranges rather than borrows
/// so the arena can keep growing while references are outstanding; a
/// [`reset`](Arena::reset) invalidates every outstanding ref at once and
/// keeps the capacity.
#[derive(Debug)]
pub struct Arena {
    buf: Vec<u8>,
}

/// A range handed out by [`Arena::alloc`]. Invalidated by the arena's
/// reset; there is no individual free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaRef {
    range: Range<usize>,
}

impl ArenaRef {
    /// Length of the allocation in bytes.
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Whether the allocation is empty.
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

impl Arena {
    /// Create an arena with the default initial capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ARENA_CAPACITY)
    }

    /// Create an arena with a chosen initial capacity.
    ///
    /// Allocations past the capacity grow the backing buffer from the
    /// global allocator; the arena never fragments because everything is
    /// freed together.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Allocate `len` zeroed bytes.
    pub fn alloc(&mut self, len: usize) -> ArenaRef {
        let start = self.buf.len();
        self.buf.resize(start + len, 0);
        ArenaRef {
            range: start..start + len,
        }
    }

    /// Allocate a copy of `data`.
    pub fn alloc_slice(&mut self, data: &[u8]) -> ArenaRef {
        let start = self.buf.len();
        self.buf.extend_from_slice(data);
        ArenaRef {
            range: start..start + data.len(),
        }
    }

    /// View an allocation.
    ///
    /// # Panics
    ///
    /// If `r` was invalidated by a reset.
    pub fn get(&self, r: &ArenaRef) -> &[u8] {
        &self.buf[r.range.clone()]
    }

    /// View an allocation mutably.
    pub fn get_mut(&mut self, r: &ArenaRef) -> &mut [u8] {
        &mut self.buf[r.range.clone()]
    }

    /// Bytes currently allocated.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing is allocated.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Drop every allocation at once; capacity is retained.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

struct PoolArena {
    /// `None` while checked out
    arena: Option<Box<Arena>>,

    /// Heap address of the boxed arena, the slot's identity
    addr: usize,

    in_use: bool,
}

/// Mutex-guarded pool of reusable arenas.
#[derive(Debug)]
pub struct ArenaPool {
    initial_capacity: usize,
    inner: Mutex<Vec<PoolArena>>,
}

impl std::fmt::Debug for PoolArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolArena").field("in_use", &self.in_use).finish_non_exhaustive()
    }
}

impl ArenaPool {
    /// Create a pool whose arenas start at the default capacity.
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_ARENA_CAPACITY)
    }

    /// Create a pool whose arenas start at `initial_capacity` bytes.
    pub fn with_capacity(initial_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            initial_capacity,
            inner: Mutex::new(Vec::new()),
        })
    }

    /// Check out an arena, reset and ready to use.
    pub fn acquire(self: &Arc<Self>) -> ScopedArena {
        let mut slots = self.inner.lock().expect("arena pool poisoned");

        let free = slots.iter().position(|slot| !slot.in_use && slot.arena.is_some());
        let arena = match free {
            Some(index) => {
                let slot = &mut slots[index];
                slot.in_use = true;
                let mut arena = slot.arena.take().expect("free slot has arena");
                arena.reset();
                arena
            },
            None => {
                let arena = Box::new(Arena::with_capacity(self.initial_capacity));
                slots.push(PoolArena {
                    addr: &*arena as *const Arena as usize,
                    arena: None,
                    in_use: true,
                });
                arena
            },
        };
        drop(slots);

        ScopedArena {
            arena: Some(arena),
            pool: Arc::clone(self),
        }
    }

    fn release_raw(&self, arena: Box<Arena>) {
        let addr = &*arena as *const Arena as usize;
        let mut slots = self.inner.lock().expect("arena pool poisoned");
        let slot = slots
            .iter_mut()
            .find(|slot| slot.addr == addr)
            .expect("released arena does not belong to this pool");
        assert!(slot.in_use, "arena released twice");
        slot.arena = Some(arena);
        slot.in_use = false;
    }

    /// Number of arenas (checked out or idle) owned by the pool.
    pub fn arena_count(&self) -> usize {
        self.inner.lock().expect("arena pool poisoned").len()
    }
}

/// RAII handle to a pooled arena; releases on scope exit.
///
/// Not cloneable: exactly one subsystem owns the arena at a time.
pub struct ScopedArena {
    arena: Option<Box<Arena>>,
    pool: Arc<ArenaPool>,
}

impl std::fmt::Debug for ScopedArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedArena").finish_non_exhaustive()
    }
}

impl std::ops::Deref for ScopedArena {
    type Target = Arena;

    fn deref(&self) -> &Arena {
        self.arena.as_ref().expect("arena present until drop")
    }
}

impl std::ops::DerefMut for ScopedArena {
    fn deref_mut(&mut self) -> &mut Arena {
        self.arena.as_mut().expect("arena present until drop")
    }
}

impl Drop for ScopedArena {
    fn drop(&mut self) {
        if let Some(arena) = self.arena.take() {
            self.pool.release_raw(arena);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_read_back() {
        let mut arena = Arena::with_capacity(128);
        let a = arena.alloc_slice(b"transcript");
        let b = arena.alloc(4);
        arena.get_mut(&b).copy_from_slice(&[1, 2, 3, 4]);

        assert_eq!(arena.get(&a), b"transcript");
        assert_eq!(arena.get(&b), &[1, 2, 3, 4]);
        assert_eq!(arena.len(), 14);
    }

    #[test]
    fn test_reset_retains_capacity() {
        let mut arena = Arena::with_capacity(64);
        let _ = arena.alloc(1000); // grows past the initial capacity
        let grown = arena.capacity();
        assert!(grown >= 1000);

        arena.reset();
        assert!(arena.is_empty());
        assert_eq!(arena.capacity(), grown);
    }

    #[test]
    fn test_pool_reuses_arena() {
        let pool = ArenaPool::with_capacity(256);
        {
            let mut scoped = pool.acquire();
            let _ = scoped.alloc(100);
        }
        assert_eq!(pool.arena_count(), 1);
        {
            let scoped = pool.acquire();
            // Came back reset
            assert!(scoped.is_empty());
        }
        assert_eq!(pool.arena_count(), 1);
    }

    #[test]
    fn test_pool_grows_under_concurrent_checkout() {
        let pool = ArenaPool::new();
        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(pool.arena_count(), 2);
        drop(a);
        drop(b);
        assert_eq!(pool.arena_count(), 2);
    }
}
