//! A singlethreaded buddy allocator.
//!
// For a general view of the allocator's operational semantics see the [`crate`] level
// documentation.
//
// # Additional implementation notes
// The heap is split across submodules by concern: `heap` owns bootstrap and the
// block state transitions, `split` serves allocations, `coalesce` handles release
// and the coalescing sweep, and `grow` implements in-place growth for `resize`.
// Only `RawBuddy` decides between the pool and the large-object path.

use core::fmt::{self, Debug};
use core::ptr::{self, NonNull};

use tracing::{debug, error, info, instrument, warn, Level};

use self::heap::Heap;
use crate::error::{AllocError, Result};
use crate::header::HEADER_SIZE;
use crate::mapped;
use crate::order::{ARENA_BYTES, MAX_ALLOCATION, MAX_CLASS_PAYLOAD, MIN_CLASS_BYTES};
use crate::source::ArenaSource;
use crate::stats::Stats;

mod coalesce;
mod grow;
mod heap;
mod split;

enum State {
    Unreserved,
    Ready(Heap),
    Failed,
}

/// A single threaded buddy allocator.
///
/// The arena is reserved from the allocator's [`ArenaSource`] on the first call that
/// can allocate. If that reservation fails the allocator stays disabled and every
/// later request fails with [`AllocError::ArenaUnavailable`].
pub struct RawBuddy<S: ArenaSource> {
    source: S,
    state: State,
}

impl<S: ArenaSource> Debug for RawBuddy<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Unreserved => "unreserved",
            State::Ready(_) => "ready",
            State::Failed => "failed",
        };
        f.debug_struct("RawBuddy")
            .field("state", &state)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Requests above the maximal class payload bypass the arena.
#[inline]
fn is_large(size: usize) -> bool {
    size > MAX_CLASS_PAYLOAD
}

#[inline]
fn check_size(size: usize) -> Result<()> {
    match size {
        0 => Err(AllocError::ZeroSize),
        size if size > MAX_ALLOCATION => Err(AllocError::TooLarge(size)),
        _ => Ok(()),
    }
}

impl<S: ArenaSource> RawBuddy<S> {
    /// Creates an allocator that will reserve its arena from `source`.
    pub const fn with_source(source: S) -> Self {
        RawBuddy {
            source,
            state: State::Unreserved,
        }
    }

    /// Returns the heap, reserving and carving the arena on first use.
    fn heap(&mut self) -> Result<&mut Heap> {
        if let State::Unreserved = self.state {
            self.state = match unsafe { self.source.reserve(ARENA_BYTES, MIN_CLASS_BYTES) } {
                Ok(base) => {
                    info!(?base, len = ARENA_BYTES, "Arena reserved.");
                    State::Ready(unsafe { Heap::carve(base) })
                }
                Err(()) => {
                    error!(len = ARENA_BYTES, "Arena reservation failed, allocator disabled.");
                    State::Failed
                }
            };
        }
        match &mut self.state {
            State::Ready(heap) => Ok(heap),
            _ => Err(AllocError::ArenaUnavailable),
        }
    }

    /// Allocates at least `size` bytes, aligned to [`PAYLOAD_ALIGN`](crate::header::PAYLOAD_ALIGN).
    #[instrument(level = "info", ret(level = Level::INFO), err(level = Level::ERROR))]
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>> {
        let heap = self.heap()?;
        check_size(size)?;
        match is_large(size) {
            true => heap.map(size),
            false => heap.allocate_block(size),
        }
    }

    /// Allocates `count * size` zeroed bytes.
    #[instrument(level = "info", ret(level = Level::INFO), err(level = Level::ERROR))]
    pub fn zero_allocate(&mut self, count: usize, size: usize) -> Result<NonNull<u8>> {
        self.heap()?;
        if count == 0 || size == 0 {
            return Err(AllocError::ZeroSize);
        }
        let total = count.checked_mul(size).ok_or(AllocError::Overflow)?;
        let payload = self.allocate(total)?;
        // Fresh mappings are already zero.
        if !is_large(total) {
            unsafe { payload.as_ptr().write_bytes(0, total) };
        }
        Ok(payload)
    }

    /// Releases the allocation at `ptr`. Null pointers and blocks that are
    /// already free are ignored.
    ///
    /// # Safety
    /// `ptr` must be null or have been returned by this allocator. Releasing an object
    /// whose storage has since been handed out again is undefined behaviour.
    #[instrument(level = "info")]
    pub unsafe fn release(&mut self, ptr: *mut u8) {
        let Some(payload) = NonNull::new(ptr) else {
            return;
        };
        let State::Ready(heap) = &mut self.state else {
            debug!("Nothing was ever handed out, ignoring.");
            return;
        };

        match heap.arena.offset_of(payload.as_ptr()) {
            Some(offset) => {
                if heap.arena.header(offset).is_free {
                    double_release(payload);
                    return;
                }
                heap.release_block(offset);
            }
            None => {
                if mapped::header(payload).is_free {
                    double_release(payload);
                    return;
                }
                heap.unmap(payload);
            }
        }
    }

    /// Resizes the allocation at `ptr` to hold at least `size` bytes, preserving
    /// its contents up to the smaller of the two sizes. A null `ptr` behaves like
    /// [`allocate`](RawBuddy::allocate). On failure the original allocation is untouched.
    ///
    /// Pool blocks never shrink: if the block already holds `size` bytes it is
    /// returned as is. Otherwise the block first tries to absorb its free buddies
    /// and is only relocated if that is not possible.
    ///
    /// Resizing a pool block that is already free changes nothing and fails with
    /// [`AllocError::AlreadyFree`].
    ///
    /// # Safety
    /// `ptr` must be null or a live allocation returned by this allocator.
    #[instrument(level = "info", ret(level = Level::INFO), err(level = Level::ERROR))]
    pub unsafe fn resize(&mut self, ptr: *mut u8, size: usize) -> Result<NonNull<u8>> {
        self.heap()?;
        check_size(size)?;
        let Some(old) = NonNull::new(ptr) else {
            return self.allocate(size);
        };
        let heap = self.heap()?;

        let old_size = match heap.arena.offset_of(old.as_ptr()) {
            Some(offset) => {
                let header = heap.arena.header(offset);
                if header.is_free {
                    double_release(old);
                    return Err(AllocError::AlreadyFree);
                }
                let old_size = header.payload_size;
                if old_size >= size {
                    return Ok(old);
                }
                if let Some(grown) = heap.grow_in_place(offset, size) {
                    return Ok(grown);
                }
                old_size
            }
            None => {
                let old_size = mapped::header(old).payload_size;
                if old_size == size {
                    return Ok(old);
                }
                old_size
            }
        };

        debug!(old_size, size, "Relocating.");
        let new = self.allocate(size)?;
        ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), old_size.min(size));
        self.release(old.as_ptr());
        Ok(new)
    }

    /// Returns a snapshot of the ledger. All zeroes before the arena is reserved.
    pub fn stats(&self) -> Stats {
        match &self.state {
            State::Ready(heap) => heap.stats,
            _ => Stats::new(),
        }
    }

    pub fn free_blocks(&self) -> usize {
        self.stats().free_blocks
    }

    pub fn free_bytes(&self) -> usize {
        self.stats().free_bytes
    }

    pub fn allocated_blocks(&self) -> usize {
        self.stats().allocated_blocks
    }

    pub fn allocated_bytes(&self) -> usize {
        self.stats().allocated_bytes
    }

    pub fn metadata_bytes(&self) -> usize {
        self.stats().metadata_bytes()
    }

    pub const fn header_size(&self) -> usize {
        HEADER_SIZE
    }

    /// Walks the arena and cross-checks it with the free lists.
    /// Returns `None` before the arena is reserved.
    #[cfg(test)]
    pub(crate) fn audit(&self) -> Option<heap::Audit> {
        match &self.state {
            State::Ready(heap) => Some(heap.audit()),
            _ => None,
        }
    }
}

#[inline]
fn double_release(payload: NonNull<u8>) {
    warn!(?payload, "Block is already free, ignoring release.");
    if cfg!(feature = "strict-release") {
        panic!("double release of {payload:?}");
    }
}

#[cfg(test)]
mod tests;
