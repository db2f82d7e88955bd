//! A multithreaded buddy allocator.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::allocators::RawBuddy;
use crate::error::{AllocError, Result};
use crate::header::PAYLOAD_ALIGN;
use crate::source::ArenaSource;
use crate::stats::Stats;
use crate::util::raw_ptr;

/// A multithreaded buddy allocator.
///
/// This allocator is just a `Mutex` wrapper over [`RawBuddy`] to allow for multithreading.
/// Every operation holds the lock for its whole duration, coalescing sweep included.
pub struct BuddyMalloc<S: ArenaSource> {
    inner: Mutex<RawBuddy<S>>,
}

unsafe impl<S: ArenaSource> Sync for BuddyMalloc<S> {}

impl<S: ArenaSource> BuddyMalloc<S> {
    pub const fn with_source(source: S) -> Self {
        BuddyMalloc {
            inner: Mutex::new(RawBuddy::with_source(source)),
        }
    }

    // A thread that panicked while holding the lock must not take the allocator down with it.
    #[inline]
    fn lock(&self) -> MutexGuard<'_, RawBuddy<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`RawBuddy::allocate`].
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>> {
        self.lock().allocate(size)
    }

    /// See [`RawBuddy::zero_allocate`].
    pub fn zero_allocate(&self, count: usize, size: usize) -> Result<NonNull<u8>> {
        self.lock().zero_allocate(count, size)
    }

    /// See [`RawBuddy::release`].
    ///
    /// # Safety
    /// `ptr` must be null or have been returned by this allocator.
    pub unsafe fn release(&self, ptr: *mut u8) {
        self.lock().release(ptr)
    }

    /// See [`RawBuddy::resize`].
    ///
    /// # Safety
    /// `ptr` must be null or a live allocation returned by this allocator.
    pub unsafe fn resize(&self, ptr: *mut u8, size: usize) -> Result<NonNull<u8>> {
        self.lock().resize(ptr, size)
    }

    pub fn stats(&self) -> Stats {
        self.lock().stats()
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

    pub fn header_size(&self) -> usize {
        self.lock().header_size()
    }

    /// Serves a layout aligned above [`PAYLOAD_ALIGN`] from a larger allocation.
    /// The pointer of that allocation is stored in the word right before the returned one.
    fn allocate_overaligned(&self, layout: Layout) -> Result<NonNull<u8>> {
        let align = layout.align();
        let size = layout.size().checked_add(align).ok_or(AllocError::Overflow)?;
        let raw = self.allocate(size)?;

        // `raw` is PAYLOAD_ALIGN aligned and `align` is larger, so the
        // offset lies in `PAYLOAD_ALIGN..=align`.
        let offset = align - (raw.as_ptr() as usize & (align - 1));
        unsafe {
            let aligned = raw.as_ptr().add(offset);
            aligned.cast::<*mut u8>().sub(1).write(raw.as_ptr());
            Ok(NonNull::new_unchecked(aligned))
        }
    }
}

/// Recovers the allocation behind a pointer from [`BuddyMalloc::allocate_overaligned`].
#[inline]
unsafe fn overaligned_origin(ptr: *mut u8) -> *mut u8 {
    ptr.cast::<*mut u8>().sub(1).read()
}

//---------------impl GlobalAlloc for BuddyMalloc---------------//

unsafe impl<S: ArenaSource> GlobalAlloc for BuddyMalloc<S> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let payload = match layout.align() <= PAYLOAD_ALIGN {
            true => self.allocate(layout.size()),
            false => self.allocate_overaligned(layout),
        };
        raw_ptr(payload.ok())
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() <= PAYLOAD_ALIGN {
            return raw_ptr(self.zero_allocate(1, layout.size()).ok());
        }
        let ptr = self.alloc(layout);
        if !ptr.is_null() {
            ptr.write_bytes(0, layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        match layout.align() <= PAYLOAD_ALIGN {
            true => self.release(ptr),
            false => self.release(overaligned_origin(ptr)),
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() <= PAYLOAD_ALIGN {
            return raw_ptr(self.resize(ptr, new_size).ok());
        }
        let new_layout = Layout::from_size_align_unchecked(new_size, layout.align());
        let new = self.alloc(new_layout);
        if !new.is_null() {
            ptr::copy_nonoverlapping(ptr, new, layout.size().min(new_size));
            self.dealloc(ptr, layout);
        }
        new
    }
}
