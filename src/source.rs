//! [`ArenaSource`] trait and structures that implement it.
//!
//! The [`ArenaSource`] trait lets users change where the allocators in
//! [`buddy_malloc::allocators`](crate::allocators) take their arena from.
//! The arena is reserved once, on first use, and never grown afterwards.

use core::ptr::{null_mut, NonNull};

use libc::{
    c_void, intptr_t, mmap, munmap, sbrk, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ,
    PROT_WRITE,
};

use crate::util::{checked_add, find_aligned};

/// A trait for types that can hand out one contiguous region of memory.
///
/// # Safety
/// * The region returned by [`reserve`](ArenaSource::reserve) must be valid for
///   reads and writes, must not be used by anything else, and must stay valid for
///   as long as the source is alive.
/// * Copying, cloning, or moving the source must not invalidate the region.
pub unsafe trait ArenaSource {
    /// Reserves `size` bytes starting at an `align`-aligned address.
    /// Returns the start of the region or `Err(())` if the reservation failed.
    ///
    /// # Safety
    /// `align` must be a power of two. Callers reserve at most once per source.
    unsafe fn reserve(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, ()>;
}

/// A source that extends the process's data segment with [`libc::sbrk`].
#[derive(Debug, Default)]
pub struct BrkSource {
    _private: (),
}

impl BrkSource {
    #[inline(always)]
    pub const fn new() -> Self {
        BrkSource { _private: () }
    }
}

unsafe impl ArenaSource for BrkSource {
    unsafe fn reserve(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, ()> {
        // A single sbrk call is atomic with respect to other break users, so
        // over-reserve and align inside the increment instead of moving the break twice.
        let increment = size.checked_add(align - 1).ok_or(())?;
        let increment = intptr_t::try_from(increment).map_err(|_| ())?;
        let old_end = sbrk(increment);
        if old_end as isize == -1 {
            return Err(());
        }
        let start = find_aligned(old_end.cast::<u8>(), align).ok_or(())?;
        checked_add(start, size).ok_or(())?;
        NonNull::new(start as *mut u8).ok_or(())
    }
}

/// A source that reserves its region with one anonymous private mapping,
/// released again when the source is dropped.
#[derive(Debug, Default)]
pub struct MmapSource {
    region: Option<(NonNull<u8>, usize)>,
}

impl MmapSource {
    #[inline(always)]
    pub const fn new() -> Self {
        MmapSource { region: None }
    }
}

unsafe impl ArenaSource for MmapSource {
    unsafe fn reserve(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, ()> {
        if self.region.is_some() || size == 0 {
            return Err(());
        }
        let p = mmap(
            null_mut(),
            size,
            PROT_READ | PROT_WRITE,
            MAP_PRIVATE | MAP_ANONYMOUS,
            -1,
            0,
        );
        if p == MAP_FAILED {
            return Err(());
        }
        let start = NonNull::new(p.cast::<u8>()).ok_or(())?;
        self.region = Some((start, size));
        // Mappings are page aligned, which covers every alignment the allocators ask for.
        if start.as_ptr() as usize % align != 0 {
            return Err(());
        }
        Ok(start)
    }
}

impl Drop for MmapSource {
    fn drop(&mut self) {
        if let Some((start, size)) = self.region.take() {
            unsafe { munmap(start.as_ptr().cast::<c_void>(), size) };
        }
    }
}

/// A source that carves its region out of a caller-provided buffer.
#[derive(Debug)]
pub struct BufferSource<'a> {
    buf: Option<&'a mut [u8]>,
}

impl<'a> BufferSource<'a> {
    #[inline(always)]
    pub fn new(buf: &'a mut [u8]) -> Self {
        BufferSource { buf: Some(buf) }
    }
}

unsafe impl ArenaSource for BufferSource<'_> {
    unsafe fn reserve(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, ()> {
        let buf = self.buf.take().ok_or(())?;
        let buf_start = buf.as_mut_ptr();
        let start = find_aligned(buf_start, align).ok_or(())?;
        let padding = start as usize - buf_start as usize;
        match padding.checked_add(size) {
            Some(end) if end <= buf.len() => NonNull::new(start as *mut u8).ok_or(()),
            _ => Err(()),
        }
    }
}

unsafe impl<T: ArenaSource + ?Sized> ArenaSource for &mut T {
    unsafe fn reserve(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, ()> {
        (**self).reserve(size, align)
    }
}
