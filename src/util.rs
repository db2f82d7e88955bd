//! Pointer helpers shared by the arena sources and the allocators.

use core::ptr::{null_mut, NonNull};

/// Returns the smallest (in address) `align`-aligned pointer
/// with an address greater or equal to that of `ptr`
/// or `None` if no such pointer exists.
///
/// # Panics
/// Panics if `align` is not a power-of-two.
#[inline]
pub(crate) fn find_aligned(ptr: *const u8, align: usize) -> Option<*const u8> {
    assert!(align.is_power_of_two(), "alignment must be a power of two");
    let offset = (align - (ptr as usize & (align - 1))) & (align - 1);
    checked_add(ptr, offset)
}

/// Advances `ptr` by `offset` bytes unless that wraps the address space.
#[inline(always)]
pub(crate) fn checked_add(ptr: *const u8, offset: usize) -> Option<*const u8> {
    (ptr as usize)
        .checked_add(offset)
        .map(|_| ptr.wrapping_add(offset))
}

#[inline(always)]
pub(crate) fn raw_ptr<T>(p: Option<NonNull<T>>) -> *mut T {
    p.map_or(null_mut(), |p| p.as_ptr())
}
