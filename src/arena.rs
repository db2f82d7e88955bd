//! The [`Arena`]: the only place where block offsets turn into addresses.
//!
//! Everything above this module talks about blocks by [`BlockOffset`], their
//! distance in bytes from the arena base. Offsets are checked to be in bounds
//! and class-aligned on every access, so the header reads and writes done here
//! stay inside the reserved region.

use core::ptr::NonNull;

use crate::header::{Header, HEADER_ALIGN, HEADER_SIZE};
use crate::order::MIN_CLASS_BYTES;

/// Distance in bytes from the arena base to a block header.
pub type BlockOffset = u32;

#[derive(Debug)]
pub struct Arena {
    base: NonNull<u8>,
    len: usize,
}

impl Arena {
    /// Wraps an already reserved region.
    ///
    /// # Safety
    /// `base..base + len` must be valid for reads and writes for as long as the
    /// arena is used and must not be accessed through any other path except
    /// the payloads this arena's owner hands out.
    pub unsafe fn new(base: NonNull<u8>, len: usize) -> Arena {
        debug_assert_eq!(base.as_ptr() as usize % HEADER_ALIGN, 0);
        debug_assert!(len <= BlockOffset::MAX as usize);
        Arena { base, len }
    }

    #[inline]
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    fn check(&self, offset: BlockOffset) {
        assert_eq!(
            offset as usize % MIN_CLASS_BYTES,
            0,
            "block offset {offset} is not class aligned"
        );
        assert!(
            offset as usize + HEADER_SIZE <= self.len,
            "block offset {offset} is outside the arena"
        );
    }

    #[inline]
    fn header_ptr(&self, offset: BlockOffset) -> *mut Header {
        self.check(offset);
        // In bounds per `check`.
        unsafe { self.base.as_ptr().add(offset as usize).cast() }
    }

    /// Reads the header of the block at `offset`.
    #[inline]
    pub fn header(&self, offset: BlockOffset) -> Header {
        unsafe { self.header_ptr(offset).read() }
    }

    #[inline]
    pub fn set_header(&mut self, offset: BlockOffset, header: Header) {
        unsafe { self.header_ptr(offset).write(header) }
    }

    /// Applies `f` to the header of the block at `offset`.
    #[inline]
    pub fn update<R>(&mut self, offset: BlockOffset, f: impl FnOnce(&mut Header) -> R) -> R {
        let mut header = self.header(offset);
        let r = f(&mut header);
        self.set_header(offset, header);
        r
    }

    /// Returns the payload of the block at `offset`.
    #[inline]
    pub fn payload(&self, offset: BlockOffset) -> NonNull<u8> {
        let header = self.header_ptr(offset);
        unsafe { NonNull::new_unchecked(header.cast::<u8>().add(HEADER_SIZE)) }
    }

    /// Maps a payload pointer back to its block, or `None` if the pointer
    /// does not start a payload inside this arena.
    pub fn offset_of(&self, payload: *const u8) -> Option<BlockOffset> {
        let base = self.base.as_ptr() as usize;
        let offset = (payload as usize).checked_sub(base + HEADER_SIZE)?;
        (offset < self.len && offset % MIN_CLASS_BYTES == 0).then_some(offset as BlockOffset)
    }
}
