//! Defines the [`Header`] struct and associated constants.

use core::mem::{align_of, size_of};

use static_assertions::const_assert;

use crate::order::{MAX_CLASS_PAYLOAD, MIN_CLASS_BYTES};

pub const HEADER_SIZE: usize = size_of::<Header>();
pub const HEADER_ALIGN: usize = align_of::<Header>();

/// Alignment of every payload handed out by the allocator.
///
/// Blocks start on [`MIN_CLASS_BYTES`] boundaries and mappings on page boundaries,
/// so a payload sitting right after its header is aligned to the header size.
pub const PAYLOAD_ALIGN: usize = HEADER_SIZE;

/// Link value meaning "no neighbour" in a free list.
pub const NIL: u32 = u32::MAX;

const_assert!(HEADER_SIZE.is_power_of_two());
const_assert!(MIN_CLASS_BYTES % HEADER_SIZE == 0);

/// Stores information about a block.
///
/// Every block, pooled or mapped, starts with one of these and is immediately
/// followed by its payload. Pooled blocks use `index` for buddy detection and
/// `prev`/`next` as arena-relative offsets while they sit in a free list.
/// Mapped objects only use `payload_size` and `is_free`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct Header {
    pub payload_size: usize,
    pub index: u64,
    pub prev: u32,
    pub next: u32,
    pub is_free: bool,
}

impl Header {
    /// Header of an unlinked free pool block.
    #[inline]
    pub const fn free(payload_size: usize, index: u64) -> Header {
        Header {
            payload_size,
            index,
            prev: NIL,
            next: NIL,
            is_free: true,
        }
    }

    /// Header of a mapped object.
    #[inline]
    pub const fn mapped(payload_size: usize) -> Header {
        Header {
            payload_size,
            index: 0,
            prev: NIL,
            next: NIL,
            is_free: false,
        }
    }

    #[inline]
    pub fn prev(&self) -> Option<u32> {
        (self.prev != NIL).then_some(self.prev)
    }

    #[inline]
    pub fn next(&self) -> Option<u32> {
        (self.next != NIL).then_some(self.next)
    }

    /// Returns whether the block lives outside the arena in its own mapping.
    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.payload_size > MAX_CLASS_PAYLOAD
    }
}
