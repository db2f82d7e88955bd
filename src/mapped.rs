//! The large-object path: one anonymous mapping per oversized request.

use core::ptr::{null_mut, NonNull};

use libc::{c_void, mmap, munmap, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE};
use tracing::{debug, error};

use crate::error::{AllocError, Result};
use crate::header::{Header, HEADER_SIZE};

/// Maps a zeroed region for a `payload_size` byte object and writes its header.
/// Returns a pointer to the payload.
pub(crate) fn map(payload_size: usize) -> Result<NonNull<u8>> {
    let len = payload_size
        .checked_add(HEADER_SIZE)
        .ok_or(AllocError::TooLarge(payload_size))?;
    let region = unsafe {
        mmap(
            null_mut(),
            len,
            PROT_READ | PROT_WRITE,
            MAP_PRIVATE | MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if region == MAP_FAILED {
        error!(len, "Mapping failed.");
        return Err(AllocError::MapFailed(len));
    }
    let header: *mut Header = region.cast();
    unsafe {
        header.write(Header::mapped(payload_size));
        debug!(?header, len, "Mapped large object.");
        Ok(NonNull::new_unchecked(header.cast::<u8>().add(HEADER_SIZE)))
    }
}

/// Reads the header in front of a mapped payload.
///
/// # Safety
/// `payload` must have been returned by [`map`] and not unmapped since.
#[inline]
pub(crate) unsafe fn header(payload: NonNull<u8>) -> Header {
    payload.as_ptr().sub(HEADER_SIZE).cast::<Header>().read()
}

/// Unmaps the region behind `payload` and returns the payload size it held.
///
/// # Safety
/// `payload` must have been returned by [`map`] and not unmapped since.
/// The payload must not be accessed afterwards.
pub(crate) unsafe fn unmap(payload: NonNull<u8>) -> usize {
    let region = payload.as_ptr().sub(HEADER_SIZE);
    let payload_size = header(payload).payload_size;
    debug_assert!(Header::mapped(payload_size).is_mapped());
    let len = payload_size + HEADER_SIZE;
    if munmap(region.cast::<c_void>(), len) != 0 {
        error!(?region, len, "Unmapping failed.");
    }
    debug!(?region, len, "Unmapped large object.");
    payload_size
}
