//! The error type reported by every fallible allocator operation.

use thiserror::Error;

/// Why an allocation could not be served.
///
/// The raw [`GlobalAlloc`](core::alloc::GlobalAlloc) adapter collapses every
/// variant into a null pointer; the variants exist for callers of the
/// `Result`-returning API and for the logs.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    #[error("zero-sized request")]
    ZeroSize,
    #[error("request of {0} bytes exceeds the allocation limit")]
    TooLarge(usize),
    #[error("element count times element size overflows")]
    Overflow,
    #[error("the arena could not be reserved")]
    ArenaUnavailable,
    #[error("no free block of order {0} or above")]
    OutOfBlocks(usize),
    #[error("mapping a {0} byte region failed")]
    MapFailed(usize),
    #[error("the block is already free")]
    AlreadyFree,
}

pub type Result<T> = core::result::Result<T, AllocError>;
