//! Size classes and the positional index scheme used to detect buddies.
//!
//! # Orders
//! A block of order `k` spans `MIN_CLASS_BYTES << k` bytes, header included,
//! so its payload is [`class_payload(k)`](class_payload).
//!
//! # Positional indices
//! Every pool block carries an index describing how it was split off its root.
//! Splitting a block with index `p` yields children `3p` (lower half) and `3p + 1`
//! (upper half). Since no index of the form `3p + 2` is ever produced, two blocks
//! of the same order whose indices differ by exactly one are always siblings.
//! Roots are spaced [`INDEX_GAP`] apart so no two subtrees ever share an index.

use static_assertions::const_assert;

use crate::header::HEADER_SIZE;

pub const MAX_ORDER: usize = 10;
pub const ORDER_COUNT: usize = MAX_ORDER + 1;

pub const MIN_CLASS_BYTES: usize = 128;
pub const MAX_CLASS_BYTES: usize = class_bytes(MAX_ORDER);
pub const MAX_CLASS_PAYLOAD: usize = class_payload(MAX_ORDER);

/// Number of maximal blocks carved out of the arena at bootstrap.
pub const ROOT_COUNT: usize = 32;
pub const ARENA_BYTES: usize = ROOT_COUNT * MAX_CLASS_BYTES;

/// Largest request accepted by any operation.
pub const MAX_ALLOCATION: usize = 100_000_000;

pub const INDEX_BASE: u64 = 3;
pub const INDEX_GAP: u64 = INDEX_BASE.pow(MAX_ORDER as u32 + 1) - 1;

// Free-list links are u32 arena offsets.
const_assert!(ARENA_BYTES <= u32::MAX as usize);
const_assert!(MAX_ALLOCATION <= isize::MAX as usize - HEADER_SIZE);
// The deepest index of the last root must not overflow.
const_assert!(root_index(ROOT_COUNT - 1) < u64::MAX / INDEX_BASE.pow(MAX_ORDER as u32 + 1));

/// Bytes spanned by a block of `order`, header included.
#[inline]
pub const fn class_bytes(order: usize) -> usize {
    MIN_CLASS_BYTES << order
}

/// Bytes available to the caller in a block of `order`.
#[inline]
pub const fn class_payload(order: usize) -> usize {
    class_bytes(order) - HEADER_SIZE
}

/// Returns the smallest order whose blocks span at least `bytes`,
/// or `None` if not even a maximal block is large enough.
#[inline]
pub fn order_for(bytes: usize) -> Option<usize> {
    (0..ORDER_COUNT).find(|&order| class_bytes(order) >= bytes)
}

/// Returns the order of a pool block with the given payload size
/// or `None` if no class has exactly that payload.
#[inline]
pub fn order_of_payload(payload_size: usize) -> Option<usize> {
    order_for(payload_size.checked_add(HEADER_SIZE)?)
        .filter(|&order| class_payload(order) == payload_size)
}

#[inline]
pub const fn root_index(root: usize) -> u64 {
    INDEX_GAP * root as u64 + 1
}

/// Indices of the lower and upper halves of a split block.
#[inline]
pub const fn child_indices(parent: u64) -> (u64, u64) {
    (parent * INDEX_BASE, parent * INDEX_BASE + 1)
}

#[inline]
pub const fn parent_index(child: u64) -> u64 {
    child / INDEX_BASE
}

/// Index of the sibling of a non-root block.
#[inline]
pub const fn buddy_index(index: u64) -> u64 {
    if index % INDEX_BASE == 0 {
        index + 1
    } else {
        index - 1
    }
}

/// Whether two same-order blocks, listed in ascending index order, are siblings.
#[inline]
pub const fn are_buddies(lower: u64, upper: u64) -> bool {
    lower + 1 == upper
}
