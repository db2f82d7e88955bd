//! The [`RawBuddy`] and [`BuddyMalloc`] allocators.

pub mod buddy_malloc;
pub mod raw_buddy;

pub use buddy_malloc::BuddyMalloc;
pub use raw_buddy::RawBuddy;
