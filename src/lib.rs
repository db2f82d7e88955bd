//! A buddy memory allocator written in Rust.
//!
//! The allocator serves small and medium requests from a fixed 4 MiB arena split into
//! power-of-two size classes, and hands every larger request its own anonymous mapping.
//! It keeps a running ledger of free and allocated blocks that can be queried at any time.
//!
//! # Usage
//! To use this crate you can add `buddy_malloc` as a dependency in your project's `Cargo.toml`.
//! ```toml
//! [dependencies]
//! buddy_malloc = "0.1"
//! ```
//!
//! ```no_run
//! use buddy_malloc::BuddyMalloc;
//! use buddy_malloc::source::BrkSource;
//!
//! #[global_allocator]
//! static ALLOCATOR: BuddyMalloc<BrkSource> = BuddyMalloc::with_source(BrkSource::new());
//!
//! fn main() {
//!     let v1: Vec<u32> = vec![1, 2, 3];
//!     println!("Buddies are cool {:?}", v1);
//!     println!("{}", ALLOCATOR.stats());
//! }
//! ```
//!
//! # Allocators
//! Two allocators are exported by this crate - [`RawBuddy`] and [`BuddyMalloc`].
//! Both of them can be used as local allocators, [`BuddyMalloc`] can also be installed
//! as the global allocator. Use [`RawBuddy`] if you are looking for a single-threaded
//! allocator, [`BuddyMalloc`] is just a `Mutex` wrapper over it to allow for multithreading.
//!
//! # Mode of operation
//! - On the first request the allocator reserves its arena from an [arena source](#arena-sources)
//!   and carves it into 32 maximal blocks of 128 KiB. If the reservation fails the
//!   allocator is disabled for good.
//! - An allocation looks up the smallest [order](#orders) whose payload fits the request,
//!   takes the lowest-addressed free block of that order or above, and halves it until it
//!   has the right order. The upper half of every split stays free.
//! - On release the block goes back to its free list and a single sweep over all the
//!   lists merges every pair of free [buddies](#buddies), cascading towards the root.
//! - Requests larger than the payload of a maximal block skip the arena entirely and
//!   are served by [`libc::mmap`], one mapping each.
//!
//! Bellow is a list of the abstractions used by the allocators for operating on the arena:
//!
//! ## Blocks
//! The arena is divided into blocks. Each block has a [header](#headers) followed by
//! its payload. A block whose payload was handed out is occupied, any other block is free.
//!
//! ## Headers
//! At the beginning of each block there is a header holding all the essential metadata
//! for that block: the payload size, the block's positional index, whether it is free
//! and its links into the free list of its order.
//!
//! ## Orders
//! A block of order `k` spans `128 << k` bytes including its header, for `k` in `0..=10`.
//! Blocks of order `k` always start at a multiple of their own size from the arena base.
//!
//! ## Buddies
//! Splitting a block of order `k + 1` yields two blocks of order `k`, which are each other's
//! buddy. Every block carries a positional index that encodes where it was split off,
//! so checking whether two free blocks are buddies never needs address arithmetic.
//! See [`order`] for the numbering.
//!
//! ## Free lists
//! Each order has a doubly linked list of its free blocks, embedded in the blocks' headers
//! and kept sorted by positional index, which puts buddies next to each other.
//! Links are stored as offsets into the arena rather than raw pointers.
//!
//! ## Arena sources
//! An arena source hands the allocator its region of memory. The allocators are generic
//! over their source, so anything that implements [`ArenaSource`] can back them.
//! [`BrkSource`](source::BrkSource) extends the data segment,
//! [`MmapSource`](source::MmapSource) maps a fresh region and
//! [`BufferSource`](source::BufferSource) manages a buffer you already own.
//!
//! # Statistics
//! Every allocator keeps four counters, see [`Stats`]. Free counters cover the free pool
//! blocks. Allocated counters cover every block header alive, free or not, plus the large
//! mappings, so the bytes spent on metadata are always `allocated_blocks * header_size`.
//!
//! # Logging
//! Operations emit [`tracing`] spans and events. Nothing is logged unless a subscriber
//! is installed. A subscriber that allocates must not be used while [`BuddyMalloc`] is
//! the global allocator, it would try to take the allocator's lock from inside itself.

pub use crate::allocators::BuddyMalloc;
pub use crate::allocators::RawBuddy;
pub use crate::error::{AllocError, Result};
pub use crate::header::{HEADER_SIZE, PAYLOAD_ALIGN};
pub use crate::order::{
    ARENA_BYTES, MAX_ALLOCATION, MAX_CLASS_BYTES, MAX_CLASS_PAYLOAD, MAX_ORDER, MIN_CLASS_BYTES,
    ROOT_COUNT,
};
pub use crate::source::ArenaSource;
pub use crate::stats::Stats;

pub mod allocators;
mod arena;
mod error;
mod freelist;
mod header;
mod mapped;
pub mod order;
pub mod source;
mod stats;
mod util;
