//! In-place growth of pool blocks by absorbing free buddies.

use core::ptr::{self, NonNull};

use tracing::{debug, instrument, Level};

use super::heap::Heap;
use crate::arena::BlockOffset;
use crate::header::HEADER_SIZE;
use crate::order::{buddy_index, order_for, parent_index};

impl Heap {
    /// Whether, for every order from `order` up to (excluding) `target`,
    /// the buddy of the block containing `index` is free.
    fn buddy_chain_free(&self, mut index: u64, order: usize, target: usize) -> bool {
        (order..target).all(|k| {
            let free = self.lists.find(&self.arena, k, buddy_index(index)).is_some();
            index = parent_index(index);
            free
        })
    }

    /// Tries to grow the occupied block at `offset` to hold `size` bytes by merging it
    /// with its free buddies. On success the old payload is moved to the start of the
    /// merged block, whose payload is returned. Returns `None`, touching nothing,
    /// if the buddies aren't free or `size` exceeds the maximal class.
    #[instrument(level = "debug", skip(self), ret(level = Level::DEBUG))]
    pub(super) fn grow_in_place(
        &mut self,
        offset: BlockOffset,
        size: usize,
    ) -> Option<NonNull<u8>> {
        let header = self.arena.header(offset);
        let order = self.order_at(offset);
        let target = order_for(size + HEADER_SIZE)?;
        debug_assert!(target > order, "Growing should only be attempted for larger sizes.");

        if !self.buddy_chain_free(header.index, order, target) {
            debug!(order, target, "Buddy chain is not free.");
            return None;
        }

        let old_payload = self.arena.payload(offset);
        self.give_back(order, offset);

        let mut block = offset;
        let mut index = header.index;
        for k in order..target {
            let buddy = self
                .lists
                .find(&self.arena, k, buddy_index(index))
                .expect("Buddy chain was checked to be free.");
            block = match block < buddy {
                true => self.merge(k, block, buddy),
                false => self.merge(k, buddy, block),
            };
            index = parent_index(index);
        }

        let new_payload = self.take(target, block);
        // Merging only rewrites headers below or beside the old payload, so it is
        // still intact here. It may overlap its new location.
        unsafe { ptr::copy(old_payload.as_ptr(), new_payload.as_ptr(), header.payload_size) };
        debug!(from = offset, to = block, target, "Grew block in place.");
        Some(new_payload)
    }
}
