//! Allocation from the size-class table, splitting larger blocks on the way down.

use core::ptr::NonNull;

use tracing::{debug, instrument, Level};

use super::heap::Heap;
use crate::arena::BlockOffset;
use crate::error::{AllocError, Result};
use crate::header::{Header, HEADER_SIZE};
use crate::order::{child_indices, class_bytes, class_payload, order_for};

impl Heap {
    /// Hands out the smallest pool block whose payload holds `size` bytes.
    ///
    /// The lowest-indexed block of the first non-empty order at or above the
    /// minimal one is halved until halving again would undersize the request.
    #[instrument(level = "debug", skip(self), ret(level = Level::DEBUG), err(level = Level::DEBUG))]
    pub(super) fn allocate_block(&mut self, size: usize) -> Result<NonNull<u8>> {
        let min_order = order_for(size + HEADER_SIZE).ok_or(AllocError::TooLarge(size))?;
        let (mut order, offset) = self
            .lists
            .first_nonempty(min_order)
            .ok_or(AllocError::OutOfBlocks(min_order))?;
        debug!(min_order, order, offset, "Found free block.");

        while order > 0 && size <= class_payload(order - 1) {
            self.split(order, offset);
            order -= 1;
        }

        Ok(self.take(order, offset))
    }

    /// Splits the free block at `offset` into two halves of `order - 1`.
    /// The lower half keeps `offset`.
    #[instrument(level = "debug", skip(self))]
    fn split(&mut self, order: usize, offset: BlockOffset) {
        let parent = self.arena.header(offset);
        debug_assert!(parent.is_free, "Only free blocks can be split.");
        debug_assert!(order > 0, "Order 0 blocks can't be split.");

        self.lists.remove(&mut self.arena, order, offset);

        let child_order = order - 1;
        let payload_size = class_payload(child_order);
        let (lower_index, upper_index) = child_indices(parent.index);
        let upper = offset + class_bytes(child_order) as BlockOffset;

        self.arena.set_header(offset, Header::free(payload_size, lower_index));
        self.arena.set_header(upper, Header::free(payload_size, upper_index));
        self.lists.insert(&mut self.arena, child_order, offset);
        self.lists.insert(&mut self.arena, child_order, upper);
        self.stats.record_split();

        debug!(offset, upper, child_order, lower_index, "Split block.");
    }
}
