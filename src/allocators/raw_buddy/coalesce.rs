//! Release into the size-class table and the coalescing sweep.

use tracing::{debug, instrument};

use super::heap::Heap;
use crate::arena::BlockOffset;
use crate::header::{Header, HEADER_SIZE};
use crate::order::{are_buddies, class_bytes, class_payload, parent_index, MAX_ORDER};

impl Heap {
    /// Returns the occupied pool block at `offset` and coalesces the table.
    #[instrument(level = "debug", skip(self))]
    pub(super) fn release_block(&mut self, offset: BlockOffset) {
        let order = self.order_at(offset);
        self.give_back(order, offset);
        self.sweep();
    }

    /// Walks every list below the maximal order once, from order 0 upwards,
    /// merging neighbouring entries that are buddies.
    ///
    /// A merge at order `k` lands in list `k + 1`, which the sweep visits next,
    /// so merges cascade all the way up within a single pass.
    #[instrument(level = "debug", skip(self))]
    pub(super) fn sweep(&mut self) {
        for order in 0..MAX_ORDER {
            let mut cursor = self.lists.head(order);
            while let Some(lower) = cursor {
                let lower_header = self.arena.header(lower);
                let Some(upper) = lower_header.next() else {
                    break;
                };
                let upper_header = self.arena.header(upper);
                if are_buddies(lower_header.index, upper_header.index) {
                    cursor = upper_header.next();
                    self.merge(order, lower, upper);
                } else {
                    cursor = Some(upper);
                }
            }
        }
    }

    /// Merges two free buddies of `order` into one free block of `order + 1`
    /// and returns its offset, which is the offset of the lower buddy.
    #[instrument(level = "debug", skip(self))]
    pub(super) fn merge(
        &mut self,
        order: usize,
        lower: BlockOffset,
        upper: BlockOffset,
    ) -> BlockOffset {
        let lower_header = self.arena.header(lower);
        let upper_header = self.arena.header(upper);
        assert!(
            lower_header.is_free && upper_header.is_free,
            "Buddies at {lower} and {upper} must both be free to merge."
        );
        debug_assert!(are_buddies(lower_header.index, upper_header.index));
        debug_assert_eq!(upper as usize, lower as usize + class_bytes(order));

        self.lists.remove(&mut self.arena, order, lower);
        self.lists.remove(&mut self.arena, order, upper);

        let payload_size = lower_header.payload_size + upper_header.payload_size + HEADER_SIZE;
        debug_assert_eq!(payload_size, class_payload(order + 1));
        self.arena.set_header(
            lower,
            Header::free(payload_size, parent_index(lower_header.index)),
        );
        self.lists.insert(&mut self.arena, order + 1, lower);
        self.stats.record_merge();

        debug!(lower, upper, order, "Merged buddies.");
        lower
    }
}
