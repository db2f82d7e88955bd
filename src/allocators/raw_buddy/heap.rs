//! The bootstrapped heap: arena, size-class table and ledger.

use core::ptr::NonNull;

use tracing::debug;

use crate::arena::{Arena, BlockOffset};
use crate::error::Result;
use crate::freelist::SizeClassTable;
use crate::header::Header;
use crate::mapped;
use crate::order::{
    order_of_payload, root_index, ARENA_BYTES, MAX_CLASS_BYTES, MAX_CLASS_PAYLOAD, MAX_ORDER,
    ROOT_COUNT,
};
use crate::stats::Stats;

pub(super) struct Heap {
    pub(super) arena: Arena,
    pub(super) lists: SizeClassTable,
    pub(super) stats: Stats,
}

impl Heap {
    /// Carves a freshly reserved arena into [`ROOT_COUNT`] maximal free blocks.
    ///
    /// # Safety
    /// `base` must point to [`ARENA_BYTES`] bytes that satisfy the requirements of
    /// [`Arena::new`].
    pub(super) unsafe fn carve(base: NonNull<u8>) -> Heap {
        let mut arena = Arena::new(base, ARENA_BYTES);
        let mut lists = SizeClassTable::new();
        for root in 0..ROOT_COUNT {
            let offset = (root * MAX_CLASS_BYTES) as BlockOffset;
            arena.set_header(offset, Header::free(MAX_CLASS_PAYLOAD, root_index(root)));
            lists.insert(&mut arena, MAX_ORDER, offset);
        }
        debug!(?base, roots = ROOT_COUNT, "Carved arena into root blocks.");
        Heap {
            arena,
            lists,
            stats: Stats::bootstrap(ROOT_COUNT, MAX_CLASS_PAYLOAD),
        }
    }

    /// Returns the order of the pool block at `offset`.
    pub(super) fn order_at(&self, offset: BlockOffset) -> usize {
        order_of_payload(self.arena.header(offset).payload_size)
            .expect("Pool blocks have class-sized payloads.")
    }

    /// Unlinks the free block at `offset` from the list for `order`,
    /// marks it occupied and returns its payload.
    pub(super) fn take(&mut self, order: usize, offset: BlockOffset) -> NonNull<u8> {
        self.lists.remove(&mut self.arena, order, offset);
        let payload_size = self.arena.update(offset, |h| {
            debug_assert!(h.is_free, "Only free blocks can be handed out.");
            h.is_free = false;
            h.payload_size
        });
        self.stats.record_taken(payload_size);
        self.arena.payload(offset)
    }

    /// Marks the occupied block at `offset` free and links it into the list for `order`.
    pub(super) fn give_back(&mut self, order: usize, offset: BlockOffset) {
        let payload_size = self.arena.update(offset, |h| {
            debug_assert!(!h.is_free, "Block shouldn't be free already.");
            h.is_free = true;
            h.payload_size
        });
        self.lists.insert(&mut self.arena, order, offset);
        self.stats.record_returned(payload_size);
    }

    /// Serves a large request from its own mapping.
    pub(super) fn map(&mut self, size: usize) -> Result<NonNull<u8>> {
        let payload = mapped::map(size)?;
        self.stats.record_mapped(size);
        Ok(payload)
    }

    /// # Safety
    /// `payload` must be a live mapped object handed out by this heap.
    pub(super) unsafe fn unmap(&mut self, payload: NonNull<u8>) {
        let payload_size = mapped::unmap(payload);
        self.stats.record_unmapped(payload_size);
    }
}

/// What a walk over the arena found.
#[cfg(test)]
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Audit {
    pub(crate) stats: Stats,
    pub(crate) free_per_order: [usize; crate::order::ORDER_COUNT],
}

#[cfg(test)]
impl Heap {
    /// Walks the arena block by block and checks it against the free lists.
    /// The returned stats only cover pool blocks.
    pub(super) fn audit(&self) -> Audit {
        use crate::header::HEADER_SIZE;
        use crate::order::{class_bytes, ORDER_COUNT};

        let mut audit = Audit::default();
        let mut offset = 0;
        while offset < ARENA_BYTES {
            let header = self.arena.header(offset as BlockOffset);
            let order = order_of_payload(header.payload_size)
                .unwrap_or_else(|| panic!("Block at {offset} has a bad size: {header:?}"));
            assert_eq!(offset % class_bytes(order), 0, "Block at {offset} is misplaced.");
            audit.stats.allocated_blocks += 1;
            audit.stats.allocated_bytes += header.payload_size;
            if header.is_free {
                audit.stats.free_blocks += 1;
                audit.stats.free_bytes += header.payload_size;
                audit.free_per_order[order] += 1;
            } else {
                assert_eq!((header.prev(), header.next()), (None, None));
            }
            offset += header.payload_size + HEADER_SIZE;
        }
        assert_eq!(offset, ARENA_BYTES);

        for order in 0..ORDER_COUNT {
            let mut listed = 0;
            let mut last_index = None;
            let mut prev = None;
            for offset in self.lists.iter(&self.arena, order) {
                let header = self.arena.header(offset);
                assert!(header.is_free, "Listed block at {offset} is occupied.");
                assert_eq!(order_of_payload(header.payload_size), Some(order));
                assert_eq!(header.prev(), prev);
                assert!(last_index < Some(header.index), "List {order} is out of order.");
                last_index = Some(header.index);
                prev = Some(offset);
                listed += 1;
            }
            assert_eq!(listed, audit.free_per_order[order], "List {order} misses blocks.");
        }
        audit
    }
}
