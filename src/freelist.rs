//! Defines the [`SizeClassTable`], one intrusive free list per order.
//!
//! Links live in the block headers inside the arena and are stored as
//! [`BlockOffset`]s. Each list is kept sorted by ascending positional index,
//! which puts siblings next to each other and lets the coalescing sweep find
//! them by looking at neighbouring entries only.

use crate::arena::{Arena, BlockOffset};
use crate::header::NIL;
use crate::order::ORDER_COUNT;

#[derive(Debug)]
pub struct SizeClassTable {
    heads: [BlockOffset; ORDER_COUNT],
}

impl SizeClassTable {
    /// Creates a table of empty lists.
    #[inline]
    pub const fn new() -> Self {
        SizeClassTable {
            heads: [NIL; ORDER_COUNT],
        }
    }

    /// Returns the head of the list for `order` or `None` if the list is empty.
    #[inline]
    pub fn head(&self, order: usize) -> Option<BlockOffset> {
        let head = self.heads[order];
        (head != NIL).then_some(head)
    }

    /// Returns the first non-empty order at or above `order` together with its head.
    pub fn first_nonempty(&self, order: usize) -> Option<(usize, BlockOffset)> {
        (order..ORDER_COUNT).find_map(|order| self.head(order).map(|head| (order, head)))
    }

    /// Links the free block at `offset` into the list for `order`,
    /// after every entry with a smaller or equal index.
    /// This operation has a time complexity of *O*(n).
    pub fn insert(&mut self, arena: &mut Arena, order: usize, offset: BlockOffset) {
        let index = arena.header(offset).index;
        debug_assert!(arena.header(offset).is_free, "Only free blocks are listed.");

        let mut prev = NIL;
        let mut cur = self.heads[order];
        while cur != NIL {
            let header = arena.header(cur);
            if header.index > index {
                break;
            }
            prev = cur;
            cur = header.next;
        }

        arena.update(offset, |h| {
            h.prev = prev;
            h.next = cur;
        });
        match prev {
            NIL => self.heads[order] = offset,
            prev => arena.update(prev, |h| h.next = offset),
        }
        if cur != NIL {
            arena.update(cur, |h| h.prev = offset);
        }
    }

    /// Unlinks the block at `offset` from the list for `order`.
    /// This operation has a time complexity of *O*(1).
    ///
    /// The block must currently be part of that list.
    pub fn remove(&mut self, arena: &mut Arena, order: usize, offset: BlockOffset) {
        let header = arena.header(offset);
        match header.prev() {
            None => {
                debug_assert_eq!(self.heads[order], offset, "Unlinked block is not the head.");
                self.heads[order] = header.next;
            }
            Some(prev) => arena.update(prev, |h| h.next = header.next),
        }
        if let Some(next) = header.next() {
            arena.update(next, |h| h.prev = header.prev);
        }
        arena.update(offset, |h| {
            h.prev = NIL;
            h.next = NIL;
        });
    }

    /// Finds the block with positional `index` in the list for `order`.
    pub fn find(&self, arena: &Arena, order: usize, index: u64) -> Option<BlockOffset> {
        self.iter(arena, order)
            .map(|offset| (offset, arena.header(offset).index))
            .take_while(|&(_, listed)| listed <= index)
            .find_map(|(offset, listed)| (listed == index).then_some(offset))
    }

    /// Iterates over the offsets in the list for `order`, in index order.
    pub fn iter<'a>(&self, arena: &'a Arena, order: usize) -> Iter<'a> {
        Iter {
            arena,
            cur: self.head(order),
        }
    }
}

pub struct Iter<'a> {
    arena: &'a Arena,
    cur: Option<BlockOffset>,
}

impl Iterator for Iter<'_> {
    type Item = BlockOffset;

    fn next(&mut self) -> Option<BlockOffset> {
        let cur = self.cur?;
        self.cur = self.arena.header(cur).next();
        Some(cur)
    }
}
