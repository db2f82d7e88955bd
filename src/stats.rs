//! The statistics ledger.

use core::fmt;

use crate::header::HEADER_SIZE;

/// A snapshot of the allocator's four running counters.
///
/// `allocated_blocks` counts every live block header, free or not, pooled or mapped,
/// and `allocated_bytes` sums their payloads. The free counters cover pool blocks
/// currently sitting in a free list. Splits and merges move one header's worth of
/// bytes between payload and metadata, which is why they touch all four counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub free_blocks: usize,
    pub free_bytes: usize,
    pub allocated_blocks: usize,
    pub allocated_bytes: usize,
}

impl Stats {
    pub const fn new() -> Stats {
        Stats {
            free_blocks: 0,
            free_bytes: 0,
            allocated_blocks: 0,
            allocated_bytes: 0,
        }
    }

    /// Ledger of a freshly carved arena of `roots` free blocks.
    pub(crate) const fn bootstrap(roots: usize, payload_size: usize) -> Stats {
        Stats {
            free_blocks: roots,
            free_bytes: roots * payload_size,
            allocated_blocks: roots,
            allocated_bytes: roots * payload_size,
        }
    }

    /// Total bytes spent on headers.
    #[inline]
    pub fn metadata_bytes(&self) -> usize {
        self.allocated_blocks * HEADER_SIZE
    }

    pub(crate) fn record_split(&mut self) {
        self.allocated_blocks += 1;
        self.allocated_bytes -= HEADER_SIZE;
        self.free_blocks += 1;
        self.free_bytes -= HEADER_SIZE;
    }

    pub(crate) fn record_merge(&mut self) {
        self.allocated_blocks -= 1;
        self.allocated_bytes += HEADER_SIZE;
        self.free_blocks -= 1;
        self.free_bytes += HEADER_SIZE;
    }

    /// A free block was handed out.
    pub(crate) fn record_taken(&mut self, payload_size: usize) {
        self.free_blocks -= 1;
        self.free_bytes -= payload_size;
    }

    /// A handed out block went back to a free list.
    pub(crate) fn record_returned(&mut self, payload_size: usize) {
        self.free_blocks += 1;
        self.free_bytes += payload_size;
    }

    pub(crate) fn record_mapped(&mut self, payload_size: usize) {
        self.allocated_blocks += 1;
        self.allocated_bytes += payload_size;
    }

    pub(crate) fn record_unmapped(&mut self, payload_size: usize) {
        self.allocated_blocks -= 1;
        self.allocated_bytes -= payload_size;
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Free blocks:      {}", self.free_blocks)?;
        writeln!(f, "Free bytes:       {}", self.free_bytes)?;
        writeln!(f, "Allocated blocks: {}", self.allocated_blocks)?;
        writeln!(f, "Allocated bytes:  {}", self.allocated_bytes)?;
        writeln!(f, "Metadata bytes:   {}", self.metadata_bytes())
    }
}
