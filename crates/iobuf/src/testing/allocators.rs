// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::num::NonZero;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::mem::BlockAllocator;

/// Supplies heap blocks and counts how many are currently handed out.
///
/// Clones share the same counters, so a test can keep one clone for inspection
/// while the buffer engine owns another.
#[derive(Clone, Debug)]
pub struct TrackingAllocator {
    block_size: NonZero<usize>,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    allocated: AtomicUsize,
    released: AtomicUsize,
}

impl TrackingAllocator {
    /// Creates an allocator supplying blocks of `block_size` bytes.
    #[must_use]
    pub fn new(block_size: NonZero<usize>) -> Self {
        Self {
            block_size,
            counters: Arc::default(),
        }
    }

    /// Blocks handed out and not yet returned.
    #[must_use]
    pub fn live_blocks(&self) -> usize {
        self.total_allocated()
            .saturating_sub(self.counters.released.load(Ordering::Acquire))
    }

    /// Blocks handed out over the lifetime of the allocator.
    #[must_use]
    pub fn total_allocated(&self) -> usize {
        self.counters.allocated.load(Ordering::Acquire)
    }
}

impl BlockAllocator for TrackingAllocator {
    fn block_size(&self) -> NonZero<usize> {
        self.block_size
    }

    fn allocate(&self) -> Option<Box<[u8]>> {
        self.counters.allocated.fetch_add(1, Ordering::AcqRel);
        Some(vec![0_u8; self.block_size.get()].into_boxed_slice())
    }

    fn deallocate(&self, block: Box<[u8]>) {
        assert_eq!(block.len(), self.block_size.get(), "block returned to the wrong allocator");
        self.counters.released.fetch_add(1, Ordering::AcqRel);
    }
}

/// Supplies a fixed number of heap blocks, then reports exhaustion forever after.
#[derive(Clone, Debug)]
pub struct FailingAllocator {
    block_size: NonZero<usize>,
    remaining: Arc<AtomicUsize>,
}

impl FailingAllocator {
    /// Creates an allocator that succeeds `successes` times before failing.
    #[must_use]
    pub fn new(block_size: NonZero<usize>, successes: usize) -> Self {
        Self {
            block_size,
            remaining: Arc::new(AtomicUsize::new(successes)),
        }
    }
}

impl BlockAllocator for FailingAllocator {
    fn block_size(&self) -> NonZero<usize> {
        self.block_size
    }

    fn allocate(&self) -> Option<Box<[u8]>> {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok()
            .map(|_| vec![0_u8; self.block_size.get()].into_boxed_slice())
    }

    #[cfg_attr(test, mutants::skip)] // Test double.
    fn deallocate(&self, block: Box<[u8]>) {
        drop(block);
    }
}
