// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::num::NonZero;

use crate::DEFAULT_BLOCK_SIZE;
use crate::mem::BlockAllocator;

/// A block allocator that obtains every block from the Rust global allocator
/// and releases it straight back.
///
/// Blocks are zero-initialized. This is the allocator used when nothing else is configured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapAllocator {
    block_size: NonZero<usize>,
}

impl HeapAllocator {
    /// Creates an allocator that supplies blocks of `block_size` bytes.
    #[must_use]
    pub const fn new(block_size: NonZero<usize>) -> Self {
        Self { block_size }
    }
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE)
    }
}

impl BlockAllocator for HeapAllocator {
    fn block_size(&self) -> NonZero<usize> {
        self.block_size
    }

    fn allocate(&self) -> Option<Box<[u8]>> {
        Some(vec![0_u8; self.block_size.get()].into_boxed_slice())
    }

    #[cfg_attr(test, mutants::skip)] // Dropping is the whole implementation.
    fn deallocate(&self, block: Box<[u8]>) {
        drop(block);
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use new_zealand::nz;
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(HeapAllocator: Send, Sync);

    #[test]
    fn default_uses_default_block_size() {
        let allocator = HeapAllocator::default();

        assert_eq!(allocator.block_size(), DEFAULT_BLOCK_SIZE);
        assert_eq!(allocator.allocate().unwrap().len(), DEFAULT_BLOCK_SIZE.get());
    }

    #[test]
    fn blocks_are_zeroed() {
        let allocator = HeapAllocator::new(nz!(33));

        let block = allocator.allocate().unwrap();

        assert_eq!(block.len(), 33);
        assert!(block.iter().all(|b| *b == 0));
    }
}
