// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::num::NonZero;

/// Supplies fixed-size memory blocks to extents.
///
/// Every block handed out by [`allocate()`][Self::allocate] is returned via
/// [`deallocate()`][Self::deallocate] once the last extent referencing it is dropped. The
/// allocator may recycle returned blocks.
///
/// # Thread safety
///
/// Blocks may be released on a different thread from the one that allocated them, so
/// implementations must be thread-safe.
pub trait BlockAllocator: Debug + Send + Sync {
    /// The size of every block this allocator supplies.
    fn block_size(&self) -> NonZero<usize>;

    /// Supplies a block of exactly [`block_size()`][Self::block_size] bytes.
    ///
    /// Returns `None` if no block can be supplied. Callers treat this as a soft failure and
    /// stop the current operation after whatever progress was already made.
    fn allocate(&self) -> Option<Box<[u8]>>;

    /// Takes back a block previously supplied by [`allocate()`][Self::allocate].
    fn deallocate(&self, block: Box<[u8]>);
}
