// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::mem;
use std::sync::Arc;

use nm::{Event, Magnitude};
use tracing::{Level, event};

use crate::mem::BlockAllocator;
use crate::{Error, Result};

/// The storage behind one or more extents.
///
/// Extents hold a block via `Arc<Block>`, so the block lives for as long as any extent
/// references it. When the last reference goes away, the storage is handed back to the
/// allocator it came from (if any).
///
/// Writing into a block requires exclusive access (`Arc::get_mut()` / `Arc::make_mut()`).
/// When an extent wants to write into a block that is shared, `Arc::make_mut()` uses the
/// `Clone` implementation below to detach the extent onto a private copy.
pub(crate) struct Block {
    bytes: Box<[u8]>,

    // `None` for caller-supplied or heap storage that is simply dropped.
    allocator: Option<Arc<dyn BlockAllocator>>,
}

impl Block {
    /// Zero-initialized storage from the Rust global allocator.
    pub(crate) fn heap(len: usize) -> Self {
        Self {
            bytes: vec![0_u8; len].into_boxed_slice(),
            allocator: None,
        }
    }

    /// Adopts caller-supplied storage. It is dropped normally when no longer referenced.
    pub(crate) fn from_boxed(bytes: Box<[u8]>) -> Self {
        Self { bytes, allocator: None }
    }

    /// Adopts storage previously supplied by `allocator`, which will get it back on drop.
    pub(crate) fn from_allocator(bytes: Box<[u8]>, allocator: Arc<dyn BlockAllocator>) -> Self {
        Self {
            bytes,
            allocator: Some(allocator),
        }
    }

    /// Obtains a fresh block from `allocator`.
    pub(crate) fn allocate(allocator: &Arc<dyn BlockAllocator>) -> Result<Self> {
        let Some(bytes) = allocator.allocate() else {
            let block_size = allocator.block_size().get();

            event!(Level::WARN, message = "block allocation failed", block_size);

            return Err(Error::AllocationFailed { block_size });
        };

        Ok(Self::from_allocator(bytes, Arc::clone(allocator)))
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Clone for Block {
    /// Creates a private copy of the block, preferring storage from the same allocator.
    fn clone(&self) -> Self {
        let len = self.len();

        BLOCK_DETACHED_SIZE.with(|e| e.observe(len));
        event!(Level::TRACE, message = "detaching extent from shared block", len);

        let mut copy = self
            .allocator
            .as_ref()
            .filter(|allocator| allocator.block_size().get() == len)
            .and_then(|allocator| {
                allocator
                    .allocate()
                    .filter(|bytes| bytes.len() == len)
                    .map(|bytes| Self::from_allocator(bytes, Arc::clone(allocator)))
            })
            .unwrap_or_else(|| Self::heap(len));

        copy.bytes.copy_from_slice(&self.bytes);
        copy
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        if let Some(allocator) = self.allocator.take() {
            allocator.deallocate(mem::take(&mut self.bytes));
        }
    }
}

impl fmt::Debug for Block {
    #[cfg_attr(coverage_nightly, coverage(off))] // There is no specific API contract here for us to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("len", &self.bytes.len())
            .field("allocator", &self.allocator)
            .finish()
    }
}

const BLOCK_SIZE_BUCKETS: &[Magnitude] = &[0, 512, 1024, 2048, 4096, 8192, 16_384, 65_536];

thread_local! {
    static BLOCK_DETACHED_SIZE: Event = Event::builder()
        .name("iobuf_extent_detached_bytes")
        .histogram(BLOCK_SIZE_BUCKETS)
        .build();
}
