// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::{Arc, OnceLock};

use tracing::{Level, event};

use crate::mem::{BlockAllocator, HeapAllocator};
use crate::{Error, Result};

static DEFAULT_ALLOCATOR: OnceLock<Arc<dyn BlockAllocator>> = OnceLock::new();

/// Installs the process-wide default block allocator.
///
/// The default allocator is used by [`ByteStream::new()`][crate::ByteStream::new] and by any
/// other constructor that is not given an explicit allocator. It can be installed at most once
/// and only before the default has been used for the first time. The first use of the default
/// fixes it for the rest of the process lifetime, to a [`HeapAllocator`] if nothing was installed.
///
/// Prefer passing an allocator explicitly via
/// [`ByteStream::with_allocator()`][crate::ByteStream::with_allocator] where possible.
///
/// # Errors
///
/// Returns [`Error::DefaultAllocatorInUse`] if a default allocator is already fixed.
pub fn set_default_allocator(allocator: Arc<dyn BlockAllocator>) -> Result<()> {
    let block_size = allocator.block_size().get();

    if DEFAULT_ALLOCATOR.set(allocator).is_err() {
        return Err(Error::DefaultAllocatorInUse);
    }

    event!(Level::DEBUG, message = "default block allocator installed", block_size);

    Ok(())
}

/// Returns the process-wide default block allocator, fixing it on first use.
#[must_use]
pub fn default_allocator() -> Arc<dyn BlockAllocator> {
    Arc::clone(DEFAULT_ALLOCATOR.get_or_init(|| Arc::new(HeapAllocator::default())))
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use new_zealand::nz;

    use super::*;

    #[test]
    fn replacing_after_first_use_is_rejected() {
        let before = default_allocator();

        let result = set_default_allocator(Arc::new(HeapAllocator::new(nz!(128))));
        assert!(matches!(result, Err(Error::DefaultAllocatorInUse)));

        // Still the same allocator as before the rejected attempt.
        assert!(Arc::ptr_eq(&before, &default_allocator()));
    }
}
