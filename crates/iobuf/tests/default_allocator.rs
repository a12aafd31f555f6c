// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The process-wide default allocator. Runs as its own test binary, so the default is still
//! unused when the test starts.

use std::sync::Arc;

use iobuf::{ByteStream, Error, HeapAllocator, default_allocator, set_default_allocator};
use new_zealand::nz;

#[test]
fn installed_before_first_use() {
    set_default_allocator(Arc::new(HeapAllocator::new(nz!(64)))).unwrap();

    assert_eq!(default_allocator().block_size(), nz!(64));

    let mut stream = ByteStream::new();
    stream.copy_in(&[5; 100]);
    assert_eq!(stream.extents().len(), 2);
    assert!(stream.extents().all(|extent| extent.bytes_consumable() <= 64));

    let second = set_default_allocator(Arc::new(HeapAllocator::new(nz!(128))));
    assert!(matches!(second, Err(Error::DefaultAllocatorInUse)));
}
