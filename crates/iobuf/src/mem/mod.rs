// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Types for supplying and sharing the memory blocks that back extents.

mod allocator;
mod block;
mod default;
mod heap;

pub use allocator::BlockAllocator;
pub(crate) use block::Block;
pub use default::{default_allocator, set_default_allocator};
pub use heap::HeapAllocator;
