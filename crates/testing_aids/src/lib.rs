// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An unpublished crate containing testing utilities for use within this repo.

mod log;

pub use log::*;

/// Standard test data generator: a repeating sequence of bytes from 0 to 255.
pub fn repeating_incrementing_bytes() -> impl Iterator<Item = u8> {
    (0..=u8::MAX).cycle()
}

/// The first `len` bytes of [`repeating_incrementing_bytes()`], collected.
#[must_use]
pub fn test_bytes(len: usize) -> Vec<u8> {
    repeating_incrementing_bytes().take(len).collect()
}
