// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::num::NonZero;

use new_zealand::nz;

/// Block size used when no allocator with a different preference has been configured.
pub const DEFAULT_BLOCK_SIZE: NonZero<usize> = nz!(4096);

/// Soft upper bound on the number of bytes a single vectored read asks the descriptor for.
pub const PREFERRED_READ_SIZE: usize = 64 * 1024;

/// Hard upper bound on the number of slices in a single vectored read.
///
/// Enough to cover [`PREFERRED_READ_SIZE`] with default-sized blocks plus the partially filled
/// tail extent of the stream.
pub const MAX_READ_SLICES: usize = PREFERRED_READ_SIZE / DEFAULT_BLOCK_SIZE.get() + 1;

/// Soft upper bound on the number of bytes offered to a single vectored write.
pub const PREFERRED_WRITE_SIZE: usize = 64 * 1024;

/// Hard upper bound on the number of slices in a single vectored write.
pub const MAX_WRITE_SLICES: usize = 32;

