// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// An error signaled by the buffer engine.
///
/// Clipping an over-sized request to what fits is never an error. Operations that can only
/// partially succeed report the number of bytes they actually processed instead. Errors are
/// only raised when no progress at all could be made.
///
/// # Thread safety
///
/// This type is thread-safe.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The descriptor failed before any byte was transferred.
    ///
    /// The operating system error code, if any, is available via
    /// [`std::io::Error::raw_os_error()`]. Whether the error means "try again later"
    /// (e.g. [`std::io::ErrorKind::WouldBlock`]) or a hard failure is for the caller to decide.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The block allocator could not supply a memory block and nothing had been transferred yet.
    #[error("block allocator failed to supply a block of {block_size} bytes")]
    AllocationFailed {
        /// Size of the block that was requested.
        block_size: usize,
    },

    /// The process-wide default allocator has already been fixed, either because one was
    /// installed earlier or because the built-in default was used.
    #[error("the default block allocator is already in use and can no longer be replaced")]
    DefaultAllocatorInUse,
}

impl Error {
    /// Whether this error means that the descriptor is not ready and the operation
    /// may be retried once it is.
    #[must_use]
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::WouldBlock)
    }
}

/// A `Result` that may contain an [`Error`] from this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a buffer engine error as a standard I/O error, for callers that
/// interoperate with APIs expecting standard I/O errors.
impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Io(error) => error,
            Error::AllocationFailed { .. } => Self::new(std::io::ErrorKind::OutOfMemory, value),
            Error::DefaultAllocatorInUse => Self::other(value),
        }
    }
}
