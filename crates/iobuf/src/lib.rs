// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Zero-copy scatter/gather byte streams for network services.
//!
//! This crate moves bytes between descriptors (sockets, pipes, files) and application code
//! with as few copies and system calls as possible.
//!
//! # Extents
//!
//! An [`Extent`] is a window over a memory block. It has a consumer offset (start of the bytes
//! not yet consumed), a producer offset (end of the bytes written so far) and an end offset
//! (end of the space it may write into). Blocks are reference counted and may be shared by many
//! extents, each with its own window. Writing into a shared block first gives the writing
//! extent a private copy, so bytes once handed out never change underneath their readers.
//!
//! # Byte streams
//!
//! A [`ByteStream`] is an ordered list of extents treated as one logical byte sequence:
//!
//! * [`read_from()`] fills the stream from any [`std::io::Read`] with vectored reads
//!   spanning the free space of the last extent plus freshly allocated blocks.
//! * [`write_to()`] drains the stream into any [`std::io::Write`] with vectored writes.
//! * [`move_from()`], [`append()`], [`copy_from()`] and [`Clone`] transfer or duplicate bytes
//!   between streams by reference, without copying them.
//! * [`copy_in()`], [`copy_out()`], [`consume()`] and [`trim()`] are the byte-accurate
//!   accessors for application code.
//!
//! ```
//! use iobuf::ByteStream;
//!
//! let mut inbound = ByteStream::new();
//! inbound.copy_in(b"GET /index.html");
//!
//! // The method moves into its own stream by reference, the rest stays behind.
//! let mut method = ByteStream::new();
//! method.move_from(&mut inbound, 3);
//! inbound.consume(1);
//!
//! assert_eq!(method.to_vec(), b"GET");
//! assert_eq!(inbound.to_vec(), b"/index.html");
//! ```
//!
//! Short transfers are normal: every operation returns the number of bytes it processed and
//! only fails with an [`Error`] if no progress at all was possible.
//!
//! # Memory blocks
//!
//! Blocks come from a [`BlockAllocator`]. A stream can be given its own allocator via
//! [`ByteStream::with_allocator()`]; otherwise it uses the process-wide default, which is a
//! [`HeapAllocator`] of [`DEFAULT_BLOCK_SIZE`] bytes unless a different one is installed via
//! [`set_default_allocator()`] before first use.
//!
//! [`read_from()`]: ByteStream::read_from
//! [`write_to()`]: ByteStream::write_to
//! [`move_from()`]: ByteStream::move_from
//! [`append()`]: ByteStream::append
//! [`copy_from()`]: ByteStream::copy_from
//! [`copy_in()`]: ByteStream::copy_in
//! [`copy_out()`]: ByteStream::copy_out
//! [`consume()`]: ByteStream::consume
//! [`trim()`]: ByteStream::trim

mod constants;
mod error;
mod extent;
mod mem;
mod stream;
mod stream_io;

pub use constants::{DEFAULT_BLOCK_SIZE, MAX_READ_SLICES, MAX_WRITE_SLICES, PREFERRED_READ_SIZE, PREFERRED_WRITE_SIZE};
pub use error::{Error, Result};
pub use extent::Extent;
pub use mem::{BlockAllocator, HeapAllocator, default_allocator, set_default_allocator};
pub use stream::ByteStream;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
