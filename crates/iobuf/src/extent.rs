// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::io::{self, Read, Write};
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

use tracing::{Level, event};

use crate::Result;
use crate::mem::{Block, BlockAllocator};

/// A window of bytes within one storage block.
///
/// An extent tracks three offsets into its block:
///
/// * `consumer` - start of the bytes not yet consumed.
/// * `producer` - end of the bytes written so far, start of the free space.
/// * `end` - end of the space this extent may write into.
///
/// The bytes between `consumer` and `producer` are the consumable bytes of the extent, the
/// bytes between `producer` and `end` are its free space. All offsets only ever stay within
/// `0 <= consumer <= producer <= end <= block length`.
///
/// # Shared storage
///
/// The block is shared between all extents that were sliced or cloned from each other and
/// lives until the last of them is dropped, at which point it is returned to the allocator
/// it came from.
///
/// Operations that write bytes into the block ([`zero_fill()`], [`copy_in()`],
/// [`copy_from()`], [`read_from()`]) first move the extent onto a private copy of the block
/// if the block is shared. Writes are therefore never visible through any other extent.
/// Operations that merely move offsets ([`fill()`], [`consume()`], [`trim()`]) never copy.
///
/// Views created by [`slice()`] end at their producer offset, so they have no free space
/// until trimmed.
///
/// [`zero_fill()`]: Self::zero_fill
/// [`copy_in()`]: Self::copy_in
/// [`copy_from()`]: Self::copy_from
/// [`read_from()`]: Self::read_from
/// [`fill()`]: Self::fill
/// [`consume()`]: Self::consume
/// [`trim()`]: Self::trim
/// [`slice()`]: Self::slice
#[derive(Clone)]
pub struct Extent {
    block: Arc<Block>,

    consumer: usize,
    producer: usize,
    end: usize,
}

impl Extent {
    /// Creates an empty extent over a fresh zero-initialized heap block of `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_block(Block::heap(capacity))
    }

    /// Creates an empty extent over a fresh block from `allocator`.
    ///
    /// The block is returned to `allocator` once the last extent referencing it is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailed`][crate::Error::AllocationFailed] if the allocator
    /// cannot supply a block.
    pub fn allocate(allocator: &Arc<dyn BlockAllocator>) -> Result<Self> {
        Block::allocate(allocator).map(Self::from_block)
    }

    /// Adopts caller-supplied storage.
    ///
    /// The extent initially holds the `len` bytes starting at `offset` as consumable bytes and
    /// can be written into from there up to the end of `bytes`. Both values are clipped to the
    /// storage bounds.
    #[must_use]
    pub fn from_boxed(bytes: Box<[u8]>, offset: usize, len: usize) -> Self {
        let mut extent = Self::from_block(Block::from_boxed(bytes));

        extent.fill(offset.saturating_add(len));
        extent.consume(offset);
        extent
    }

    pub(crate) fn from_block(block: Block) -> Self {
        let end = block.len();

        Self {
            block: Arc::new(block),
            consumer: 0,
            producer: 0,
            end,
        }
    }

    /// Returns a view over a range of the consumable bytes, sharing the same block.
    ///
    /// The range is relative to the first consumable byte. The view has no free space of its
    /// own and both extents remain independent of each other from here on.
    ///
    /// To write into a view, [`trim()`][Self::trim] it first: the trimmed bytes become its free
    /// space, and the first write moves the view onto a private copy of the block.
    ///
    /// Returns `None` if the range is not within the consumable bytes.
    #[must_use]
    pub fn slice<R>(&self, range: R) -> Option<Self>
    where
        R: RangeBounds<usize>,
    {
        let start = match range.start_bound() {
            Bound::Included(&x) => x,
            Bound::Excluded(&x) => x.checked_add(1)?,
            Bound::Unbounded => 0,
        };

        let end = match range.end_bound() {
            Bound::Included(&x) => x.checked_add(1)?,
            Bound::Excluded(&x) => x,
            Bound::Unbounded => self.bytes_consumable(),
        };

        if start > end || end > self.bytes_consumable() {
            return None;
        }

        let producer = self.consumer + end;

        Some(Self {
            block: Arc::clone(&self.block),
            consumer: self.consumer + start,
            producer,
            end: producer,
        })
    }

    /// Number of bytes between the consumer and producer offsets.
    #[must_use]
    pub fn bytes_consumable(&self) -> usize {
        self.producer - self.consumer
    }

    /// Number of bytes that can still be written after the producer offset.
    #[must_use]
    pub fn space_available(&self) -> usize {
        self.end - self.producer
    }

    /// Whether there are no consumable bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.producer == self.consumer
    }

    /// Whether there is no free space left.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.producer == self.end
    }

    /// Whether any other extent currently references the same block.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.block) > 1
    }

    /// The consumable bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.block.as_slice()[self.consumer..self.producer]
    }

    /// Marks up to `n` bytes of free space as written, without touching their contents.
    ///
    /// Returns the number of bytes added, which is less than `n` if there is not enough space.
    pub fn fill(&mut self, n: usize) -> usize {
        let n = n.min(self.space_available());

        self.producer += n;
        n
    }

    /// Writes up to `n` zero bytes into the free space.
    ///
    /// Returns the number of bytes added, which is less than `n` if there is not enough space.
    pub fn zero_fill(&mut self, n: usize) -> usize {
        let n = n.min(self.space_available());

        if n > 0 {
            self.spare_capacity_mut()[..n].fill(0);
            self.producer += n;
        }

        n
    }

    /// Discards up to `n` bytes from the front of the consumable bytes.
    ///
    /// Returns the number of bytes discarded.
    pub fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.bytes_consumable());

        self.consumer += n;
        n
    }

    /// Keeps only the first `n` consumable bytes, returning the trailing ones to free space.
    ///
    /// Returns the number of consumable bytes remaining. The storage itself is not released,
    /// as other extents may still reference it.
    pub fn trim(&mut self, n: usize) -> usize {
        let n = n.min(self.bytes_consumable());

        self.producer = self.consumer + n;
        n
    }

    /// Copies as much of `bytes` as fits into the free space.
    ///
    /// Returns the number of bytes copied.
    pub fn copy_in(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.space_available());

        if n > 0 {
            self.spare_capacity_mut()[..n].copy_from_slice(&bytes[..n]);
            self.producer += n;
        }

        n
    }

    /// Copies up to `n` consumable bytes of `other` into the free space.
    ///
    /// `other` is left unchanged. Returns the number of bytes copied.
    pub fn copy_from(&mut self, other: &Self, n: usize) -> usize {
        let n = n.min(other.bytes_consumable());

        self.copy_in(&other.as_slice()[..n])
    }

    /// Copies consumable bytes into `buf` without consuming them.
    ///
    /// Returns the number of bytes copied, the lesser of `buf.len()` and
    /// [`bytes_consumable()`][Self::bytes_consumable].
    pub fn copy_out(&self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.bytes_consumable());

        buf[..n].copy_from_slice(&self.as_slice()[..n]);
        n
    }

    /// Reads up to `max` bytes from `reader` directly into the free space.
    ///
    /// Issues at most one successful read call. Returns the number of bytes read, which is
    /// zero without calling `reader` if there is no free space or `max` is zero.
    ///
    /// # Errors
    ///
    /// Returns the error reported by `reader`. Interrupted calls are retried.
    pub fn read_from<R>(&mut self, reader: &mut R, max: usize) -> Result<usize>
    where
        R: Read + ?Sized,
    {
        let n = max.min(self.space_available());

        if n == 0 {
            return Ok(0);
        }

        loop {
            match reader.read(&mut self.spare_capacity_mut()[..n]) {
                Ok(read) => return Ok(self.fill(read)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    event!(Level::DEBUG, message = "extent read failed", error = %e);
                    return Err(e.into());
                }
            }
        }
    }

    /// Writes the consumable bytes to `writer`, consuming the bytes that were written.
    ///
    /// Issues at most one successful write call. Returns the number of bytes written, which
    /// is zero without calling `writer` if there is nothing to write.
    ///
    /// # Errors
    ///
    /// Returns the error reported by `writer`. Interrupted calls are retried.
    pub fn write_to<W>(&mut self, writer: &mut W) -> Result<usize>
    where
        W: Write + ?Sized,
    {
        if self.is_empty() {
            return Ok(0);
        }

        loop {
            match writer.write(self.as_slice()) {
                Ok(written) => return Ok(self.consume(written)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    event!(Level::DEBUG, message = "extent write failed", error = %e);
                    return Err(e.into());
                }
            }
        }
    }

    /// The free space, writable in place.
    ///
    /// Detaches the extent onto a private copy of its block first if the block is shared.
    /// Callers must not request this for a full extent, as that would copy for nothing.
    pub(crate) fn spare_capacity_mut(&mut self) -> &mut [u8] {
        debug_assert!(!self.is_full());

        let (producer, end) = (self.producer, self.end);

        &mut Arc::make_mut(&mut self.block).as_mut_slice()[producer..end]
    }
}

impl fmt::Debug for Extent {
    #[cfg_attr(coverage_nightly, coverage(off))] // There is no specific API contract here for us to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extent")
            .field("consumer", &self.consumer)
            .field("producer", &self.producer)
            .field("end", &self.end)
            .field("block", &self.block)
            .finish()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use new_zealand::nz;
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::Error;
    use crate::testing::{ReadStep, ScriptedReader, ScriptedWriter, TrackingAllocator, WriteStep};

    assert_impl_all!(Extent: Send, Sync, Clone);

    fn extent_with(bytes: &[u8], capacity: usize) -> Extent {
        let mut extent = Extent::with_capacity(capacity);
        assert_eq!(extent.copy_in(bytes), bytes.len());
        extent
    }

    #[test]
    fn fill_clips_to_free_space() {
        let mut extent = Extent::with_capacity(8);

        assert_eq!(extent.fill(3), 3);
        assert_eq!(extent.fill(100), 5);
        assert!(extent.is_full());
        assert_eq!(extent.space_available(), 0);
        assert_eq!(extent.bytes_consumable(), 8);
        assert_eq!(extent.fill(1), 0);
    }

    #[test]
    fn zero_fill_writes_zeros() {
        let mut extent = Extent::from_boxed(vec![0xFF; 6].into_boxed_slice(), 0, 2);

        assert_eq!(extent.zero_fill(10), 4);
        assert_eq!(extent.as_slice(), &[0xFF, 0xFF, 0, 0, 0, 0]);
    }

    #[test]
    fn consume_and_trim_clip() {
        let mut extent = extent_with(b"abcdef", 8);

        assert_eq!(extent.consume(0), 0);
        assert_eq!(extent.consume(2), 2);
        assert_eq!(extent.as_slice(), b"cdef");

        assert_eq!(extent.trim(10), 4);
        assert_eq!(extent.as_slice(), b"cdef");

        assert_eq!(extent.trim(1), 1);
        assert_eq!(extent.as_slice(), b"c");
        assert_eq!(extent.space_available(), 5);

        assert_eq!(extent.consume(10), 1);
        assert!(extent.is_empty());
    }

    #[test]
    fn copy_in_and_out() {
        let mut extent = Extent::with_capacity(4);

        assert_eq!(extent.copy_in(b"hello"), 4);
        assert_eq!(extent.copy_in(b"!"), 0);

        let mut buf = [0_u8; 8];
        assert_eq!(extent.copy_out(&mut buf), 4);
        assert_eq!(&buf[..4], b"hell");

        // Copying out is not destructive.
        assert_eq!(extent.bytes_consumable(), 4);

        let mut small = [0_u8; 2];
        assert_eq!(extent.copy_out(&mut small), 2);
        assert_eq!(&small, b"he");
    }

    #[test]
    fn copy_from_other_extent() {
        let source = extent_with(b"abcdef", 6);
        let mut target = extent_with(b"xy", 5);

        assert_eq!(target.copy_from(&source, 10), 3);
        assert_eq!(target.as_slice(), b"xyabc");
        assert_eq!(source.as_slice(), b"abcdef");
    }

    #[test]
    fn from_boxed_clips_window() {
        let extent = Extent::from_boxed(b"abcdef".to_vec().into_boxed_slice(), 2, 3);
        assert_eq!(extent.as_slice(), b"cde");
        assert_eq!(extent.space_available(), 1);

        let extent = Extent::from_boxed(b"abc".to_vec().into_boxed_slice(), 1, 100);
        assert_eq!(extent.as_slice(), b"bc");
        assert!(extent.is_full());

        let extent = Extent::from_boxed(b"abc".to_vec().into_boxed_slice(), 10, 1);
        assert!(extent.is_empty());
        assert!(extent.is_full());
    }

    #[test]
    fn slice_bounds() {
        let extent = extent_with(b"abcdef", 10);

        assert_eq!(extent.slice(..).unwrap().as_slice(), b"abcdef");
        assert_eq!(extent.slice(1..3).unwrap().as_slice(), b"bc");
        assert_eq!(extent.slice(2..=3).unwrap().as_slice(), b"cd");
        assert_eq!(extent.slice(6..).unwrap().as_slice(), b"");

        assert!(extent.slice(..7).is_none());
        assert!(extent.slice(7..).is_none());
        assert!(extent.slice(..=usize::MAX).is_none());
    }

    #[test]
    fn slice_is_relative_to_consumer() {
        let mut extent = extent_with(b"abcdef", 10);
        extent.consume(2);

        let view = extent.slice(1..3).unwrap();
        assert_eq!(view.as_slice(), b"de");
        assert!(view.is_full());
        assert!(extent.is_shared());
        assert!(view.is_shared());

        drop(view);
        assert!(!extent.is_shared());
    }

    #[test]
    fn writing_into_shared_block_detaches() {
        let mut original = extent_with(b"abc", 8);
        let view = original.slice(..).unwrap();

        assert_eq!(original.copy_in(b"d"), 1);

        assert_eq!(original.as_slice(), b"abcd");
        assert_eq!(view.as_slice(), b"abc");
        assert!(!original.is_shared());
        assert!(!view.is_shared());
    }

    #[test]
    fn trimmed_view_writes_privately() {
        let original = extent_with(b"hello", 5);
        let mut view = original.slice(..).unwrap();

        assert_eq!(view.copy_in(b"!"), 0);

        view.trim(2);
        assert_eq!(view.copy_in(b"XY"), 2);

        assert_eq!(view.as_slice(), b"heXY");
        assert_eq!(original.as_slice(), b"hello");
    }

    #[test]
    fn offset_only_operations_do_not_detach() {
        let mut original = extent_with(b"abc", 8);
        let _view = original.slice(..).unwrap();

        original.fill(2);
        original.consume(1);
        original.trim(2);

        assert!(original.is_shared());
    }

    #[test]
    fn detaching_copies_whole_block() {
        let mut original = extent_with(b"abcdef", 8);
        let view = original.slice(..).unwrap();

        original.trim(2);
        assert!(original.is_shared());

        assert_eq!(original.copy_in(b"X"), 1);
        assert!(!original.is_shared());

        // Bytes beyond the producer offset came along with the private copy.
        assert_eq!(original.fill(3), 3);
        assert_eq!(original.as_slice(), b"abXdef");
        assert_eq!(view.as_slice(), b"abcdef");
    }

    #[test]
    fn block_returns_to_allocator_with_last_extent() {
        let tracking = TrackingAllocator::new(nz!(16));
        let allocator: Arc<dyn BlockAllocator> = Arc::new(tracking.clone());

        let mut extent = Extent::allocate(&allocator).unwrap();
        assert_eq!(extent.space_available(), 16);
        extent.copy_in(b"data");

        let view = extent.slice(1..).unwrap();
        drop(extent);
        assert_eq!(tracking.live_blocks(), 1);
        assert_eq!(view.as_slice(), b"ata");

        drop(view);
        assert_eq!(tracking.live_blocks(), 0);
    }

    #[test]
    fn read_from_clips_to_space_and_max() {
        let mut reader = ScriptedReader::from_chunks([b"0123456789".to_vec()]);
        let mut extent = Extent::with_capacity(6);

        assert_eq!(extent.read_from(&mut reader, 4).unwrap(), 4);
        assert_eq!(extent.read_from(&mut reader, 100).unwrap(), 2);
        assert_eq!(extent.as_slice(), b"012345");

        // Full, so the reader is not even asked.
        assert_eq!(extent.read_from(&mut reader, 100).unwrap(), 0);
        assert_eq!(reader.calls().len(), 2);
        assert_eq!(reader.calls()[0].requested, 4);
        assert_eq!(reader.calls()[1].requested, 2);
    }

    #[test]
    fn read_from_retries_interrupted() {
        let mut reader = ScriptedReader::new([
            ReadStep::Fail(io::ErrorKind::Interrupted),
            ReadStep::Data(b"ok".to_vec()),
        ]);
        let mut extent = Extent::with_capacity(4);

        assert_eq!(extent.read_from(&mut reader, 4).unwrap(), 2);
        assert_eq!(extent.as_slice(), b"ok");
    }

    #[test]
    fn read_from_reports_errors() {
        let mut reader = ScriptedReader::default().would_block_when_exhausted();
        let mut extent = Extent::with_capacity(4);

        let error = extent.read_from(&mut reader, 4).unwrap_err();
        assert!(error.is_would_block());
        assert!(extent.is_empty());
    }

    #[test]
    fn write_to_consumes_written_bytes() {
        let mut writer = ScriptedWriter::new([WriteStep::Accept(2)]);
        let mut extent = extent_with(b"abcde", 5);

        assert_eq!(extent.write_to(&mut writer).unwrap(), 2);
        assert_eq!(extent.as_slice(), b"cde");

        assert_eq!(extent.write_to(&mut writer).unwrap(), 3);
        assert!(extent.is_empty());
        assert_eq!(writer.written(), b"abcde");

        assert_eq!(extent.write_to(&mut writer).unwrap(), 0);
        assert_eq!(writer.calls().len(), 2);
    }

    #[test]
    fn write_to_reports_errors() {
        let mut writer = ScriptedWriter::new([WriteStep::Fail(io::ErrorKind::BrokenPipe)]);
        let mut extent = extent_with(b"abc", 3);

        match extent.write_to(&mut writer) {
            Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected result: {other:?}"),
        }

        assert_eq!(extent.bytes_consumable(), 3);
    }
}
