// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Vectored reads into and writes out of a [`ByteStream`].

use std::io::{self, IoSlice, IoSliceMut, Read, Write};

use nm::{Event, Magnitude};
use smallvec::SmallVec;
use tracing::{Level, event};

use crate::constants::{MAX_READ_SLICES, MAX_WRITE_SLICES, PREFERRED_READ_SIZE, PREFERRED_WRITE_SIZE};
use crate::{ByteStream, Extent, Result};

impl ByteStream {
    /// Reads from `reader` into the end of the stream, using as few read calls as possible.
    ///
    /// Each read call targets the free space of the last extent plus newly allocated extents,
    /// up to [`MAX_READ_SLICES`] slices and roughly [`PREFERRED_READ_SIZE`] bytes. Read calls
    /// are repeated while `reader` fills every slice it is given, until `max` bytes have been
    /// read (unlimited if `None`). A call that returns fewer bytes than requested (end of
    /// stream, or no more data available right now) ends the operation. Newly allocated
    /// extents that received no bytes are released again.
    ///
    /// If `max` is at most one block and the last extent has enough free space, a single
    /// plain read call into that extent is issued instead.
    ///
    /// Returns the number of bytes read and appended to the stream.
    ///
    /// # Errors
    ///
    /// Returns the error of the first read call if it fails before any bytes were read, or
    /// [`Error::AllocationFailed`][crate::Error::AllocationFailed] if no extent could be
    /// allocated to read into. Once any bytes were read, failures end the operation and the
    /// bytes read so far are reported. Interrupted calls are retried.
    pub fn read_from<R>(&mut self, reader: &mut R, max: Option<usize>) -> Result<usize>
    where
        R: Read + ?Sized,
    {
        let block_size = self.allocator.block_size().get();

        if max == Some(0) {
            return Ok(0);
        }

        if let Some(max) = max.filter(|&max| max <= block_size)
            && let Some(tail) = self.extents.back_mut()
            && tail.space_available() >= max
        {
            let read = tail.read_from(reader, max)?;
            self.len += read;

            READ_SYSCALL_BYTES.with(|e| e.observe(read));
            READ_BATCH_SLICES.with(|e| e.observe(1));

            self.check_len();
            return Ok(read);
        }

        let max_slices = MAX_READ_SLICES.min(PREFERRED_READ_SIZE / block_size + 1);
        let mut budget = max.unwrap_or(usize::MAX);
        let mut total = 0;

        while budget > 0 {
            let ceiling = budget.min(PREFERRED_READ_SIZE);

            let tail_len = self
                .extents
                .back()
                .map_or(0, |tail| tail.space_available().min(ceiling));

            let mut requested = tail_len;
            let mut fresh: SmallVec<[Extent; MAX_READ_SLICES]> = SmallVec::new();

            while requested < ceiling && usize::from(tail_len > 0) + fresh.len() < max_slices {
                match Extent::allocate(&self.allocator) {
                    Ok(extent) => {
                        requested += extent.space_available().min(ceiling - requested);
                        fresh.push(extent);
                    }
                    Err(e) if total == 0 && tail_len == 0 && fresh.is_empty() => return Err(e),
                    Err(_) => break,
                }
            }

            if requested == 0 {
                break;
            }

            let result = {
                let mut bufs: SmallVec<[IoSliceMut<'_>; MAX_READ_SLICES]> = SmallVec::new();

                if tail_len > 0
                    && let Some(tail) = self.extents.back_mut()
                {
                    bufs.push(IoSliceMut::new(&mut tail.spare_capacity_mut()[..tail_len]));
                }

                let mut unassigned = requested - tail_len;

                for extent in &mut fresh {
                    let len = extent.space_available().min(unassigned);
                    unassigned -= len;

                    bufs.push(IoSliceMut::new(&mut extent.spare_capacity_mut()[..len]));
                }

                READ_BATCH_SLICES.with(|e| e.observe(bufs.len()));

                loop {
                    match reader.read_vectored(&mut bufs) {
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                        result => break result,
                    }
                }
            };

            let read = match result {
                Ok(read) => read.min(requested),
                Err(e) if total == 0 => {
                    event!(Level::DEBUG, message = "stream read failed", error = %e);
                    return Err(e.into());
                }
                Err(e) => {
                    event!(Level::DEBUG, message = "stream read failed after partial progress", total, error = %e);
                    break;
                }
            };

            READ_SYSCALL_BYTES.with(|e| e.observe(read));

            // The tail received the first bytes, the fresh extents the rest in order. Fresh
            // extents that received nothing are dropped here, releasing their blocks.
            let mut undistributed = read;

            if let Some(tail) = self.extents.back_mut() {
                undistributed -= tail.fill(undistributed.min(tail_len));
            }

            for mut extent in fresh {
                if undistributed == 0 {
                    break;
                }

                undistributed -= extent.fill(undistributed);
                self.extents.push_back(extent);
            }

            self.len += read;
            total += read;
            budget -= read;

            self.check_len();

            if read < requested {
                event!(Level::TRACE, message = "short read ends stream read", requested, read, total);
                break;
            }
        }

        Ok(total)
    }

    /// Writes the stream to `writer`, consuming the bytes that were written.
    ///
    /// Each write call offers the extents at the front of the stream, up to
    /// [`MAX_WRITE_SLICES`] slices and roughly [`PREFERRED_WRITE_SIZE`] bytes. Write calls are
    /// repeated until the stream is empty or `writer` accepts fewer bytes than offered, which
    /// is taken as a sign that it cannot accept more right now.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns the error of the first write call if it fails before any bytes were written.
    /// Once any bytes were written, failures end the operation and the bytes written so far
    /// are reported. Interrupted calls are retried.
    pub fn write_to<W>(&mut self, writer: &mut W) -> Result<usize>
    where
        W: Write + ?Sized,
    {
        self.extents.retain(|extent| !extent.is_empty());

        let mut total = 0;

        while !self.is_empty() {
            let mut bufs: SmallVec<[IoSlice<'_>; MAX_WRITE_SLICES]> = SmallVec::new();
            let mut offered = 0;

            for extent in &self.extents {
                if bufs.len() == MAX_WRITE_SLICES || offered >= PREFERRED_WRITE_SIZE {
                    break;
                }

                bufs.push(IoSlice::new(extent.as_slice()));
                offered += extent.bytes_consumable();
            }

            WRITE_BATCH_SLICES.with(|e| e.observe(bufs.len()));

            let result = loop {
                match writer.write_vectored(&bufs) {
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    result => break result,
                }
            };

            drop(bufs);

            let written = match result {
                Ok(written) => written.min(offered),
                Err(e) if total == 0 => {
                    event!(Level::DEBUG, message = "stream write failed", error = %e);
                    return Err(e.into());
                }
                Err(e) => {
                    event!(Level::DEBUG, message = "stream write failed after partial progress", total, error = %e);
                    break;
                }
            };

            WRITE_SYSCALL_BYTES.with(|e| e.observe(written));

            self.consume(written);
            total += written;

            if written < offered {
                event!(Level::TRACE, message = "short write ends stream write", offered, written, total);
                break;
            }
        }

        Ok(total)
    }
}

const SYSCALL_BYTES_BUCKETS: &[Magnitude] = &[0, 64, 512, 4096, 16_384, 65_536, 262_144];

const BATCH_SLICES_BUCKETS: &[Magnitude] = &[0, 1, 2, 4, 8, 16, 32];

thread_local! {
    static READ_SYSCALL_BYTES: Event = Event::builder()
        .name("iobuf_read_syscall_bytes")
        .histogram(SYSCALL_BYTES_BUCKETS)
        .build();

    static READ_BATCH_SLICES: Event = Event::builder()
        .name("iobuf_read_batch_slices")
        .histogram(BATCH_SLICES_BUCKETS)
        .build();

    static WRITE_SYSCALL_BYTES: Event = Event::builder()
        .name("iobuf_write_syscall_bytes")
        .histogram(SYSCALL_BYTES_BUCKETS)
        .build();

    static WRITE_BATCH_SLICES: Event = Event::builder()
        .name("iobuf_write_batch_slices")
        .histogram(BATCH_SLICES_BUCKETS)
        .build();
}
