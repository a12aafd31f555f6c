// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::Extent;
use crate::mem::{BlockAllocator, default_allocator};

/// An ordered sequence of extents forming one logical byte stream.
///
/// The stream starts with the consumable bytes of its first extent, continues with those of
/// the second extent and so on. Extents without consumable bytes may linger in the sequence
/// for a while; they are pruned as operations walk past them.
///
/// Moving bytes between streams ([`append()`], [`move_all()`], [`move_from()`]), duplicating
/// them ([`Clone`], [`copy_from()`]) and consuming or trimming them never copies any bytes.
/// Only [`zero_fill()`], [`copy_in()`] and [`read_from()`] write bytes, each into a block
/// that is not visible through any other stream (see [`Extent`] for the copy-on-write rules).
///
/// New extents are obtained from the stream's [`BlockAllocator`]. A stream created via
/// [`new()`] uses the process-wide [`default_allocator()`][crate::default_allocator].
///
/// [`append()`]: Self::append
/// [`move_all()`]: Self::move_all
/// [`move_from()`]: Self::move_from
/// [`copy_from()`]: Self::copy_from
/// [`zero_fill()`]: Self::zero_fill
/// [`copy_in()`]: Self::copy_in
/// [`read_from()`]: Self::read_from
/// [`new()`]: Self::new
#[derive(Debug)]
pub struct ByteStream {
    pub(crate) extents: VecDeque<Extent>,

    // Sum of the consumable bytes of all extents.
    pub(crate) len: usize,

    pub(crate) allocator: Arc<dyn BlockAllocator>,
}

impl ByteStream {
    /// Creates an empty stream that allocates from the process-wide default allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_allocator(default_allocator())
    }

    /// Creates an empty stream that allocates from `allocator`.
    #[must_use]
    pub fn with_allocator(allocator: Arc<dyn BlockAllocator>) -> Self {
        Self {
            extents: VecDeque::new(),
            len: 0,
            allocator,
        }
    }

    /// The allocator new extents of this stream come from.
    #[must_use]
    pub fn allocator(&self) -> &Arc<dyn BlockAllocator> {
        &self.allocator
    }

    /// Number of consumable bytes in the stream.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the stream holds no consumable bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The extents currently making up the stream, in stream order.
    ///
    /// This may include extents without consumable bytes.
    pub fn extents(&self) -> impl ExactSizeIterator<Item = &Extent> {
        self.extents.iter()
    }

    /// Copies the whole stream into a new vector without consuming anything.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len);

        for extent in &self.extents {
            bytes.extend_from_slice(extent.as_slice());
        }

        bytes
    }

    /// Appends an extent to the end of the stream.
    ///
    /// Any free space of the extent is used by later writes into the stream.
    pub fn push_extent(&mut self, extent: Extent) {
        self.len += extent.bytes_consumable();
        self.extents.push_back(extent);

        self.check_len();
    }

    /// Moves every non-empty extent of `other` to the end of this stream, leaving `other` empty.
    ///
    /// Returns the number of bytes moved.
    pub fn append(&mut self, other: &mut Self) -> usize {
        let moved = other.len;

        self.extents.extend(other.extents.drain(..).filter(|extent| !extent.is_empty()));
        self.len += moved;
        other.len = 0;

        self.check_len();
        moved
    }

    /// Moves the entire extent sequence of `other` to the end of this stream in one step,
    /// leaving `other` empty.
    pub fn move_all(&mut self, other: &mut Self) {
        self.extents.append(&mut other.extents);
        self.len += other.len;
        other.len = 0;

        self.check_len();
    }

    /// Moves up to `n` bytes from the front of `other` to the end of this stream.
    ///
    /// Extents that are covered entirely are moved as they are. If `n` ends within an extent,
    /// a view over its first bytes is moved and the extent in `other` is consumed past them.
    ///
    /// Returns the number of bytes moved, which is less than `n` if `other` is shorter.
    pub fn move_from(&mut self, other: &mut Self, n: usize) -> usize {
        let mut moved = 0;
        let mut remaining = n.min(other.len);

        while remaining > 0 {
            let Some(front) = other.extents.front_mut() else {
                break;
            };

            let available = front.bytes_consumable();

            if available <= remaining {
                if let Some(extent) = other.extents.pop_front()
                    && !extent.is_empty()
                {
                    self.extents.push_back(extent);
                }

                moved += available;
                remaining -= available;
            } else {
                if let Some(view) = front.slice(..remaining) {
                    front.consume(remaining);
                    self.extents.push_back(view);
                    moved += remaining;
                }

                break;
            }
        }

        other.prune_front();

        self.len += moved;
        other.len -= moved;

        self.check_len();
        other.check_len();
        moved
    }

    /// Appends up to `n` bytes from the front of `other` to this stream without consuming
    /// them from `other`.
    ///
    /// The appended extents are views sharing storage with `other`. Returns the number of
    /// bytes appended.
    pub fn copy_from(&mut self, other: &Self, n: usize) -> usize {
        let mut copied = 0;

        for extent in &other.extents {
            if copied == n {
                break;
            }

            let take = extent.bytes_consumable().min(n - copied);

            if take == 0 {
                continue;
            }

            if let Some(view) = extent.slice(..take) {
                self.extents.push_back(view);
                copied += take;
            }
        }

        self.len += copied;

        self.check_len();
        copied
    }

    /// Appends `n` zero bytes, extending the last extent first and then adding new ones.
    ///
    /// Returns the number of bytes appended. This is `n` unless the allocator runs out of
    /// blocks.
    pub fn zero_fill(&mut self, n: usize) -> usize {
        while self.extents.back().is_some_and(Extent::is_empty) {
            self.extents.pop_back();
        }

        let filled = self.extend_with(n, |extent, remaining| extent.zero_fill(remaining));

        self.check_len();
        filled
    }

    /// Appends a copy of `bytes`, extending the last extent first and then adding new ones.
    ///
    /// Returns the number of bytes appended. This is `bytes.len()` unless the allocator runs
    /// out of blocks.
    pub fn copy_in(&mut self, bytes: &[u8]) -> usize {
        let copied = self.extend_with(bytes.len(), |extent, remaining| {
            let offset = bytes.len() - remaining;
            extent.copy_in(&bytes[offset..])
        });

        self.check_len();
        copied
    }

    /// Copies bytes from the front of the stream into `buf` without consuming them.
    ///
    /// Returns the number of bytes copied, the lesser of `buf.len()` and [`len()`][Self::len].
    pub fn copy_out(&self, buf: &mut [u8]) -> usize {
        let mut copied = 0;

        for extent in &self.extents {
            if copied == buf.len() {
                break;
            }

            copied += extent.copy_out(&mut buf[copied..]);
        }

        copied
    }

    /// Discards up to `n` bytes from the front of the stream.
    ///
    /// Returns the number of bytes discarded.
    pub fn consume(&mut self, n: usize) -> usize {
        if n >= self.len {
            let consumed = self.len;
            self.clear();
            return consumed;
        }

        let mut remaining = n;

        while remaining > 0 {
            let Some(front) = self.extents.front_mut() else {
                break;
            };

            remaining -= front.consume(remaining);

            if front.is_empty() {
                self.extents.pop_front();
            }
        }

        self.prune_front();
        self.len -= n;

        self.check_len();
        n
    }

    /// Keeps only the first `n` bytes of the stream.
    ///
    /// Trailing extents are dropped and the extent containing the cut point is trimmed. A
    /// stream of at most `n` bytes is left unchanged and trimming to zero clears it.
    ///
    /// Returns the resulting length of the stream.
    pub fn trim(&mut self, n: usize) -> usize {
        if n == 0 {
            self.clear();
            return 0;
        }

        if n >= self.len {
            return self.len;
        }

        let mut keep = n;
        let mut kept_extents = 0;

        for extent in &mut self.extents {
            kept_extents += 1;

            let available = extent.bytes_consumable();

            if available >= keep {
                extent.trim(keep);
                break;
            }

            keep -= available;
        }

        self.extents.truncate(kept_extents);
        self.len = n;

        self.check_len();
        n
    }

    /// Removes all bytes and extents from the stream.
    pub fn clear(&mut self) {
        self.extents.clear();
        self.len = 0;
    }

    // Appends up to `n` bytes via `write`, which is called with an extent that has free space
    // and the number of bytes still to append, and returns how many it appended.
    fn extend_with<F>(&mut self, n: usize, mut write: F) -> usize
    where
        F: FnMut(&mut Extent, usize) -> usize,
    {
        let mut written = 0;

        while written < n {
            let tail = match self.extents.back_mut() {
                Some(tail) if !tail.is_full() => tail,
                _ => match Extent::allocate(&self.allocator) {
                    Ok(extent) => {
                        self.extents.push_back(extent);
                        continue;
                    }
                    // Already logged by the allocation path, the caller sees the short count.
                    Err(_) => break,
                },
            };

            let appended = write(tail, n - written);

            if appended == 0 {
                break;
            }

            written += appended;
            self.len += appended;
        }

        written
    }

    // Drops leading extents that have nothing left to consume.
    pub(crate) fn prune_front(&mut self) {
        while self.extents.front().is_some_and(Extent::is_empty) {
            self.extents.pop_front();
        }
    }

    #[cfg_attr(test, mutants::skip)] // Debug-only check, no behavior to mutate.
    pub(crate) fn check_len(&self) {
        debug_assert_eq!(
            self.len,
            self.extents.iter().map(Extent::bytes_consumable).sum::<usize>(),
            "cached stream length out of sync with its extents"
        );
    }
}

impl Default for ByteStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ByteStream {
    /// Creates a stream with the same bytes, sharing storage with this one.
    ///
    /// The clone holds views over the consumable bytes of every non-empty extent, so later
    /// operations on either stream do not affect the other.
    fn clone(&self) -> Self {
        Self {
            extents: self
                .extents
                .iter()
                .filter(|extent| !extent.is_empty())
                .filter_map(|extent| extent.slice(..))
                .collect(),
            len: self.len,
            allocator: Arc::clone(&self.allocator),
        }
    }
}
