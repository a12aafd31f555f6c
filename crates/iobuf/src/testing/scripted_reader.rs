// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::VecDeque;
use std::io::{self, IoSliceMut, Read};

/// One scripted outcome of a read system call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadStep {
    /// The call delivers up to these bytes. Whatever does not fit into the caller's
    /// slices is delivered by the next call.
    Data(Vec<u8>),

    /// The call fails with an error of this kind.
    Fail(io::ErrorKind),
}

/// What the caller asked for in one read call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadCall {
    /// Total capacity of all slices offered to the call.
    pub requested: usize,

    /// Number of slices offered to the call.
    pub slices: usize,
}

/// A byte source whose every read call follows a script.
///
/// Once the script is exhausted, reads report end of stream (`Ok(0)`), or
/// [`io::ErrorKind::WouldBlock`] if configured via [`would_block_when_exhausted()`].
///
/// [`would_block_when_exhausted()`]: Self::would_block_when_exhausted
#[derive(Debug, Default)]
pub struct ScriptedReader {
    steps: VecDeque<ReadStep>,
    calls: Vec<ReadCall>,
    would_block_when_exhausted: bool,
}

impl ScriptedReader {
    /// Creates a reader following the given script.
    #[must_use]
    pub fn new(steps: impl IntoIterator<Item = ReadStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Creates a reader that delivers one chunk per call.
    #[must_use]
    pub fn from_chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        Self::new(chunks.into_iter().map(|c| ReadStep::Data(c.into())))
    }

    /// Reports "would block" instead of end of stream once the script is exhausted.
    #[must_use]
    pub fn would_block_when_exhausted(mut self) -> Self {
        self.would_block_when_exhausted = true;
        self
    }

    /// Every read call made so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> &[ReadCall] {
        &self.calls
    }

    /// Whether every scripted step has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_vectored(&mut [IoSliceMut::new(buf)])
    }

    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        self.calls.push(ReadCall {
            requested: bufs.iter().map(|b| b.len()).sum(),
            slices: bufs.len(),
        });

        let data = match self.steps.pop_front() {
            None if self.would_block_when_exhausted => return Err(io::ErrorKind::WouldBlock.into()),
            None => return Ok(0),
            Some(ReadStep::Fail(kind)) => return Err(kind.into()),
            Some(ReadStep::Data(data)) => data,
        };

        let mut delivered = 0;

        for buf in bufs.iter_mut() {
            let remaining = data.get(delivered..).unwrap_or_default();
            let n = remaining.len().min(buf.len());

            buf[..n].copy_from_slice(&remaining[..n]);
            delivered += n;
        }

        if delivered < data.len() {
            self.steps.push_front(ReadStep::Data(data[delivered..].to_vec()));
        }

        Ok(delivered)
    }
}
