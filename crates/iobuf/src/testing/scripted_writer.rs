// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::VecDeque;
use std::io::{self, IoSlice, Write};

/// One scripted outcome of a write system call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteStep {
    /// The call accepts at most this many bytes.
    Accept(usize),

    /// The call fails with an error of this kind.
    Fail(io::ErrorKind),
}

/// What the caller offered in one write call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteCall {
    /// Total length of all slices offered to the call.
    pub offered: usize,

    /// Number of slices offered to the call.
    pub slices: usize,
}

/// A byte sink whose every write call follows a script.
///
/// Once the script is exhausted, every call accepts everything it is offered.
#[derive(Debug, Default)]
pub struct ScriptedWriter {
    steps: VecDeque<WriteStep>,
    calls: Vec<WriteCall>,
    written: Vec<u8>,
}

impl ScriptedWriter {
    /// Creates a writer following the given script.
    #[must_use]
    pub fn new(steps: impl IntoIterator<Item = WriteStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            ..Self::default()
        }
    }

    /// A writer that accepts everything.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Every byte accepted so far, in order.
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Every write call made so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> &[WriteCall] {
        &self.calls
    }
}

impl Write for ScriptedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_vectored(&[IoSlice::new(buf)])
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        let offered: usize = bufs.iter().map(|b| b.len()).sum();

        self.calls.push(WriteCall {
            offered,
            slices: bufs.len(),
        });

        let mut budget = match self.steps.pop_front() {
            Some(WriteStep::Fail(kind)) => return Err(kind.into()),
            Some(WriteStep::Accept(limit)) => limit.min(offered),
            None => offered,
        };

        let accepted = budget;

        for buf in bufs {
            if budget == 0 {
                break;
            }

            let n = budget.min(buf.len());
            self.written.extend_from_slice(&buf[..n]);
            budget -= n;
        }

        Ok(accepted)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
