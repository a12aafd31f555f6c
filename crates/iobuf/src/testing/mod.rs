// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test doubles for exercising byte stream logic under controlled conditions.
//!
//! * [`ScriptedReader`] / [`ScriptedWriter`] stand in for descriptors and let a test decide
//!   exactly how many bytes each vectored system call transfers, including short transfers
//!   and failures.
//! * [`TrackingAllocator`] counts blocks in use so tests can prove that nothing leaks.
//! * [`FailingAllocator`] runs out of blocks after a configured number of allocations.

mod allocators;
mod scripted_reader;
mod scripted_writer;

pub use allocators::{FailingAllocator, TrackingAllocator};
pub use scripted_reader::{ReadCall, ReadStep, ScriptedReader};
pub use scripted_writer::{ScriptedWriter, WriteCall, WriteStep};
