// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(unix)]

//! Vectored reads and writes against real descriptors.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use iobuf::{ByteStream, HeapAllocator};
use new_zealand::nz;
use testing_aids::test_bytes;

fn nonblocking_pair() -> (UnixStream, UnixStream) {
    let (a, b) = UnixStream::pair().unwrap();
    a.set_nonblocking(true).unwrap();
    b.set_nonblocking(true).unwrap();
    (a, b)
}

#[test]
fn read_everything_available_then_would_block() {
    let (mut sender, mut receiver) = nonblocking_pair();
    let data = test_bytes(10_000);
    sender.write_all(&data).unwrap();

    let mut stream = ByteStream::with_allocator(Arc::new(HeapAllocator::new(nz!(1024))));

    let mut total = 0;
    while total < data.len() {
        total += stream.read_from(&mut receiver, None).unwrap();
    }

    assert_eq!(stream.len(), data.len());
    assert_eq!(stream.to_vec(), data);

    let error = stream.read_from(&mut receiver, None).unwrap_err();
    assert!(error.is_would_block());
    assert_eq!(stream.len(), data.len());
}

#[test]
fn bounded_reads_respect_the_limit() {
    let (mut sender, mut receiver) = nonblocking_pair();
    sender.write_all(b"0123456789").unwrap();

    let mut stream = ByteStream::with_allocator(Arc::new(HeapAllocator::new(nz!(4))));

    assert_eq!(stream.read_from(&mut receiver, Some(3)).unwrap(), 3);
    assert_eq!(stream.read_from(&mut receiver, Some(5)).unwrap(), 5);
    assert_eq!(stream.to_vec(), b"01234567");
}

#[test]
fn end_of_stream_reads_zero() {
    let (sender, mut receiver) = nonblocking_pair();
    drop(sender);

    let mut stream = ByteStream::new();

    assert_eq!(stream.read_from(&mut receiver, None).unwrap(), 0);
    assert!(stream.is_empty());
    assert_eq!(stream.extents().len(), 0);
}

#[test]
fn relay_through_two_descriptors() {
    let (mut source, mut relay_in) = nonblocking_pair();
    let (mut relay_out, mut sink) = nonblocking_pair();

    let data = test_bytes(3000);
    source.write_all(&data).unwrap();

    let mut stream = ByteStream::with_allocator(Arc::new(HeapAllocator::new(nz!(256))));
    let mut read = 0;
    while read < data.len() {
        read += stream.read_from(&mut relay_in, None).unwrap();
    }

    assert_eq!(stream.write_to(&mut relay_out).unwrap(), data.len());
    assert!(stream.is_empty());

    let mut received = ByteStream::new();
    let mut total = 0;
    while total < data.len() {
        total += received.read_from(&mut sink, None).unwrap();
    }

    assert_eq!(received.to_vec(), data);
}

#[test]
fn write_to_full_socket_stops_short() {
    let (mut writer_side, _reader_side) = nonblocking_pair();

    let mut stream = ByteStream::with_allocator(Arc::new(HeapAllocator::new(nz!(4096))));
    stream.zero_fill(8 * 1024 * 1024);

    // Nobody reads, so the socket buffer fills up long before 8 MiB are written.
    let mut written = 0;
    loop {
        match stream.write_to(&mut writer_side) {
            Ok(n) => written += n,
            Err(e) if e.is_would_block() => break,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert!(written > 0);
    assert!(written < 8 * 1024 * 1024);
    assert_eq!(stream.len(), 8 * 1024 * 1024 - written);
}
