// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Relays bytes from one socket to another through a byte stream, splitting off a fixed-size
//! header along the way without copying it.

#[cfg(unix)]
fn main() -> Result<(), iobuf::Error> {
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::sync::Arc;

    use iobuf::{ByteStream, HeapAllocator};
    use new_zealand::nz;

    const HEADER_LEN: usize = 8;

    let (mut client, mut server_in) = UnixStream::pair()?;
    let (mut server_out, mut peer) = UnixStream::pair()?;

    client.write_all(b"HEADER01the payload follows the header")?;
    drop(client);

    let mut inbound = ByteStream::with_allocator(Arc::new(HeapAllocator::new(nz!(16))));

    while inbound.read_from(&mut server_in, None)? > 0 {}

    let mut header = ByteStream::new();
    header.move_from(&mut inbound, HEADER_LEN);

    println!("header: {}", String::from_utf8_lossy(&header.to_vec()));
    println!("payload spans {} extents", inbound.extents().len());

    let written = inbound.write_to(&mut server_out)?;
    drop(server_out);

    let mut received = ByteStream::new();
    while received.read_from(&mut peer, None)? > 0 {}

    println!("relayed {written} bytes: {}", String::from_utf8_lossy(&received.to_vec()));

    Ok(())
}

#[cfg(not(unix))]
fn main() {
    println!("This example requires Unix domain sockets.");
}
