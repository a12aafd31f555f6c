// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Length-prefixed message framing over [`iobuf`] byte streams.
//!
//! A frame is `[total length: u32 BE][type name length: u32 BE][type name + NUL][payload]`,
//! where the total length counts every byte after its own field and the type name length
//! includes the NUL terminator.
//!
//! * [`encode()`] appends a [`WireMessage`] to a [`ByteStream`][iobuf::ByteStream] as one frame.
//! * [`FrameDecoder`] takes complete frames off the front of a stream, moving each payload
//!   out without copying it.
//! * [`Dispatcher`] routes frames to handlers registered per message type name.
//!
//! The payload format of each message type is up to its [`WireMessage`] implementation.

mod dispatcher;
mod error;
mod frame;

pub use dispatcher::{Dispatch, Dispatcher};
pub use error::FrameError;
pub use frame::{DEFAULT_MAX_FRAME_LEN, Frame, FrameDecoder, HEADER_LEN, LENGTH_FIELD_LEN, WireMessage, encode};
