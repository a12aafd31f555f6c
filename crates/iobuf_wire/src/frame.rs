// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use iobuf::ByteStream;
use tracing::{Level, event};

use crate::FrameError;

/// Size of each of the two length fields at the front of a frame.
pub const LENGTH_FIELD_LEN: usize = 4;

/// Size of the fixed part of a frame header (total length + type name length).
pub const HEADER_LEN: usize = 2 * LENGTH_FIELD_LEN;

/// Largest frame a [`FrameDecoder`] accepts unless configured otherwise.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// A message type that can travel in a frame.
///
/// The payload format is up to the message type, frames only carry it as opaque bytes.
pub trait WireMessage: Sized {
    /// Identifies the message type on the wire. Must be non-empty and must not contain NUL.
    const TYPE_NAME: &'static str;

    /// Appends the serialized message to `out`.
    fn encode_payload(&self, out: &mut Vec<u8>);

    /// Parses a serialized message, returning `None` if `payload` is not a valid message.
    fn decode_payload(payload: &[u8]) -> Option<Self>;
}

/// Appends `message` to `out` as one frame.
///
/// Returns the number of bytes appended.
///
/// # Errors
///
/// Returns [`FrameError::TypeNameInvalid`] if the type name of `M` is unusable and
/// [`FrameError::Encode`] if the frame is too long for its length field or `out` could not
/// hold all of it. `out` is unchanged on error.
pub fn encode<M>(message: &M, out: &mut ByteStream) -> Result<usize, FrameError>
where
    M: WireMessage,
{
    validate_type_name(M::TYPE_NAME.as_bytes())?;

    let mut payload = Vec::new();
    message.encode_payload(&mut payload);

    let type_name_len = M::TYPE_NAME.len() + 1;

    let (Ok(total), Ok(type_name_len_field)) = (
        u32::try_from(LENGTH_FIELD_LEN + type_name_len + payload.len()),
        u32::try_from(type_name_len),
    ) else {
        return Err(FrameError::Encode {
            reason: "frame length does not fit the length field",
        });
    };

    let mut header = Vec::with_capacity(HEADER_LEN + type_name_len);
    header.extend_from_slice(&total.to_be_bytes());
    header.extend_from_slice(&type_name_len_field.to_be_bytes());
    header.extend_from_slice(M::TYPE_NAME.as_bytes());
    header.push(0);

    let len_before = out.len();
    let expected = header.len() + payload.len();
    let appended = out.copy_in(&header) + out.copy_in(&payload);

    if appended != expected {
        out.trim(len_before);

        event!(Level::WARN, message = "frame did not fit into the output stream", type_name = M::TYPE_NAME, expected, appended);

        return Err(FrameError::Encode {
            reason: "output stream could not hold the frame",
        });
    }

    Ok(appended)
}

/// A frame taken off an input stream.
#[derive(Clone, Debug)]
pub struct Frame {
    type_name: String,
    payload: ByteStream,
}

impl Frame {
    /// Name of the message type carried by the frame.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The serialized message, sharing storage with the stream the frame was decoded from.
    #[must_use]
    pub fn payload(&self) -> &ByteStream {
        &self.payload
    }

    /// Takes the payload out of the frame.
    #[must_use]
    pub fn into_payload(self) -> ByteStream {
        self.payload
    }

    /// Parses the payload as an `M`.
    ///
    /// Returns `None` if the frame carries a different message type or the payload is not a
    /// valid `M`.
    #[must_use]
    pub fn decode_as<M>(&self) -> Option<M>
    where
        M: WireMessage,
    {
        if self.type_name != M::TYPE_NAME {
            return None;
        }

        M::decode_payload(&self.payload.to_vec())
    }
}

/// Takes complete frames off the front of a byte stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameDecoder {
    max_frame_len: usize,
}

impl FrameDecoder {
    /// A decoder accepting frames of up to [`DEFAULT_MAX_FRAME_LEN`] bytes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Limits the value of the total length field accepted by the decoder.
    #[must_use]
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// The largest total length field the decoder accepts.
    #[must_use]
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Removes the first frame from `input` if it is complete.
    ///
    /// Returns `Ok(None)` without consuming anything while the frame is still incomplete. The
    /// payload of a decoded frame is moved out of `input` without copying it.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Malformed`] or [`FrameError::FrameTooLarge`] if the length fields
    /// are unacceptable, leaving `input` unchanged. Returns [`FrameError::TypeNameInvalid`]
    /// after removing a complete frame whose type name is unusable.
    pub fn decode(&self, input: &mut ByteStream) -> Result<Option<Frame>, FrameError> {
        let mut header = [0_u8; HEADER_LEN];

        if input.copy_out(&mut header) < HEADER_LEN {
            return Ok(None);
        }

        let (total, type_name_len) = header.split_at(LENGTH_FIELD_LEN);
        let total = read_len(total);
        let type_name_len = read_len(type_name_len);

        if total > self.max_frame_len {
            event!(Level::DEBUG, message = "frame rejected", reason = "too large", total, max = self.max_frame_len);
            return Err(FrameError::FrameTooLarge {
                len: total,
                max: self.max_frame_len,
            });
        }

        if type_name_len == 0 {
            return Err(FrameError::Malformed {
                reason: "type name length is zero",
            });
        }

        if LENGTH_FIELD_LEN.saturating_add(type_name_len) > total {
            return Err(FrameError::Malformed {
                reason: "type name overruns frame",
            });
        }

        if input.len() < LENGTH_FIELD_LEN.saturating_add(total) {
            return Ok(None);
        }

        let mut frame = ByteStream::with_allocator(Arc::clone(input.allocator()));
        frame.move_from(input, LENGTH_FIELD_LEN + total);
        frame.consume(HEADER_LEN);

        let mut type_name = vec![0_u8; type_name_len];
        frame.copy_out(&mut type_name);
        frame.consume(type_name_len);

        if type_name.pop() != Some(0) {
            return Err(FrameError::TypeNameInvalid);
        }

        validate_type_name(&type_name)?;

        let Ok(type_name) = String::from_utf8(type_name) else {
            return Err(FrameError::TypeNameInvalid);
        };

        Ok(Some(Frame {
            type_name,
            payload: frame,
        }))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn read_len(field: &[u8]) -> usize {
    let mut bytes = [0_u8; LENGTH_FIELD_LEN];
    bytes.copy_from_slice(field);

    usize::try_from(u32::from_be_bytes(bytes)).unwrap_or(usize::MAX)
}

// Checks a type name without its NUL terminator.
fn validate_type_name(name: &[u8]) -> Result<(), FrameError> {
    if name.is_empty() || name.contains(&0) {
        return Err(FrameError::TypeNameInvalid);
    }

    Ok(())
}
