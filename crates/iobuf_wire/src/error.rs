// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// A frame could not be encoded or decoded.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameError {
    /// The length fields at the front of the input are inconsistent. The input is left as it
    /// was, as there is no way to tell where the next frame would start.
    #[error("malformed frame header: {reason}")]
    Malformed {
        /// What is wrong with the header.
        reason: &'static str,
    },

    /// The frame announces more bytes than the decoder accepts. The input is left as it was.
    #[error("frame of {len} bytes exceeds the limit of {max} bytes")]
    FrameTooLarge {
        /// Length announced by the frame header.
        len: usize,

        /// Largest length the decoder accepts.
        max: usize,
    },

    /// The type name is empty, not terminated by NUL, contains NUL or is not valid UTF-8.
    ///
    /// When decoding, the offending frame has been removed from the input.
    #[error("invalid message type name")]
    TypeNameInvalid,

    /// The message cannot be represented as a frame.
    #[error("cannot encode frame: {reason}")]
    Encode {
        /// Why the frame cannot be encoded.
        reason: &'static str,
    },
}
