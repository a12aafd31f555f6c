// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::fmt;

use iobuf::ByteStream;
use tracing::{Level, event};

use crate::{Frame, FrameDecoder, FrameError, WireMessage};

type Handler = Box<dyn Fn(&Frame) -> bool + Send + Sync>;

/// Outcome of routing one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// The frame was decoded and passed to its handler.
    Handled,

    /// No handler is registered for the type name of the frame. The frame was dropped.
    Unregistered,

    /// A handler is registered but the payload is not a valid message. The frame was dropped.
    Malformed,
}

/// Routes frames to handlers by message type name.
///
/// ```
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// use iobuf::ByteStream;
/// use iobuf_wire::{Dispatch, Dispatcher, FrameDecoder, WireMessage, encode};
///
/// struct Heartbeat(u32);
///
/// impl WireMessage for Heartbeat {
///     const TYPE_NAME: &'static str = "Heartbeat";
///
///     fn encode_payload(&self, out: &mut Vec<u8>) {
///         out.extend_from_slice(&self.0.to_be_bytes());
///     }
///
///     fn decode_payload(payload: &[u8]) -> Option<Self> {
///         Some(Self(u32::from_be_bytes(payload.try_into().ok()?)))
///     }
/// }
///
/// let last_seen = Arc::new(AtomicU32::new(0));
///
/// let mut dispatcher = Dispatcher::new();
/// dispatcher.register({
///     let last_seen = Arc::clone(&last_seen);
///     move |heartbeat: Heartbeat| last_seen.store(heartbeat.0, Ordering::Relaxed)
/// });
///
/// let mut stream = ByteStream::new();
/// encode(&Heartbeat(42), &mut stream)?;
///
/// let frame = FrameDecoder::new().decode(&mut stream)?.expect("frame is complete");
/// assert_eq!(dispatcher.dispatch(&frame), Dispatch::Handled);
/// assert_eq!(last_seen.load(Ordering::Relaxed), 42);
/// # Ok::<(), iobuf_wire::FrameError>(())
/// ```
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<&'static str, Handler>,
}

impl Dispatcher {
    /// Creates a dispatcher without any handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for messages of type `M`, replacing any handler registered for the
    /// same type name before.
    pub fn register<M, F>(&mut self, handler: F)
    where
        M: WireMessage + 'static,
        F: Fn(M) + Send + Sync + 'static,
    {
        let replaced = self
            .handlers
            .insert(
                M::TYPE_NAME,
                Box::new(move |frame: &Frame| frame.decode_as::<M>().map(&handler).is_some()),
            )
            .is_some();

        if replaced {
            event!(Level::DEBUG, message = "message handler replaced", type_name = M::TYPE_NAME);
        }
    }

    /// Whether a handler is registered for `type_name`.
    #[must_use]
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.handlers.contains_key(type_name)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Decodes the frame's message and passes it to the handler registered for its type.
    pub fn dispatch(&self, frame: &Frame) -> Dispatch {
        let Some(handler) = self.handlers.get(frame.type_name()) else {
            event!(Level::DEBUG, message = "frame dropped", reason = "no handler", type_name = frame.type_name());
            return Dispatch::Unregistered;
        };

        if handler(frame) {
            Dispatch::Handled
        } else {
            event!(
                Level::WARN,
                message = "frame dropped",
                reason = "malformed payload",
                type_name = frame.type_name(),
                payload_len = frame.payload().len()
            );
            Dispatch::Malformed
        }
    }

    /// Decodes and dispatches every complete frame at the front of `input`.
    ///
    /// Returns the number of frames dispatched, whether handled or dropped. Bytes of an
    /// incomplete trailing frame stay in `input`.
    ///
    /// # Errors
    ///
    /// Stops at the first frame `decoder` rejects and returns its error.
    pub fn dispatch_all(&self, decoder: &FrameDecoder, input: &mut ByteStream) -> Result<usize, FrameError> {
        let mut dispatched = 0;

        while let Some(frame) = decoder.decode(input)? {
            self.dispatch(&frame);
            dispatched += 1;
        }

        Ok(dispatched)
    }
}

impl fmt::Debug for Dispatcher {
    #[cfg_attr(coverage_nightly, coverage(off))] // There is no specific API contract here for us to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("type_names", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use static_assertions::assert_impl_all;
    use testing_aids::LogCapture;

    use super::*;
    use crate::encode;

    assert_impl_all!(Dispatcher: Send, Sync, Default);

    #[derive(Debug, PartialEq, Eq)]
    struct Lease {
        holder: u8,
    }

    impl WireMessage for Lease {
        const TYPE_NAME: &'static str = "Lease";

        fn encode_payload(&self, out: &mut Vec<u8>) {
            out.push(self.holder);
        }

        fn decode_payload(payload: &[u8]) -> Option<Self> {
            match payload {
                [holder] => Some(Self { holder: *holder }),
                _ => None,
            }
        }
    }

    struct Release;

    impl WireMessage for Release {
        const TYPE_NAME: &'static str = "Release";

        fn encode_payload(&self, _out: &mut Vec<u8>) {}

        fn decode_payload(payload: &[u8]) -> Option<Self> {
            payload.is_empty().then_some(Self)
        }
    }

    fn frame_of<M: WireMessage>(message: &M) -> Frame {
        let mut stream = ByteStream::new();
        encode(message, &mut stream).unwrap();
        FrameDecoder::new().decode(&mut stream).unwrap().unwrap()
    }

    fn recording_dispatcher() -> (Dispatcher, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut dispatcher = Dispatcher::new();
        dispatcher.register({
            let seen = Arc::clone(&seen);
            move |lease: Lease| seen.lock().unwrap().push(lease.holder)
        });

        (dispatcher, seen)
    }

    #[test]
    fn routes_by_type_name() {
        let (dispatcher, seen) = recording_dispatcher();

        assert_eq!(dispatcher.dispatch(&frame_of(&Lease { holder: 3 })), Dispatch::Handled);
        assert_eq!(*seen.lock().unwrap(), [3]);

        assert!(dispatcher.is_registered("Lease"));
        assert!(!dispatcher.is_registered("Release"));
        assert_eq!(dispatcher.len(), 1);
        assert!(!dispatcher.is_empty());
    }

    #[test]
    fn unregistered_frames_are_dropped() {
        let (dispatcher, seen) = recording_dispatcher();
        let capture = LogCapture::new();

        {
            let _guard = capture.capture_thread();
            assert_eq!(dispatcher.dispatch(&frame_of(&Release)), Dispatch::Unregistered);
        }

        assert!(seen.lock().unwrap().is_empty());
        capture.assert_contains("frame dropped");
        capture.assert_contains("Release");
    }

    #[test]
    fn malformed_payloads_are_dropped() {
        let (dispatcher, seen) = recording_dispatcher();
        let capture = LogCapture::new();

        let mut stream = ByteStream::new();
        stream.copy_in(&[0, 0, 0, 12, 0, 0, 0, 6, b'L', b'e', b'a', b's', b'e', 0, 1, 2]);
        let frame = FrameDecoder::new().decode(&mut stream).unwrap().unwrap();

        {
            let _guard = capture.capture_thread();
            assert_eq!(dispatcher.dispatch(&frame), Dispatch::Malformed);
        }

        assert!(seen.lock().unwrap().is_empty());
        capture.assert_contains("malformed payload");
    }

    #[test]
    fn registering_again_replaces_handler() {
        let (mut dispatcher, seen) = recording_dispatcher();

        let replacement_seen = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register({
            let replacement_seen = Arc::clone(&replacement_seen);
            move |lease: Lease| replacement_seen.lock().unwrap().push(lease.holder)
        });

        dispatcher.dispatch(&frame_of(&Lease { holder: 8 }));

        assert_eq!(dispatcher.len(), 1);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(*replacement_seen.lock().unwrap(), [8]);
    }

    #[test]
    fn dispatch_all_stops_at_incomplete_frame() {
        let (dispatcher, seen) = recording_dispatcher();

        let mut input = ByteStream::new();
        encode(&Lease { holder: 1 }, &mut input).unwrap();
        encode(&Release, &mut input).unwrap();
        encode(&Lease { holder: 2 }, &mut input).unwrap();
        input.copy_in(&[0, 0, 0, 50]);

        assert_eq!(dispatcher.dispatch_all(&FrameDecoder::new(), &mut input).unwrap(), 3);
        assert_eq!(*seen.lock().unwrap(), [1, 2]);
        assert_eq!(input.len(), 4);
    }

    #[test]
    fn dispatch_all_reports_decoder_errors() {
        let (dispatcher, _) = recording_dispatcher();

        let mut input = ByteStream::new();
        encode(&Lease { holder: 1 }, &mut input).unwrap();
        input.copy_in(&[0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 1]);

        let decoder = FrameDecoder::new().with_max_frame_len(1024);

        assert!(matches!(
            dispatcher.dispatch_all(&decoder, &mut input),
            Err(FrameError::FrameTooLarge { .. })
        ));
        assert_eq!(input.len(), 8);
    }
}
