//! Wire frame and delivered envelope types.

use bytes::Bytes;

/// One (channel, payload) unit crossing the transport boundary.
///
/// The channel is an opaque name; the payload is opaque bytes whose
/// structure is a concern of layers above the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Logical stream the frame belongs to.
    pub channel: String,
    /// Opaque payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(channel: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// A received frame as delivered to subscriber callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Channel the frame arrived on.
    pub channel: String,
    /// Opaque payload bytes.
    pub payload: Bytes,
    /// Local receive time in microseconds since the Unix epoch, stamped
    /// when the frame was dequeued from the transport.
    pub recv_utime: i64,
}

impl Envelope {
    pub(crate) fn stamp(frame: Frame) -> Self {
        Self {
            channel: frame.channel,
            payload: frame.payload,
            recv_utime: chrono::Utc::now().timestamp_micros(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_from_parts() {
        let frame = Frame::new("TEST", vec![1u8, 2, 3]);
        assert_eq!(frame.channel, "TEST");
        assert_eq!(&frame.payload[..], &[1, 2, 3]);
    }

    #[test]
    fn envelope_stamp_preserves_frame() {
        let env = Envelope::stamp(Frame::new("TEST", Bytes::from_static(b"hi")));
        assert_eq!(env.channel, "TEST");
        assert_eq!(&env.payload[..], b"hi");
        assert!(env.recv_utime > 0);
    }
}
