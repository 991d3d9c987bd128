use bytes::{BufMut, BytesMut};

use crate::ConnectionId;

/// Number of logical channels multiplexed over one connection.
pub const CHANNEL_COUNT: u8 = 2;

/// Logical sub-stream a message travels on.
///
/// The underlying stream delivers everything reliably and in order, so the
/// distinction is carried end to end as metadata rather than changing how a
/// frame is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Channel {
    /// Ordered, lossless delivery.
    Reliable = 0,
    /// Delivery the application tolerates losing. Tagged and carried over the
    /// same stream.
    Unreliable = 1,
}

impl Channel {
    /// Maps a wire tag back to a channel, treating unknown tags as
    /// [`Reliable`](Self::Reliable).
    pub fn from_tag_lossy(tag: u8) -> Self {
        match tag {
            1 => Self::Unreliable,
            _ => Self::Reliable,
        }
    }
}

/// One queued outbound message.
///
/// Owned by exactly one queue at a time. The buffer travels with the packet
/// and is released when the frame is handed to the engine or the queue is
/// cleared.
#[derive(Debug)]
pub(crate) struct Packet {
    pub(crate) recipient: ConnectionId,
    pub(crate) channel: u8,
    payload: BytesMut,
}

impl Packet {
    /// Copies `payload` into an owned buffer with one spare byte so the tag
    /// append never reallocates.
    pub(crate) fn new(recipient: ConnectionId, channel: u8, payload: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(payload.len() + 1);
        buf.extend_from_slice(payload);
        Self {
            recipient,
            channel,
            payload: buf,
        }
    }

    /// Consumes the packet into its tagged wire frame.
    pub(crate) fn into_frame(mut self) -> BytesMut {
        attach_channel(&mut self.payload, self.channel);
        self.payload
    }

    #[cfg(test)]
    pub(crate) fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Appends `channel` to `payload` as the trailing tag byte.
pub(crate) fn attach_channel(payload: &mut BytesMut, channel: u8) {
    payload.put_u8(channel);
}

/// Splits the trailing tag byte off `frame` and returns it.
///
/// Any byte value is accepted as a tag; mapping it to a [`Channel`] is the
/// caller's concern. `frame` must not be empty.
pub(crate) fn detach_channel(frame: &mut BytesMut) -> u8 {
    let tag = frame[frame.len() - 1];
    frame.truncate(frame.len() - 1);
    tag
}
