//! Pose frame - one publish cycle of channel writes
//!
//! Frame header is 18 bytes:
//! - Byte 0: Version
//! - Byte 1: Flags
//! - Bytes 2-3: Reserved
//! - Bytes 4-7: Sequence (LE)
//! - Bytes 8-15: Send time in microseconds (LE, signed)
//! - Bytes 16-17: Message count (LE)

use bytes::{Buf, BufMut, Bytes, BytesMut};

use bonesync_core::{BoneSyncError, BoneSyncResult, StateTime};

use crate::message::ensure;
use crate::PoseMessage;

/// Frame header size in bytes
pub const FRAME_HEADER_SIZE: usize = 18;

/// Current wire protocol version
pub const WIRE_VERSION: u8 = 1;

/// Frame flags (1 byte)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameFlags(pub u8);

impl FrameFlags {
    pub const NONE: FrameFlags = FrameFlags(0);

    /// Frame rebuilds every channel from scratch
    pub const FULL_SYNC: u8 = 0b0000_0001;

    #[inline]
    pub fn is_full_sync(self) -> bool {
        self.0 & Self::FULL_SYNC != 0
    }

    #[inline]
    pub fn set_full_sync(&mut self, value: bool) {
        if value {
            self.0 |= Self::FULL_SYNC;
        } else {
            self.0 &= !Self::FULL_SYNC;
        }
    }
}

/// Channel writes of one publish cycle, in write order
#[derive(Clone, Debug, PartialEq)]
pub struct PoseFrame {
    pub flags: FrameFlags,
    pub sequence: u32,
    pub sent_at: StateTime,
    pub messages: Vec<PoseMessage>,
}

impl PoseFrame {
    pub fn new(sequence: u32, sent_at: StateTime) -> Self {
        PoseFrame {
            flags: FrameFlags::NONE,
            sequence,
            sent_at,
            messages: Vec::new(),
        }
    }

    pub fn full_sync(sequence: u32, sent_at: StateTime) -> Self {
        let mut frame = Self::new(sequence, sent_at);
        frame.flags.set_full_sync(true);
        frame
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of bone field writes carried (settings excluded)
    pub fn field_write_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_field_write()).count()
    }

    pub fn encode(&self) -> BoneSyncResult<Bytes> {
        let count = u16::try_from(self.messages.len()).map_err(|_| {
            BoneSyncError::InvalidWireFormat(format!(
                "too many messages in one frame: {}",
                self.messages.len()
            ))
        })?;

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.messages.len() * 22);
        buf.put_u8(WIRE_VERSION);
        buf.put_u8(self.flags.0);
        buf.put_u16_le(0);
        buf.put_u32_le(self.sequence);
        buf.put_i64_le(self.sent_at.as_micros());
        buf.put_u16_le(count);

        for message in &self.messages {
            message.encode(&mut buf)?;
        }
        Ok(buf.freeze())
    }

    pub fn decode(data: &[u8]) -> BoneSyncResult<Self> {
        let mut buf = data;
        ensure(buf.remaining(), FRAME_HEADER_SIZE)?;

        let version = buf.get_u8();
        if version != WIRE_VERSION {
            return Err(BoneSyncError::UnsupportedVersion(version));
        }
        let flags = FrameFlags(buf.get_u8());
        buf.advance(2);
        let sequence = buf.get_u32_le();
        let sent_at = StateTime::from_micros(buf.get_i64_le());
        let count = buf.get_u16_le() as usize;

        // Never trust the count for allocation; the smallest message is 2 bytes
        let mut messages = Vec::with_capacity(count.min(buf.remaining() / 2));
        for _ in 0..count {
            messages.push(PoseMessage::decode(&mut buf)?);
        }

        if buf.has_remaining() {
            return Err(BoneSyncError::InvalidWireFormat(format!(
                "{} trailing bytes after {} messages",
                buf.remaining(),
                count
            )));
        }

        Ok(PoseFrame {
            flags,
            sequence,
            sent_at,
            messages,
        })
    }
}
