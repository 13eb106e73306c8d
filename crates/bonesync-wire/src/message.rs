//! Pose channel messages
//!
//! Message layout:
//! - Byte 0: kind (1 position, 2 rotation, 3 scale, 4 settings)
//! - Channel kinds: op byte (0 add, 1 set, 2 clear), then
//!   `set` carries a u32 index, `add`/`set` carry the value
//!   (vec3 = 12 bytes, quat = 16 bytes as w, x, y, z)
//! - Settings: interval in microseconds (u64) + latency multiplier (f64)

use std::time::Duration;

use bytes::{Buf, BufMut};

use bonesync_core::{BoneSyncError, BoneSyncResult, LinkSettings, Quat, Vec3};
use bonesync_state::{ListOperation, ListWrite};

/// Message kind tags
pub const KIND_POSITION: u8 = 1;
pub const KIND_ROTATION: u8 = 2;
pub const KIND_SCALE: u8 = 3;
pub const KIND_SETTINGS: u8 = 4;

const OP_ADD: u8 = 0;
const OP_SET: u8 = 1;
const OP_CLEAR: u8 = 2;

/// One write on one replicated pose channel
#[derive(Clone, Debug, PartialEq)]
pub enum PoseMessage {
    Position(ListWrite<Vec3>),
    Rotation(ListWrite<Quat>),
    Scale(ListWrite<Vec3>),
    Settings(LinkSettings),
}

impl PoseMessage {
    /// Whether this message carries bone field data
    pub fn is_field_write(&self) -> bool {
        !matches!(self, PoseMessage::Settings(_))
    }

    /// Channel operation of a field write; `None` for settings
    pub fn operation(&self) -> Option<ListOperation> {
        match self {
            PoseMessage::Position(write) => Some(write.operation()),
            PoseMessage::Rotation(write) => Some(write.operation()),
            PoseMessage::Scale(write) => Some(write.operation()),
            PoseMessage::Settings(_) => None,
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) -> BoneSyncResult<()> {
        match self {
            PoseMessage::Position(write) => {
                buf.put_u8(KIND_POSITION);
                encode_write(write, buf, put_vec3)
            }
            PoseMessage::Rotation(write) => {
                buf.put_u8(KIND_ROTATION);
                encode_write(write, buf, put_quat)
            }
            PoseMessage::Scale(write) => {
                buf.put_u8(KIND_SCALE);
                encode_write(write, buf, put_vec3)
            }
            PoseMessage::Settings(settings) => {
                buf.put_u8(KIND_SETTINGS);
                buf.put_u64_le(settings.interval.as_micros() as u64);
                buf.put_f64_le(settings.latency);
                Ok(())
            }
        }
    }

    pub fn decode(buf: &mut impl Buf) -> BoneSyncResult<Self> {
        ensure(buf.remaining(), 1)?;
        match buf.get_u8() {
            KIND_POSITION => Ok(PoseMessage::Position(decode_write(buf, 12, get_vec3)?)),
            KIND_ROTATION => Ok(PoseMessage::Rotation(decode_write(buf, 16, get_quat)?)),
            KIND_SCALE => Ok(PoseMessage::Scale(decode_write(buf, 12, get_vec3)?)),
            KIND_SETTINGS => {
                ensure(buf.remaining(), 16)?;
                let interval = Duration::from_micros(buf.get_u64_le());
                let latency = buf.get_f64_le();
                Ok(PoseMessage::Settings(LinkSettings::new(interval, latency)))
            }
            other => Err(BoneSyncError::UnknownMessageKind(other)),
        }
    }
}

fn encode_write<T>(
    write: &ListWrite<T>,
    buf: &mut impl BufMut,
    put: fn(&mut dyn BufMut, &T),
) -> BoneSyncResult<()> {
    match write {
        ListWrite::Add(value) => {
            buf.put_u8(OP_ADD);
            put(buf, value);
        }
        ListWrite::Set { index, value } => {
            let index = u32::try_from(*index).map_err(|_| {
                BoneSyncError::InvalidWireFormat(format!("channel index {} exceeds u32", index))
            })?;
            buf.put_u8(OP_SET);
            buf.put_u32_le(index);
            put(buf, value);
        }
        ListWrite::Clear => buf.put_u8(OP_CLEAR),
    }
    Ok(())
}

fn decode_write<T>(
    buf: &mut impl Buf,
    value_size: usize,
    get: fn(&mut dyn Buf) -> T,
) -> BoneSyncResult<ListWrite<T>> {
    ensure(buf.remaining(), 1)?;
    match buf.get_u8() {
        OP_ADD => {
            ensure(buf.remaining(), value_size)?;
            Ok(ListWrite::Add(get(buf)))
        }
        OP_SET => {
            ensure(buf.remaining(), 4 + value_size)?;
            let index = buf.get_u32_le() as usize;
            Ok(ListWrite::Set {
                index,
                value: get(buf),
            })
        }
        OP_CLEAR => Ok(ListWrite::Clear),
        other => Err(BoneSyncError::InvalidWireFormat(format!(
            "unknown channel op {}",
            other
        ))),
    }
}

pub(crate) fn ensure(remaining: usize, needed: usize) -> BoneSyncResult<()> {
    if remaining < needed {
        return Err(BoneSyncError::BufferTooShort {
            expected: needed,
            actual: remaining,
        });
    }
    Ok(())
}

fn put_vec3(buf: &mut dyn BufMut, v: &Vec3) {
    buf.put_f32_le(v.x);
    buf.put_f32_le(v.y);
    buf.put_f32_le(v.z);
}

fn put_quat(buf: &mut dyn BufMut, q: &Quat) {
    buf.put_f32_le(q.w);
    buf.put_f32_le(q.x);
    buf.put_f32_le(q.y);
    buf.put_f32_le(q.z);
}

fn get_vec3(buf: &mut dyn Buf) -> Vec3 {
    let x = buf.get_f32_le();
    let y = buf.get_f32_le();
    let z = buf.get_f32_le();
    Vec3::new(x, y, z)
}

fn get_quat(buf: &mut dyn Buf) -> Quat {
    let w = buf.get_f32_le();
    let x = buf.get_f32_le();
    let y = buf.get_f32_le();
    let z = buf.get_f32_le();
    Quat::new(w, x, y, z)
}
