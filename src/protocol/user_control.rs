use crate::utils::ByteBuffer;
use crate::{Error, Result};

/// Events carried by a user control message (message type 4).
///
/// The dispatch loop acts on ping requests and stream EOF; the rest are
/// decoded so they can be logged instead of failing the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserControlEvent {
    StreamBegin(u32),
    StreamEof(u32),
    StreamDry(u32),
    SetBufferLength { stream_id: u32, buffer_length_ms: u32 },
    StreamIsRecorded(u32),
    PingRequest(u32),
    PingResponse(u32),
}

impl UserControlEvent {
    pub fn event_type(&self) -> u16 {
        match self {
            UserControlEvent::StreamBegin(_) => 0,
            UserControlEvent::StreamEof(_) => 1,
            UserControlEvent::StreamDry(_) => 2,
            UserControlEvent::SetBufferLength { .. } => 3,
            UserControlEvent::StreamIsRecorded(_) => 4,
            UserControlEvent::PingRequest(_) => 6,
            UserControlEvent::PingResponse(_) => 7,
        }
    }

    pub fn decode(buffer: &mut ByteBuffer) -> Result<Self> {
        let event_type = buffer.read_u16_be()?;
        match event_type {
            0 => Ok(UserControlEvent::StreamBegin(buffer.read_u32_be()?)),
            1 => Ok(UserControlEvent::StreamEof(buffer.read_u32_be()?)),
            2 => Ok(UserControlEvent::StreamDry(buffer.read_u32_be()?)),
            3 => Ok(UserControlEvent::SetBufferLength {
                stream_id: buffer.read_u32_be()?,
                buffer_length_ms: buffer.read_u32_be()?,
            }),
            4 => Ok(UserControlEvent::StreamIsRecorded(buffer.read_u32_be()?)),
            6 => Ok(UserControlEvent::PingRequest(buffer.read_u32_be()?)),
            7 => Ok(UserControlEvent::PingResponse(buffer.read_u32_be()?)),
            _ => Err(Error::protocol(format!(
                "Unknown user control event type: {}",
                event_type
            ))),
        }
    }

    pub fn encode(&self, buffer: &mut ByteBuffer) -> Result<()> {
        buffer.write_u16_be(self.event_type())?;
        match self {
            UserControlEvent::StreamBegin(v)
            | UserControlEvent::StreamEof(v)
            | UserControlEvent::StreamDry(v)
            | UserControlEvent::StreamIsRecorded(v)
            | UserControlEvent::PingRequest(v)
            | UserControlEvent::PingResponse(v) => buffer.write_u32_be(*v)?,
            UserControlEvent::SetBufferLength {
                stream_id,
                buffer_length_ms,
            } => {
                buffer.write_u32_be(*stream_id)?;
                buffer.write_u32_be(*buffer_length_ms)?;
            }
        }
        Ok(())
    }
}
