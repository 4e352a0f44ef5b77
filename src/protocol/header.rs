use crate::protocol::constants::*;
use crate::{Error, Result};

/// Chunk header format, the 2-bit "fmt" field of the basic header.
///
/// Everything except `Full` inherits unsent fields from the previous
/// header received or sent on the same chunk stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkFormat {
    /// fmt 0: absolute timestamp, length, type and message stream id
    Full,
    /// fmt 1: timestamp delta, length and type; stream id inherited
    SameStream,
    /// fmt 2: timestamp delta only
    TimestampOnly,
    /// fmt 3: bare basic header, everything inherited
    Continuation,
}

impl ChunkFormat {
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(ChunkFormat::Full),
            1 => Ok(ChunkFormat::SameStream),
            2 => Ok(ChunkFormat::TimestampOnly),
            3 => Ok(ChunkFormat::Continuation),
            _ => Err(Error::chunk(format!("Invalid chunk format: {}", id))),
        }
    }

    pub fn id(&self) -> u8 {
        match self {
            ChunkFormat::Full => 0,
            ChunkFormat::SameStream => 1,
            ChunkFormat::TimestampOnly => 2,
            ChunkFormat::Continuation => 3,
        }
    }
}

/// RTMP message types this client understands. Anything else on the wire
/// is a protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    SetChunkSize,
    Abort,
    Acknowledgement,
    UserControl,
    WindowAckSize,
    SetPeerBandwidth,
    Audio,
    Video,
    DataAmf0,
    CommandAmf0,
}

impl MessageType {
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            1 => Ok(MessageType::SetChunkSize),
            2 => Ok(MessageType::Abort),
            3 => Ok(MessageType::Acknowledgement),
            4 => Ok(MessageType::UserControl),
            5 => Ok(MessageType::WindowAckSize),
            6 => Ok(MessageType::SetPeerBandwidth),
            8 => Ok(MessageType::Audio),
            9 => Ok(MessageType::Video),
            18 => Ok(MessageType::DataAmf0),
            20 => Ok(MessageType::CommandAmf0),
            _ => Err(Error::protocol(format!("Unsupported message type: {}", id))),
        }
    }

    pub fn id(&self) -> u8 {
        match self {
            MessageType::SetChunkSize => 1,
            MessageType::Abort => 2,
            MessageType::Acknowledgement => 3,
            MessageType::UserControl => 4,
            MessageType::WindowAckSize => 5,
            MessageType::SetPeerBandwidth => 6,
            MessageType::Audio => 8,
            MessageType::Video => 9,
            MessageType::DataAmf0 => 18,
            MessageType::CommandAmf0 => 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RtmpHeader {
    /// Format to emit when this header is written; incoming headers carry
    /// the format they arrived with
    pub format: ChunkFormat,
    pub chunk_stream_id: u32,
    /// Absolute timestamp; deltas are resolved on read and re-derived on write
    pub timestamp: u32,
    pub message_length: u32,
    pub message_type: MessageType,
    pub message_stream_id: u32,
}

impl RtmpHeader {
    pub fn new(
        format: ChunkFormat,
        chunk_stream_id: u32,
        timestamp: u32,
        message_length: u32,
        message_type: MessageType,
        message_stream_id: u32,
    ) -> Self {
        RtmpHeader {
            format,
            chunk_stream_id,
            timestamp,
            message_length,
            message_type,
            message_stream_id,
        }
    }

    /// Header for a command on the connection-level command channel
    pub fn command(message_stream_id: u32) -> Self {
        RtmpHeader::new(
            ChunkFormat::Full,
            COMMAND_CHANNEL,
            0,
            0,
            MessageType::CommandAmf0,
            message_stream_id,
        )
    }

    /// Header for a command scoped to an open stream (play, pause, closeStream)
    pub fn stream_command(message_stream_id: u32) -> Self {
        RtmpHeader::new(
            ChunkFormat::Full,
            STREAM_CHANNEL,
            0,
            0,
            MessageType::CommandAmf0,
            message_stream_id,
        )
    }

    /// Header for a protocol/user control message on the control channel
    pub fn control(message_type: MessageType) -> Self {
        RtmpHeader::new(ChunkFormat::Full, CONTROL_CHANNEL, 0, 0, message_type, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_format_ids() {
        for id in 0..=3u8 {
            assert_eq!(ChunkFormat::from_id(id).unwrap().id(), id);
        }
        assert!(ChunkFormat::from_id(4).is_err());
    }

    #[test]
    fn test_message_type_ids_round_trip() {
        for id in [1u8, 2, 3, 4, 5, 6, 8, 9, 18, 20] {
            assert_eq!(MessageType::from_id(id).unwrap().id(), id);
        }
    }

    #[test]
    fn test_unknown_message_type_is_error() {
        for id in [0u8, 7, 15, 17, 22, 99] {
            assert!(MessageType::from_id(id).is_err());
        }
    }

    #[test]
    fn test_command_header_defaults() {
        let header = RtmpHeader::command(0);
        assert_eq!(header.format, ChunkFormat::Full);
        assert_eq!(header.chunk_stream_id, COMMAND_CHANNEL);
        assert_eq!(header.message_type, MessageType::CommandAmf0);
        assert_eq!(header.timestamp, 0);
    }
}
