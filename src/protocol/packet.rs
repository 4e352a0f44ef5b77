use crate::protocol::command::RtmpCommand;
use crate::protocol::data::RtmpData;
use crate::protocol::header::{MessageType, RtmpHeader};
use crate::protocol::user_control::UserControlEvent;
use crate::utils::ByteBuffer;
use crate::{Error, Result};

/// One complete RTMP message, decoded from (or ready to be encoded into)
/// a sequence of chunks. Every variant carries the header it arrived with
/// or will be written with.
#[derive(Debug, Clone, PartialEq)]
pub enum RtmpPacket {
    SetChunkSize {
        header: RtmpHeader,
        chunk_size: u32,
    },
    Abort {
        header: RtmpHeader,
        chunk_stream_id: u32,
    },
    Acknowledgement {
        header: RtmpHeader,
        sequence_number: u32,
    },
    UserControl {
        header: RtmpHeader,
        event: UserControlEvent,
    },
    WindowAckSize {
        header: RtmpHeader,
        window_size: u32,
    },
    SetPeerBandwidth {
        header: RtmpHeader,
        window_size: u32,
        limit_type: u8,
    },
    Audio {
        header: RtmpHeader,
        data: Vec<u8>,
    },
    Video {
        header: RtmpHeader,
        data: Vec<u8>,
    },
    Command {
        header: RtmpHeader,
        command: RtmpCommand,
    },
    Data {
        header: RtmpHeader,
        data: RtmpData,
    },
}

impl RtmpPacket {
    pub fn header(&self) -> &RtmpHeader {
        match self {
            RtmpPacket::SetChunkSize { header, .. }
            | RtmpPacket::Abort { header, .. }
            | RtmpPacket::Acknowledgement { header, .. }
            | RtmpPacket::UserControl { header, .. }
            | RtmpPacket::WindowAckSize { header, .. }
            | RtmpPacket::SetPeerBandwidth { header, .. }
            | RtmpPacket::Audio { header, .. }
            | RtmpPacket::Video { header, .. }
            | RtmpPacket::Command { header, .. }
            | RtmpPacket::Data { header, .. } => header,
        }
    }

    pub fn header_mut(&mut self) -> &mut RtmpHeader {
        match self {
            RtmpPacket::SetChunkSize { header, .. }
            | RtmpPacket::Abort { header, .. }
            | RtmpPacket::Acknowledgement { header, .. }
            | RtmpPacket::UserControl { header, .. }
            | RtmpPacket::WindowAckSize { header, .. }
            | RtmpPacket::SetPeerBandwidth { header, .. }
            | RtmpPacket::Audio { header, .. }
            | RtmpPacket::Video { header, .. }
            | RtmpPacket::Command { header, .. }
            | RtmpPacket::Data { header, .. } => header,
        }
    }

    /// Parse a completely reassembled message body
    pub fn parse(header: RtmpHeader, body: &[u8]) -> Result<RtmpPacket> {
        match header.message_type {
            MessageType::SetChunkSize => {
                let mut buffer = ByteBuffer::new(body.to_vec());
                let chunk_size = buffer.read_u32_be()?;
                if chunk_size < 1 {
                    return Err(Error::protocol("Chunk size must be positive"));
                }
                Ok(RtmpPacket::SetChunkSize { header, chunk_size })
            }
            MessageType::Abort => {
                let mut buffer = ByteBuffer::new(body.to_vec());
                let chunk_stream_id = buffer.read_u32_be()?;
                Ok(RtmpPacket::Abort {
                    header,
                    chunk_stream_id,
                })
            }
            MessageType::Acknowledgement => {
                let mut buffer = ByteBuffer::new(body.to_vec());
                let sequence_number = buffer.read_u32_be()?;
                Ok(RtmpPacket::Acknowledgement {
                    header,
                    sequence_number,
                })
            }
            MessageType::UserControl => {
                let mut buffer = ByteBuffer::new(body.to_vec());
                let event = UserControlEvent::decode(&mut buffer)?;
                Ok(RtmpPacket::UserControl { header, event })
            }
            MessageType::WindowAckSize => {
                let mut buffer = ByteBuffer::new(body.to_vec());
                let window_size = buffer.read_u32_be()?;
                Ok(RtmpPacket::WindowAckSize {
                    header,
                    window_size,
                })
            }
            MessageType::SetPeerBandwidth => {
                let mut buffer = ByteBuffer::new(body.to_vec());
                let window_size = buffer.read_u32_be()?;
                let limit_type = buffer.read_u8()?;
                Ok(RtmpPacket::SetPeerBandwidth {
                    header,
                    window_size,
                    limit_type,
                })
            }
            MessageType::Audio => Ok(RtmpPacket::Audio {
                header,
                data: body.to_vec(),
            }),
            MessageType::Video => Ok(RtmpPacket::Video {
                header,
                data: body.to_vec(),
            }),
            MessageType::CommandAmf0 => Ok(RtmpPacket::Command {
                header,
                command: RtmpCommand::decode(body)?,
            }),
            MessageType::DataAmf0 => Ok(RtmpPacket::Data {
                header,
                data: RtmpData::decode(body)?,
            }),
        }
    }

    /// Encode the message body (everything after the chunk headers)
    pub fn encode_body(&self) -> Result<Vec<u8>> {
        match self {
            RtmpPacket::SetChunkSize { chunk_size, .. } => {
                let mut buffer = ByteBuffer::with_capacity(4);
                buffer.write_u32_be(*chunk_size)?;
                Ok(buffer.to_vec())
            }
            RtmpPacket::Abort {
                chunk_stream_id, ..
            } => {
                let mut buffer = ByteBuffer::with_capacity(4);
                buffer.write_u32_be(*chunk_stream_id)?;
                Ok(buffer.to_vec())
            }
            RtmpPacket::Acknowledgement {
                sequence_number, ..
            } => {
                let mut buffer = ByteBuffer::with_capacity(4);
                buffer.write_u32_be(*sequence_number)?;
                Ok(buffer.to_vec())
            }
            RtmpPacket::UserControl { event, .. } => {
                let mut buffer = ByteBuffer::with_capacity(10);
                event.encode(&mut buffer)?;
                Ok(buffer.to_vec())
            }
            RtmpPacket::WindowAckSize { window_size, .. } => {
                let mut buffer = ByteBuffer::with_capacity(4);
                buffer.write_u32_be(*window_size)?;
                Ok(buffer.to_vec())
            }
            RtmpPacket::SetPeerBandwidth {
                window_size,
                limit_type,
                ..
            } => {
                let mut buffer = ByteBuffer::with_capacity(5);
                buffer.write_u32_be(*window_size)?;
                buffer.write_u8(*limit_type)?;
                Ok(buffer.to_vec())
            }
            RtmpPacket::Audio { data, .. } | RtmpPacket::Video { data, .. } => Ok(data.clone()),
            RtmpPacket::Command { command, .. } => command.encode(),
            RtmpPacket::Data { data, .. } => data.encode(),
        }
    }

    /// Build a command packet on the given channel and message stream
    pub fn command(command: RtmpCommand, mut header: RtmpHeader) -> RtmpPacket {
        header.message_type = MessageType::CommandAmf0;
        RtmpPacket::Command { header, command }
    }

    /// Build a user control packet on the control channel
    pub fn user_control(event: UserControlEvent) -> RtmpPacket {
        RtmpPacket::UserControl {
            header: RtmpHeader::control(MessageType::UserControl),
            event,
        }
    }

    /// Build an acknowledgement carrying the total bytes received
    pub fn acknowledgement(sequence_number: u32) -> RtmpPacket {
        RtmpPacket::Acknowledgement {
            header: RtmpHeader::control(MessageType::Acknowledgement),
            sequence_number,
        }
    }
}
