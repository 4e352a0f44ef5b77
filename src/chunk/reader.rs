use crate::chunk::stream::ChunkStreamRegistry;
use crate::protocol::{
    ChunkFormat, DEFAULT_CHUNK_SIZE, MessageType, RtmpHeader, RtmpPacket,
};
use crate::{Error, Result};
use log::{debug, trace};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

const EXTENDED_TIMESTAMP: u32 = 0xFFFFFF;

/// Decodes one RTMP message at a time from the transport, maintaining
/// per-chunk-stream header state and reassembly buffers.
///
/// SetChunkSize messages are consumed here: they update the inbound chunk
/// size and never surface to the consumer.
pub struct ChunkReader {
    streams: Arc<ChunkStreamRegistry>,

    /// Chunk size negotiated by the peer for what it sends us
    chunk_size: usize,

    /// Total bytes consumed from the transport
    bytes_read: u64,

    /// Value of `bytes_read` at the last acknowledgement sent
    bytes_acknowledged: u64,
}

impl ChunkReader {
    pub fn new(streams: Arc<ChunkStreamRegistry>) -> Self {
        ChunkReader {
            streams,
            chunk_size: DEFAULT_CHUNK_SIZE as usize,
            bytes_read: 0,
            bytes_acknowledged: 0,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Bytes read since the last acknowledgement
    pub fn unacknowledged_bytes(&self) -> u64 {
        self.bytes_read - self.bytes_acknowledged
    }

    /// Mark all bytes read so far as acknowledged; returns the total
    /// byte count to report to the peer
    pub fn mark_acknowledged(&mut self) -> u64 {
        self.bytes_acknowledged = self.bytes_read;
        self.bytes_read
    }

    /// Read chunks until one message completes or the current chunk leaves
    /// a message partially assembled.
    ///
    /// Returns `Ok(None)` when the chunk read did not complete a message
    /// (more chunks are needed) or when the message was consumed internally
    /// (SetChunkSize).
    pub async fn read_packet<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
    ) -> Result<Option<RtmpPacket>> {
        let (format, chunk_stream_id) = self.read_basic_header(reader).await?;
        let prev_header = self.streams.prev_header(chunk_stream_id).await;
        let header = self
            .read_message_header(reader, format, chunk_stream_id, prev_header)
            .await?;

        let to_read = self.streams.begin_chunk(header, self.chunk_size).await;
        let mut payload = vec![0u8; to_read];
        self.read_exact(reader, &mut payload).await?;

        let Some((header, body)) = self.streams.push_chunk(chunk_stream_id, &payload).await else {
            trace!(
                "Message on chunk stream {} not yet complete",
                chunk_stream_id
            );
            return Ok(None);
        };

        let packet = RtmpPacket::parse(header, &body)?;
        if let RtmpPacket::SetChunkSize { chunk_size, .. } = packet {
            debug!("Peer set inbound chunk size to {}", chunk_size);
            self.chunk_size = chunk_size as usize;
            return Ok(None);
        }
        Ok(Some(packet))
    }

    /// Parse the basic header: format bits plus a 1-, 2- or 3-byte
    /// chunk stream id (ids >= 64 use the extended encodings)
    async fn read_basic_header<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
    ) -> Result<(ChunkFormat, u32)> {
        let mut first = [0u8; 1];
        self.read_exact(reader, &mut first).await?;

        let format = ChunkFormat::from_id((first[0] >> 6) & 0x03)?;
        let chunk_stream_id = match first[0] & 0x3F {
            0 => {
                let mut id = [0u8; 1];
                self.read_exact(reader, &mut id).await?;
                id[0] as u32 + 64
            }
            1 => {
                let mut id = [0u8; 2];
                self.read_exact(reader, &mut id).await?;
                u16::from_le_bytes(id) as u32 + 64
            }
            n => n as u32,
        };

        Ok((format, chunk_stream_id))
    }

    /// Read the 0-11 byte message header for the given format, inheriting
    /// unsent fields from the previous header on the chunk stream
    async fn read_message_header<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
        format: ChunkFormat,
        chunk_stream_id: u32,
        prev_header: Option<RtmpHeader>,
    ) -> Result<RtmpHeader> {
        match format {
            ChunkFormat::Full => {
                let mut bytes = [0u8; 11];
                self.read_exact(reader, &mut bytes).await?;

                let timestamp = read_u24(&bytes[0..3]);
                let message_length = read_u24(&bytes[3..6]);
                let message_type = MessageType::from_id(bytes[6])?;
                let message_stream_id =
                    u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]);

                let timestamp = if timestamp == EXTENDED_TIMESTAMP {
                    self.read_extended_timestamp(reader).await?
                } else {
                    timestamp
                };

                Ok(RtmpHeader::new(
                    format,
                    chunk_stream_id,
                    timestamp,
                    message_length,
                    message_type,
                    message_stream_id,
                ))
            }
            ChunkFormat::SameStream => {
                let mut bytes = [0u8; 7];
                self.read_exact(reader, &mut bytes).await?;

                let delta = read_u24(&bytes[0..3]);
                let message_length = read_u24(&bytes[3..6]);
                let message_type = MessageType::from_id(bytes[6])?;

                let delta = if delta == EXTENDED_TIMESTAMP {
                    self.read_extended_timestamp(reader).await?
                } else {
                    delta
                };

                let prev = require_prev(prev_header, chunk_stream_id)?;
                Ok(RtmpHeader::new(
                    format,
                    chunk_stream_id,
                    prev.timestamp.wrapping_add(delta),
                    message_length,
                    message_type,
                    prev.message_stream_id,
                ))
            }
            ChunkFormat::TimestampOnly => {
                let mut bytes = [0u8; 3];
                self.read_exact(reader, &mut bytes).await?;

                let delta = read_u24(&bytes);
                let delta = if delta == EXTENDED_TIMESTAMP {
                    self.read_extended_timestamp(reader).await?
                } else {
                    delta
                };

                let prev = require_prev(prev_header, chunk_stream_id)?;
                Ok(RtmpHeader::new(
                    format,
                    chunk_stream_id,
                    prev.timestamp.wrapping_add(delta),
                    prev.message_length,
                    prev.message_type,
                    prev.message_stream_id,
                ))
            }
            ChunkFormat::Continuation => {
                let prev = require_prev(prev_header, chunk_stream_id)?;
                Ok(RtmpHeader::new(
                    format,
                    chunk_stream_id,
                    prev.timestamp,
                    prev.message_length,
                    prev.message_type,
                    prev.message_stream_id,
                ))
            }
        }
    }

    async fn read_extended_timestamp<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
    ) -> Result<u32> {
        let mut bytes = [0u8; 4];
        self.read_exact(reader, &mut bytes).await?;
        Ok(u32::from_be_bytes(bytes))
    }

    async fn read_exact<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
        buf: &mut [u8],
    ) -> Result<()> {
        reader.read_exact(buf).await?;
        self.bytes_read += buf.len() as u64;
        Ok(())
    }
}

fn read_u24(bytes: &[u8]) -> u32 {
    ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | (bytes[2] as u32)
}

fn require_prev(prev: Option<RtmpHeader>, chunk_stream_id: u32) -> Result<RtmpHeader> {
    prev.ok_or_else(|| {
        Error::chunk(format!(
            "Relative header on chunk stream {} with no previous header",
            chunk_stream_id
        ))
    })
}
