use crate::protocol::{ChunkFormat, DEFAULT_CHUNK_SIZE, RtmpHeader, RtmpPacket};
use crate::utils::ByteBuffer;
use crate::{Error, Result};
use std::collections::HashMap;
use tokio::io::{AsyncWrite, AsyncWriteExt};

const EXTENDED_TIMESTAMP: u32 = 0xFFFFFF;

/// Serializes packets into chunk sequences: the packet's header is written
/// once in the format it specifies, and bodies longer than the chunk size
/// are split with bare continuation (fmt 3) basic headers between pieces.
pub struct ChunkWriter {
    /// Previous header sent per chunk stream, for delta encoding
    prev_headers: HashMap<u32, RtmpHeader>,

    /// Chunk size for what we send
    chunk_size: usize,
}

impl ChunkWriter {
    pub fn new() -> Self {
        ChunkWriter {
            prev_headers: HashMap::new(),
            chunk_size: DEFAULT_CHUNK_SIZE as usize,
        }
    }

    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = size;
    }

    /// Serialize and send one packet. The caller is responsible for
    /// flushing the transport once its queue is drained.
    pub async fn write_packet<W: AsyncWrite + Unpin>(
        &mut self,
        packet: &RtmpPacket,
        writer: &mut W,
    ) -> Result<()> {
        let bytes = self.encode_packet(packet)?;
        writer.write_all(&bytes).await?;
        Ok(())
    }

    /// Serialize a packet into its full chunk byte sequence, updating the
    /// previous-header cache for the packet's chunk stream
    pub fn encode_packet(&mut self, packet: &RtmpPacket) -> Result<Vec<u8>> {
        let body = packet.encode_body()?;
        let mut header = *packet.header();
        header.message_length = body.len() as u32;

        let mut out = ByteBuffer::with_capacity(18 + body.len());
        self.encode_header(&header, &mut out)?;

        // First piece after the header, then bare continuation headers
        let first = body.len().min(self.chunk_size);
        out.write_bytes(&body[..first])?;

        let mut offset = first;
        while offset < body.len() {
            encode_basic_header(ChunkFormat::Continuation, header.chunk_stream_id, &mut out)?;
            let end = (offset + self.chunk_size).min(body.len());
            out.write_bytes(&body[offset..end])?;
            offset = end;
        }

        self.prev_headers.insert(header.chunk_stream_id, header);
        Ok(out.to_vec())
    }

    /// Encode the basic header plus the message header in the format the
    /// packet specifies. Relative formats encode the timestamp as a delta
    /// against the previous header sent on the chunk stream.
    fn encode_header(&self, header: &RtmpHeader, out: &mut ByteBuffer) -> Result<()> {
        encode_basic_header(header.format, header.chunk_stream_id, out)?;

        match header.format {
            ChunkFormat::Full => {
                let (wire_ts, extended) = wire_timestamp(header.timestamp);
                out.write_u24_be(wire_ts)?;
                out.write_u24_be(header.message_length)?;
                out.write_u8(header.message_type.id())?;
                out.write_u32_le(header.message_stream_id)?;
                if extended {
                    out.write_u32_be(header.timestamp)?;
                }
            }
            ChunkFormat::SameStream => {
                let delta = self.timestamp_delta(header)?;
                let (wire_ts, extended) = wire_timestamp(delta);
                out.write_u24_be(wire_ts)?;
                out.write_u24_be(header.message_length)?;
                out.write_u8(header.message_type.id())?;
                if extended {
                    out.write_u32_be(delta)?;
                }
            }
            ChunkFormat::TimestampOnly => {
                let delta = self.timestamp_delta(header)?;
                let (wire_ts, extended) = wire_timestamp(delta);
                out.write_u24_be(wire_ts)?;
                if extended {
                    out.write_u32_be(delta)?;
                }
            }
            ChunkFormat::Continuation => {}
        }
        Ok(())
    }

    fn timestamp_delta(&self, header: &RtmpHeader) -> Result<u32> {
        let prev = self.prev_headers.get(&header.chunk_stream_id).ok_or_else(|| {
            Error::chunk(format!(
                "Relative header on chunk stream {} with nothing previously sent",
                header.chunk_stream_id
            ))
        })?;
        Ok(header.timestamp.wrapping_sub(prev.timestamp))
    }
}

impl Default for ChunkWriter {
    fn default() -> Self {
        ChunkWriter::new()
    }
}

fn wire_timestamp(timestamp: u32) -> (u32, bool) {
    if timestamp >= EXTENDED_TIMESTAMP {
        (EXTENDED_TIMESTAMP, true)
    } else {
        (timestamp, false)
    }
}

fn encode_basic_header(format: ChunkFormat, chunk_stream_id: u32, out: &mut ByteBuffer) -> Result<()> {
    let fmt_bits = format.id() << 6;
    if chunk_stream_id < 2 {
        return Err(Error::chunk(format!(
            "Chunk stream id {} is reserved",
            chunk_stream_id
        )));
    }
    if chunk_stream_id <= 63 {
        out.write_u8(fmt_bits | chunk_stream_id as u8)?;
    } else if chunk_stream_id <= 319 {
        out.write_u8(fmt_bits)?;
        out.write_u8((chunk_stream_id - 64) as u8)?;
    } else {
        out.write_u8(fmt_bits | 1)?;
        let id = chunk_stream_id - 64;
        out.write_u8((id & 0xFF) as u8)?;
        out.write_u8((id >> 8) as u8)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::stream::ChunkStreamRegistry;
    use crate::chunk::ChunkReader;
    use crate::protocol::{MessageType, STREAM_CHANNEL};
    use std::sync::Arc;

    fn audio_packet(payload: Vec<u8>, timestamp: u32) -> RtmpPacket {
        RtmpPacket::Audio {
            header: RtmpHeader::new(
                ChunkFormat::Full,
                STREAM_CHANNEL,
                timestamp,
                payload.len() as u32,
                MessageType::Audio,
                1,
            ),
            data: payload,
        }
    }

    async fn decode_all(bytes: &[u8]) -> Vec<RtmpPacket> {
        let registry = Arc::new(ChunkStreamRegistry::new());
        let mut reader = ChunkReader::new(registry);
        let mut cursor = bytes;
        let mut packets = Vec::new();
        while !cursor.is_empty() {
            if let Some(packet) = reader.read_packet(&mut cursor).await.unwrap() {
                packets.push(packet);
            }
        }
        packets
    }

    #[tokio::test]
    async fn test_fragmentation_round_trip_at_boundary_lengths() {
        let chunk_size = DEFAULT_CHUNK_SIZE as usize;
        for len in [0, chunk_size - 1, chunk_size, chunk_size + 1, 10 * chunk_size] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let mut writer = ChunkWriter::new();
            let bytes = writer.encode_packet(&audio_packet(payload.clone(), 1000)).unwrap();

            let packets = decode_all(&bytes).await;
            assert_eq!(packets.len(), 1, "length {}", len);
            match &packets[0] {
                RtmpPacket::Audio { header, data } => {
                    assert_eq!(data, &payload, "length {}", len);
                    assert_eq!(header.timestamp, 1000);
                    assert_eq!(header.message_length, len as u32);
                }
                other => panic!("unexpected packet {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_continuation_pieces_use_single_byte_headers() {
        let chunk_size = DEFAULT_CHUNK_SIZE as usize;
        let payload = vec![0u8; chunk_size * 2];
        let mut writer = ChunkWriter::new();
        let bytes = writer.encode_packet(&audio_packet(payload, 0)).unwrap();

        // basic(1) + full header(11) + chunk + basic(1) + chunk
        assert_eq!(bytes.len(), 1 + 11 + chunk_size + 1 + chunk_size);
        let continuation = bytes[1 + 11 + chunk_size];
        assert_eq!(continuation, (3 << 6) | STREAM_CHANNEL as u8);
    }

    #[tokio::test]
    async fn test_header_round_trip_all_formats() {
        let mut writer = ChunkWriter::new();

        let full = audio_packet(vec![1, 2, 3], 500);
        let mut same_stream = audio_packet(vec![4, 5, 6, 7], 600);
        same_stream.header_mut().format = ChunkFormat::SameStream;
        let mut ts_only = audio_packet(vec![8, 9, 10, 11], 700);
        ts_only.header_mut().format = ChunkFormat::TimestampOnly;
        let mut continuation = audio_packet(vec![12, 13, 14, 15], 700);
        continuation.header_mut().format = ChunkFormat::Continuation;

        let mut bytes = Vec::new();
        for packet in [&full, &same_stream, &ts_only, &continuation] {
            bytes.extend(writer.encode_packet(packet).unwrap());
        }

        let packets = decode_all(&bytes).await;
        assert_eq!(packets.len(), 4);

        let expect = [
            (ChunkFormat::Full, 500u32, vec![1u8, 2, 3]),
            (ChunkFormat::SameStream, 600, vec![4, 5, 6, 7]),
            (ChunkFormat::TimestampOnly, 700, vec![8, 9, 10, 11]),
            (ChunkFormat::Continuation, 700, vec![12, 13, 14, 15]),
        ];
        for (packet, (format, timestamp, payload)) in packets.iter().zip(expect) {
            match packet {
                RtmpPacket::Audio { header, data } => {
                    assert_eq!(header.format, format);
                    assert_eq!(header.timestamp, timestamp);
                    assert_eq!(header.message_stream_id, 1);
                    assert_eq!(data, &payload);
                }
                other => panic!("unexpected packet {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_extended_chunk_stream_ids_round_trip() {
        for csid in [63u32, 64, 319, 320, 400] {
            let packet = RtmpPacket::Audio {
                header: RtmpHeader::new(ChunkFormat::Full, csid, 0, 2, MessageType::Audio, 1),
                data: vec![0xaa, 0xbb],
            };
            let mut writer = ChunkWriter::new();
            let bytes = writer.encode_packet(&packet).unwrap();
            let packets = decode_all(&bytes).await;
            assert_eq!(packets[0].header().chunk_stream_id, csid, "csid {}", csid);
        }
    }

    #[tokio::test]
    async fn test_extended_timestamp_round_trip() {
        let packet = audio_packet(vec![1], 0x01000000);
        let mut writer = ChunkWriter::new();
        let bytes = writer.encode_packet(&packet).unwrap();
        let packets = decode_all(&bytes).await;
        assert_eq!(packets[0].header().timestamp, 0x01000000);
    }

    #[tokio::test]
    async fn test_set_chunk_size_is_consumed_and_applied() {
        // Server switches to a 16-byte chunk size, then sends a 40-byte message
        let mut server_writer = ChunkWriter::new();
        let set = RtmpPacket::SetChunkSize {
            header: RtmpHeader::control(MessageType::SetChunkSize),
            chunk_size: 16,
        };
        let mut bytes = server_writer.encode_packet(&set).unwrap();
        server_writer.set_chunk_size(16);
        let payload: Vec<u8> = (0..40).collect();
        bytes.extend(server_writer.encode_packet(&audio_packet(payload.clone(), 9)).unwrap());

        let registry = Arc::new(ChunkStreamRegistry::new());
        let mut reader = ChunkReader::new(registry);
        let mut cursor = bytes.as_slice();

        let mut packets = Vec::new();
        while !cursor.is_empty() {
            if let Some(packet) = reader.read_packet(&mut cursor).await.unwrap() {
                packets.push(packet);
            }
        }

        assert_eq!(reader.chunk_size(), 16);
        assert_eq!(packets.len(), 1);
        match &packets[0] {
            RtmpPacket::Audio { data, .. } => assert_eq!(data, &payload),
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_incomplete_message_yields_no_packet() {
        let chunk_size = DEFAULT_CHUNK_SIZE as usize;
        let payload = vec![7u8; chunk_size + 10];
        let mut writer = ChunkWriter::new();
        let bytes = writer.encode_packet(&audio_packet(payload, 0)).unwrap();

        let registry = Arc::new(ChunkStreamRegistry::new());
        let mut reader = ChunkReader::new(registry);
        let mut cursor = bytes.as_slice();

        // First chunk: message incomplete, no packet and no error
        assert!(reader.read_packet(&mut cursor).await.unwrap().is_none());
        // Second chunk completes it
        assert!(reader.read_packet(&mut cursor).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_aborted_message_is_never_delivered() {
        let chunk_size = DEFAULT_CHUNK_SIZE as usize;
        let payload = vec![7u8; chunk_size * 2];
        let mut writer = ChunkWriter::new();
        let bytes = writer.encode_packet(&audio_packet(payload, 0)).unwrap();

        let registry = Arc::new(ChunkStreamRegistry::new());
        let mut reader = ChunkReader::new(registry.clone());
        let mut cursor = bytes.as_slice();

        assert!(reader.read_packet(&mut cursor).await.unwrap().is_none());
        registry.clear_assembly(STREAM_CHANNEL).await;
        // The trailing continuation restarts assembly instead of completing
        assert!(reader.read_packet(&mut cursor).await.unwrap().is_none());
        assert!(cursor.is_empty());
    }

    #[tokio::test]
    async fn test_relative_first_header_is_error() {
        let mut packet = audio_packet(vec![1], 100);
        packet.header_mut().format = ChunkFormat::TimestampOnly;
        let mut writer = ChunkWriter::new();
        assert!(writer.encode_packet(&packet).is_err());
    }

    #[tokio::test]
    async fn test_reader_counts_bytes_for_acknowledgement() {
        let mut writer = ChunkWriter::new();
        let bytes = writer.encode_packet(&audio_packet(vec![1, 2, 3], 0)).unwrap();

        let registry = Arc::new(ChunkStreamRegistry::new());
        let mut reader = ChunkReader::new(registry);
        let mut cursor = bytes.as_slice();
        reader.read_packet(&mut cursor).await.unwrap();

        assert_eq!(reader.unacknowledged_bytes(), bytes.len() as u64);
        assert_eq!(reader.mark_acknowledged(), bytes.len() as u64);
        assert_eq!(reader.unacknowledged_bytes(), 0);
    }
}
