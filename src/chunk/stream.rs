use crate::protocol::RtmpHeader;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Per-chunk-stream receive state: the previous header seen on the stream
/// and the partially assembled message, if any.
#[derive(Debug, Clone, Default)]
pub struct ChunkStreamContext {
    /// Previous header received on this chunk stream
    pub prev_header: Option<RtmpHeader>,

    /// Header of the message currently being assembled
    current_header: Option<RtmpHeader>,

    /// Bytes accumulated so far for the current message
    assembly_buffer: Vec<u8>,

    /// Bytes still missing from the current message
    bytes_remaining: usize,
}

impl ChunkStreamContext {
    pub fn new() -> Self {
        ChunkStreamContext::default()
    }

    /// Check if a message is partially assembled
    pub fn is_assembling(&self) -> bool {
        self.bytes_remaining > 0
    }

    /// Begin assembling a new message described by `header`
    pub fn start_message(&mut self, header: RtmpHeader) {
        self.current_header = Some(header);
        self.bytes_remaining = header.message_length as usize;
        self.assembly_buffer.clear();
        self.assembly_buffer.reserve(header.message_length as usize);
    }

    /// Append one chunk of payload. Returns the message header and the
    /// complete contiguous body once all declared bytes have arrived.
    pub fn push_chunk(&mut self, data: &[u8]) -> Option<(RtmpHeader, Vec<u8>)> {
        let Some(header) = self.current_header else {
            // Assembly was aborted while this chunk was in flight
            return None;
        };

        self.assembly_buffer.extend_from_slice(data);

        if data.len() >= self.bytes_remaining {
            self.bytes_remaining = 0;
            self.current_header = None;
            let body = std::mem::take(&mut self.assembly_buffer);
            Some((header, body))
        } else {
            self.bytes_remaining -= data.len();
            None
        }
    }

    /// Discard any partially assembled message
    pub fn clear_assembly(&mut self) {
        self.current_header = None;
        self.assembly_buffer.clear();
        self.bytes_remaining = 0;
    }
}

/// The set of chunk stream contexts for one connection.
///
/// Entries are created on first reference to an id and live until
/// teardown. The registry is shared between the read loop (header
/// inheritance, reassembly) and the dispatch loop (abort handling), so
/// it locks internally; locks are never held across socket reads.
#[derive(Debug, Default)]
pub struct ChunkStreamRegistry {
    streams: Mutex<HashMap<u32, ChunkStreamContext>>,
}

impl ChunkStreamRegistry {
    pub fn new() -> Self {
        ChunkStreamRegistry::default()
    }

    /// Previous header received on the given chunk stream
    pub async fn prev_header(&self, chunk_stream_id: u32) -> Option<RtmpHeader> {
        let streams = self.streams.lock().await;
        streams.get(&chunk_stream_id).and_then(|ctx| ctx.prev_header)
    }

    /// Record the header of an arriving chunk and return how many payload
    /// bytes the caller should read for it (the lesser of the remaining
    /// message bytes and the chunk size).
    pub async fn begin_chunk(&self, header: RtmpHeader, chunk_size: usize) -> usize {
        let mut streams = self.streams.lock().await;
        let ctx = streams.entry(header.chunk_stream_id).or_default();
        ctx.prev_header = Some(header);
        if !ctx.is_assembling() {
            ctx.start_message(header);
        }
        ctx.bytes_remaining.min(chunk_size)
    }

    /// Append payload bytes read for a chunk stream; returns the complete
    /// message once assembled.
    pub async fn push_chunk(
        &self,
        chunk_stream_id: u32,
        data: &[u8],
    ) -> Option<(RtmpHeader, Vec<u8>)> {
        let mut streams = self.streams.lock().await;
        streams.get_mut(&chunk_stream_id)?.push_chunk(data)
    }

    /// Drop the partial message for a chunk stream (Abort message handling)
    pub async fn clear_assembly(&self, chunk_stream_id: u32) {
        let mut streams = self.streams.lock().await;
        if let Some(ctx) = streams.get_mut(&chunk_stream_id) {
            ctx.clear_assembly();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ChunkFormat, MessageType};

    fn audio_header(length: u32) -> RtmpHeader {
        RtmpHeader::new(ChunkFormat::Full, 5, 100, length, MessageType::Audio, 1)
    }

    #[test]
    fn test_single_chunk_assembly() {
        let mut ctx = ChunkStreamContext::new();
        ctx.start_message(audio_header(3));
        assert!(ctx.is_assembling());

        let (header, body) = ctx.push_chunk(&[1, 2, 3]).unwrap();
        assert_eq!(header.message_length, 3);
        assert_eq!(body, vec![1, 2, 3]);
        assert!(!ctx.is_assembling());
    }

    #[test]
    fn test_multi_chunk_assembly() {
        let mut ctx = ChunkStreamContext::new();
        ctx.start_message(audio_header(5));

        assert!(ctx.push_chunk(&[1, 2]).is_none());
        assert!(ctx.push_chunk(&[3, 4]).is_none());
        let (_, body) = ctx.push_chunk(&[5]).unwrap();
        assert_eq!(body, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_empty_body_completes_immediately() {
        let mut ctx = ChunkStreamContext::new();
        ctx.start_message(audio_header(0));
        assert!(!ctx.is_assembling());
        let (_, body) = ctx.push_chunk(&[]).unwrap();
        assert!(body.is_empty());
    }

    #[test]
    fn test_clear_assembly_drops_partial_message() {
        let mut ctx = ChunkStreamContext::new();
        ctx.start_message(audio_header(5));
        assert!(ctx.push_chunk(&[1, 2]).is_none());

        ctx.clear_assembly();
        assert!(!ctx.is_assembling());
        // A chunk that was in flight when the abort arrived is dropped
        assert!(ctx.push_chunk(&[3, 4, 5]).is_none());
    }

    #[tokio::test]
    async fn test_registry_creates_streams_lazily() {
        let registry = ChunkStreamRegistry::new();
        assert!(registry.prev_header(3).await.is_none());

        let header = audio_header(2);
        let to_read = registry.begin_chunk(header, 128).await;
        assert_eq!(to_read, 2);
        assert_eq!(registry.prev_header(5).await, Some(header));
    }

    #[tokio::test]
    async fn test_registry_caps_read_at_chunk_size() {
        let registry = ChunkStreamRegistry::new();
        let to_read = registry.begin_chunk(audio_header(1000), 128).await;
        assert_eq!(to_read, 128);
    }
}
