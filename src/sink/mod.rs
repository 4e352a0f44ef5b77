use crate::Result;
use crate::protocol::RtmpData;
use async_trait::async_trait;

/// Kind of media payload delivered to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Audio,
    Video,
}

/// Receiver for the decoded content of a played stream.
///
/// The dispatch loop calls this for every forwarded metadata notification
/// and every audio/video packet, and closes it on stream EOF or shutdown.
/// Implementations reformat the payloads into whatever container they
/// produce; the protocol engine treats the bytes as opaque.
#[async_trait]
pub trait StreamSink: Send + Sync {
    /// Stream metadata (`onMetaData`) arrived
    async fn on_metadata(&self, metadata: RtmpData) -> Result<()>;

    /// One audio or video packet arrived, with its absolute timestamp
    /// in milliseconds
    async fn on_content(&self, kind: ContentKind, data: Vec<u8>, timestamp: u32) -> Result<()>;

    /// The stream ended or the connection is shutting down. Called at
    /// most once.
    async fn close(&self);
}
