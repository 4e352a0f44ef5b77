// RTMP play client demo
//
// Connects to an RTMP server, plays a stream and reports what arrives.
//
// Usage:
//   cargo run --example play_client -- rtmp://localhost/live?mystream
//   cargo run --example play_client -- rtmp://localhost/live mystream

use async_trait::async_trait;
use log::info;
use rtmp::{ContentKind, Result, RtmpClient, RtmpData, StreamSink};
use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sink that counts packets and bytes instead of writing a container
#[derive(Default)]
struct CountingSink {
    audio_packets: AtomicU64,
    video_packets: AtomicU64,
    bytes: AtomicU64,
}

#[async_trait]
impl StreamSink for CountingSink {
    async fn on_metadata(&self, metadata: RtmpData) -> Result<()> {
        info!("Metadata: {:?}", metadata.values);
        Ok(())
    }

    async fn on_content(&self, kind: ContentKind, data: Vec<u8>, timestamp: u32) -> Result<()> {
        match kind {
            ContentKind::Audio => self.audio_packets.fetch_add(1, Ordering::Relaxed),
            ContentKind::Video => self.video_packets.fetch_add(1, Ordering::Relaxed),
        };
        self.bytes.fetch_add(data.len() as u64, Ordering::Relaxed);
        log::debug!("{:?} packet, {} bytes at {} ms", kind, data.len(), timestamp);
        Ok(())
    }

    async fn close(&self) {
        info!(
            "Stream finished: {} audio / {} video packets, {} bytes",
            self.audio_packets.load(Ordering::Relaxed),
            self.video_packets.load(Ordering::Relaxed),
            self.bytes.load(Ordering::Relaxed)
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <rtmp-url> [stream_name]", args[0]);
        eprintln!("Example: {} rtmp://localhost/live?mystream", args[0]);
        std::process::exit(1);
    }

    let mut client = RtmpClient::from_url(&args[1])?;
    let play_path = args
        .get(2)
        .map(String::as_str)
        .or(client.stream_name())
        .map(str::to_string);
    let Some(play_path) = play_path else {
        eprintln!("No stream name in URL; pass one as the second argument");
        std::process::exit(1);
    };

    client.connect().await?;
    info!("Connected, playing '{}'", play_path);

    let sink = Arc::new(CountingSink::default());
    client.play(&play_path, sink).await?;

    client.shutdown().await;
    Ok(())
}
