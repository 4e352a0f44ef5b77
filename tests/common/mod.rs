// Shared test utilities: a scripted RTMP stub server and a collecting sink.

use async_trait::async_trait;
use rtmp::{
    Amf0Object, Amf0Value, ChunkFormat, ChunkReader, ChunkStreamRegistry, ChunkWriter,
    ContentKind, MessageType, Result, RtmpCommand, RtmpData, RtmpHeader, RtmpPacket, StreamSink,
    UserControlEvent, HANDSHAKE_SIZE, RTMP_VERSION,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Sink that records everything delivered to it
#[derive(Default)]
pub struct CollectingSink {
    pub metadata: Mutex<Vec<RtmpData>>,
    pub content: Mutex<Vec<(ContentKind, Vec<u8>, u32)>>,
    pub close_calls: AtomicUsize,
}

#[async_trait]
impl StreamSink for CollectingSink {
    async fn on_metadata(&self, metadata: RtmpData) -> Result<()> {
        self.metadata.lock().unwrap().push(metadata);
        Ok(())
    }

    async fn on_content(&self, kind: ContentKind, data: Vec<u8>, timestamp: u32) -> Result<()> {
        self.content.lock().unwrap().push((kind, data, timestamp));
        Ok(())
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl CollectingSink {
    pub fn content_count(&self) -> usize {
        self.content.lock().unwrap().len()
    }

    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct StubOptions {
    /// Delay before replying to the connect command
    pub connect_delay: Duration,
    /// Send a `_result` with an unknown transaction id before anything else
    pub send_stray_result: bool,
    /// Reply to play with one audio packet
    pub send_audio: bool,
    /// Send StreamEof after the audio packet
    pub send_eof: bool,
    pub audio_payload: Vec<u8>,
    pub audio_timestamp: u32,
    /// Stream id handed out by createStream
    pub stream_id: u32,
}

impl Default for StubOptions {
    fn default() -> Self {
        StubOptions {
            connect_delay: Duration::from_millis(50),
            send_stray_result: false,
            send_audio: true,
            send_eof: true,
            audio_payload: vec![0xaf, 0x01, 0x02, 0x03],
            audio_timestamp: 777,
            stream_id: 7,
        }
    }
}

pub struct StubServer {
    pub addr: String,
    /// Commands received from the client, with their message stream ids
    pub commands: Arc<Mutex<Vec<(u32, RtmpCommand)>>>,
}

impl StubServer {
    pub fn command_names(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(_, c)| c.name.clone())
            .collect()
    }

    pub fn commands_named(&self, name: &str) -> Vec<(u32, RtmpCommand)> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| c.name == name)
            .cloned()
            .collect()
    }
}

/// Start a one-connection stub RTMP server on an ephemeral port
pub async fn spawn_stub_server(options: StubOptions) -> StubServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
    let commands: Arc<Mutex<Vec<(u32, RtmpCommand)>>> = Arc::new(Mutex::new(Vec::new()));

    let recorded = commands.clone();
    tokio::spawn(async move {
        if let Ok((socket, _)) = listener.accept().await {
            run_session(socket, options, recorded).await;
        }
    });

    StubServer { addr, commands }
}

async fn run_session(
    mut socket: TcpStream,
    options: StubOptions,
    commands: Arc<Mutex<Vec<(u32, RtmpCommand)>>>,
) {
    // Server half of the handshake: S0+S1+S2 after C0+C1, then read C2
    let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
    socket.read_exact(&mut c0c1).await.unwrap();
    assert_eq!(c0c1[0], RTMP_VERSION);

    let mut reply = vec![RTMP_VERSION];
    reply.extend(vec![0x51u8; HANDSHAKE_SIZE]); // S1
    reply.extend(&c0c1[1..]); // S2 echoes C1
    socket.write_all(&reply).await.unwrap();
    socket.flush().await.unwrap();

    let mut c2 = vec![0u8; HANDSHAKE_SIZE];
    socket.read_exact(&mut c2).await.unwrap();

    let (mut read_half, mut write_half) = socket.split();
    let mut decoder = ChunkReader::new(Arc::new(ChunkStreamRegistry::new()));
    let mut encoder = ChunkWriter::new();

    if options.send_stray_result {
        let mut stray = RtmpCommand::new("_result", 99.0);
        stray.arguments.push(Amf0Value::Null);
        send(&mut encoder, &mut write_half, RtmpPacket::command(stray, RtmpHeader::command(0)))
            .await;
    }

    loop {
        let packet = match decoder.read_packet(&mut read_half).await {
            Ok(Some(packet)) => packet,
            Ok(None) => continue,
            Err(_) => break, // client went away
        };
        let RtmpPacket::Command { header, command } = packet else {
            continue;
        };
        commands
            .lock()
            .unwrap()
            .push((header.message_stream_id, command.clone()));

        match command.name.as_str() {
            "connect" => {
                tokio::time::sleep(options.connect_delay).await;
                let mut result = RtmpCommand::new("_result", command.transaction_id);
                result.arguments.push(Amf0Value::Object(connect_properties()));
                result.arguments.push(Amf0Value::Object(connect_information()));
                send(
                    &mut encoder,
                    &mut write_half,
                    RtmpPacket::command(result, RtmpHeader::command(0)),
                )
                .await;
            }
            "createStream" => {
                let mut result = RtmpCommand::new("_result", command.transaction_id);
                result.arguments.push(Amf0Value::Null);
                result
                    .arguments
                    .push(Amf0Value::Number(options.stream_id as f64));
                send(
                    &mut encoder,
                    &mut write_half,
                    RtmpPacket::command(result, RtmpHeader::command(0)),
                )
                .await;
            }
            "play" => {
                if options.send_audio {
                    let audio = RtmpPacket::Audio {
                        header: RtmpHeader::new(
                            ChunkFormat::Full,
                            5,
                            options.audio_timestamp,
                            options.audio_payload.len() as u32,
                            MessageType::Audio,
                            options.stream_id,
                        ),
                        data: options.audio_payload.clone(),
                    };
                    send(&mut encoder, &mut write_half, audio).await;
                }
                if options.send_eof {
                    send(
                        &mut encoder,
                        &mut write_half,
                        RtmpPacket::user_control(UserControlEvent::StreamEof(options.stream_id)),
                    )
                    .await;
                }
            }
            _ => {}
        }
    }
}

async fn send(
    encoder: &mut ChunkWriter,
    write_half: &mut tokio::net::tcp::WriteHalf<'_>,
    packet: RtmpPacket,
) {
    encoder.write_packet(&packet, write_half).await.unwrap();
    write_half.flush().await.unwrap();
}

fn connect_properties() -> Amf0Object {
    let mut properties = Amf0Object::new();
    properties.set("fmsVer", Amf0Value::String("FMS/3,5,1,516".to_string()));
    properties.set("capabilities", Amf0Value::Number(31.0));
    properties
}

fn connect_information() -> Amf0Object {
    let mut information = Amf0Object::new();
    information.set("level", Amf0Value::String("status".to_string()));
    information.set(
        "code",
        Amf0Value::String("NetConnection.Connect.Success".to_string()),
    );
    information.set(
        "description",
        Amf0Value::String("Connection succeeded.".to_string()),
    );
    information
}

/// Poll until `condition` holds or the timeout elapses
pub async fn wait_for<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
