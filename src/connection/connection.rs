use crate::chunk::{ChunkReader, ChunkStreamRegistry, ChunkWriter};
use crate::connection::state::ConnectionState;
use crate::protocol::{
    RtmpCommand, RtmpHeader, RtmpPacket, STREAM_BUFFER_LENGTH_MS, UserControlEvent,
};
use crate::session::SessionState;
use crate::sink::{ContentKind, StreamSink};
use crate::{Error, Result};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{Notify, RwLock, mpsc, watch};

/// One live connection: the transport plus the three loops driving it.
///
/// The read loop decodes chunks into packets and queues them; the
/// dispatch loop consumes that queue in arrival order and mutates session
/// state or forwards content to the sink; the write loop drains the
/// outbound queue, sending and flushing in enqueue order. Whichever loop
/// fails or observes shutdown first triggers the teardown cascade, which
/// runs exactly once.
pub(crate) struct Connection {
    id: String,
    session: Arc<SessionState>,
    state: Arc<RwLock<ConnectionState>>,
    streams: Arc<ChunkStreamRegistry>,
    outbound_tx: mpsc::UnboundedSender<RtmpPacket>,
    sink: RwLock<Option<Arc<dyn StreamSink>>>,

    active: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    shutdown_started: AtomicBool,

    /// Set when the played stream reaches EOF or the connection dies
    stream_finished: AtomicBool,
    stream_done: Notify,
}

impl Connection {
    /// Take ownership of a handshaken transport and start the loops
    pub fn start(
        id: String,
        transport: TcpStream,
        session: Arc<SessionState>,
        state: Arc<RwLock<ConnectionState>>,
    ) -> Arc<Connection> {
        let (read_half, write_half) = transport.into_split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (received_tx, received_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);

        let connection = Arc::new(Connection {
            id,
            session,
            state,
            streams: Arc::new(ChunkStreamRegistry::new()),
            outbound_tx,
            sink: RwLock::new(None),
            active: AtomicBool::new(true),
            shutdown_tx,
            shutdown_started: AtomicBool::new(false),
            stream_finished: AtomicBool::new(false),
            stream_done: Notify::new(),
        });

        tokio::spawn(Connection::read_loop(
            connection.clone(),
            BufReader::new(read_half),
            received_tx,
        ));
        tokio::spawn(Connection::write_loop(
            connection.clone(),
            BufWriter::new(write_half),
            outbound_rx,
        ));
        tokio::spawn(Connection::dispatch_loop(connection.clone(), received_rx));

        connection
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    async fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write().await;
        *state = next;
    }

    /// Enqueue a packet for the write loop
    pub fn send_packet(&self, packet: RtmpPacket) -> Result<()> {
        if !self.is_active() {
            return Err(Error::connection("Connection is shut down"));
        }
        self.outbound_tx
            .send(packet)
            .map_err(|_| Error::connection("Write queue is closed"))
    }

    /// Install the sink that will receive played content
    pub async fn set_sink(&self, sink: Arc<dyn StreamSink>) {
        self.stream_finished.store(false, Ordering::Release);
        *self.sink.write().await = Some(sink);
    }

    async fn sink(&self) -> Option<Arc<dyn StreamSink>> {
        self.sink.read().await.clone()
    }

    /// Block until the played stream completes or the connection dies
    pub async fn wait_stream_done(&self) {
        loop {
            if self.stream_finished.load(Ordering::Acquire) || !self.is_active() {
                return;
            }
            let notified = self.stream_done.notified();
            if self.stream_finished.load(Ordering::Acquire) || !self.is_active() {
                return;
            }
            notified.await;
        }
    }

    fn mark_stream_done(&self) {
        self.stream_finished.store(true, Ordering::Release);
        self.stream_done.notify_waiters();
    }

    /// Issue the buffer-length controls and the play command for an open
    /// stream. Used directly by the client when a stream id already
    /// exists, and by the dispatch loop once a deferred createStream
    /// result arrives.
    pub async fn start_playback(&self, stream_name: &str, stream_id: u32) -> Result<()> {
        debug!(
            "[{}] Starting playback of '{}' on stream {}",
            self.id, stream_name, stream_id
        );
        self.send_packet(RtmpPacket::user_control(UserControlEvent::SetBufferLength {
            stream_id: 0,
            buffer_length_ms: STREAM_BUFFER_LENGTH_MS,
        }))?;
        let play = RtmpCommand::play(
            self.session.current_transaction_id() as f64,
            stream_name,
        );
        self.send_packet(RtmpPacket::command(play, RtmpHeader::stream_command(stream_id)))?;
        self.send_packet(RtmpPacket::user_control(UserControlEvent::SetBufferLength {
            stream_id,
            buffer_length_ms: STREAM_BUFFER_LENGTH_MS,
        }))?;
        self.set_state(ConnectionState::Playing).await;
        Ok(())
    }

    /// Wake every loop and waiter; safe to call repeatedly
    fn request_shutdown(&self) {
        self.active.store(false, Ordering::Release);
        let _ = self.shutdown_tx.send(true);
        self.session.abort_connecting();
        self.mark_stream_done();
    }

    /// Teardown cascade: stop the loops, let them close their transport
    /// halves, close the sink. Runs its body exactly once no matter how
    /// many loops or callers race into it.
    pub async fn shutdown(&self) {
        if self.shutdown_started.swap(true, Ordering::AcqRel) {
            self.request_shutdown();
            return;
        }
        info!("[{}] Shutting down connection", self.id);
        self.request_shutdown();
        if let Some(sink) = self.sink.write().await.take() {
            sink.close().await;
        }
        self.set_state(ConnectionState::Closed).await;
    }

    async fn read_loop(
        self: Arc<Self>,
        mut transport: BufReader<OwnedReadHalf>,
        received_tx: mpsc::UnboundedSender<RtmpPacket>,
    ) {
        let mut decoder = ChunkReader::new(self.streams.clone());
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        while self.is_active() {
            let result = tokio::select! {
                _ = shutdown_rx.changed() => break,
                result = decoder.read_packet(&mut transport) => result,
            };
            match result {
                Ok(Some(packet)) => {
                    if received_tx.send(packet).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    if self.is_active() {
                        error!("[{}] Read loop failed: {}", self.id, e);
                    }
                    break;
                }
            }

            let window = self.session.window_ack_size() as u64;
            if window > 0 && decoder.unacknowledged_bytes() >= window {
                let total = decoder.mark_acknowledged();
                let _ = self.outbound_tx.send(RtmpPacket::acknowledgement(total as u32));
            }
        }

        // Dropping the read half closes it
        drop(transport);
        debug!("[{}] Read loop exiting", self.id);
        self.shutdown().await;
    }

    async fn write_loop(
        self: Arc<Self>,
        mut transport: BufWriter<OwnedWriteHalf>,
        mut outbound_rx: mpsc::UnboundedReceiver<RtmpPacket>,
    ) {
        let mut encoder = ChunkWriter::new();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        'outer: while self.is_active() {
            // Drain everything queued so far
            loop {
                match outbound_rx.try_recv() {
                    Ok(packet) => {
                        if let Err(e) = self.write_one(&mut encoder, &mut transport, packet).await
                        {
                            if self.is_active() {
                                error!("[{}] Write loop failed: {}", self.id, e);
                            }
                            break 'outer;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => break 'outer,
                }
            }

            if let Err(e) = transport.flush().await {
                if self.is_active() {
                    error!("[{}] Flush failed: {}", self.id, e);
                }
                break;
            }

            // Block until another packet is enqueued or shutdown is requested
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                packet = outbound_rx.recv() => match packet {
                    Some(packet) => {
                        if let Err(e) = self.write_one(&mut encoder, &mut transport, packet).await {
                            if self.is_active() {
                                error!("[{}] Write loop failed: {}", self.id, e);
                            }
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        let _ = transport.shutdown().await;
        debug!("[{}] Write loop exiting", self.id);
        self.shutdown().await;
    }

    async fn write_one<W: AsyncWrite + Unpin>(
        &self,
        encoder: &mut ChunkWriter,
        transport: &mut W,
        packet: RtmpPacket,
    ) -> Result<()> {
        encoder.write_packet(&packet, transport).await?;
        if let RtmpPacket::Command { command, .. } = &packet {
            self.session
                .record_transaction(command.transaction_id as u32, &command.name)
                .await;
        }
        Ok(())
    }

    async fn dispatch_loop(self: Arc<Self>, mut received_rx: mpsc::UnboundedReceiver<RtmpPacket>) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        while self.is_active() {
            let packet = tokio::select! {
                _ = shutdown_rx.changed() => break,
                packet = received_rx.recv() => match packet {
                    Some(packet) => packet,
                    None => break,
                },
            };
            if let Err(e) = self.handle_packet(packet).await {
                if self.is_active() {
                    error!("[{}] Dispatch failed: {}", self.id, e);
                }
                break;
            }
        }

        debug!("[{}] Dispatch loop exiting", self.id);
        self.shutdown().await;
    }

    async fn handle_packet(&self, packet: RtmpPacket) -> Result<()> {
        match packet {
            RtmpPacket::Abort {
                chunk_stream_id, ..
            } => {
                debug!(
                    "[{}] Abort received, dropping partial message on chunk stream {}",
                    self.id, chunk_stream_id
                );
                self.streams.clear_assembly(chunk_stream_id).await;
            }
            RtmpPacket::UserControl { event, .. } => self.handle_user_control(event).await?,
            RtmpPacket::WindowAckSize { window_size, .. } => {
                debug!("[{}] Window acknowledgement size set to {}", self.id, window_size);
                self.session.set_window_ack_size(window_size);
            }
            RtmpPacket::Command { command, .. } => self.handle_command(command).await?,
            RtmpPacket::Data { data, .. } => {
                if data.is_metadata() {
                    if let Some(sink) = self.sink().await {
                        sink.on_metadata(data).await?;
                    }
                } else {
                    debug!("[{}] Ignoring data message: {}", self.id, data.type_name);
                }
            }
            RtmpPacket::Audio { header, data } => {
                self.forward_content(ContentKind::Audio, data, header.timestamp)
                    .await?;
            }
            RtmpPacket::Video { header, data } => {
                self.forward_content(ContentKind::Video, data, header.timestamp)
                    .await?;
            }
            other => {
                warn!(
                    "[{}] Not handling packet of type {:?}",
                    self.id,
                    other.header().message_type
                );
            }
        }
        Ok(())
    }

    async fn handle_user_control(&self, event: UserControlEvent) -> Result<()> {
        match event {
            UserControlEvent::PingRequest(timestamp) => {
                debug!("[{}] Replying to ping request", self.id);
                self.send_packet(RtmpPacket::user_control(UserControlEvent::PingResponse(
                    timestamp,
                )))?;
            }
            UserControlEvent::StreamEof(_) => {
                info!("[{}] Stream EOF reached, closing sink", self.id);
                if let Some(sink) = self.sink.write().await.take() {
                    sink.close().await;
                }
                self.mark_stream_done();
            }
            other => debug!("[{}] Ignoring user control event: {:?}", self.id, other),
        }
        Ok(())
    }

    /// Correlate a `_result` with the command that requested it
    async fn handle_command(&self, command: RtmpCommand) -> Result<()> {
        if !command.is_result() {
            warn!("[{}] Ignoring server command: {}", self.id, command.name);
            return Ok(());
        }

        let transaction_id = command.transaction_id as u32;
        match self.session.take_transaction(transaction_id).await {
            Some(method) if method == "connect" => {
                info!("[{}] Connected to application", self.id);
                self.session.mark_connected();
                self.set_state(ConnectionState::Connected).await;
            }
            Some(method) if method == "createStream" => {
                let stream_id = command
                    .arguments
                    .get(1)
                    .and_then(|v| v.as_number())
                    .ok_or_else(|| {
                        Error::protocol("createStream result carries no stream id")
                    })? as u32;
                debug!("[{}] Stream created with id {}", self.id, stream_id);
                self.session.set_current_stream_id(Some(stream_id)).await;
                self.set_state(ConnectionState::StreamCreated).await;

                // A play issued before the stream existed resumes here
                if let Some(stream_name) = self.session.requested_stream_name().await {
                    self.start_playback(&stream_name, stream_id).await?;
                }
            }
            Some(method) => {
                warn!("[{}] _result received for unexpected method: {}", self.id, method);
            }
            None => {
                warn!(
                    "[{}] _result received for unknown transaction id: {}",
                    self.id, transaction_id
                );
            }
        }
        Ok(())
    }

    async fn forward_content(
        &self,
        kind: ContentKind,
        data: Vec<u8>,
        timestamp: u32,
    ) -> Result<()> {
        self.session.set_stream_position(timestamp);
        if let Some(sink) = self.sink().await {
            sink.on_content(kind, data, timestamp).await?;
        } else {
            warn!("[{}] Content received with no sink installed", self.id);
        }
        Ok(())
    }
}
