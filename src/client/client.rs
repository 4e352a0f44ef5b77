use crate::client::config::ClientConfig;
use crate::connection::{Connection, ConnectionState};
use crate::handshake::perform_client_handshake;
use crate::protocol::{ConnectInfo, RtmpCommand, RtmpHeader, RtmpPacket};
use crate::session::SessionState;
use crate::sink::StreamSink;
use crate::{Error, Result};
use log::{debug, info};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tokio::time::timeout;
use url::Url;

const DEFAULT_RTMP_PORT: u16 = 1935;

/// RTMP play client.
///
/// Drives one connection through connect → createStream → play and hands
/// decoded audio, video and metadata to a caller-supplied sink. `play`
/// blocks until the stream completes; `play_async` returns once the
/// commands are issued.
pub struct RtmpClient {
    config: Arc<ClientConfig>,
    host: String,
    port: u16,
    app: String,

    /// Stream name taken from the URL query, if any
    stream_name: Option<String>,

    session: Arc<SessionState>,
    state: Arc<RwLock<ConnectionState>>,
    connection: Option<Arc<Connection>>,
}

impl RtmpClient {
    /// Create a client for an explicit host, port and application
    pub fn new(host: impl Into<String>, port: u16, app: impl Into<String>) -> Self {
        RtmpClient::with_config(host, port, app, ClientConfig::default())
    }

    /// Create a client with a custom configuration
    pub fn with_config(
        host: impl Into<String>,
        port: u16,
        app: impl Into<String>,
        config: ClientConfig,
    ) -> Self {
        RtmpClient {
            config: Arc::new(config),
            host: host.into(),
            port,
            app: app.into(),
            stream_name: None,
            session: Arc::new(SessionState::new()),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            connection: None,
        }
    }

    /// Create a client from a URL in the form
    /// `rtmp://host[:port]/application[?streamName]`
    pub fn from_url(url: &str) -> Result<Self> {
        RtmpClient::from_url_with_config(url, ClientConfig::default())
    }

    /// Create a client from a URL with a custom configuration
    pub fn from_url_with_config(url: &str, config: ClientConfig) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| Error::config(format!("Invalid URL: {}", e)))?;

        if parsed.scheme() != "rtmp" {
            return Err(Error::config(format!(
                "Unsupported scheme: {} (expected rtmp)",
                parsed.scheme()
            )));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| Error::config("Missing host in URL"))?
            .to_string();
        let port = parsed.port().unwrap_or(DEFAULT_RTMP_PORT);

        let app = parsed.path().trim_start_matches('/').to_string();
        if app.is_empty() {
            return Err(Error::config("Missing application name in URL"));
        }

        let stream_name = parsed.query().filter(|q| !q.is_empty()).map(str::to_string);

        let mut client = RtmpClient::with_config(host, port, app, config);
        client.stream_name = stream_name;
        Ok(client)
    }

    /// Stream name carried by the connection URL, if one was given
    pub fn stream_name(&self) -> Option<&str> {
        self.stream_name.as_deref()
    }

    /// Current connection state
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Timestamp of the most recently received content packet
    pub fn stream_position(&self) -> u32 {
        self.session.stream_position()
    }

    /// Establish the TCP session, perform the handshake, start the I/O
    /// loops and issue the `connect` command. Returns once the command is
    /// on its way; the connect result is handled asynchronously.
    pub async fn connect(&mut self) -> Result<()> {
        if self.session.is_fully_connected() || self.session.is_connecting() {
            return Err(Error::invalid_state(
                "Already connecting, or connected to RTMP server",
            ));
        }

        let addr = format!("{}:{}", self.host, self.port);
        info!("Connecting to {} (app: {})", addr, self.app);
        self.set_state(ConnectionState::Handshaking).await;

        let transport = match self.establish_transport(&addr).await {
            Ok(transport) => transport,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected).await;
                return Err(e);
            }
        };
        debug!("Handshake done, starting connection loops");

        self.session.begin_connecting();
        self.set_state(ConnectionState::Connecting).await;

        let connection = Connection::start(
            addr,
            transport,
            self.session.clone(),
            self.state.clone(),
        );

        let transaction_id = self.session.next_transaction_id();
        let connect = RtmpCommand::connect(
            transaction_id as f64,
            &ConnectInfo {
                app: self.app.clone(),
                flash_version: self.config.flash_version.clone(),
                swf_url: self.config.swf_url.clone(),
                tc_url: self.tc_url(),
                page_url: self.config.page_url.clone(),
            },
        );
        connection.send_packet(RtmpPacket::command(connect, RtmpHeader::command(0)))?;

        self.connection = Some(connection);
        Ok(())
    }

    /// Play a stream, blocking until it completes (stream EOF or
    /// connection shutdown). Content goes to the given sink.
    pub async fn play(&self, play_path: &str, sink: Arc<dyn StreamSink>) -> Result<()> {
        let connection = self.start_play(play_path, sink).await?;
        connection.wait_stream_done().await;
        Ok(())
    }

    /// Play a stream, returning once the commands are issued
    pub async fn play_async(&self, play_path: &str, sink: Arc<dyn StreamSink>) -> Result<()> {
        self.start_play(play_path, sink).await?;
        Ok(())
    }

    async fn start_play(
        &self,
        play_path: &str,
        sink: Arc<dyn StreamSink>,
    ) -> Result<Arc<Connection>> {
        let connection = self.connection()?.clone();

        // A play issued before the connect result arrives waits for it
        if self.session.is_connecting() {
            self.session.wait_until_connected().await;
        }
        if !self.session.is_fully_connected() {
            return Err(Error::invalid_state("Not connected to RTMP server"));
        }

        self.session
            .set_requested_stream_name(Some(play_path.to_string()))
            .await;
        connection.set_sink(sink).await;

        match self.session.current_stream_id().await {
            Some(stream_id) => {
                // A stream object exists; play the requested name on it
                connection.start_playback(play_path, stream_id).await?;
            }
            None => {
                // No stream object yet; the createStream result handler
                // issues the recorded play once the id arrives
                debug!("No stream object exists, sending createStream");
                let transaction_id = self.session.next_transaction_id();
                connection.send_packet(RtmpPacket::command(
                    RtmpCommand::create_stream(transaction_id as f64),
                    RtmpHeader::command(0),
                ))?;
            }
        }
        Ok(connection)
    }

    /// Pause the playing stream, or resume it from the recorded position
    /// if it is already paused
    pub async fn pause(&self) -> Result<()> {
        let connection = self.connection()?;
        if !self.session.is_fully_connected() {
            return Err(Error::invalid_state("Not connected to RTMP server"));
        }
        let stream_id = self
            .session
            .current_stream_id()
            .await
            .ok_or_else(|| Error::invalid_state("No current stream object exists"))?;

        let command = match self.session.pause_timestamp().await {
            None => {
                let position = self.session.stream_position();
                info!("Pausing stream {} at position {}", stream_id, position);
                self.session.set_pause_timestamp(Some(position)).await;
                self.set_state(ConnectionState::Paused).await;
                RtmpCommand::pause(true, position)
            }
            Some(position) => {
                info!("Resuming stream {} from position {}", stream_id, position);
                self.session.set_pause_timestamp(None).await;
                self.set_state(ConnectionState::Playing).await;
                RtmpCommand::pause(false, position)
            }
        };
        connection.send_packet(RtmpPacket::command(
            command,
            RtmpHeader::stream_command(stream_id),
        ))
    }

    /// Close the current stream, returning the connection to the
    /// connected state
    pub async fn close_stream(&self) -> Result<()> {
        let connection = self.connection()?;
        if !self.session.is_fully_connected() {
            return Err(Error::invalid_state("Not connected to RTMP server"));
        }
        let stream_id = self
            .session
            .current_stream_id()
            .await
            .ok_or_else(|| Error::invalid_state("No current stream object exists"))?;

        debug!("Closing stream {}", stream_id);
        connection.send_packet(RtmpPacket::command(
            RtmpCommand::close_stream(),
            RtmpHeader::stream_command(stream_id),
        ))?;

        self.session.set_requested_stream_name(None).await;
        self.session.set_current_stream_id(None).await;
        self.session.set_pause_timestamp(None).await;
        self.set_state(ConnectionState::Connected).await;
        Ok(())
    }

    /// Shut down the connection and all of its loops. Idempotent.
    pub async fn shutdown(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.shutdown().await;
        }
    }

    /// TCP connect with timeout followed by the RTMP handshake
    async fn establish_transport(&self, addr: &str) -> Result<TcpStream> {
        let mut transport = timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::connection(format!("Timed out connecting to {}", addr)))?
            .map_err(|e| Error::connection(format!("Failed to connect to {}: {}", addr, e)))?;
        transport.set_nodelay(true)?;

        let (mut read_half, mut write_half) = transport.split();
        perform_client_handshake(&mut read_half, &mut write_half).await?;
        Ok(transport)
    }

    fn connection(&self) -> Result<&Arc<Connection>> {
        self.connection
            .as_ref()
            .filter(|c| c.is_active())
            .ok_or_else(|| Error::invalid_state("Not connected to RTMP server"))
    }

    fn tc_url(&self) -> String {
        if self.port == DEFAULT_RTMP_PORT {
            format!("rtmp://{}/{}", self.host, self.app)
        } else {
            format!("rtmp://{}:{}/{}", self.host, self.port, self.app)
        }
    }

    async fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write().await;
        *state = next;
    }
}
