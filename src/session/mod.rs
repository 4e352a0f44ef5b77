use crate::protocol::DEFAULT_WINDOW_ACK_SIZE;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::{Mutex, Notify};

/// Per-connection mutable state shared by the caller and the three loops.
///
/// The transaction table correlates outbound commands with the `_result`
/// replies that complete them; the remaining fields record the playback
/// continuation the dispatch loop acts on (requested stream name, current
/// stream id, pause position).
#[derive(Debug)]
pub struct SessionState {
    /// Window acknowledgement size announced by the server
    window_ack_size: AtomicU32,

    /// Transaction id counter; the first command issued gets id 1
    transaction_counter: AtomicU32,

    /// Outstanding command names by transaction id
    pending_transactions: Mutex<HashMap<u32, String>>,

    /// Set between sending `connect` and receiving its result
    connecting: AtomicBool,

    /// Set once the `connect` result has arrived
    fully_connected: AtomicBool,

    /// Wakes callers blocked waiting for the connect result
    connected_notify: Notify,

    /// Stream id returned by createStream, if one is open
    current_stream_id: Mutex<Option<u32>>,

    /// Stream name recorded by play() for the createStream result handler
    requested_stream_name: Mutex<Option<String>>,

    /// Position at which the stream was paused, if it is paused
    pause_timestamp: Mutex<Option<u32>>,

    /// Timestamp of the last audio/video packet received
    stream_position: AtomicU32,
}

impl SessionState {
    pub fn new() -> Self {
        SessionState {
            window_ack_size: AtomicU32::new(DEFAULT_WINDOW_ACK_SIZE),
            transaction_counter: AtomicU32::new(0),
            pending_transactions: Mutex::new(HashMap::new()),
            connecting: AtomicBool::new(false),
            fully_connected: AtomicBool::new(false),
            connected_notify: Notify::new(),
            current_stream_id: Mutex::new(None),
            requested_stream_name: Mutex::new(None),
            pause_timestamp: Mutex::new(None),
            stream_position: AtomicU32::new(0),
        }
    }

    pub fn window_ack_size(&self) -> u32 {
        self.window_ack_size.load(Ordering::Acquire)
    }

    pub fn set_window_ack_size(&self, size: u32) {
        self.window_ack_size.store(size, Ordering::Release);
    }

    /// Allocate the next transaction id
    pub fn next_transaction_id(&self) -> u32 {
        self.transaction_counter.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Most recently allocated transaction id
    pub fn current_transaction_id(&self) -> u32 {
        self.transaction_counter.load(Ordering::Acquire)
    }

    /// Record an outbound command so its `_result` can be correlated
    pub async fn record_transaction(&self, transaction_id: u32, command_name: &str) {
        let mut pending = self.pending_transactions.lock().await;
        pending.insert(transaction_id, command_name.to_string());
    }

    /// Remove and return the command name for a completed transaction
    pub async fn take_transaction(&self, transaction_id: u32) -> Option<String> {
        let mut pending = self.pending_transactions.lock().await;
        pending.remove(&transaction_id)
    }

    pub fn begin_connecting(&self) {
        self.connecting.store(true, Ordering::Release);
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::Acquire)
    }

    pub fn is_fully_connected(&self) -> bool {
        self.fully_connected.load(Ordering::Acquire)
    }

    /// Mark the connect handshake complete and wake blocked callers
    pub fn mark_connected(&self) {
        self.connecting.store(false, Ordering::Release);
        self.fully_connected.store(true, Ordering::Release);
        self.connected_notify.notify_waiters();
    }

    /// Wake connect waiters without marking the session connected, so a
    /// failed connection attempt does not strand them
    pub fn abort_connecting(&self) {
        self.connecting.store(false, Ordering::Release);
        self.connected_notify.notify_waiters();
    }

    /// Block until the connect result arrives (or connecting is aborted)
    pub async fn wait_until_connected(&self) {
        loop {
            if !self.is_connecting() {
                return;
            }
            let notified = self.connected_notify.notified();
            if !self.is_connecting() {
                return;
            }
            notified.await;
        }
    }

    pub async fn current_stream_id(&self) -> Option<u32> {
        *self.current_stream_id.lock().await
    }

    pub async fn set_current_stream_id(&self, stream_id: Option<u32>) {
        *self.current_stream_id.lock().await = stream_id;
    }

    pub async fn requested_stream_name(&self) -> Option<String> {
        self.requested_stream_name.lock().await.clone()
    }

    pub async fn set_requested_stream_name(&self, name: Option<String>) {
        *self.requested_stream_name.lock().await = name;
    }

    pub async fn pause_timestamp(&self) -> Option<u32> {
        *self.pause_timestamp.lock().await
    }

    pub async fn set_pause_timestamp(&self, timestamp: Option<u32>) {
        *self.pause_timestamp.lock().await = timestamp;
    }

    pub fn stream_position(&self) -> u32 {
        self.stream_position.load(Ordering::Acquire)
    }

    pub fn set_stream_position(&self, timestamp: u32) {
        self.stream_position.store(timestamp, Ordering::Release);
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::new()
    }
}
