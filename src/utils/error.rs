use std::io::Error as IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Handshake error: {0}")]
    Handshake(String),

    #[error("AMF decode error: {0}")]
    AmfDecode(String),

    #[error("AMF encode error: {0}")]
    AmfEncode(String),

    #[error("Chunk error: {0}")]
    Chunk(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create a handshake error
    pub fn handshake(msg: impl Into<String>) -> Self {
        Error::Handshake(msg.into())
    }

    /// Create an AMF decode error
    pub fn amf_decode(msg: impl Into<String>) -> Self {
        Error::AmfDecode(msg.into())
    }

    /// Create an AMF encode error
    pub fn amf_encode(msg: impl Into<String>) -> Self {
        Error::AmfEncode(msg.into())
    }

    /// Create a chunk error
    pub fn chunk(msg: impl Into<String>) -> Self {
        Error::Chunk(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Error::Connection(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// True for errors that abort the connection rather than just the call
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::InvalidState(_) | Error::Configuration(_))
    }
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
