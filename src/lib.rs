mod amf;
mod chunk;
mod client;
mod connection;
mod handshake;
mod protocol;
mod session;
mod sink;
mod utils;

// Re-export commonly used types at crate root
pub use amf::*;
pub use chunk::*;
pub use connection::ConnectionState;
pub use handshake::*;
pub use protocol::*;
pub use session::SessionState;
pub use utils::*;

// Client exports
pub use client::{ClientConfig, ClientConfigBuilder, RtmpClient};

// Sink exports
pub use sink::{ContentKind, StreamSink};
