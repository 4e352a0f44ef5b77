mod connection;
mod state;

pub(crate) use connection::Connection;
pub use state::ConnectionState;
