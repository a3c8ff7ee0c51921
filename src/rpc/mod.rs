//! Connection to a debug agent: framing, authentication and the JSON records
//! carried over it.

pub mod auth;
pub mod protocol;
pub mod transport;

pub use protocol::{DecodeError, Method, Record, RemoteError, RequestId};
pub use transport::{Connection, ConnectionError, FrameReader, FrameWriter, Listener};
