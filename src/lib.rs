mod utils;
mod amf;
mod protocol;
mod handshake;
mod chunk;
mod connection;
mod client;
mod stream;

// Re-export commonly used types at crate root
pub use utils::*;
pub use amf::*;
pub use protocol::*;
pub use handshake::*;
pub use chunk::*;
pub use connection::*;

// Client exports
pub use client::*;

// Media exports
pub use stream::*;
