// Message types
pub const MSG_TYPE_SET_CHUNK_SIZE: u8 = 1;
pub const MSG_TYPE_ACK: u8 = 3;                  // Observed only
pub const MSG_TYPE_WINDOW_ACK: u8 = 5;
pub const MSG_TYPE_SET_PEER_BW: u8 = 6;
pub const MSG_TYPE_AUDIO: u8 = 8;
pub const MSG_TYPE_VIDEO: u8 = 9;
pub const MSG_TYPE_DATA_AMF0: u8 = 18;
pub const MSG_TYPE_COMMAND_AMF0: u8 = 20;

// Chunk stream IDs
pub const CHUNK_STREAM_PROTOCOL: u32 = 2;
pub const CHUNK_STREAM_COMMAND: u32 = 3;
pub const CHUNK_STREAM_AUDIO: u32 = 4;
pub const CHUNK_STREAM_VIDEO: u32 = 5;

// Default values
pub const DEFAULT_CHUNK_SIZE: u32 = 128;
pub const DEFAULT_PORT: u16 = 1935;
pub const DEFAULT_TLS_PORT: u16 = 443;
pub const DEFAULT_APP: &str = "live";

/// Stream id assumed when createStream never answers
pub const FALLBACK_STREAM_ID: u32 = 1;

/// Largest timestamp that fits the 3-byte header field
pub const TIMESTAMP_SENTINEL: u32 = 0xFF_FFFF;

// Chunk size bounds accepted for our outbound side
pub const MIN_CHUNK_SIZE: u32 = 128;
pub const MAX_CHUNK_SIZE: u32 = 65536;

// Command transaction ids
pub const TID_CONNECT: f64 = 1.0;
pub const TID_RELEASE_STREAM: f64 = 2.0;
pub const TID_FC_PUBLISH: f64 = 3.0;
pub const TID_CREATE_STREAM: f64 = 4.0;
pub const TID_CHECK_BW: f64 = 5.0;
pub const TID_PUBLISH: f64 = 5.0;

/// Tolerance when matching a response's transaction id
pub const TID_EPSILON: f64 = 1e-4;
