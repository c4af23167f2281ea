use crate::{ByteBuffer, Error, Result};
use crate::protocol::{RtmpHeader, RtmpPacket};

/// Chunk header format (`fmt`, the top two bits of the basic header)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkFormat {
    /// 11-byte header, everything explicit
    Full,
    /// 7 bytes: timestamp delta, length, type; stream id inherited
    SameStream,
    /// 3 bytes: timestamp delta only
    TimestampDelta,
    /// No message header, everything inherited
    Continuation,
}

impl ChunkFormat {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => ChunkFormat::Full,
            1 => ChunkFormat::SameStream,
            2 => ChunkFormat::TimestampDelta,
            _ => ChunkFormat::Continuation,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            ChunkFormat::Full => 0,
            ChunkFormat::SameStream => 1,
            ChunkFormat::TimestampDelta => 2,
            ChunkFormat::Continuation => 3,
        }
    }

    /// Size of the message header that follows the basic header
    pub fn message_header_len(self) -> usize {
        match self {
            ChunkFormat::Full => 11,
            ChunkFormat::SameStream => 7,
            ChunkFormat::TimestampDelta => 3,
            ChunkFormat::Continuation => 0,
        }
    }
}

/// Header fields remembered per chunk stream id, one table per direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkStreamState {
    pub timestamp: u32,
    pub message_length: u32,
    pub message_type: u8,
    pub message_stream_id: u32,
}

impl ChunkStreamState {
    pub fn from_header(header: &RtmpHeader) -> Self {
        ChunkStreamState {
            timestamp: header.timestamp,
            message_length: header.message_length,
            message_type: header.message_type,
            message_stream_id: header.message_stream_id,
        }
    }

    pub fn to_header(&self, chunk_stream_id: u32) -> RtmpHeader {
        RtmpHeader::new(
            self.timestamp,
            self.message_length,
            self.message_type,
            self.message_stream_id,
            chunk_stream_id,
        )
    }
}

/// Inbound assembly state for one chunk stream
#[derive(Debug, Clone, Default)]
pub struct ChunkStreamContext {
    /// Last resolved header, the base for fmt 1-3
    pub prev_state: Option<ChunkStreamState>,

    /// Partial message being assembled
    pub message_buffer: Vec<u8>,

    /// Bytes remaining for current message
    pub bytes_remaining: usize,

    /// Current message header being assembled
    pub current_header: Option<RtmpHeader>,
}

impl ChunkStreamContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if currently assembling a message
    pub fn is_assembling(&self) -> bool {
        self.current_header.is_some()
    }

    /// Start new message and remember its header for the next chunk
    pub fn start_message(&mut self, header: RtmpHeader) {
        self.prev_state = Some(ChunkStreamState::from_header(&header));
        self.current_header = Some(header);
        self.bytes_remaining = header.message_length as usize;
        self.message_buffer.clear();
        self.message_buffer.reserve(header.message_length as usize);
    }

    /// Add chunk data to message buffer, returning the message once complete
    pub fn add_chunk_data(&mut self, data: &[u8]) -> Option<RtmpPacket> {
        self.message_buffer.extend_from_slice(data);
        self.bytes_remaining = self.bytes_remaining.saturating_sub(data.len());

        if self.bytes_remaining > 0 {
            return None;
        }

        let header = self.current_header.take()?;
        Some(RtmpPacket::new(header, std::mem::take(&mut self.message_buffer)))
    }

    /// Drop a half-assembled message
    pub fn abort_message(&mut self) {
        self.current_header = None;
        self.bytes_remaining = 0;
        self.message_buffer.clear();
    }
}

/// Append the 1-3 byte basic header for `cs_id`
pub fn encode_basic_header(buffer: &mut ByteBuffer, fmt: ChunkFormat, cs_id: u32) -> Result<()> {
    let fmt_bits = fmt.bits() << 6;

    if (2..64).contains(&cs_id) {
        buffer.write_u8(fmt_bits | cs_id as u8)?;
    } else if (64..320).contains(&cs_id) {
        buffer.write_u8(fmt_bits)?;
        buffer.write_u8((cs_id - 64) as u8)?;
    } else if (320..=65599).contains(&cs_id) {
        buffer.write_u8(fmt_bits | 1)?;
        buffer.write_u16_be((cs_id - 64) as u16)?;
    } else {
        return Err(Error::chunk(format!("Chunk stream id {} out of range", cs_id)));
    }

    Ok(())
}

/// Parse a basic header from the front of `bytes`.
///
/// Returns the format, chunk stream id and header size, or `None` when the
/// header isn't complete yet.
pub fn parse_basic_header(bytes: &[u8]) -> Option<(ChunkFormat, u32, usize)> {
    let first = *bytes.first()?;
    let fmt = ChunkFormat::from_bits(first >> 6);

    match first & 0x3F {
        0 => {
            let id = *bytes.get(1)?;
            Some((fmt, id as u32 + 64, 2))
        }
        1 => {
            let high = *bytes.get(1)?;
            let low = *bytes.get(2)?;
            Some((fmt, u16::from_be_bytes([high, low]) as u32 + 64, 3))
        }
        n => Some((fmt, n as u32, 1)),
    }
}
