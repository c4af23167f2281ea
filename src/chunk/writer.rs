use crate::{ByteBuffer, Error, Result, DEFAULT_CHUNK_SIZE};
use crate::protocol::{wire_timestamp, RtmpPacket};
use crate::chunk::stream::{encode_basic_header, ChunkFormat, ChunkStreamState};
use std::collections::HashMap;
use tokio::io::{AsyncWrite, AsyncWriteExt};

const MAX_MESSAGE_LENGTH: usize = 0xFF_FFFF;

/// Outbound half of the chunk framer.
///
/// The caller chooses the header format for every message; the writer only
/// checks that the peer would reconstruct the same header from its state.
#[derive(Clone)]
pub struct ChunkWriter {
    /// Previous headers for each chunk stream
    prev_headers: HashMap<u32, ChunkStreamState>,

    /// Current chunk size for writing
    chunk_size_out: usize,
}

impl Default for ChunkWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkWriter {
    pub fn new() -> Self {
        ChunkWriter {
            prev_headers: HashMap::new(),
            chunk_size_out: DEFAULT_CHUNK_SIZE as usize,
        }
    }

    /// Set outgoing chunk size
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size_out = size.max(1);
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size_out
    }

    /// Forget all chunk stream state
    pub fn reset(&mut self) {
        self.prev_headers.clear();
    }

    /// Encode a packet as chunks and write them in one call
    pub async fn write_packet<W: AsyncWrite + Unpin>(
        &mut self,
        fmt: ChunkFormat,
        packet: &RtmpPacket,
        writer: &mut W,
    ) -> Result<usize> {
        self.write_packets([(fmt, packet)], writer).await
    }

    /// Encode several packets and write them with a single `write_all`.
    ///
    /// Chunk stream state is only committed once the bytes are written, so
    /// a failed or abandoned write leaves the table as the peer last saw it.
    pub async fn write_packets<'a, W, I>(&mut self, packets: I, writer: &mut W) -> Result<usize>
    where
        W: AsyncWrite + Unpin,
        I: IntoIterator<Item = (ChunkFormat, &'a RtmpPacket)>,
    {
        let mut staged = self.clone();
        let mut buffer = ByteBuffer::with_capacity(512);
        for (fmt, packet) in packets {
            staged.encode_into(fmt, packet, &mut buffer)?;
        }

        writer.write_all(buffer.as_slice()).await?;
        writer.flush().await?;

        *self = staged;
        Ok(buffer.len())
    }

    /// Encode a packet into chunk bytes
    pub fn encode(&mut self, fmt: ChunkFormat, packet: &RtmpPacket) -> Result<Vec<u8>> {
        let mut buffer = ByteBuffer::with_capacity(packet.payload.len() + 18);
        self.encode_into(fmt, packet, &mut buffer)?;
        Ok(buffer.into_vec())
    }

    /// Append chunks for `packet` to `buffer` and record its header
    pub fn encode_into(
        &mut self,
        fmt: ChunkFormat,
        packet: &RtmpPacket,
        buffer: &mut ByteBuffer,
    ) -> Result<()> {
        let cs_id = packet.header.chunk_stream_id;
        let payload_len = packet.payload.len();
        if payload_len > MAX_MESSAGE_LENGTH {
            return Err(Error::chunk(format!("Message of {} bytes exceeds 24-bit length", payload_len)));
        }

        let state = ChunkStreamState::from_header(&packet.header);
        let prev = self.prev_headers.get(&cs_id).copied();
        Self::check_format(fmt, cs_id, &state, prev)?;

        encode_basic_header(buffer, fmt, cs_id)?;
        let delta = prev.map(|p| state.timestamp.wrapping_sub(p.timestamp)).unwrap_or(0);
        match fmt {
            ChunkFormat::Full => {
                buffer.write_u24_be(wire_timestamp(state.timestamp))?;
                buffer.write_u24_be(state.message_length)?;
                buffer.write_u8(state.message_type)?;
                buffer.write_u32_le(state.message_stream_id)?;
            }
            ChunkFormat::SameStream => {
                buffer.write_u24_be(wire_timestamp(delta))?;
                buffer.write_u24_be(state.message_length)?;
                buffer.write_u8(state.message_type)?;
            }
            ChunkFormat::TimestampDelta => {
                buffer.write_u24_be(wire_timestamp(delta))?;
            }
            ChunkFormat::Continuation => {}
        }

        // First chunk data, then fmt 3 continuations
        let first_chunk_size = payload_len.min(self.chunk_size_out);
        buffer.write_bytes(&packet.payload[..first_chunk_size])?;

        let mut offset = first_chunk_size;
        while offset < payload_len {
            encode_basic_header(buffer, ChunkFormat::Continuation, cs_id)?;
            let chunk_end = (offset + self.chunk_size_out).min(payload_len);
            buffer.write_bytes(&packet.payload[offset..chunk_end])?;
            offset = chunk_end;
        }

        self.prev_headers.insert(cs_id, state);
        Ok(())
    }

    /// Reject a format whose inherited fields would differ from the message
    fn check_format(
        fmt: ChunkFormat,
        cs_id: u32,
        state: &ChunkStreamState,
        prev: Option<ChunkStreamState>,
    ) -> Result<()> {
        let Some(prev) = prev else {
            if fmt == ChunkFormat::Full {
                return Ok(());
            }
            return Err(Error::chunk(format!(
                "fmt {} on chunk stream {} before any full header",
                fmt.bits(),
                cs_id
            )));
        };

        let same_stream = prev.message_stream_id == state.message_stream_id;
        let same_shape = same_stream
            && prev.message_length == state.message_length
            && prev.message_type == state.message_type;

        let ok = match fmt {
            ChunkFormat::Full => true,
            ChunkFormat::SameStream => same_stream,
            ChunkFormat::TimestampDelta => same_shape,
            ChunkFormat::Continuation => same_shape && prev.timestamp == state.timestamp,
        };

        if ok {
            Ok(())
        } else {
            Err(Error::chunk(format!(
                "fmt {} on chunk stream {} would inherit {:?}, message has {:?}",
                fmt.bits(),
                cs_id,
                prev,
                state
            )))
        }
    }
}
