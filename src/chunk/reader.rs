use crate::{ByteBuffer, Error, Result, DEFAULT_CHUNK_SIZE};
use crate::protocol::{RtmpHeader, RtmpPacket};
use crate::chunk::stream::{parse_basic_header, ChunkFormat, ChunkStreamContext, ChunkStreamState};
use log::{trace, warn};
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_BUFFER_SIZE: usize = 8192;

/// Inbound half of the chunk framer.
///
/// Decoding works on a byte slice and commits per-stream state only once a
/// whole chunk is present, so bytes can arrive in any split.
pub struct ChunkReader {
    /// Chunk streams by ID
    chunk_streams: HashMap<u32, ChunkStreamContext>,

    /// Current chunk size for reading
    chunk_size_in: usize,
}

impl Default for ChunkReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkReader {
    pub fn new() -> Self {
        ChunkReader {
            chunk_streams: HashMap::new(),
            chunk_size_in: DEFAULT_CHUNK_SIZE as usize,
        }
    }

    /// Set incoming chunk size (from the peer's SetChunkSize)
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size_in = size.max(1);
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size_in
    }

    /// Whether any chunk stream holds a partially assembled message
    pub fn has_partial_message(&self) -> bool {
        self.chunk_streams.values().any(|ctx| ctx.is_assembling())
    }

    /// Forget all chunk stream state
    pub fn reset(&mut self) {
        self.chunk_streams.clear();
    }

    /// Decode one chunk from the front of `input`.
    ///
    /// `Ok(None)` means more bytes are needed and nothing was consumed.
    /// Otherwise returns the bytes consumed and the message the chunk
    /// completed, if any.
    pub fn try_read_chunk(&mut self, input: &[u8]) -> Result<Option<(usize, Option<RtmpPacket>)>> {
        let Some((fmt, cs_id, basic_len)) = parse_basic_header(input) else {
            return Ok(None);
        };

        let header_len = fmt.message_header_len();
        if input.len() < basic_len + header_len {
            return Ok(None);
        }

        let context = self.chunk_streams.get(&cs_id);
        let prev_state = context.and_then(|ctx| ctx.prev_state);
        let continuing = fmt == ChunkFormat::Continuation
            && context.is_some_and(|ctx| ctx.is_assembling());

        let new_header = if continuing {
            None
        } else {
            let mut buffer = ByteBuffer::from_slice(&input[basic_len..basic_len + header_len]);
            let header = Self::read_message_header(fmt, cs_id, prev_state, &mut buffer)?;
            Some(header)
        };

        let remaining = match (&new_header, context) {
            (Some(header), _) => header.message_length as usize,
            (None, Some(ctx)) => ctx.bytes_remaining,
            (None, None) => 0,
        };
        let data_len = remaining.min(self.chunk_size_in);
        let data_start = basic_len + header_len;
        if input.len() < data_start + data_len {
            return Ok(None);
        }

        // Whole chunk present: commit
        let context = self.chunk_streams.entry(cs_id).or_default();
        if let Some(header) = new_header {
            if context.is_assembling() {
                warn!(
                    "Chunk stream {} got a fmt {} header mid-message; dropping {} buffered bytes",
                    cs_id,
                    fmt.bits(),
                    context.message_buffer.len()
                );
                context.abort_message();
            }
            trace!(
                "Chunk stream {}: fmt {} type {} len {} ts {} stream {}",
                cs_id, fmt.bits(), header.message_type, header.message_length,
                header.timestamp, header.message_stream_id
            );
            context.start_message(header);
        }

        let packet = context.add_chunk_data(&input[data_start..data_start + data_len]);
        Ok(Some((data_start + data_len, packet)))
    }

    /// Resolve a message header against the previous state of its chunk stream.
    ///
    /// A sentinel timestamp is taken as-is; no extended field is read.
    fn read_message_header(
        fmt: ChunkFormat,
        cs_id: u32,
        prev: Option<ChunkStreamState>,
        buffer: &mut ByteBuffer,
    ) -> Result<RtmpHeader> {
        let require_prev = || {
            prev.ok_or_else(|| {
                Error::chunk(format!(
                    "fmt {} chunk on stream {} without a previous full header",
                    fmt.bits(),
                    cs_id
                ))
            })
        };

        match fmt {
            ChunkFormat::Full => {
                let timestamp = buffer.read_u24_be()?;
                let message_length = buffer.read_u24_be()?;
                let message_type = buffer.read_u8()?;
                let message_stream_id = buffer.read_u32_le()?;
                Ok(RtmpHeader::new(timestamp, message_length, message_type, message_stream_id, cs_id))
            }
            ChunkFormat::SameStream => {
                let prev = require_prev()?;
                let delta = buffer.read_u24_be()?;
                let message_length = buffer.read_u24_be()?;
                let message_type = buffer.read_u8()?;
                Ok(RtmpHeader::new(
                    prev.timestamp.wrapping_add(delta),
                    message_length,
                    message_type,
                    prev.message_stream_id,
                    cs_id,
                ))
            }
            ChunkFormat::TimestampDelta => {
                let prev = require_prev()?;
                let delta = buffer.read_u24_be()?;
                let mut header = prev.to_header(cs_id);
                header.timestamp = prev.timestamp.wrapping_add(delta);
                Ok(header)
            }
            ChunkFormat::Continuation => Ok(require_prev()?.to_header(cs_id)),
        }
    }

    /// Decode every chunk buffered in `inbound` until a message completes.
    ///
    /// Consumed bytes are drained from `inbound`; a trailing partial chunk
    /// stays there for the next call.
    pub fn next_packet(&mut self, inbound: &mut Vec<u8>) -> Result<Option<RtmpPacket>> {
        let mut offset = 0;
        let mut completed = None;

        while let Some((consumed, packet)) = self.try_read_chunk(&inbound[offset..])? {
            offset += consumed;
            if packet.is_some() {
                completed = packet;
                break;
            }
        }

        inbound.drain(..offset);
        Ok(completed)
    }

    /// Read from `reader` until one message is complete.
    ///
    /// Cancel-safe: bytes already read are kept in `inbound`, so dropping the
    /// future (e.g. on a timeout) loses nothing.
    pub async fn read_packet<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
        inbound: &mut Vec<u8>,
    ) -> Result<RtmpPacket> {
        let mut read_buf = [0u8; READ_BUFFER_SIZE];
        loop {
            if let Some(packet) = self.next_packet(inbound)? {
                return Ok(packet);
            }

            let n = reader.read(&mut read_buf).await?;
            if n == 0 {
                return Err(if inbound.is_empty() && !self.has_partial_message() {
                    Error::connection("Peer closed the connection")
                } else {
                    Error::chunk(format!(
                        "Connection closed mid-message ({} bytes buffered)",
                        inbound.len()
                    ))
                });
            }
            inbound.extend_from_slice(&read_buf[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::writer::ChunkWriter;

    fn decode_all(reader: &mut ChunkReader, bytes: &[u8]) -> Vec<RtmpPacket> {
        let mut inbound = bytes.to_vec();
        let mut packets = Vec::new();
        while let Some(packet) = reader.next_packet(&mut inbound).unwrap() {
            packets.push(packet);
        }
        assert!(inbound.is_empty());
        packets
    }

    #[test]
    fn test_split_and_reassemble() {
        for chunk_size in [1usize, 128, 4096] {
            for len in [0, chunk_size - 1, chunk_size, chunk_size + 1, 3 * chunk_size] {
                let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
                let packet = RtmpPacket::new(RtmpHeader::new(1234, 0, 9, 7, 5), payload);

                let mut writer = ChunkWriter::new();
                writer.set_chunk_size(chunk_size);
                let bytes = writer.encode(ChunkFormat::Full, &packet).unwrap();

                let mut reader = ChunkReader::new();
                reader.set_chunk_size(chunk_size);
                let packets = decode_all(&mut reader, &bytes);

                assert_eq!(packets, vec![packet], "chunk size {} len {}", chunk_size, len);
            }
        }
    }

    #[test]
    fn test_byte_at_a_time_delivery() {
        let mut writer = ChunkWriter::new();
        let packet = RtmpPacket::new(RtmpHeader::command(0, 0, 0), vec![0x42; 300]);
        let bytes = writer.encode(ChunkFormat::Full, &packet).unwrap();

        let mut reader = ChunkReader::new();
        let mut inbound = Vec::new();
        let mut result = None;
        for byte in bytes {
            inbound.push(byte);
            if let Some(p) = reader.next_packet(&mut inbound).unwrap() {
                result = Some(p);
            }
        }
        assert_eq!(result, Some(packet));
        assert!(inbound.is_empty());
    }

    #[test]
    fn test_fmt3_reuses_header_verbatim() {
        let mut writer = ChunkWriter::new();
        let first = RtmpPacket::new(RtmpHeader::audio(500, 0, 1), vec![0xAF, 1, 2, 3]);
        let mut bytes = writer.encode(ChunkFormat::Full, &first).unwrap();
        bytes.extend(writer.encode(ChunkFormat::Continuation, &first).unwrap());

        let mut reader = ChunkReader::new();
        let packets = decode_all(&mut reader, &bytes);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].header, packets[1].header);
        assert_eq!(packets[1].timestamp(), 500);
    }

    #[test]
    fn test_fmt2_only_moves_timestamp() {
        let mut writer = ChunkWriter::new();
        let first = RtmpPacket::new(RtmpHeader::video(100, 0, 1), vec![0x17; 101]);
        let second = RtmpPacket::new(RtmpHeader::video(133, 0, 1), vec![0x27; 101]);
        let mut bytes = writer.encode(ChunkFormat::Full, &first).unwrap();
        bytes.extend(writer.encode(ChunkFormat::TimestampDelta, &second).unwrap());

        let mut reader = ChunkReader::new();
        let packets = decode_all(&mut reader, &bytes);
        assert_eq!(packets[1].timestamp(), 133);
        assert_eq!(packets[1].message_type(), packets[0].message_type());
        assert_eq!(packets[1].message_stream_id(), 1);
        assert_eq!(packets[1].payload, vec![0x27; 101]);
    }

    #[test]
    fn test_fmt1_without_state_is_framing_error() {
        // fmt 1, cs 4, delta 23, length 1, type 8
        let bytes = [0x44, 0x00, 0x00, 0x17, 0x00, 0x00, 0x01, 0x08, 0xAF];
        let mut reader = ChunkReader::new();
        let err = reader.try_read_chunk(&bytes).unwrap_err();
        assert!(matches!(err, Error::Chunk(_)));
    }

    #[test]
    fn test_incomplete_chunk_commits_nothing() {
        let mut writer = ChunkWriter::new();
        let packet = RtmpPacket::new(RtmpHeader::audio(0, 0, 1), vec![0xAF, 1, 2, 3]);
        let bytes = writer.encode(ChunkFormat::Full, &packet).unwrap();

        let mut reader = ChunkReader::new();
        assert!(reader.try_read_chunk(&bytes[..bytes.len() - 1]).unwrap().is_none());
        assert!(!reader.has_partial_message());

        // A fmt 3 chunk right after would still fail: no state was stored
        assert!(reader.try_read_chunk(&[0xC4, 0xAF]).is_err());
    }

    #[test]
    fn test_sentinel_timestamp_is_not_extended() {
        // fmt 0, cs 4, ts 0xFFFFFF, length 1, type 8, stream 1, payload
        let bytes = [0x04, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x01, 0x08, 0x01, 0x00, 0x00, 0x00, 0xAF];
        let mut reader = ChunkReader::new();
        let (consumed, packet) = reader.try_read_chunk(&bytes).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        let packet = packet.unwrap();
        assert_eq!(packet.timestamp(), 0xFF_FFFF);
        assert_eq!(packet.payload, vec![0xAF]);
    }

    #[test]
    fn test_interleaved_streams() {
        let mut writer = ChunkWriter::new();
        writer.set_chunk_size(4);
        let audio = RtmpPacket::new(RtmpHeader::audio(0, 0, 1), vec![1; 6]);
        let video = RtmpPacket::new(RtmpHeader::video(0, 0, 1), vec![2; 6]);
        let audio_bytes = writer.encode(ChunkFormat::Full, &audio).unwrap();
        let video_bytes = writer.encode(ChunkFormat::Full, &video).unwrap();

        // audio chunk 1, video chunk 1, audio chunk 2, video chunk 2
        let (a1, a2) = audio_bytes.split_at(1 + 11 + 4);
        let (v1, v2) = video_bytes.split_at(1 + 11 + 4);
        let bytes = [a1, v1, a2, v2].concat();

        let mut reader = ChunkReader::new();
        reader.set_chunk_size(4);
        let packets = decode_all(&mut reader, &bytes);
        assert_eq!(packets, vec![audio, video]);
    }

    #[tokio::test]
    async fn test_read_packet_eof() {
        let mut reader = ChunkReader::new();
        let mut inbound = Vec::new();

        let mut empty: &[u8] = &[];
        let err = reader.read_packet(&mut empty, &mut inbound).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));

        let mut truncated: &[u8] = &[0x03, 0x00, 0x00];
        let err = reader.read_packet(&mut truncated, &mut inbound).await.unwrap_err();
        assert!(matches!(err, Error::Chunk(_)));
    }
}
