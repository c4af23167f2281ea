use std::sync::Arc;
use std::time::Duration;
use log::{debug, trace};
use tokio::io::{split, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio::time::timeout;
use crate::{ChunkFormat, ChunkReader, ChunkWriter, Error, Result, RtmpPacket};
use crate::connection::transport::RtmpIo;

/// Bound on a single outbound write unless the caller picks one
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Single writer for the connection.
///
/// Owns the write half and the outbound chunk stream table behind one lock,
/// so a message (or a batch of them) is framed and written without another
/// writer interleaving. Every write is bounded by `write_timeout`; a peer
/// that stops reading turns into a fatal timeout instead of a held lock.
pub struct WriteLane<S> {
    inner: Arc<Mutex<LaneInner<S>>>,
    write_timeout: Duration,
}

struct LaneInner<S> {
    writer: WriteHalf<S>,
    chunk_writer: ChunkWriter,
}

impl<S> Clone for WriteLane<S> {
    fn clone(&self) -> Self {
        WriteLane {
            inner: Arc::clone(&self.inner),
            write_timeout: self.write_timeout,
        }
    }
}

impl<S: RtmpIo> WriteLane<S> {
    fn new(writer: WriteHalf<S>, write_timeout: Duration) -> Self {
        WriteLane {
            inner: Arc::new(Mutex::new(LaneInner {
                writer,
                chunk_writer: ChunkWriter::new(),
            })),
            write_timeout,
        }
    }

    /// Frame and write one message
    pub async fn send(&self, fmt: ChunkFormat, packet: &RtmpPacket) -> Result<()> {
        self.write_frames([(fmt, packet)]).await?;
        trace!(
            "Sent type {} on chunk stream {} (fmt {}, {} bytes)",
            packet.message_type(), packet.chunk_stream_id(), fmt.bits(), packet.payload.len()
        );
        Ok(())
    }

    /// Frame several messages and write them with a single socket write
    pub async fn send_batch(&self, packets: &[(ChunkFormat, RtmpPacket)]) -> Result<()> {
        let written = self
            .write_frames(packets.iter().map(|(fmt, packet)| (*fmt, packet)))
            .await?;
        trace!("Sent batch of {} messages ({} bytes)", packets.len(), written);
        Ok(())
    }

    async fn write_frames<'a, I>(&self, packets: I) -> Result<usize>
    where
        I: IntoIterator<Item = (ChunkFormat, &'a RtmpPacket)>,
    {
        let limit = self.write_timeout;
        let write = async {
            let mut inner = self.inner.lock().await;
            let LaneInner { writer, chunk_writer } = &mut *inner;
            chunk_writer.write_packets(packets, writer).await
        };

        match timeout(limit, write).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(format!("Write did not complete within {:?}", limit))),
        }
    }

    /// Change the outbound chunk size; takes effect for the next message
    pub async fn set_chunk_size(&self, size: usize) {
        self.inner.lock().await.chunk_writer.set_chunk_size(size);
    }

    pub async fn chunk_size(&self) -> usize {
        self.inner.lock().await.chunk_writer.chunk_size()
    }

    /// Shut down the write direction
    pub async fn shutdown(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.chunk_writer.reset();
        inner.writer.shutdown().await?;
        Ok(())
    }
}

/// An RTMP connection after the handshake: inbound chunk decoding plus the
/// shared write lane
pub struct Connection<S> {
    reader: ReadHalf<S>,
    chunk_reader: ChunkReader,
    /// Bytes read but not yet decoded
    inbound: Vec<u8>,
    lane: WriteLane<S>,
}

impl<S: RtmpIo> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self::with_write_timeout(stream, DEFAULT_WRITE_TIMEOUT)
    }

    pub fn with_write_timeout(stream: S, write_timeout: Duration) -> Self {
        let (reader, writer) = split(stream);
        Connection {
            reader,
            chunk_reader: ChunkReader::new(),
            inbound: Vec::with_capacity(4096),
            lane: WriteLane::new(writer, write_timeout),
        }
    }

    /// Handle to the writer, shareable with the publish task
    pub fn lane(&self) -> WriteLane<S> {
        self.lane.clone()
    }

    pub fn set_inbound_chunk_size(&mut self, size: usize) {
        debug!("Inbound chunk size {} -> {}", self.chunk_reader.chunk_size(), size);
        self.chunk_reader.set_chunk_size(size);
    }

    pub fn inbound_chunk_size(&self) -> usize {
        self.chunk_reader.chunk_size()
    }

    /// Wait up to `wait` for the next complete message.
    ///
    /// `Ok(None)` on timeout; partially received chunks stay buffered.
    pub async fn read_message(&mut self, wait: Duration) -> Result<Option<RtmpPacket>> {
        let Connection { reader, chunk_reader, inbound, .. } = self;
        match timeout(wait, chunk_reader.read_packet(reader, inbound)).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    pub async fn send(&self, fmt: ChunkFormat, packet: &RtmpPacket) -> Result<()> {
        self.lane.send(fmt, packet).await
    }

    pub async fn send_batch(&self, packets: &[(ChunkFormat, RtmpPacket)]) -> Result<()> {
        self.lane.send_batch(packets).await
    }

    /// Shut down writing and drop all inbound state
    pub async fn close(mut self) -> Result<()> {
        self.chunk_reader.reset();
        self.inbound.clear();
        self.lane.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{make_audio_packet, RtmpHeader};
    use tokio::io::{duplex, AsyncReadExt};

    #[tokio::test]
    async fn test_timeout_keeps_partial_chunk() {
        let (client, mut server) = duplex(4096);
        let mut connection = Connection::new(client);

        let mut writer = ChunkWriter::new();
        let packet = RtmpPacket::new(RtmpHeader::command(0, 0, 0), vec![7; 40]);
        let bytes = writer.encode(ChunkFormat::Full, &packet).unwrap();

        server.write_all(&bytes[..10]).await.unwrap();
        let first = connection.read_message(Duration::from_millis(20)).await.unwrap();
        assert!(first.is_none());

        server.write_all(&bytes[10..]).await.unwrap();
        let second = connection.read_message(Duration::from_millis(500)).await.unwrap();
        assert_eq!(second, Some(packet));
    }

    #[tokio::test]
    async fn test_peer_close() {
        let (client, server) = duplex(64);
        let mut connection = Connection::new(client);
        drop(server);

        let err = connection.read_message(Duration::from_millis(500)).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[tokio::test]
    async fn test_batch_is_one_write() {
        let (client, mut server) = duplex(4096);
        let connection = Connection::new(client);

        let batch = vec![
            (ChunkFormat::Full, make_audio_packet(vec![0xAF, 1], 0, 1)),
            (ChunkFormat::SameStream, make_audio_packet(vec![0xAF, 2], 23, 1)),
        ];
        connection.send_batch(&batch).await.unwrap();

        let mut received = vec![0u8; 12 + 2 + 8 + 2];
        server.read_exact(&mut received).await.unwrap();
        assert_eq!(received[0], 0x04);
        assert_eq!(received[14], 0x44);
    }

    #[tokio::test]
    async fn test_stalled_peer_times_out_write() {
        let (client, _server) = duplex(256);
        let connection = Connection::with_write_timeout(client, Duration::from_millis(50));
        let lane = connection.lane();

        // Nobody reads the other end, so the pipe fills up
        let big = make_audio_packet(vec![0xAF; 1000], 0, 1);
        let err = lane.send(ChunkFormat::Full, &big).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.is_fatal());

        // The lock was released with the abandoned write
        let err = lane.send(ChunkFormat::Full, &big).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_failed_batch_commits_nothing() {
        let (client, _server) = duplex(4096);
        let connection = Connection::new(client);

        let command = RtmpPacket::new(RtmpHeader::command(0, 0, 0), vec![1; 8]);
        let batch = vec![
            (ChunkFormat::Full, command.clone()),
            (ChunkFormat::SameStream, make_audio_packet(vec![0xAF], 0, 1)),
        ];
        assert!(matches!(connection.send_batch(&batch).await, Err(Error::Chunk(_))));

        // Chunk stream 3 still has no header on record
        let err = connection.send(ChunkFormat::SameStream, &command).await.unwrap_err();
        assert!(matches!(err, Error::Chunk(_)));
        connection.send(ChunkFormat::Full, &command).await.unwrap();
    }

    #[tokio::test]
    async fn test_lane_rejects_fmt_without_state() {
        let (client, _server) = duplex(64);
        let connection = Connection::new(client);
        let err = connection
            .send(ChunkFormat::SameStream, &make_audio_packet(vec![0xAF], 0, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Chunk(_)));
    }
}
