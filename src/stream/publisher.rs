use log::{debug, error, info};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use crate::{
    generate_random_bytes, make_audio_packet, make_video_packet, ChunkFormat, MediaConfig,
    Result, RtmpData, RtmpHeader, RtmpIo, RtmpPacket, Step, StatusReporter, WriteLane,
};

/// AAC, 44 kHz, 16-bit, stereo
pub const AUDIO_TAG_AAC: u8 = 0xAF;
/// AVC keyframe
pub const VIDEO_TAG_KEYFRAME: u8 = 0x17;
/// AVC inter frame
pub const VIDEO_TAG_INTER: u8 = 0x27;

/// Per-channel timestamp tracking for audio or video
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishChannelState {
    /// Whether a full header went out since the last reset
    pub sent: bool,
    /// Nominal timestamp of the last frame
    pub timestamp: u32,
}

impl PublishChannelState {
    /// Header format and timestamp for the next frame
    pub fn advance(&mut self, delta: u32) -> (ChunkFormat, u32) {
        if self.sent {
            self.timestamp = self.timestamp.wrapping_add(delta);
            (ChunkFormat::SameStream, self.timestamp)
        } else {
            self.sent = true;
            self.timestamp = 0;
            (ChunkFormat::Full, 0)
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Emits onMetaData and synthetic audio/video frames for one session.
///
/// Owned by the session between publish runs and moved into the publish
/// task while running, so the metadata flag survives stop/start.
pub struct MediaPublisher<S> {
    lane: WriteLane<S>,
    stream_id: u32,
    config: MediaConfig,
    reporter: StatusReporter,
    metadata_sent: bool,
    audio: PublishChannelState,
    video: PublishChannelState,
    frames: u64,
}

impl<S: RtmpIo> MediaPublisher<S> {
    pub fn new(lane: WriteLane<S>, stream_id: u32, config: MediaConfig, reporter: StatusReporter) -> Self {
        MediaPublisher {
            lane,
            stream_id,
            config,
            reporter,
            metadata_sent: false,
            audio: PublishChannelState::default(),
            video: PublishChannelState::default(),
            frames: 0,
        }
    }

    pub fn metadata_sent(&self) -> bool {
        self.metadata_sent
    }

    pub fn audio_state(&self) -> PublishChannelState {
        self.audio
    }

    pub fn video_state(&self) -> PublishChannelState {
        self.video
    }

    /// Audio+video pairs sent over the session's lifetime
    pub fn frames_sent(&self) -> u64 {
        self.frames
    }

    /// Send onMetaData unless it already went out; returns whether it was sent
    pub async fn send_metadata(&mut self) -> Result<bool> {
        if self.metadata_sent {
            return Ok(false);
        }

        let payload = RtmpData::on_metadata(&self.config.metadata).encode()?;
        let packet = RtmpPacket::new(RtmpHeader::data(0, 0, self.stream_id), payload);
        self.lane.send(ChunkFormat::Full, &packet).await?;
        self.metadata_sent = true;

        self.reporter.info(Step::Media, format!("onMetaData sent ({} bytes)", packet.payload.len())).await;
        Ok(true)
    }

    pub async fn send_audio(&mut self) -> Result<()> {
        let (fmt, timestamp) = self.audio.advance(self.config.audio_delta);

        let mut payload = Vec::with_capacity(1 + self.config.audio_payload_len);
        payload.push(AUDIO_TAG_AAC);
        payload.extend(generate_random_bytes(self.config.audio_payload_len));

        let packet = make_audio_packet(payload, timestamp, self.stream_id);
        self.lane.send(fmt, &packet).await
    }

    pub async fn send_video(&mut self) -> Result<()> {
        let tag = if self.video.sent { VIDEO_TAG_INTER } else { VIDEO_TAG_KEYFRAME };
        let (fmt, timestamp) = self.video.advance(self.config.video_delta);

        let mut payload = Vec::with_capacity(1 + self.config.video_payload_len);
        payload.push(tag);
        payload.extend(generate_random_bytes(self.config.video_payload_len));

        let packet = make_video_packet(payload, timestamp, self.stream_id);
        self.lane.send(fmt, &packet).await
    }

    /// Force the next frames to re-baseline with full headers
    pub fn reset_channels(&mut self) {
        self.audio.reset();
        self.video.reset();
    }

    /// Publish until `cancel` fires or a write fails, then hand the
    /// publisher back with the outcome. A failure is reported on the sink
    /// right away, whether or not anyone is waiting on the task.
    pub async fn run(mut self, cancel: CancellationToken) -> (Self, Result<()>) {
        let result = self.run_loop(&cancel).await;
        let failure = result
            .as_ref()
            .err()
            .map(|e| format!("Publishing failed after {} frames: {}", self.frames, e));
        if let Some(message) = failure {
            error!("{}", message);
            self.reporter.error(Step::Media, message).await;
        }
        (self, result)
    }

    async fn run_loop(&mut self, cancel: &CancellationToken) -> Result<()> {
        if self.send_metadata().await? {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = sleep(self.config.metadata_settle) => {}
            }
        }

        let mut ticker = interval(self.config.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.send_audio().await?;
            self.send_video().await?;
            self.frames += 1;

            if self.frames % 10 == 0 {
                info!("Published {} frames (audio ts {}, video ts {})",
                    self.frames, self.audio.timestamp, self.video.timestamp);
                self.reporter
                    .info(Step::Media, format!("{} frames published", self.frames))
                    .await;
            }
        }

        debug!("Publish loop stopped after {} frames", self.frames);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::duplex;
    use crate::{
        ChannelSink, ChunkReader, Connection, NullSink, StatusLevel, MSG_TYPE_DATA_AMF0,
        CHUNK_STREAM_AUDIO, CHUNK_STREAM_VIDEO,
    };

    #[test]
    fn test_channel_state_advance() {
        let mut state = PublishChannelState::default();
        assert_eq!(state.advance(23), (ChunkFormat::Full, 0));
        assert_eq!(state.advance(23), (ChunkFormat::SameStream, 23));
        assert_eq!(state.advance(23), (ChunkFormat::SameStream, 46));

        state.reset();
        assert_eq!(state.advance(23), (ChunkFormat::Full, 0));
    }

    fn publisher_over_duplex() -> (MediaPublisher<tokio::io::DuplexStream>, tokio::io::DuplexStream) {
        let (client, server) = duplex(64 * 1024);
        let connection = Connection::new(client);
        let config = MediaConfig {
            frame_interval: Duration::from_millis(5),
            metadata_settle: Duration::from_millis(1),
            ..MediaConfig::default()
        };
        let publisher = MediaPublisher::new(
            connection.lane(),
            7,
            config,
            StatusReporter::new(Arc::new(NullSink)),
        );
        (publisher, server)
    }

    #[tokio::test]
    async fn test_frames_on_the_wire() {
        let (mut publisher, mut server) = publisher_over_duplex();

        assert!(publisher.send_metadata().await.unwrap());
        assert!(!publisher.send_metadata().await.unwrap());
        for _ in 0..2 {
            publisher.send_audio().await.unwrap();
            publisher.send_video().await.unwrap();
        }

        let mut reader = ChunkReader::new();
        let mut inbound = Vec::new();
        macro_rules! next {
            () => { reader.read_packet(&mut server, &mut inbound) };
        }

        let metadata = next!().await.unwrap();
        assert_eq!(metadata.message_type(), MSG_TYPE_DATA_AMF0);
        assert_eq!(metadata.message_stream_id(), 7);

        let audio = next!().await.unwrap();
        assert_eq!(audio.chunk_stream_id(), CHUNK_STREAM_AUDIO);
        assert_eq!(audio.timestamp(), 0);
        assert_eq!(audio.payload.len(), 4);
        assert_eq!(audio.payload[0], AUDIO_TAG_AAC);

        let video = next!().await.unwrap();
        assert_eq!(video.chunk_stream_id(), CHUNK_STREAM_VIDEO);
        assert_eq!(video.payload.len(), 101);
        assert_eq!(video.payload[0], VIDEO_TAG_KEYFRAME);

        let audio = next!().await.unwrap();
        assert_eq!(audio.timestamp(), 23);
        let video = next!().await.unwrap();
        assert_eq!(video.timestamp(), 33);
        assert_eq!(video.payload[0], VIDEO_TAG_INTER);
        assert_eq!(video.message_stream_id(), 7);
    }

    #[tokio::test]
    async fn test_run_until_cancelled() {
        let (publisher, _server) = publisher_over_duplex();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(publisher.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(40)).await;
        cancel.cancel();
        let (mut publisher, result) = task.await.unwrap();
        result.unwrap();

        assert!(publisher.metadata_sent());
        assert!(publisher.frames_sent() >= 1);
        assert!(publisher.audio_state().sent);

        publisher.reset_channels();
        assert_eq!(publisher.audio_state(), PublishChannelState::default());
        assert_eq!(publisher.video_state(), PublishChannelState::default());
        assert!(publisher.metadata_sent());
    }

    #[tokio::test]
    async fn test_write_failure_reported() {
        let (client, server) = duplex(64 * 1024);
        let connection = Connection::new(client);
        let (sink, mut events) = ChannelSink::new();
        let config = MediaConfig {
            frame_interval: Duration::from_millis(5),
            metadata_settle: Duration::from_millis(1),
            ..MediaConfig::default()
        };
        let publisher = MediaPublisher::new(connection.lane(), 1, config, StatusReporter::new(Arc::new(sink)));
        drop(server);

        let cancel = CancellationToken::new();
        let (_publisher, result) = publisher.run(cancel).await;
        assert!(result.is_err());

        let event = events.recv().await.unwrap();
        assert_eq!(event.step, Step::Media);
        assert_eq!(event.level, StatusLevel::Error);
    }
}
