use std::sync::Arc;
use log::{debug, info, trace, warn};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use crate::protocol::constants::*;
use crate::{
    set_chunk_size_packet, BandwidthLimit, BoxedIo, ChunkFormat, ClientConfig, ClientHandshake,
    Connection, ConnectParams, ControlMessage, Error, MediaPublisher, Result, RtmpCommand,
    RtmpHeader, RtmpIo, RtmpPacket, RtmpUrl, StatusReporter, Step, WriteLane,
};
use crate::client::state::{SessionState, StepStatus};
use crate::client::transaction::TransactionTable;

/// What the peer told us about its side of the connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerSettings {
    pub window_ack_size: Option<u32>,
    pub peer_bandwidth: Option<(u32, BandwidthLimit)>,
    pub last_ack: Option<u32>,
}

enum PublishSlot<S> {
    Empty,
    Idle(MediaPublisher<S>),
    Running {
        task: JoinHandle<(MediaPublisher<S>, Result<()>)>,
        cancel: CancellationToken,
        /// Cancelled when the task returns, for whatever reason
        finished: CancellationToken,
    },
}

/// One outbound publish session over one connection.
///
/// Owns the connection, the transaction table, the peer settings and the
/// media publisher. Every step checks the current state first; a fatal
/// error moves the session to `Failed` and drops the connection.
pub struct Session<S = BoxedIo> {
    config: Arc<ClientConfig>,
    reporter: StatusReporter,
    state: SessionState,
    /// Socket between `attach` and the end of the handshake
    transport: Option<S>,
    connection: Option<Connection<S>>,
    stream_id: u32,
    transactions: TransactionTable,
    peer: PeerSettings,
    publish: PublishSlot<S>,
}

impl<S: RtmpIo> Session<S> {
    pub fn new(config: Arc<ClientConfig>, reporter: StatusReporter) -> Self {
        Session {
            config,
            reporter,
            state: SessionState::Idle,
            transport: None,
            connection: None,
            stream_id: FALLBACK_STREAM_ID,
            transactions: TransactionTable::new(),
            peer: PeerSettings::default(),
            publish: PublishSlot::Empty,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Uuid {
        self.reporter.session_id()
    }

    /// Message stream id assigned by createStream (1 until then)
    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    pub fn peer_settings(&self) -> PeerSettings {
        self.peer
    }

    pub fn inbound_chunk_size(&self) -> Option<usize> {
        self.connection.as_ref().map(Connection::inbound_chunk_size)
    }

    pub fn outstanding_transactions(&self) -> &[f64] {
        self.transactions.outstanding()
    }

    /// Whether the media task is still running
    pub fn is_publishing(&self) -> bool {
        matches!(&self.publish, PublishSlot::Running { finished, .. } if !finished.is_cancelled())
    }

    /// Token cancelled once the media task returns, if one was started.
    ///
    /// Lets an owner notice a task that ended on its own; follow up with
    /// `stop_publishing` to collect the outcome.
    pub fn publish_task_done(&self) -> Option<CancellationToken> {
        match &self.publish {
            PublishSlot::Running { finished, .. } => Some(finished.clone()),
            _ => None,
        }
    }

    /// Hand the session a freshly connected socket
    pub async fn attach(&mut self, stream: S, peer: &str) -> Result<()> {
        self.expect_state(SessionState::Idle, "attach")?;
        self.transport = Some(stream);
        self.transition(SessionState::TcpConnected)?;
        self.reporter.info(Step::Tcp, format!("TCP connected to {}", peer)).await;
        Ok(())
    }

    /// Run the simple handshake, bounded by the handshake timeout
    pub async fn handshake(&mut self) -> Result<()> {
        self.expect_state(SessionState::TcpConnected, "handshake")?;
        let mut stream = self
            .transport
            .take()
            .ok_or_else(|| Error::invalid_state("No socket attached"))?;

        let limit = self.config.handshake_timeout;
        let result = match timeout(limit, run_handshake(&self.reporter, &mut stream)).await {
            Ok(result) => result,
            Err(_) => Err(Error::handshake(format!("Handshake timed out after {:?}", limit))),
        };

        match result {
            Ok(()) => {
                self.connection = Some(Connection::with_write_timeout(stream, self.config.write_timeout));
                self.transition(SessionState::Handshaken)
            }
            Err(e) => self.settle(Step::HandshakeComplete, Err(e)).await,
        }
    }

    /// Announce our chunk size and send `connect` in one write, then wait
    /// for `_result` 1
    pub async fn connect(&mut self, app: &str, tc_url: &str) -> Result<StepStatus> {
        self.expect_state(SessionState::Handshaken, "connect")?;
        let result = self.connect_inner(app, tc_url).await;
        self.settle(Step::Connect, result).await
    }

    async fn connect_inner(&mut self, app: &str, tc_url: &str) -> Result<StepStatus> {
        let chunk_size = self.config.chunk_size;
        let command = RtmpCommand::connect(&ConnectParams {
            app,
            tc_url,
            flash_ver: &self.config.flash_ver,
            connect_type: &self.config.connect_type,
            extra: &self.config.connect_extra,
        });
        let connect = RtmpPacket::new(RtmpHeader::command(0, 0, 0), command.encode()?);

        let lane = self.lane()?;
        self.transactions.register(TID_CONNECT)?;
        // The connect chunk itself already uses the announced size
        lane.set_chunk_size(chunk_size as usize).await;
        lane.send_batch(&[
            (ChunkFormat::Full, set_chunk_size_packet(chunk_size)),
            (ChunkFormat::Full, connect),
        ])
        .await?;

        self.reporter.info(Step::SetChunkSize, format!("SetChunkSize {} sent", chunk_size)).await;
        self.reporter
            .info(Step::Connect, format!("connect sent (app '{}', tcUrl '{}')", app, tc_url))
            .await;

        let status = self.await_response(TID_CONNECT, Step::ConnectResult).await?;
        self.transition(SessionState::Connected)?;
        Ok(status)
    }

    pub async fn release_stream(&mut self, name: &str) -> Result<StepStatus> {
        self.expect_state(SessionState::Connected, "releaseStream")?;
        let result = self.release_stream_inner(name).await;
        self.settle(Step::ReleaseStream, result).await
    }

    async fn release_stream_inner(&mut self, name: &str) -> Result<StepStatus> {
        let payload = RtmpCommand::release_stream(name).encode()?;
        let packet = RtmpPacket::new(RtmpHeader::command(0, 0, 0), payload);

        self.transactions.register(TID_RELEASE_STREAM)?;
        self.lane()?.send(ChunkFormat::SameStream, &packet).await?;
        self.reporter.info(Step::ReleaseStream, format!("releaseStream '{}' sent", name)).await;

        let status = self.await_response(TID_RELEASE_STREAM, Step::ReleaseStream).await?;
        self.transition(SessionState::StreamReleased)?;
        Ok(status)
    }

    /// FCPublish, createStream and `_checkbw` in a single socket write
    pub async fn publish_prepare(&mut self, name: &str) -> Result<()> {
        self.expect_state(SessionState::StreamReleased, "FCPublish")?;
        let result = self.publish_prepare_inner(name).await;
        self.settle(Step::CreateStream, result).await
    }

    async fn publish_prepare_inner(&mut self, name: &str) -> Result<()> {
        let command = |cmd: RtmpCommand| -> Result<RtmpPacket> {
            Ok(RtmpPacket::new(RtmpHeader::command(0, 0, 0), cmd.encode()?))
        };
        let batch = [
            (ChunkFormat::SameStream, command(RtmpCommand::fc_publish(name))?),
            (ChunkFormat::SameStream, command(RtmpCommand::create_stream())?),
            (ChunkFormat::Full, command(RtmpCommand::check_bw())?),
        ];

        let lane = self.lane()?;
        self.transactions.register(TID_FC_PUBLISH)?;
        self.transactions.register(TID_CREATE_STREAM)?;
        self.transactions.register(TID_CHECK_BW)?;
        lane.send_batch(&batch).await?;

        self.reporter
            .info(Step::CreateStream, format!("FCPublish '{}' + createStream sent", name))
            .await;
        Ok(())
    }

    /// Wait for `_result` 4 and take the stream id from it
    pub async fn await_create_stream_result(&mut self) -> Result<StepStatus> {
        self.expect_state(SessionState::StreamReleased, "createStream")?;
        let result = self.await_create_stream_inner().await;
        self.settle(Step::CreateStreamResult, result).await
    }

    async fn await_create_stream_inner(&mut self) -> Result<StepStatus> {
        let mut status = StepStatus::TimedOut;

        for _ in 0..self.config.response_attempts {
            let Some(command) = self.next_command().await? else {
                continue;
            };
            if !command.is_result() && !command.is_error() {
                continue;
            }

            if !command.has_transaction_id(TID_CREATE_STREAM) {
                if self.transactions.resolve(command.transaction_id) {
                    debug!("Transaction {} answered while waiting for createStream", command.transaction_id);
                } else {
                    debug!("Discarding {} for unexpected transaction {}", command.name, command.transaction_id);
                }
                continue;
            }

            if command.is_error() {
                let info = command.status_info().unwrap_or_default();
                status = StepStatus::Rejected { code: info.code, description: info.description };
                break;
            }

            match command.stream_id() {
                Some(id) if id >= 1.0 && id <= u32::MAX as f64 => {
                    self.stream_id = id as u32;
                    status = StepStatus::Completed;
                    break;
                }
                other => warn!("createStream result without a usable stream id: {:?}", other),
            }
        }

        // FCPublish and _checkbw answers are optional; retire them with createStream
        for tid in [TID_FC_PUBLISH, TID_CREATE_STREAM, TID_CHECK_BW] {
            self.transactions.resolve(tid);
        }

        match &status {
            StepStatus::Completed => {
                self.reporter
                    .info(Step::CreateStreamResult, format!("Stream id {}", self.stream_id))
                    .await;
            }
            StepStatus::TimedOut => {
                self.stream_id = FALLBACK_STREAM_ID;
                self.reporter
                    .warn(
                        Step::CreateStreamResult,
                        format!("No createStream result, using stream id {}", self.stream_id),
                    )
                    .await;
            }
            StepStatus::Rejected { code, description } => {
                self.stream_id = FALLBACK_STREAM_ID;
                self.reporter
                    .warn(
                        Step::CreateStreamResult,
                        format!("createStream rejected ({}: {}), using stream id {}", code, description, self.stream_id),
                    )
                    .await;
            }
        }

        self.transition(SessionState::StreamCreated)?;
        Ok(status)
    }

    /// Send `publish` on the assigned stream and (optionally) wait for its
    /// `onStatus`
    pub async fn publish(&mut self, name: &str) -> Result<StepStatus> {
        self.expect_state(SessionState::StreamCreated, "publish")?;
        let result = self.publish_inner(name).await;
        self.settle(Step::Publish, result).await
    }

    async fn publish_inner(&mut self, name: &str) -> Result<StepStatus> {
        let payload = RtmpCommand::publish(name, "live").encode()?;
        let packet = RtmpPacket::new(RtmpHeader::command(0, 0, self.stream_id), payload);

        self.transactions.register(TID_PUBLISH)?;
        self.lane()?.send(ChunkFormat::Full, &packet).await?;
        self.transition(SessionState::Publishing)?;
        self.reporter
            .info(Step::Publish, format!("publish '{}' sent on stream {}", name, self.stream_id))
            .await;

        let status = if self.config.await_publish_status {
            self.await_publish_status().await?
        } else {
            StepStatus::Completed
        };
        self.transactions.resolve(TID_PUBLISH);

        match &status {
            StepStatus::Completed => self.reporter.info(Step::PublishStatus, "Publishing is live").await,
            StepStatus::TimedOut => {
                self.reporter
                    .warn(Step::PublishStatus, "No publish status received, assuming live")
                    .await
            }
            StepStatus::Rejected { code, description } => {
                self.reporter
                    .error(Step::PublishStatus, format!("Publish rejected: {} ({})", code, description))
                    .await
            }
        }

        self.transition(SessionState::Live)?;
        Ok(status)
    }

    async fn await_publish_status(&mut self) -> Result<StepStatus> {
        for _ in 0..self.config.response_attempts {
            let Some(command) = self.next_command().await? else {
                continue;
            };

            if command.is_on_status() {
                match command.status_info() {
                    Some(info) if info.code.contains("Publish") => {
                        debug!("Publish status {} ({})", info.code, info.level);
                        return Ok(if info.is_error() {
                            StepStatus::Rejected { code: info.code, description: info.description }
                        } else {
                            StepStatus::Completed
                        });
                    }
                    info => debug!("Ignoring onStatus {:?}", info.map(|i| i.code)),
                }
            } else if command.is_error() && command.has_transaction_id(TID_PUBLISH) {
                let info = command.status_info().unwrap_or_default();
                return Ok(StepStatus::Rejected { code: info.code, description: info.description });
            } else {
                debug!("Discarding {} (transaction {}) while waiting for publish status", command.name, command.transaction_id);
            }
        }
        Ok(StepStatus::TimedOut)
    }

    /// Run every command step against `url`, pausing between steps
    pub async fn establish(&mut self, url: &RtmpUrl) -> Result<()> {
        let name = url.publish_name();

        self.handshake().await?;
        self.pause().await;
        self.connect(&url.app, &url.tc_url()).await?;
        self.pause().await;
        self.release_stream(&name).await?;
        self.pause().await;
        self.publish_prepare(&name).await?;
        self.await_create_stream_result().await?;
        self.pause().await;
        self.publish(&name).await?;

        info!("Session {} live on {} (stream id {})", self.session_id(), url, self.stream_id);
        Ok(())
    }

    /// Start the periodic media task
    pub async fn start_publishing(&mut self) -> Result<()> {
        if matches!(&self.publish, PublishSlot::Running { finished, .. } if finished.is_cancelled()) {
            self.stop_publishing().await?;
        }
        if !self.state.can_publish() {
            return Err(Error::invalid_state(format!("Cannot publish media in state {}", self.state)));
        }

        let publisher = match std::mem::replace(&mut self.publish, PublishSlot::Empty) {
            PublishSlot::Idle(publisher) => publisher,
            PublishSlot::Empty => MediaPublisher::new(
                self.lane()?,
                self.stream_id,
                self.config.media.clone(),
                self.reporter.clone(),
            ),
            running @ PublishSlot::Running { .. } => {
                self.publish = running;
                return Err(Error::invalid_state("Already publishing"));
            }
        };

        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();
        let done = finished.clone().drop_guard();
        let run = publisher.run(cancel.clone());
        let task = tokio::spawn(async move {
            let _done = done;
            run.await
        });
        self.publish = PublishSlot::Running { task, cancel, finished };

        self.reporter.info(Step::Media, "Media publishing started").await;
        Ok(())
    }

    /// Stop the media task at its next cycle boundary and reset the channels.
    ///
    /// Also collects a task that already ended on its own; its error fails
    /// the session.
    pub async fn stop_publishing(&mut self) -> Result<()> {
        if !matches!(self.publish, PublishSlot::Running { .. }) {
            debug!("Stop requested while not publishing");
            return Ok(());
        }
        let PublishSlot::Running { mut task, cancel, .. } = std::mem::replace(&mut self.publish, PublishSlot::Empty) else {
            return Ok(());
        };

        cancel.cancel();
        // Every write in the task is bounded, so this only expires if the
        // task itself is wedged
        let limit = self.config.write_timeout * 2;
        let joined = match timeout(limit, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                let error = Error::timeout(format!("Publish task did not stop within {:?}", limit));
                return self.settle(Step::Media, Err(error)).await;
            }
        };

        match joined {
            Ok((mut publisher, Ok(()))) => {
                publisher.reset_channels();
                let frames = publisher.frames_sent();
                self.publish = PublishSlot::Idle(publisher);
                self.reporter
                    .info(Step::Media, format!("Media publishing stopped after {} frames", frames))
                    .await;
                Ok(())
            }
            Ok((_, Err(e))) => {
                // The task has already reported this one
                if e.is_fatal() && !self.state.is_terminal() {
                    self.fail();
                }
                Err(e)
            }
            Err(e) => {
                let error = Error::protocol(format!("Publish task failed: {}", e));
                self.settle(Step::Media, Err(error)).await
            }
        }
    }

    /// Stop publishing, shut the socket and forget all session state
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Err(e) = self.stop_publishing().await {
            debug!("Publishing ended with error during disconnect: {}", e);
        }
        self.publish = PublishSlot::Empty;
        self.transport = None;

        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                debug!("Error while closing connection: {}", e);
            }
        }

        self.transactions.clear();
        self.peer = PeerSettings::default();
        self.stream_id = FALLBACK_STREAM_ID;

        if !self.state.is_terminal() {
            self.transition(SessionState::Idle)?;
        }
        self.reporter.info(Step::Disconnect, "Disconnected").await;
        Ok(())
    }

    /// Wait on `transaction_id` for up to the response budget
    async fn await_response(&mut self, transaction_id: f64, step: Step) -> Result<StepStatus> {
        for _ in 0..self.config.response_attempts {
            let Some(command) = self.next_command().await? else {
                continue;
            };

            if !command.has_transaction_id(transaction_id) {
                if command.is_result() || command.is_error() {
                    debug!("Discarding {} for unexpected transaction {}", command.name, command.transaction_id);
                }
                continue;
            }

            if command.is_result() {
                self.transactions.resolve(transaction_id);
                self.reporter.info(step, format!("_result for transaction {}", transaction_id)).await;
                return Ok(StepStatus::Completed);
            }

            if command.is_error() {
                self.transactions.resolve(transaction_id);
                let info = command.status_info().unwrap_or_default();
                self.reporter
                    .warn(step, format!("_error for transaction {}: {} ({})", transaction_id, info.code, info.description))
                    .await;
                return Ok(StepStatus::Rejected { code: info.code, description: info.description });
            }
        }

        self.transactions.resolve(transaction_id);
        self.reporter
            .warn(
                step,
                format!("No response to transaction {} after {} attempts, continuing", transaction_id, self.config.response_attempts),
            )
            .await;
        Ok(StepStatus::TimedOut)
    }

    /// One bounded read. Control messages are applied and swallowed;
    /// undecodable commands are skipped.
    async fn next_command(&mut self) -> Result<Option<RtmpCommand>> {
        let wait = self.config.response_timeout;
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| Error::invalid_state("Not connected"))?;

        let Some(packet) = connection.read_message(wait).await? else {
            return Ok(None);
        };

        if packet.is_control() {
            match ControlMessage::parse(&packet) {
                Ok(Some(message)) => self.apply_control(message),
                Ok(None) => {}
                Err(e) => warn!("Ignoring malformed control message: {}", e),
            }
            return Ok(None);
        }

        if !packet.is_command() {
            trace!("Ignoring message type {} while waiting for a response", packet.message_type());
            return Ok(None);
        }

        match RtmpCommand::decode(&packet.payload) {
            Ok(command) => {
                debug!("Received {} (transaction {})", command.name, command.transaction_id);
                Ok(Some(command))
            }
            Err(e) if !e.is_fatal() => {
                warn!("Skipping undecodable command: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn apply_control(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::SetChunkSize(size) => {
                if let Some(connection) = self.connection.as_mut() {
                    connection.set_inbound_chunk_size(size as usize);
                }
            }
            ControlMessage::WindowAckSize(size) => {
                debug!("Peer window acknowledgement size {}", size);
                self.peer.window_ack_size = Some(size);
            }
            ControlMessage::SetPeerBandwidth { size, limit } => {
                debug!("Peer bandwidth {} ({:?})", size, limit);
                self.peer.peer_bandwidth = Some((size, limit));
            }
            ControlMessage::Acknowledgement(sequence) => {
                trace!("Peer acknowledged {} bytes", sequence);
                self.peer.last_ack = Some(sequence);
            }
        }
    }

    fn lane(&self) -> Result<WriteLane<S>> {
        self.connection
            .as_ref()
            .map(Connection::lane)
            .ok_or_else(|| Error::invalid_state("Not connected"))
    }

    async fn pause(&mut self) {
        let delay = self.config.step_delay;
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }

    fn expect_state(&self, expected: SessionState, operation: &str) -> Result<()> {
        if self.state != expected {
            return Err(Error::invalid_state(format!(
                "{} requires state {}, session is {}",
                operation, expected, self.state
            )));
        }
        Ok(())
    }

    fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::invalid_state(format!("Illegal transition {} -> {}", self.state, next)));
        }
        debug!("Session {}: {} -> {}", self.session_id(), self.state, next);
        self.state = next;
        Ok(())
    }

    /// Tear the session down when a step failed fatally
    async fn settle<T>(&mut self, step: Step, result: Result<T>) -> Result<T> {
        let failure = match &result {
            Err(e) if e.is_fatal() && !self.state.is_terminal() => Some(e.to_string()),
            _ => None,
        };

        if let Some(message) = failure {
            self.fail();
            self.reporter.error(step, message).await;
        }
        result
    }

    fn fail(&mut self) {
        if let PublishSlot::Running { task, cancel, .. } = &self.publish {
            cancel.cancel();
            task.abort();
        }
        self.publish = PublishSlot::Empty;
        self.transport = None;
        self.connection = None;
        self.transactions.clear();
        debug!("Session {}: {} -> {}", self.session_id(), self.state, SessionState::Failed);
        self.state = SessionState::Failed;
    }
}

/// C0+C1 out, S0+S1+S2 in, C2 out; progress reported after each leg
async fn run_handshake<S: RtmpIo>(reporter: &StatusReporter, stream: &mut S) -> Result<()> {
    let mut handshake = ClientHandshake::new();

    handshake.send_c0c1(stream).await?;
    reporter.info(Step::HandshakeStart, "C0+C1 sent").await;

    handshake.read_s0s1(stream).await?;
    handshake.read_s2(stream).await?;
    reporter.info(Step::HandshakeResponse, "S0+S1+S2 received").await;

    handshake.send_c2(stream).await?;
    reporter.info(Step::HandshakeComplete, "C2 sent, handshake complete").await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
    use crate::{
        window_ack_size_packet, set_peer_bandwidth_packet, Amf0Object, Amf0Value, ChannelSink,
        ChunkReader, ChunkWriter, StatusLevel, C0C1, C2, HANDSHAKE_SIZE, S0S1S2,
    };

    fn quick_config() -> Arc<ClientConfig> {
        Arc::new(
            ClientConfig::builder()
                .handshake_timeout(Duration::from_millis(200))
                .response_wait(Duration::from_millis(20), 3)
                .step_delay(Duration::ZERO)
                .build()
                .unwrap(),
        )
    }

    async fn accept_handshake(server: &mut DuplexStream) {
        let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
        server.read_exact(&mut c0c1).await.unwrap();
        let response = S0S1S2::generate(&C0C1::parse(&c0c1).unwrap()).unwrap();
        server.write_all(&response.encode()).await.unwrap();
        let mut c2 = vec![0u8; HANDSHAKE_SIZE];
        server.read_exact(&mut c2).await.unwrap();
        C2::parse(&c2).unwrap().validate(&response).unwrap();
    }

    async fn handshaken_session(config: Arc<ClientConfig>) -> (Session<DuplexStream>, DuplexStream) {
        let (client, mut server) = duplex(256 * 1024);
        let mut session = Session::new(config, StatusReporter::new(Arc::new(crate::NullSink)));
        session.attach(client, "test").await.unwrap();

        let (result, ()) = tokio::join!(session.handshake(), accept_handshake(&mut server));
        result.unwrap();
        assert_eq!(session.state(), SessionState::Handshaken);
        (session, server)
    }

    #[tokio::test]
    async fn test_steps_require_state() {
        let mut session: Session<DuplexStream> =
            Session::new(quick_config(), StatusReporter::new(Arc::new(crate::NullSink)));

        let err = session.connect("live", "rtmp://localhost/live").await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(session.start_publishing().await.is_err());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_handshake_timeout_fails_session() {
        let (client, _server) = duplex(8192);
        let (sink, mut events) = ChannelSink::new();
        let mut session = Session::new(quick_config(), StatusReporter::new(Arc::new(sink)));
        session.attach(client, "silent peer").await.unwrap();

        let err = session.handshake().await.unwrap_err();
        assert!(matches!(err, Error::Handshake(_)));
        assert_eq!(session.state(), SessionState::Failed);

        let mut saw_error = false;
        while let Ok(event) = events.try_recv() {
            saw_error |= event.level == StatusLevel::Error;
        }
        assert!(saw_error);

        // Failed is terminal
        session.disconnect().await.unwrap();
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_connect_soft_timeout() {
        let (mut session, mut server) = handshaken_session(quick_config()).await;

        let status = session.connect("live", "rtmp://localhost/live").await.unwrap();
        assert_eq!(status, StepStatus::TimedOut);
        assert_eq!(session.state(), SessionState::Connected);
        assert!(session.outstanding_transactions().is_empty());

        let mut reader = ChunkReader::new();
        let mut inbound = Vec::new();
        let set_chunk_size = reader.read_packet(&mut server, &mut inbound).await.unwrap();
        match ControlMessage::parse(&set_chunk_size).unwrap() {
            Some(ControlMessage::SetChunkSize(size)) => {
                assert_eq!(size, 4096);
                reader.set_chunk_size(size as usize);
            }
            other => panic!("expected SetChunkSize, got {:?}", other),
        }

        let connect = reader.read_packet(&mut server, &mut inbound).await.unwrap();
        let command = RtmpCommand::decode(&connect.payload).unwrap();
        assert_eq!(command.name, "connect");
        assert_eq!(command.transaction_id, 1.0);
        let keys: Vec<&str> = command.command_object.as_ref().unwrap().as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["app", "type", "flashVer", "swfUrl", "tcUrl"]);
    }

    #[tokio::test]
    async fn test_control_messages_update_peer_settings() {
        // Enough attempts to swallow the leading control messages
        let mut config = (*quick_config()).clone();
        config.response_attempts = 10;
        let (mut session, mut server) = handshaken_session(Arc::new(config)).await;

        // A _result bigger than the default chunk size proves the new
        // inbound chunk size took effect
        let properties = Amf0Object::new().with("fmsVer", Amf0Value::String("x".repeat(300)));
        let result = RtmpCommand::result(1.0, Amf0Value::Object(properties), Amf0Value::Null);
        let mut writer = ChunkWriter::new();
        let mut bytes = Vec::new();
        bytes.extend(writer.encode(ChunkFormat::Full, &window_ack_size_packet(2_500_000)).unwrap());
        bytes.extend(writer.encode(ChunkFormat::Full, &set_peer_bandwidth_packet(2_500_000, 2)).unwrap());
        bytes.extend(writer.encode(ChunkFormat::Full, &set_chunk_size_packet(4096)).unwrap());
        writer.set_chunk_size(4096);
        let packet = RtmpPacket::new(RtmpHeader::command(0, 0, 0), result.encode().unwrap());
        bytes.extend(writer.encode(ChunkFormat::Full, &packet).unwrap());
        server.write_all(&bytes).await.unwrap();

        let status = session.connect("live", "rtmp://localhost/live").await.unwrap();
        assert_eq!(status, StepStatus::Completed);
        assert_eq!(session.inbound_chunk_size(), Some(4096));

        let peer = session.peer_settings();
        assert_eq!(peer.window_ack_size, Some(2_500_000));
        assert_eq!(peer.peer_bandwidth, Some((2_500_000, BandwidthLimit::Dynamic)));
    }
}
