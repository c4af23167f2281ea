use std::fmt;
use std::sync::Arc;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use uuid::Uuid;
use crate::utils::wall_clock;

/// Stage of the publish flow an event belongs to.
///
/// The numbers are the step labels shown to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// 1: TCP connect
    Tcp,
    /// 4: C0+C1 sent
    HandshakeStart,
    /// 5: S0+S1+S2 received
    HandshakeResponse,
    /// 6: C2 sent
    HandshakeComplete,
    /// 7: SetChunkSize
    SetChunkSize,
    /// 8: connect sent
    Connect,
    /// 9: connect answered
    ConnectResult,
    /// 10: releaseStream
    ReleaseStream,
    /// 11: FCPublish + createStream sent
    CreateStream,
    /// 12: createStream answered
    CreateStreamResult,
    /// 13: publish sent
    Publish,
    /// 14: publish acknowledged
    PublishStatus,
    Media,
    Disconnect,
}

impl Step {
    /// Operator-facing step number, if the step has one
    pub fn number(&self) -> Option<u8> {
        match self {
            Step::Tcp => Some(1),
            Step::HandshakeStart => Some(4),
            Step::HandshakeResponse => Some(5),
            Step::HandshakeComplete => Some(6),
            Step::SetChunkSize => Some(7),
            Step::Connect => Some(8),
            Step::ConnectResult => Some(9),
            Step::ReleaseStream => Some(10),
            Step::CreateStream => Some(11),
            Step::CreateStreamResult => Some(12),
            Step::Publish => Some(13),
            Step::PublishStatus => Some(14),
            Step::Media | Step::Disconnect => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.number() {
            Some(n) => write!(f, "step {}", n),
            None => write!(f, "{:?}", self),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatusLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Progress notification delivered to the front end
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub session_id: Uuid,
    pub at: DateTime<Local>,
    pub step: Step,
    pub level: StatusLevel,
    pub message: String,
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.at.format("%H:%M:%S%.3f"),
            self.step,
            self.message
        )
    }
}

/// Receiver of status events
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn emit(&self, event: StatusEvent);
}

/// Forwards events to the `log` facade
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl StatusSink for LogSink {
    async fn emit(&self, event: StatusEvent) {
        let short_id = &event.session_id.simple().to_string()[..8];
        match event.level {
            StatusLevel::Debug => debug!("[{}] {}", short_id, event),
            StatusLevel::Info => info!("[{}] {}", short_id, event),
            StatusLevel::Warning => warn!("[{}] {}", short_id, event),
            StatusLevel::Error => error!("[{}] {}", short_id, event),
        }
    }
}

/// Forwards events into a tokio channel; events are dropped once the
/// receiver is gone
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelSink { tx }, rx)
    }
}

#[async_trait]
impl StatusSink for ChannelSink {
    async fn emit(&self, event: StatusEvent) {
        let _ = self.tx.send(event);
    }
}

/// Discards everything
#[derive(Debug, Default, Clone)]
pub struct NullSink;

#[async_trait]
impl StatusSink for NullSink {
    async fn emit(&self, _event: StatusEvent) {}
}

/// Stamps events with the session id and time before handing them to a sink
#[derive(Clone)]
pub struct StatusReporter {
    session_id: Uuid,
    sink: Arc<dyn StatusSink>,
}

impl StatusReporter {
    pub fn new(sink: Arc<dyn StatusSink>) -> Self {
        StatusReporter {
            session_id: Uuid::new_v4(),
            sink,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub async fn report(&self, step: Step, level: StatusLevel, message: impl Into<String>) {
        self.sink
            .emit(StatusEvent {
                session_id: self.session_id,
                at: wall_clock(),
                step,
                level,
                message: message.into(),
            })
            .await;
    }

    pub async fn info(&self, step: Step, message: impl Into<String>) {
        self.report(step, StatusLevel::Info, message).await;
    }

    pub async fn warn(&self, step: Step, message: impl Into<String>) {
        self.report(step, StatusLevel::Warning, message).await;
    }

    pub async fn error(&self, step: Step, message: impl Into<String>) {
        self.report(step, StatusLevel::Error, message).await;
    }
}
