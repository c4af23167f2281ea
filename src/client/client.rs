use std::fmt;
use std::sync::Arc;
use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use crate::{open_transport, Error, Result, RtmpUrl, StatusReporter, StatusSink, Step};
use crate::client::config::ClientConfig;
use crate::client::session::Session;
use crate::client::state::SessionState;

const CONTROL_QUEUE_DEPTH: usize = 32;

/// Requests a front end can queue for the client
#[derive(Debug)]
pub enum ControlCommand {
    /// Open a session to the URL and run it up to Live
    Connect(String),
    StartPublishing,
    StopPublishing,
    Disconnect,
    /// Report the current session
    Query(oneshot::Sender<SessionSnapshot>),
    /// Disconnect and stop the client task
    Shutdown,
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::Connect(url) => write!(f, "Connect({})", url),
            ControlCommand::StartPublishing => write!(f, "StartPublishing"),
            ControlCommand::StopPublishing => write!(f, "StopPublishing"),
            ControlCommand::Disconnect => write!(f, "Disconnect"),
            ControlCommand::Query(_) => write!(f, "Query"),
            ControlCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Point-in-time view of the client's session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: Option<Uuid>,
    pub state: SessionState,
    pub stream_id: u32,
    pub publishing: bool,
}

/// Front-end side of the client: queues commands, never waits on the session
#[derive(Clone)]
pub struct ClientHandle {
    tx: mpsc::Sender<ControlCommand>,
}

impl ClientHandle {
    pub async fn send(&self, command: ControlCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| Error::invalid_state("Client task has stopped"))
    }

    pub async fn connect(&self, url: impl Into<String>) -> Result<()> {
        self.send(ControlCommand::Connect(url.into())).await
    }

    pub async fn start_publishing(&self) -> Result<()> {
        self.send(ControlCommand::StartPublishing).await
    }

    pub async fn stop_publishing(&self) -> Result<()> {
        self.send(ControlCommand::StopPublishing).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.send(ControlCommand::Disconnect).await
    }

    /// Current session state, once every earlier command has been handled
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(ControlCommand::Query(reply)).await?;
        response
            .await
            .map_err(|_| Error::invalid_state("Client task has stopped"))
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(ControlCommand::Shutdown).await
    }
}

/// Actor owning at most one publish session.
///
/// Commands are handled one at a time in arrival order. A publish task that
/// dies on its own is collected between commands, failing the session. A
/// session that failed stays around (for queries) until the next connect
/// replaces it.
pub struct RtmpClient {
    config: Arc<ClientConfig>,
    sink: Arc<dyn StatusSink>,
    session: Option<Session>,
    rx: mpsc::Receiver<ControlCommand>,
}

impl RtmpClient {
    /// Validate `config` and start the client task
    pub fn spawn(config: ClientConfig, sink: Arc<dyn StatusSink>) -> Result<(ClientHandle, JoinHandle<()>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(CONTROL_QUEUE_DEPTH);
        let client = RtmpClient {
            config: Arc::new(config),
            sink,
            session: None,
            rx,
        };
        let task = tokio::spawn(client.run());
        Ok((ClientHandle { tx }, task))
    }

    async fn run(mut self) {
        debug!("RTMP client task started");

        loop {
            let publish_done = self.session.as_ref().and_then(Session::publish_task_done);
            let woken = tokio::select! {
                command = self.rx.recv() => Some(command),
                _ = publish_ended(publish_done) => None,
            };

            let Some(command) = woken else {
                self.collect_publisher().await;
                continue;
            };
            let Some(command) = command else { break };
            if matches!(command, ControlCommand::Shutdown) {
                break;
            }

            let label = command.to_string();
            if let Err(e) = self.handle(command).await {
                warn!("{} failed: {}", label, e);
            }
        }

        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.disconnect().await {
                debug!("Disconnect on shutdown failed: {}", e);
            }
        }
        debug!("RTMP client task stopped");
    }

    async fn handle(&mut self, command: ControlCommand) -> Result<()> {
        match command {
            ControlCommand::Connect(url) => self.connect(&url).await,
            ControlCommand::StartPublishing => self.active_session()?.start_publishing().await,
            ControlCommand::StopPublishing => self.active_session()?.stop_publishing().await,
            ControlCommand::Disconnect => match self.session.as_mut() {
                Some(session) => session.disconnect().await,
                None => Ok(()),
            },
            ControlCommand::Query(reply) => {
                let snapshot = self.snapshot();
                // Requester may have given up
                let _ = reply.send(snapshot);
                Ok(())
            }
            ControlCommand::Shutdown => Ok(()),
        }
    }

    async fn collect_publisher(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = session.stop_publishing().await {
            warn!("Session {} stopped publishing: {}", session.session_id(), e);
        }
    }

    async fn connect(&mut self, url: &str) -> Result<()> {
        if let Some(mut previous) = self.session.take() {
            if previous.state() != SessionState::Idle {
                info!("Replacing session {} ({})", previous.session_id(), previous.state());
            }
            previous.disconnect().await?;
        }

        let reporter = StatusReporter::new(Arc::clone(&self.sink));
        let target = match RtmpUrl::parse(url) {
            Ok(target) => target,
            Err(e) => {
                reporter.error(Step::Tcp, e.to_string()).await;
                return Err(e);
            }
        };

        reporter.info(Step::Tcp, format!("Connecting to {}", target.socket_addr())).await;
        let stream = match open_transport(&target, self.config.connect_timeout).await {
            Ok(stream) => stream,
            Err(e) => {
                reporter.error(Step::Tcp, e.to_string()).await;
                return Err(e);
            }
        };

        let session = self
            .session
            .insert(Session::new(Arc::clone(&self.config), reporter));
        session.attach(stream, &target.socket_addr()).await?;
        session.establish(&target).await
    }

    fn active_session(&mut self) -> Result<&mut Session> {
        self.session
            .as_mut()
            .ok_or_else(|| Error::invalid_state("No session; connect first"))
    }

    fn snapshot(&self) -> SessionSnapshot {
        match &self.session {
            Some(session) => SessionSnapshot {
                session_id: Some(session.session_id()),
                state: session.state(),
                stream_id: session.stream_id(),
                publishing: session.is_publishing(),
            },
            None => SessionSnapshot {
                session_id: None,
                state: SessionState::Idle,
                stream_id: crate::FALLBACK_STREAM_ID,
                publishing: false,
            },
        }
    }
}

async fn publish_ended(done: Option<CancellationToken>) {
    match done {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
