mod state;
mod c0c1;
mod s0s1s2;

pub use state::*;
pub use c0c1::*;
pub use s0s1s2::*;

use crate::{Error, Result};
use log::debug;
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Driver for the client side of the simple handshake.
///
/// Each step is a separate call so the caller can report progress between
/// them; the caller also owns the overall timeout.
#[derive(Debug, Default)]
pub struct ClientHandshake {
    state: HandshakeState,
    s1: Vec<u8>,
}

impl ClientHandshake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Send C0+C1
    pub async fn send_c0c1<S: AsyncWrite + Unpin>(&mut self, stream: &mut S) -> Result<()> {
        let c0c1 = C0C1::create_client();
        let bytes = c0c1.encode()?;
        self.guard(async {
            stream.write_all(&bytes).await?;
            stream.flush().await?;
            Ok(())
        })
        .await?;
        debug!("Sent C0+C1 ({} bytes, timestamp {})", bytes.len(), c0c1.timestamp);
        self.state.transition(HandshakeEvent::SentC0C1)
    }

    /// Read S0 (must be version 3) and S1
    pub async fn read_s0s1<S: AsyncRead + Unpin>(&mut self, stream: &mut S) -> Result<()> {
        let mut s0 = [0u8; 1];
        self.guard(read_exact(stream, &mut s0)).await?;
        if s0[0] != RTMP_VERSION {
            self.state.transition(HandshakeEvent::Error)?;
            return Err(Error::handshake(format!(
                "Unsupported server version: {}, expected {}",
                s0[0], RTMP_VERSION
            )));
        }

        let mut s1 = vec![0u8; HANDSHAKE_SIZE];
        self.guard(read_exact(stream, &mut s1)).await?;
        self.s1 = s1;
        debug!("Received S0+S1");
        self.state.transition(HandshakeEvent::ReceivedS0S1)
    }

    /// Read S2; its content isn't checked
    pub async fn read_s2<S: AsyncRead + Unpin>(&mut self, stream: &mut S) -> Result<()> {
        let mut s2 = vec![0u8; HANDSHAKE_SIZE];
        self.guard(read_exact(stream, &mut s2)).await?;
        debug!("Received S2");
        self.state.transition(HandshakeEvent::ReceivedS2)
    }

    /// Send C2, an echo of S1
    pub async fn send_c2<S: AsyncWrite + Unpin>(&mut self, stream: &mut S) -> Result<()> {
        let c2 = C2::echo_s1(&self.s1).encode();
        self.guard(async {
            stream.write_all(&c2).await?;
            stream.flush().await?;
            Ok(())
        })
        .await?;
        debug!("Sent C2");
        self.state.transition(HandshakeEvent::SentC2)
    }

    /// Run every step in order
    pub async fn perform<S: AsyncRead + AsyncWrite + Unpin>(&mut self, stream: &mut S) -> Result<()> {
        self.send_c0c1(stream).await?;
        self.read_s0s1(stream).await?;
        self.read_s2(stream).await?;
        self.send_c2(stream).await
    }

    /// Mark the handshake failed when `step` errors
    async fn guard<F>(&mut self, step: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>>,
    {
        let result = step.await;
        if result.is_err() {
            self.state = HandshakeState::Failed;
        }
        result
    }
}

/// `read_exact` with a closed connection reported as a handshake failure
async fn read_exact<S: AsyncRead + Unpin>(stream: &mut S, buf: &mut [u8]) -> Result<()> {
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(Error::handshake(format!(
            "Connection closed before {} handshake bytes arrived",
            buf.len()
        ))),
        Err(e) => Err(e.into()),
    }
}
