use std::time::Duration;
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use crate::{Error, Result, RtmpUrl};

/// Byte stream a session can run over (TCP, TLS, or an in-memory pipe)
pub trait RtmpIo: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> RtmpIo for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

pub type BoxedIo = Box<dyn RtmpIo>;

/// Open the socket for `url`: TCP with nodelay, wrapped in TLS for rtmps
pub async fn open_transport(url: &RtmpUrl, connect_timeout: Duration) -> Result<BoxedIo> {
    let addr = url.socket_addr();

    let stream = match timeout(connect_timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(Error::connection(format!("Connection to {} failed: {}", addr, e))),
        Err(_) => return Err(Error::timeout(format!("Connection to {} timed out", addr))),
    };
    stream.set_nodelay(true)?;
    debug!("TCP connected to {}", addr);

    if !url.tls {
        return Ok(Box::new(stream));
    }

    let connector = tokio_native_tls::TlsConnector::from(native_tls::TlsConnector::new()?);
    let tls_stream = match timeout(connect_timeout, connector.connect(&url.host, stream)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(Error::timeout(format!("TLS negotiation with {} timed out", addr))),
    };
    debug!("TLS established with {}", url.host);

    Ok(Box::new(tls_stream))
}
