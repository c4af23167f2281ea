use std::fmt;
use url::Url;
use crate::{Error, Result, DEFAULT_APP, DEFAULT_PORT, DEFAULT_TLS_PORT};

/// Publish target split into the pieces the handshake and commands need
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmpUrl {
    pub tls: bool,
    pub host: String,
    pub port: u16,
    pub app: String,
    /// Path after the app segment (may contain slashes, may be empty)
    pub stream: String,
    pub query: Option<String>,
}

impl RtmpUrl {
    /// Parse an `rtmp://` or `rtmps://` URL
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input.trim())
            .map_err(|e| Error::config(format!("Invalid URL: {}", e)))?;

        let tls = match url.scheme() {
            "rtmp" => false,
            "rtmps" => true,
            scheme => return Err(Error::config(format!("Unsupported scheme: {}", scheme))),
        };

        let host = url.host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::config("Missing host in URL"))?
            .to_string();
        let port = url.port().unwrap_or(if tls { DEFAULT_TLS_PORT } else { DEFAULT_PORT });

        let path = url.path().trim_start_matches('/');
        let (app, stream) = match path.split_once('/') {
            Some((app, stream)) => (app, stream),
            None => (path, ""),
        };
        let app = if app.is_empty() { DEFAULT_APP } else { app };

        Ok(RtmpUrl {
            tls,
            host,
            port,
            app: app.to_string(),
            stream: stream.to_string(),
            query: url.query().filter(|q| !q.is_empty()).map(str::to_string),
        })
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls { "rtmps" } else { "rtmp" }
    }

    fn default_port(&self) -> u16 {
        if self.tls { DEFAULT_TLS_PORT } else { DEFAULT_PORT }
    }

    /// `scheme://host[:port]/app`, port omitted when it is the default
    pub fn tc_url(&self) -> String {
        if self.port == self.default_port() {
            format!("{}://{}/{}", self.scheme(), self.host, self.app)
        } else {
            format!("{}://{}:{}/{}", self.scheme(), self.host, self.port, self.app)
        }
    }

    /// Stream name for releaseStream/FCPublish/publish, query included
    pub fn publish_name(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.stream, query),
            None => self.stream.clone(),
        }
    }

    /// `host:port` for the socket connect
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for RtmpUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tc_url(), self.stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_url() {
        let url = RtmpUrl::parse("rtmp://push.example.com/third/stream-6948?sign=abc&t=1").unwrap();
        assert!(!url.tls);
        assert_eq!(url.host, "push.example.com");
        assert_eq!(url.port, 1935);
        assert_eq!(url.app, "third");
        assert_eq!(url.stream, "stream-6948");
        assert_eq!(url.tc_url(), "rtmp://push.example.com/third");
        assert_eq!(url.publish_name(), "stream-6948?sign=abc&t=1");
    }

    #[test]
    fn test_explicit_port_in_tc_url() {
        let url = RtmpUrl::parse("rtmp://127.0.0.1:19350/live/a/b").unwrap();
        assert_eq!(url.port, 19350);
        assert_eq!(url.stream, "a/b");
        assert_eq!(url.tc_url(), "rtmp://127.0.0.1:19350/live");
        assert_eq!(url.publish_name(), "a/b");
        assert_eq!(url.socket_addr(), "127.0.0.1:19350");
    }

    #[test]
    fn test_rtmps_defaults() {
        let url = RtmpUrl::parse("rtmps://live.example.com/app/key").unwrap();
        assert!(url.tls);
        assert_eq!(url.port, 443);
        assert_eq!(url.tc_url(), "rtmps://live.example.com/app");
    }

    #[test]
    fn test_default_app() {
        let url = RtmpUrl::parse("rtmp://example.com").unwrap();
        assert_eq!(url.app, "live");
        assert_eq!(url.stream, "");
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(RtmpUrl::parse("http://example.com/live"), Err(Error::Configuration(_))));
        assert!(RtmpUrl::parse("not a url").is_err());
    }
}
