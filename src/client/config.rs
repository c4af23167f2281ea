use std::time::Duration;
use crate::{
    Amf0Object, Amf0Value, Error, Result, StreamMetadata, DEFAULT_WRITE_TIMEOUT, MAX_CHUNK_SIZE,
    MIN_CHUNK_SIZE,
};

pub const DEFAULT_FLASH_VER: &str = "FMLE/3.0 (compatible; FMSc/1.0)";
pub const DEFAULT_CONNECT_TYPE: &str = "nonprivate";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// TCP (and TLS) connect timeout
    pub connect_timeout: Duration,

    /// Bound on the whole handshake exchange
    pub handshake_timeout: Duration,

    /// Timeout of a single read while waiting for a command response
    pub response_timeout: Duration,

    /// Reads per command step before giving up on its response
    pub response_attempts: u32,

    /// Bound on every outbound socket write; expiry fails the session
    pub write_timeout: Duration,

    /// Outbound chunk size announced with SetChunkSize
    pub chunk_size: u32,

    /// `flashVer` of the connect command object
    pub flash_ver: String,

    /// `type` of the connect command object
    pub connect_type: String,

    /// Extra connect command object keys, written after the standard ones
    pub connect_extra: Amf0Object,

    /// Pause between command steps
    pub step_delay: Duration,

    /// Wait for the publish `onStatus` before reporting Live
    pub await_publish_status: bool,

    /// Synthetic media settings
    pub media: MediaConfig,
}

/// Cadence and shape of the synthetic media stream
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Time between audio+video frame pairs
    pub frame_interval: Duration,

    /// Pause after onMetaData before the first frame
    pub metadata_settle: Duration,

    /// Nominal audio timestamp step (ms)
    pub audio_delta: u32,

    /// Nominal video timestamp step (ms)
    pub video_delta: u32,

    /// Random bytes after the audio tag header
    pub audio_payload_len: usize,

    /// Random bytes after the video tag header
    pub video_payload_len: usize,

    /// Values announced in onMetaData
    pub metadata: StreamMetadata,
}

impl Default for MediaConfig {
    fn default() -> Self {
        MediaConfig {
            frame_interval: Duration::from_secs(1),
            metadata_settle: Duration::from_secs(1),
            audio_delta: 23,
            video_delta: 33,
            audio_payload_len: 3,
            video_payload_len: 100,
            metadata: StreamMetadata::default(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(1),
            response_attempts: 10,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            chunk_size: 4096,
            flash_ver: DEFAULT_FLASH_VER.to_string(),
            connect_type: DEFAULT_CONNECT_TYPE.to_string(),
            connect_extra: Amf0Object::new(),
            step_delay: Duration::from_millis(100),
            await_publish_status: true,
            media: MediaConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(Error::config(format!("Chunk size must be at least {}", MIN_CHUNK_SIZE)));
        }

        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::config(format!("Chunk size must not exceed {}", MAX_CHUNK_SIZE)));
        }

        if self.response_attempts == 0 {
            return Err(Error::config("At least one response attempt is required"));
        }

        if self.response_timeout.is_zero() {
            return Err(Error::config("Response timeout must be positive"));
        }

        if self.write_timeout.is_zero() {
            return Err(Error::config("Write timeout must be positive"));
        }

        if self.media.frame_interval.is_zero() {
            return Err(Error::config("Frame interval must be positive"));
        }

        if self.connect_extra.keys().any(str::is_empty) {
            return Err(Error::config("Connect object keys must not be empty"));
        }

        Ok(())
    }
}

/// Builder for ClientConfig
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        ClientConfigBuilder {
            config: ClientConfig::default(),
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Set the per-read timeout and attempt budget for command responses
    pub fn response_wait(mut self, timeout: Duration, attempts: u32) -> Self {
        self.config.response_timeout = timeout;
        self.config.response_attempts = attempts;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn chunk_size(mut self, size: u32) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn flash_ver(mut self, flash_ver: impl Into<String>) -> Self {
        self.config.flash_ver = flash_ver.into();
        self
    }

    pub fn connect_type(mut self, connect_type: impl Into<String>) -> Self {
        self.config.connect_type = connect_type.into();
        self
    }

    /// Add a key to the connect command object
    pub fn connect_property(mut self, key: impl Into<String>, value: Amf0Value) -> Self {
        self.config.connect_extra.insert(key, value);
        self
    }

    pub fn step_delay(mut self, delay: Duration) -> Self {
        self.config.step_delay = delay;
        self
    }

    pub fn await_publish_status(mut self, enabled: bool) -> Self {
        self.config.await_publish_status = enabled;
        self
    }

    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.config.media.frame_interval = interval;
        self
    }

    pub fn metadata_settle(mut self, delay: Duration) -> Self {
        self.config.media.metadata_settle = delay;
        self
    }

    pub fn media(mut self, media: MediaConfig) -> Self {
        self.config.media = media;
        self
    }

    /// Build configuration
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
