use crate::{ByteBuffer, Error, Result};
use crate::utils::{generate_random_bytes, handshake_timestamp};

/// RTMP version
pub const RTMP_VERSION: u8 = 3;

/// Handshake packet size (C1/S1/C2/S2)
pub const HANDSHAKE_SIZE: usize = 1536;

/// Client handshake (C0 + C1)
#[derive(Debug, Clone, PartialEq)]
pub struct C0C1 {
    /// RTMP version (C0)
    pub version: u8,

    /// Timestamp (C1)
    pub timestamp: u32,

    /// Zero (C1)
    pub zero: u32,

    /// Random filler (C1)
    pub random_data: Vec<u8>,
}

impl C0C1 {
    /// Parse C0+C1 from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 1 + HANDSHAKE_SIZE {
            return Err(Error::handshake(format!(
                "C0+C1 too short: {} bytes, expected {}",
                data.len(),
                1 + HANDSHAKE_SIZE
            )));
        }

        let version = data[0];
        let mut buffer = ByteBuffer::from_slice(&data[1..1 + HANDSHAKE_SIZE]);

        let timestamp = buffer.read_u32_be()?;
        let zero = buffer.read_u32_be()?;
        let random_data = buffer.read_bytes(HANDSHAKE_SIZE - 8)?;

        Ok(C0C1 {
            version,
            timestamp,
            zero,
            random_data,
        })
    }

    /// Create C0+C1 for client
    pub fn create_client() -> Self {
        C0C1 {
            version: RTMP_VERSION,
            timestamp: handshake_timestamp(),
            zero: 0,
            random_data: generate_random_bytes(HANDSHAKE_SIZE - 8),
        }
    }

    /// C1 alone
    pub fn c1_bytes(&self) -> Result<Vec<u8>> {
        let mut c1 = ByteBuffer::with_capacity(HANDSHAKE_SIZE);
        c1.write_u32_be(self.timestamp)?;
        c1.write_u32_be(self.zero)?;
        c1.write_bytes(&self.random_data)?;
        Ok(c1.into_vec())
    }

    /// Encode to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut result = Vec::with_capacity(1 + HANDSHAKE_SIZE);
        result.push(self.version);
        result.extend_from_slice(&self.c1_bytes()?);
        Ok(result)
    }
}
