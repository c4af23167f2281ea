use crate::{ByteBuffer, Error, Result};
use crate::handshake::c0c1::{C0C1, HANDSHAKE_SIZE, RTMP_VERSION};
use crate::utils::{generate_random_bytes, handshake_timestamp};

/// Server handshake (S0 + S1 + S2), kept as raw blocks.
///
/// The client never interprets S1 or S2: S1 is echoed back as C2 and S2
/// is only read to keep the stream aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct S0S1S2 {
    /// RTMP version (S0)
    pub version: u8,

    pub s1: Vec<u8>,

    pub s2: Vec<u8>,
}

impl S0S1S2 {
    /// Generate a simple-handshake answer to `c0c1` (S2 echoes C1)
    pub fn generate(c0c1: &C0C1) -> Result<Self> {
        let mut s1 = ByteBuffer::with_capacity(HANDSHAKE_SIZE);
        s1.write_u32_be(handshake_timestamp())?;
        s1.write_u32_be(0)?;
        s1.write_bytes(&generate_random_bytes(HANDSHAKE_SIZE - 8))?;

        Ok(S0S1S2 {
            version: RTMP_VERSION,
            s1: s1.into_vec(),
            s2: c0c1.c1_bytes()?,
        })
    }

    /// Encode to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(1 + HANDSHAKE_SIZE * 2);
        result.push(self.version);
        result.extend_from_slice(&self.s1);
        result.extend_from_slice(&self.s2);
        result
    }

    /// Parse S0+S1+S2 from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 1 + HANDSHAKE_SIZE * 2 {
            return Err(Error::handshake(format!(
                "S0+S1+S2 too short: {} bytes",
                data.len()
            )));
        }

        Ok(S0S1S2 {
            version: data[0],
            s1: data[1..1 + HANDSHAKE_SIZE].to_vec(),
            s2: data[1 + HANDSHAKE_SIZE..1 + HANDSHAKE_SIZE * 2].to_vec(),
        })
    }
}

/// C2 packet for completing handshake
#[derive(Debug, Clone, PartialEq)]
pub struct C2 {
    pub data: Vec<u8>,
}

impl C2 {
    /// C2 is S1 echoed verbatim
    pub fn echo_s1(s1: &[u8]) -> Self {
        C2 { data: s1.to_vec() }
    }

    /// Parse C2 from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HANDSHAKE_SIZE {
            return Err(Error::handshake(format!(
                "C2 too short: {} bytes",
                data.len()
            )));
        }
        Ok(C2 { data: data[..HANDSHAKE_SIZE].to_vec() })
    }

    /// Check that C2 echoes S1
    pub fn validate(&self, s0s1s2: &S0S1S2) -> Result<()> {
        if self.data != s0s1s2.s1 {
            return Err(Error::handshake("C2 does not echo S1"));
        }
        Ok(())
    }

    pub fn encode(&self) -> Vec<u8> {
        self.data.clone()
    }
}
