use std::time::{SystemTime, UNIX_EPOCH};
use chrono::{DateTime, Local};

/// Seconds since the Unix epoch, truncated to the 4-byte handshake field
pub fn handshake_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Wall-clock time stamped on status events
pub fn wall_clock() -> DateTime<Local> {
    Local::now()
}
