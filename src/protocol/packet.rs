use crate::protocol::constants::*;

/// One complete RTMP message plus the chunk stream it travels on
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpPacket {
    pub header: RtmpHeader,
    pub payload: Vec<u8>,
}

impl RtmpPacket {
    /// Create new packet; the header length is taken from the payload
    pub fn new(mut header: RtmpHeader, payload: Vec<u8>) -> Self {
        header.message_length = payload.len() as u32;
        RtmpPacket { header, payload }
    }

    /// Get message type
    pub fn message_type(&self) -> u8 {
        self.header.message_type
    }

    /// Get message stream ID
    pub fn message_stream_id(&self) -> u32 {
        self.header.message_stream_id
    }

    /// Get chunk stream ID
    pub fn chunk_stream_id(&self) -> u32 {
        self.header.chunk_stream_id
    }

    /// Get timestamp
    pub fn timestamp(&self) -> u32 {
        self.header.timestamp
    }

    pub fn is_audio(&self) -> bool {
        self.header.message_type == MSG_TYPE_AUDIO
    }

    pub fn is_video(&self) -> bool {
        self.header.message_type == MSG_TYPE_VIDEO
    }

    pub fn is_command(&self) -> bool {
        self.header.message_type == MSG_TYPE_COMMAND_AMF0
    }

    pub fn is_data(&self) -> bool {
        self.header.message_type == MSG_TYPE_DATA_AMF0
    }

    /// Check if this is a protocol control message
    pub fn is_control(&self) -> bool {
        matches!(self.header.message_type,
            MSG_TYPE_SET_CHUNK_SIZE |
            MSG_TYPE_ACK |
            MSG_TYPE_WINDOW_ACK |
            MSG_TYPE_SET_PEER_BW)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtmpHeader {
    pub timestamp: u32,
    pub message_length: u32,
    pub message_type: u8,
    pub message_stream_id: u32,
    pub chunk_stream_id: u32,
}

impl RtmpHeader {
    pub fn new(
        timestamp: u32,
        message_length: u32,
        message_type: u8,
        message_stream_id: u32,
        chunk_stream_id: u32,
    ) -> Self {
        RtmpHeader {
            timestamp,
            message_length,
            message_type,
            message_stream_id,
            chunk_stream_id,
        }
    }

    /// Create header for audio message
    pub fn audio(timestamp: u32, length: u32, stream_id: u32) -> Self {
        RtmpHeader::new(timestamp, length, MSG_TYPE_AUDIO, stream_id, CHUNK_STREAM_AUDIO)
    }

    /// Create header for video message
    pub fn video(timestamp: u32, length: u32, stream_id: u32) -> Self {
        RtmpHeader::new(timestamp, length, MSG_TYPE_VIDEO, stream_id, CHUNK_STREAM_VIDEO)
    }

    /// Create header for command message
    pub fn command(timestamp: u32, length: u32, stream_id: u32) -> Self {
        RtmpHeader::new(timestamp, length, MSG_TYPE_COMMAND_AMF0, stream_id, CHUNK_STREAM_COMMAND)
    }

    /// Create header for data message (shares the command chunk stream)
    pub fn data(timestamp: u32, length: u32, stream_id: u32) -> Self {
        RtmpHeader::new(timestamp, length, MSG_TYPE_DATA_AMF0, stream_id, CHUNK_STREAM_COMMAND)
    }

    /// Create header for a protocol control message
    pub fn control(message_type: u8, length: u32) -> Self {
        RtmpHeader::new(0, length, message_type, 0, CHUNK_STREAM_PROTOCOL)
    }
}

/// Clamp a timestamp or delta to the 3-byte field.
// TODO: write the 4-byte extended timestamp after the message header instead of clamping
pub fn wire_timestamp(value: u32) -> u32 {
    value.min(TIMESTAMP_SENTINEL)
}

pub fn make_audio_packet(data: Vec<u8>, timestamp: u32, stream_id: u32) -> RtmpPacket {
    let header = RtmpHeader::audio(timestamp, data.len() as u32, stream_id);
    RtmpPacket::new(header, data)
}

pub fn make_video_packet(data: Vec<u8>, timestamp: u32, stream_id: u32) -> RtmpPacket {
    let header = RtmpHeader::video(timestamp, data.len() as u32, stream_id);
    RtmpPacket::new(header, data)
}
