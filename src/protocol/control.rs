use crate::protocol::constants::*;
use crate::{ByteBuffer, Error, Result, RtmpHeader, RtmpPacket};

/// Limit type carried by SetPeerBandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandwidthLimit {
    Hard,
    Soft,
    Dynamic,
    Unknown(u8),
}

impl From<u8> for BandwidthLimit {
    fn from(value: u8) -> Self {
        match value {
            0 => BandwidthLimit::Hard,
            1 => BandwidthLimit::Soft,
            2 => BandwidthLimit::Dynamic,
            other => BandwidthLimit::Unknown(other),
        }
    }
}

/// Protocol control messages the client understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    SetChunkSize(u32),
    Acknowledgement(u32),
    WindowAckSize(u32),
    SetPeerBandwidth { size: u32, limit: BandwidthLimit },
}

impl ControlMessage {
    /// Parse a control message; `None` for message types that aren't control
    pub fn parse(packet: &RtmpPacket) -> Result<Option<Self>> {
        let mut buffer = ByteBuffer::from_slice(&packet.payload);
        let short = |what: &str| Error::protocol(format!("Truncated {} payload", what));

        let message = match packet.message_type() {
            MSG_TYPE_SET_CHUNK_SIZE => {
                // High bit is reserved
                let size = buffer.read_u32_be().map_err(|_| short("SetChunkSize"))? & 0x7FFF_FFFF;
                ControlMessage::SetChunkSize(size)
            }
            MSG_TYPE_ACK => {
                ControlMessage::Acknowledgement(buffer.read_u32_be().map_err(|_| short("Acknowledgement"))?)
            }
            MSG_TYPE_WINDOW_ACK => {
                ControlMessage::WindowAckSize(buffer.read_u32_be().map_err(|_| short("WindowAckSize"))?)
            }
            MSG_TYPE_SET_PEER_BW => {
                let size = buffer.read_u32_be().map_err(|_| short("SetPeerBandwidth"))?;
                let limit = buffer.read_u8().map(BandwidthLimit::from).unwrap_or(BandwidthLimit::Dynamic);
                ControlMessage::SetPeerBandwidth { size, limit }
            }
            _ => return Ok(None),
        };
        Ok(Some(message))
    }
}

/// SetChunkSize announcing our outbound chunk size (chunk stream 2, stream 0)
pub fn set_chunk_size_packet(chunk_size: u32) -> RtmpPacket {
    let payload = (chunk_size & 0x7FFF_FFFF).to_be_bytes().to_vec();
    RtmpPacket::new(RtmpHeader::control(MSG_TYPE_SET_CHUNK_SIZE, 4), payload)
}

pub fn window_ack_size_packet(size: u32) -> RtmpPacket {
    RtmpPacket::new(RtmpHeader::control(MSG_TYPE_WINDOW_ACK, 4), size.to_be_bytes().to_vec())
}

pub fn set_peer_bandwidth_packet(size: u32, limit: u8) -> RtmpPacket {
    let mut payload = size.to_be_bytes().to_vec();
    payload.push(limit);
    RtmpPacket::new(RtmpHeader::control(MSG_TYPE_SET_PEER_BW, 5), payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_chunk_size_round_trip() {
        let packet = set_chunk_size_packet(4096);
        assert_eq!(packet.chunk_stream_id(), CHUNK_STREAM_PROTOCOL);
        assert_eq!(packet.message_stream_id(), 0);
        assert_eq!(packet.payload, vec![0x00, 0x00, 0x10, 0x00]);
        assert_eq!(
            ControlMessage::parse(&packet).unwrap(),
            Some(ControlMessage::SetChunkSize(4096))
        );
    }

    #[test]
    fn test_set_chunk_size_masks_reserved_bit() {
        let mut packet = set_chunk_size_packet(0);
        packet.payload = vec![0x80, 0x00, 0x01, 0x00];
        assert_eq!(
            ControlMessage::parse(&packet).unwrap(),
            Some(ControlMessage::SetChunkSize(256))
        );
    }

    #[test]
    fn test_peer_bandwidth() {
        let packet = set_peer_bandwidth_packet(2_500_000, 2);
        assert_eq!(
            ControlMessage::parse(&packet).unwrap(),
            Some(ControlMessage::SetPeerBandwidth { size: 2_500_000, limit: BandwidthLimit::Dynamic })
        );
    }

    #[test]
    fn test_non_control_and_truncated() {
        let packet = crate::make_audio_packet(vec![0xAF], 0, 1);
        assert_eq!(ControlMessage::parse(&packet).unwrap(), None);

        let mut packet = window_ack_size_packet(1);
        packet.payload.truncate(2);
        assert!(ControlMessage::parse(&packet).is_err());
    }
}
