// Scripted RTMP peer for integration tests
//
// Plays the server side of a publish session using the crate's own framer
// and AMF0 codec, over any byte stream (in-memory duplex or loopback TCP).

#![allow(dead_code)]

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use rtmp_publish::{
    set_chunk_size_packet, set_peer_bandwidth_packet, window_ack_size_packet, Amf0Object,
    Amf0Value, ChunkFormat, ChunkReader, ChunkWriter, ClientConfig, ControlMessage, RtmpCommand,
    RtmpHeader, RtmpPacket, C0C1, C2, HANDSHAKE_SIZE, S0S1S2,
};

/// Chunk size the peer announces before answering connect
pub const PEER_CHUNK_SIZE: u32 = 4096;

/// Config with short waits and no pauses
pub fn quick_config() -> ClientConfig {
    ClientConfig::builder()
        .connect_timeout(Duration::from_secs(2))
        .handshake_timeout(Duration::from_secs(2))
        .response_wait(Duration::from_millis(50), 8)
        .write_timeout(Duration::from_millis(250))
        .step_delay(Duration::ZERO)
        .frame_interval(Duration::from_millis(10))
        .metadata_settle(Duration::from_millis(1))
        .build()
        .expect("test config is valid")
}

/// What the peer saw of the publish command
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    pub name: String,
    pub publish_type: String,
    pub message_stream_id: u32,
}

pub struct ScriptedPeer<S> {
    stream: S,
    reader: ChunkReader,
    writer: ChunkWriter,
    inbound: Vec<u8>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ScriptedPeer<S> {
    pub fn new(stream: S) -> Self {
        ScriptedPeer {
            stream,
            reader: ChunkReader::new(),
            writer: ChunkWriter::new(),
            inbound: Vec::new(),
        }
    }

    /// Server side of the simple handshake; checks that C2 echoes S1
    pub async fn accept_handshake(&mut self) {
        let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
        self.stream.read_exact(&mut c0c1).await.unwrap();
        let c0c1 = C0C1::parse(&c0c1).unwrap();
        assert_eq!(c0c1.version, 3);

        let response = S0S1S2::generate(&c0c1).unwrap();
        self.stream.write_all(&response.encode()).await.unwrap();

        let mut c2 = vec![0u8; HANDSHAKE_SIZE];
        self.stream.read_exact(&mut c2).await.unwrap();
        C2::parse(&c2).unwrap().validate(&response).unwrap();
    }

    /// Answer C0+C1 with the wrong version byte
    pub async fn reject_handshake(&mut self) {
        let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
        self.stream.read_exact(&mut c0c1).await.unwrap();
        self.stream.write_all(&[6u8; 1 + 2 * HANDSHAKE_SIZE]).await.unwrap();
    }

    /// Next message from the client; follows its SetChunkSize
    pub async fn read_packet(&mut self) -> rtmp_publish::Result<RtmpPacket> {
        let packet = self.reader.read_packet(&mut self.stream, &mut self.inbound).await?;
        if let Ok(Some(ControlMessage::SetChunkSize(size))) = ControlMessage::parse(&packet) {
            self.reader.set_chunk_size(size as usize);
        }
        Ok(packet)
    }

    /// Next command message, skipping everything else
    pub async fn read_command(&mut self) -> (RtmpCommand, RtmpHeader) {
        loop {
            let packet = self.read_packet().await.unwrap();
            if packet.is_command() {
                return (RtmpCommand::decode(&packet.payload).unwrap(), packet.header);
            }
        }
    }

    pub async fn send(&mut self, packet: &RtmpPacket) {
        let bytes = self.writer.encode(ChunkFormat::Full, packet).unwrap();
        self.stream.write_all(&bytes).await.unwrap();
    }

    pub async fn send_command(&mut self, stream_id: u32, command: &RtmpCommand) {
        let packet = RtmpPacket::new(RtmpHeader::command(0, 0, stream_id), command.encode().unwrap());
        self.send(&packet).await;
    }

    /// Window/bandwidth/chunk size announcements, then `_result` 1
    pub async fn answer_connect(&mut self) -> RtmpCommand {
        let (connect, _) = self.read_command().await;
        assert_eq!(connect.name, "connect");

        self.send(&window_ack_size_packet(2_500_000)).await;
        self.send(&set_peer_bandwidth_packet(2_500_000, 2)).await;
        self.send(&set_chunk_size_packet(PEER_CHUNK_SIZE)).await;
        self.writer.set_chunk_size(PEER_CHUNK_SIZE as usize);

        let properties = Amf0Object::new()
            .with("fmsVer", Amf0Value::from("FMS/3,0,1,123"))
            .with("capabilities", Amf0Value::from(31.0));
        let info = Amf0Object::new()
            .with("level", Amf0Value::from("status"))
            .with("code", Amf0Value::from("NetConnection.Connect.Success"))
            .with("description", Amf0Value::from("Connection succeeded."));
        self.send_command(0, &RtmpCommand::result(1.0, Amf0Value::Object(properties), Amf0Value::Object(info)))
            .await;
        connect
    }

    pub async fn answer_release_stream(&mut self) -> RtmpCommand {
        let (release, _) = self.read_command().await;
        assert_eq!(release.name, "releaseStream");
        self.send_command(0, &RtmpCommand::result(2.0, Amf0Value::Null, Amf0Value::Undefined))
            .await;
        release
    }

    /// Read FCPublish, createStream and `_checkbw`. With a stream id, answer
    /// transactions 2, 3 and 5 (each carrying a decoy number) before 4.
    pub async fn answer_create_stream(&mut self, stream_id: Option<u32>) -> Vec<RtmpCommand> {
        let mut batch = Vec::new();
        for expected in ["FCPublish", "createStream", "_checkbw"] {
            let (command, _) = self.read_command().await;
            assert_eq!(command.name, expected);
            batch.push(command);
        }

        if let Some(stream_id) = stream_id {
            for (tid, decoy) in [(2.0, 55.0), (3.0, 99.0), (5.0, 77.0)] {
                self.send_command(0, &RtmpCommand::result(tid, Amf0Value::Null, Amf0Value::Number(decoy)))
                    .await;
            }
            self.send_command(0, &RtmpCommand::result(4.0, Amf0Value::Null, Amf0Value::Number(stream_id as f64)))
                .await;
        }
        batch
    }

    /// Read `publish` and (optionally) confirm it with onStatus
    pub async fn answer_publish(&mut self, confirm: bool) -> PublishRequest {
        let (publish, header) = self.read_command().await;
        assert_eq!(publish.name, "publish");
        assert_eq!(publish.transaction_id, 5.0);

        let argument = |index: usize| {
            publish.arguments.get(index).and_then(|v| v.as_string()).unwrap_or_default().to_string()
        };
        let request = PublishRequest {
            name: argument(0),
            publish_type: argument(1),
            message_stream_id: header.message_stream_id,
        };

        if confirm {
            let status = RtmpCommand::on_status(
                "status",
                "NetStream.Publish.Start",
                &format!("{} is now published.", request.name),
            );
            self.send_command(request.message_stream_id, &status).await;
        }
        request
    }

    /// Handshake plus the whole command exchange
    pub async fn serve_publish(&mut self, stream_id: Option<u32>) -> PublishRequest {
        self.accept_handshake().await;
        self.answer_connect().await;
        self.answer_release_stream().await;
        self.answer_create_stream(stream_id).await;
        self.answer_publish(true).await
    }

    /// Everything the client sends until it closes the connection
    pub async fn drain(&mut self) -> Vec<RtmpPacket> {
        let mut packets = Vec::new();
        while let Ok(packet) = self.read_packet().await {
            packets.push(packet);
        }
        packets
    }
}

/// Timestamps of the packets with `message_type`, in arrival order
pub fn timestamps(packets: &[RtmpPacket], message_type: u8) -> Vec<u32> {
    packets
        .iter()
        .filter(|p| p.message_type() == message_type)
        .map(|p| p.timestamp())
        .collect()
}
