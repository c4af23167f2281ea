use crate::{Error, Result};
use crate::amf::{Amf0Decoder, Amf0Encoder, Amf0Object, Amf0Value};
use crate::ByteBuffer;

pub const DATA_ON_METADATA: &str = "onMetaData";

/// AMF0 data message: a type name followed by values
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpData {
    pub data_type: String,
    pub values: Vec<Amf0Value>,
}

/// Stream description announced in `onMetaData`.
///
/// Nothing is actually encoded; these are the values advertised to the
/// ingest server for the synthetic frames.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMetadata {
    pub duration: f64,
    pub file_size: f64,
    pub width: f64,
    pub height: f64,
    pub video_codec_id: f64,
    pub frame_rate: f64,
    pub video_data_rate: f64,
    pub audio_data_rate: f64,
    pub audio_sample_rate: f64,
    pub audio_sample_size: f64,
    pub audio_codec_id: f64,
}

impl Default for StreamMetadata {
    fn default() -> Self {
        StreamMetadata {
            duration: 0.0,
            file_size: 0.0,
            width: 1280.0,
            height: 720.0,
            video_codec_id: 7.0,    // AVC
            frame_rate: 30.0,
            video_data_rate: 1000.0,
            audio_data_rate: 128.0,
            audio_sample_rate: 44100.0,
            audio_sample_size: 16.0,
            audio_codec_id: 10.0,   // AAC
        }
    }
}

impl StreamMetadata {
    /// Properties in the order they go on the wire
    pub fn to_ecma_array(&self) -> Amf0Value {
        Amf0Value::EcmaArray(
            Amf0Object::new()
                .with("duration", self.duration.into())
                .with("fileSize", self.file_size.into())
                .with("width", self.width.into())
                .with("height", self.height.into())
                .with("videocodecid", self.video_codec_id.into())
                .with("framerate", self.frame_rate.into())
                .with("videodatarate", self.video_data_rate.into())
                .with("audiodatarate", self.audio_data_rate.into())
                .with("audiosamplerate", self.audio_sample_rate.into())
                .with("audiosamplesize", self.audio_sample_size.into())
                .with("audiocodecid", self.audio_codec_id.into()),
        )
    }
}

impl RtmpData {
    /// Create new data message
    pub fn new(data_type: impl Into<String>) -> Self {
        RtmpData {
            data_type: data_type.into(),
            values: Vec::new(),
        }
    }

    /// Create onMetaData message
    pub fn on_metadata(metadata: &StreamMetadata) -> Self {
        let mut data = RtmpData::new(DATA_ON_METADATA);
        data.values.push(metadata.to_ecma_array());
        data
    }

    /// Encode data message to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut encoder = Amf0Encoder::new();
        encoder.encode(&Amf0Value::String(self.data_type.clone()))?;
        encoder.encode_all(&self.values)?;
        Ok(encoder.into_bytes())
    }

    /// Decode data message from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buffer = ByteBuffer::from_slice(data);
        let mut decoder = Amf0Decoder::new(&mut buffer);

        let type_val = decoder.decode()?;
        let data_type = type_val.as_string()
            .ok_or_else(|| Error::amf_decode("Data type must be string"))?
            .to_string();

        let values = decoder.decode_all()?;

        Ok(RtmpData {
            data_type,
            values,
        })
    }

    /// Get metadata object if this is onMetaData
    pub fn get_metadata(&self) -> Option<&Amf0Object> {
        if self.data_type == DATA_ON_METADATA {
            self.values.first().and_then(|v| v.as_object())
        } else {
            None
        }
    }
}
