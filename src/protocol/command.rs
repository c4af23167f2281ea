use crate::{Error, Result};
use crate::amf::{Amf0Decoder, Amf0Encoder, Amf0Object, Amf0Value};
use crate::protocol::constants::*;
use crate::ByteBuffer;

pub const CMD_CONNECT: &str = "connect";
pub const CMD_RELEASE_STREAM: &str = "releaseStream";
pub const CMD_FC_PUBLISH: &str = "FCPublish";
pub const CMD_CREATE_STREAM: &str = "createStream";
pub const CMD_CHECK_BW: &str = "_checkbw";
pub const CMD_PUBLISH: &str = "publish";
pub const CMD_RESULT: &str = "_result";
pub const CMD_ERROR: &str = "_error";
pub const CMD_ON_STATUS: &str = "onStatus";
pub const CMD_ON_FC_PUBLISH: &str = "onFCPublish";

/// Fields of the `connect` command object that come from configuration
#[derive(Debug, Clone)]
pub struct ConnectParams<'a> {
    pub app: &'a str,
    pub tc_url: &'a str,
    pub flash_ver: &'a str,
    pub connect_type: &'a str,
    /// Appended after the fixed keys; a colliding key overrides in place
    pub extra: &'a Amf0Object,
}

/// `level` / `code` / `description` of an info object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusInfo {
    pub level: String,
    pub code: String,
    pub description: String,
}

impl StatusInfo {
    pub fn is_error(&self) -> bool {
        self.level.eq_ignore_ascii_case("error")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RtmpCommand {
    pub name: String,
    pub transaction_id: f64,
    pub command_object: Option<Amf0Value>,
    pub arguments: Vec<Amf0Value>,
}

impl RtmpCommand {
    /// Create new command
    pub fn new(name: impl Into<String>, transaction_id: f64) -> Self {
        RtmpCommand {
            name: name.into(),
            transaction_id,
            command_object: None,
            arguments: Vec::new(),
        }
    }

    /// Command with a Null command object followed by `arguments`
    fn with_null_object(name: &str, transaction_id: f64, arguments: Vec<Amf0Value>) -> Self {
        RtmpCommand {
            name: name.to_string(),
            transaction_id,
            command_object: Some(Amf0Value::Null),
            arguments,
        }
    }

    /// Create connect command.
    ///
    /// Keys are written as app, type, flashVer, swfUrl, tcUrl, then any
    /// extra keys in their own order. Ingest servers are known to be picky
    /// about this layout.
    pub fn connect(params: &ConnectParams<'_>) -> Self {
        let mut obj = Amf0Object::new()
            .with("app", params.app.into())
            .with("type", params.connect_type.into())
            .with("flashVer", params.flash_ver.into())
            .with("swfUrl", params.tc_url.into())
            .with("tcUrl", params.tc_url.into());
        for (key, value) in params.extra.iter() {
            obj.insert(key, value.clone());
        }

        let mut cmd = RtmpCommand::new(CMD_CONNECT, TID_CONNECT);
        cmd.command_object = Some(Amf0Value::Object(obj));
        cmd
    }

    pub fn release_stream(stream_name: &str) -> Self {
        Self::with_null_object(CMD_RELEASE_STREAM, TID_RELEASE_STREAM, vec![stream_name.into()])
    }

    pub fn fc_publish(stream_name: &str) -> Self {
        Self::with_null_object(CMD_FC_PUBLISH, TID_FC_PUBLISH, vec![stream_name.into()])
    }

    pub fn create_stream() -> Self {
        Self::with_null_object(CMD_CREATE_STREAM, TID_CREATE_STREAM, Vec::new())
    }

    pub fn check_bw() -> Self {
        Self::with_null_object(CMD_CHECK_BW, TID_CHECK_BW, Vec::new())
    }

    /// Create publish command
    pub fn publish(stream_name: &str, publish_type: &str) -> Self {
        Self::with_null_object(
            CMD_PUBLISH,
            TID_PUBLISH,
            vec![stream_name.into(), publish_type.into()],
        )
    }

    /// Create result response
    pub fn result(transaction_id: f64, properties: Amf0Value, result: Amf0Value) -> Self {
        let mut cmd = RtmpCommand::new(CMD_RESULT, transaction_id);
        cmd.command_object = Some(properties);
        cmd.arguments.push(result);
        cmd
    }

    /// Create error response
    pub fn error(transaction_id: f64, error_obj: Amf0Value) -> Self {
        Self::with_null_object(CMD_ERROR, transaction_id, vec![error_obj])
    }

    /// Create onStatus response
    pub fn on_status(level: &str, code: &str, description: &str) -> Self {
        let info = Amf0Object::new()
            .with("level", level.into())
            .with("code", code.into())
            .with("description", description.into());
        Self::with_null_object(CMD_ON_STATUS, 0.0, vec![Amf0Value::Object(info)])
    }

    pub fn is_result(&self) -> bool {
        self.name == CMD_RESULT
    }

    pub fn is_error(&self) -> bool {
        self.name == CMD_ERROR
    }

    pub fn is_on_status(&self) -> bool {
        self.name == CMD_ON_STATUS
    }

    /// Compare transaction ids with a small tolerance
    pub fn has_transaction_id(&self, transaction_id: f64) -> bool {
        (self.transaction_id - transaction_id).abs() < TID_EPSILON
    }

    /// Everything after the transaction id, in wire order
    pub fn values(&self) -> impl Iterator<Item = &Amf0Value> {
        self.command_object.iter().chain(self.arguments.iter())
    }

    /// Stream id carried by a createStream `_result`.
    ///
    /// Leading Null/Undefined values are skipped; the first other value must
    /// be a Number.
    pub fn stream_id(&self) -> Option<f64> {
        self.values()
            .find(|value| !value.is_null())
            .and_then(|value| value.as_number())
    }

    /// First info object in the command (onStatus, `_error`, `_result`)
    pub fn status_info(&self) -> Option<StatusInfo> {
        let info = self
            .arguments
            .iter()
            .chain(self.command_object.iter())
            .find_map(|value| match value {
                Amf0Value::Object(obj) if obj.contains_key("code") || obj.contains_key("level") => {
                    Some(obj)
                }
                _ => None,
            })?;

        let field = |key: &str| {
            info.get(key)
                .and_then(|v| v.as_string())
                .unwrap_or_default()
                .to_string()
        };
        Some(StatusInfo {
            level: field("level"),
            code: field("code"),
            description: field("description"),
        })
    }

    /// Encode command to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut encoder = Amf0Encoder::new();

        encoder.encode(&Amf0Value::String(self.name.clone()))?;
        encoder.encode(&Amf0Value::Number(self.transaction_id))?;

        if let Some(ref obj) = self.command_object {
            encoder.encode(obj)?;
        } else {
            encoder.encode(&Amf0Value::Null)?;
        }

        encoder.encode_all(&self.arguments)?;

        Ok(encoder.into_bytes())
    }

    /// Decode command from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buffer = ByteBuffer::from_slice(data);
        let mut decoder = Amf0Decoder::new(&mut buffer);

        let name_val = decoder.decode()?;
        let name = name_val.as_string()
            .ok_or_else(|| Error::amf_decode("Command name must be string"))?
            .to_string();

        // Some peers end a notification right after the name
        let transaction_id = if decoder.has_remaining() {
            decoder.decode()?
                .as_number()
                .ok_or_else(|| Error::amf_decode("Transaction ID must be number"))?
        } else {
            0.0
        };

        let command_object = if decoder.has_remaining() {
            Some(decoder.decode()?)
        } else {
            None
        };

        let arguments = decoder.decode_all()?;

        Ok(RtmpCommand {
            name,
            transaction_id,
            command_object,
            arguments,
        })
    }
}
