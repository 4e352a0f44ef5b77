use crate::amf::{Amf0Decoder, Amf0Encoder, Amf0Object, Amf0Value};
use crate::protocol::constants::*;
use crate::utils::ByteBuffer;
use crate::{Error, Result};

/// An AMF0 command message: name, transaction id and the ordered argument
/// values that follow them on the wire (the first argument is the command
/// object, Null for stream-level commands).
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpCommand {
    pub name: String,
    pub transaction_id: f64,
    pub arguments: Vec<Amf0Value>,
}

/// Application metadata sent with the `connect` command
#[derive(Debug, Clone)]
pub struct ConnectInfo {
    pub app: String,
    pub flash_version: String,
    pub swf_url: String,
    pub tc_url: String,
    pub page_url: String,
}

impl RtmpCommand {
    /// Create new command
    pub fn new(name: impl Into<String>, transaction_id: f64) -> Self {
        RtmpCommand {
            name: name.into(),
            transaction_id,
            arguments: Vec::new(),
        }
    }

    /// Create connect command with the standard application metadata object
    pub fn connect(transaction_id: f64, info: &ConnectInfo) -> Self {
        let mut cmd = RtmpCommand::new("connect", transaction_id);

        let mut obj = Amf0Object::new();
        obj.set("app", Amf0Value::String(info.app.clone()));
        obj.set("flashVer", Amf0Value::String(info.flash_version.clone()));
        obj.set("swfUrl", Amf0Value::String(info.swf_url.clone()));
        obj.set("tcUrl", Amf0Value::String(info.tc_url.clone()));
        obj.set("fpad", Amf0Value::Boolean(false));
        obj.set("capabilities", Amf0Value::Number(CAPABILITIES));
        obj.set("audioCodecs", Amf0Value::Number(AUDIO_CODECS));
        obj.set("videoCodecs", Amf0Value::Number(VIDEO_CODECS));
        obj.set("videoFunction", Amf0Value::Number(VIDEO_FUNCTION));
        obj.set("pageUrl", Amf0Value::String(info.page_url.clone()));

        cmd.arguments.push(Amf0Value::Object(obj));
        cmd
    }

    /// Create createStream command
    pub fn create_stream(transaction_id: f64) -> Self {
        let mut cmd = RtmpCommand::new("createStream", transaction_id);
        cmd.arguments.push(Amf0Value::Null);
        cmd
    }

    /// Create play command for a stream name
    pub fn play(transaction_id: f64, stream_name: &str) -> Self {
        let mut cmd = RtmpCommand::new("play", transaction_id);
        cmd.arguments.push(Amf0Value::Null);
        cmd.arguments.push(Amf0Value::String(stream_name.to_string()));
        cmd.arguments.push(Amf0Value::Number(PLAY_START_LIVE));
        cmd.arguments.push(Amf0Value::Number(PLAY_DURATION_UNTIL_END));
        cmd
    }

    /// Create pause command; `pause` toggles between pausing and resuming
    /// at the given stream position (milliseconds)
    pub fn pause(pause: bool, timestamp_ms: u32) -> Self {
        let mut cmd = RtmpCommand::new("pause", 0.0);
        cmd.arguments.push(Amf0Value::Null);
        cmd.arguments.push(Amf0Value::Boolean(pause));
        cmd.arguments.push(Amf0Value::Number(timestamp_ms as f64));
        cmd
    }

    /// Create closeStream command
    pub fn close_stream() -> Self {
        let mut cmd = RtmpCommand::new("closeStream", 0.0);
        cmd.arguments.push(Amf0Value::Null);
        cmd
    }

    /// Check if this is a `_result` response from the server
    pub fn is_result(&self) -> bool {
        self.name == "_result"
    }

    /// Encode command to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut encoder = Amf0Encoder::new();
        encoder.encode(&Amf0Value::String(self.name.clone()))?;
        encoder.encode(&Amf0Value::Number(self.transaction_id))?;
        for arg in &self.arguments {
            encoder.encode(arg)?;
        }
        Ok(encoder.get_bytes())
    }

    /// Decode command from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buffer = ByteBuffer::new(data.to_vec());
        let mut decoder = Amf0Decoder::new(&mut buffer);

        let name = decoder
            .decode()?
            .as_string()
            .ok_or_else(|| Error::amf_decode("Command name must be a string"))?
            .to_string();

        let transaction_id = decoder
            .decode()?
            .as_number()
            .ok_or_else(|| Error::amf_decode("Transaction ID must be a number"))?;

        let mut arguments = Vec::new();
        while decoder.has_remaining() {
            arguments.push(decoder.decode()?);
        }

        Ok(RtmpCommand {
            name,
            transaction_id,
            arguments,
        })
    }
}
