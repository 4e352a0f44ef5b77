use crate::amf::{Amf0Decoder, Amf0Encoder, Amf0Value};
use crate::utils::ByteBuffer;
use crate::{Error, Result};

/// An AMF0 data (notification) message such as `onMetaData`: a type name
/// followed by the values it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpData {
    pub type_name: String,
    pub values: Vec<Amf0Value>,
}

impl RtmpData {
    pub fn new(type_name: impl Into<String>) -> Self {
        RtmpData {
            type_name: type_name.into(),
            values: Vec::new(),
        }
    }

    /// Check if this is a stream metadata notification
    pub fn is_metadata(&self) -> bool {
        self.type_name == "onMetaData"
    }

    /// Encode data message to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut encoder = Amf0Encoder::new();
        encoder.encode(&Amf0Value::String(self.type_name.clone()))?;
        for value in &self.values {
            encoder.encode(value)?;
        }
        Ok(encoder.get_bytes())
    }

    /// Decode data message from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buffer = ByteBuffer::new(data.to_vec());
        let mut decoder = Amf0Decoder::new(&mut buffer);

        let type_name = decoder
            .decode()?
            .as_string()
            .ok_or_else(|| Error::amf_decode("Data type name must be a string"))?
            .to_string();

        let mut values = Vec::new();
        while decoder.has_remaining() {
            values.push(decoder.decode()?);
        }

        Ok(RtmpData { type_name, values })
    }
}
