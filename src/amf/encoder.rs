use crate::Result;
use crate::amf::amf0::{Amf0Object, Amf0Value, markers};
use crate::utils::ByteBuffer;

pub struct Amf0Encoder {
    buffer: ByteBuffer,
}

impl Amf0Encoder {
    pub fn new() -> Self {
        Amf0Encoder {
            buffer: ByteBuffer::with_capacity(1024),
        }
    }

    pub fn encode(&mut self, value: &Amf0Value) -> Result<()> {
        match value {
            Amf0Value::Number(n) => self.encode_number(*n),
            Amf0Value::Boolean(b) => self.encode_boolean(*b),
            Amf0Value::String(s) => self.encode_string(s),
            Amf0Value::Object(obj) => self.encode_object(obj),
            Amf0Value::Null => self.encode_marker(markers::NULL),
            Amf0Value::Undefined => self.encode_marker(markers::UNDEFINED),
            Amf0Value::EcmaArray(obj) => self.encode_ecma_array(obj),
        }
    }

    fn encode_number(&mut self, value: f64) -> Result<()> {
        self.buffer.write_u8(markers::NUMBER)?;
        self.buffer.write_f64_be(value)?;
        Ok(())
    }

    fn encode_boolean(&mut self, value: bool) -> Result<()> {
        self.buffer.write_u8(markers::BOOLEAN)?;
        self.buffer.write_u8(if value { 1 } else { 0 })?;
        Ok(())
    }

    fn encode_string(&mut self, value: &str) -> Result<()> {
        self.buffer.write_u8(markers::STRING)?;
        self.write_string_no_marker(value)
    }

    fn encode_object(&mut self, obj: &Amf0Object) -> Result<()> {
        self.buffer.write_u8(markers::OBJECT)?;
        self.encode_properties(obj)
    }

    fn encode_ecma_array(&mut self, obj: &Amf0Object) -> Result<()> {
        self.buffer.write_u8(markers::ECMA_ARRAY)?;
        self.buffer.write_u32_be(obj.len() as u32)?;
        self.encode_properties(obj)
    }

    fn encode_properties(&mut self, obj: &Amf0Object) -> Result<()> {
        for (key, value) in obj.iter() {
            self.write_string_no_marker(key)?;
            self.encode(value)?;
        }
        // Empty key followed by the end marker terminates the object
        self.buffer.write_u16_be(0)?;
        self.buffer.write_u8(markers::OBJECT_END)?;
        Ok(())
    }

    fn encode_marker(&mut self, marker: u8) -> Result<()> {
        self.buffer.write_u8(marker)?;
        Ok(())
    }

    /// Helper to write string without type marker (for object keys)
    fn write_string_no_marker(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() > u16::MAX as usize {
            return Err(crate::Error::amf_encode(format!(
                "String too long for AMF0 short string: {} bytes",
                bytes.len()
            )));
        }
        self.buffer.write_u16_be(bytes.len() as u16)?;
        self.buffer.write_bytes(bytes)?;
        Ok(())
    }

    pub fn get_bytes(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }
}

impl Default for Amf0Encoder {
    fn default() -> Self {
        Amf0Encoder::new()
    }
}
