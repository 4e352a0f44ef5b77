use crate::amf::amf0::{Amf0Object, Amf0Value, markers};
use crate::utils::ByteBuffer;
use crate::{Error, Result};

pub struct Amf0Decoder<'a> {
    buffer: &'a mut ByteBuffer,
}

impl<'a> Amf0Decoder<'a> {
    pub fn new(buffer: &'a mut ByteBuffer) -> Self {
        Amf0Decoder { buffer }
    }

    /// Check if decoder has remaining data to decode
    pub fn has_remaining(&self) -> bool {
        self.buffer.remaining() > 0
    }

    pub fn decode(&mut self) -> Result<Amf0Value> {
        let marker = self.buffer.read_u8()?;
        match marker {
            markers::NUMBER => self.decode_number(),
            markers::BOOLEAN => self.decode_boolean(),
            markers::STRING => self.decode_string(),
            markers::OBJECT => Ok(Amf0Value::Object(self.decode_properties()?)),
            markers::NULL => Ok(Amf0Value::Null),
            markers::UNDEFINED => Ok(Amf0Value::Undefined),
            markers::ECMA_ARRAY => self.decode_ecma_array(),
            _ => Err(Error::amf_decode(format!("Unknown AMF0 marker: 0x{:02x}", marker))),
        }
    }

    fn decode_number(&mut self) -> Result<Amf0Value> {
        let value = self.buffer.read_f64_be()?;
        Ok(Amf0Value::Number(value))
    }

    fn decode_boolean(&mut self) -> Result<Amf0Value> {
        let value = self.buffer.read_u8()? != 0;
        Ok(Amf0Value::Boolean(value))
    }

    fn decode_string(&mut self) -> Result<Amf0Value> {
        Ok(Amf0Value::String(self.read_string_no_marker()?))
    }

    fn decode_ecma_array(&mut self) -> Result<Amf0Value> {
        let _count = self.buffer.read_u32_be()?; // declared size, not trusted
        Ok(Amf0Value::EcmaArray(self.decode_properties()?))
    }

    fn decode_properties(&mut self) -> Result<Amf0Object> {
        let mut object = Amf0Object::new();
        loop {
            let name_len = self.buffer.read_u16_be()? as usize;
            if name_len == 0 {
                let end = self.buffer.read_u8()?;
                if end != markers::OBJECT_END {
                    return Err(Error::amf_decode(format!(
                        "Expected object end marker, got 0x{:02x}",
                        end
                    )));
                }
                break;
            }
            let name = String::from_utf8(self.buffer.read_bytes(name_len)?)
                .map_err(|e| Error::amf_decode(format!("Invalid UTF-8 in property name: {}", e)))?;
            let value = self.decode()?;
            object.set(name, value);
        }
        Ok(object)
    }

    fn read_string_no_marker(&mut self) -> Result<String> {
        let len = self.buffer.read_u16_be()? as usize;
        let bytes = self.buffer.read_bytes(len)?;
        String::from_utf8(bytes)
            .map_err(|e| Error::amf_decode(format!("Invalid UTF-8 in string: {}", e)))
    }
}
