use crate::amf::amf0::{markers, Amf0Object, Amf0Value};
use crate::{ByteBuffer, Error, Result};
use log::trace;

/// Lossy AMF0 reader over a shared buffer.
///
/// Unknown markers become `Null` instead of failing the whole message, and
/// objects cut short by the end of the buffer return the pairs read so far.
/// Short numbers, short strings and bad UTF-8 are still decode errors.
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
        let marker = self
            .buffer
            .read_u8()
            .map_err(|_| Error::amf_decode("No data left for a type marker"))?;

        match marker {
            markers::NUMBER => self.decode_number(),
            markers::BOOLEAN => self.decode_boolean(),
            markers::STRING => self.decode_string(),
            markers::OBJECT => self.decode_object().map(Amf0Value::Object),
            markers::NULL => Ok(Amf0Value::Null),
            markers::UNDEFINED => Ok(Amf0Value::Undefined),
            markers::ECMA_ARRAY => self.decode_ecma_array(),
            _ => {
                trace!("Skipping unknown AMF0 marker 0x{:02x}", marker);
                self.buffer.skip(1);
                Ok(Amf0Value::Null)
            }
        }
    }

    /// Decode values until the buffer is exhausted
    pub fn decode_all(&mut self) -> Result<Vec<Amf0Value>> {
        let mut values = Vec::new();
        while self.has_remaining() {
            values.push(self.decode()?);
        }
        Ok(values)
    }

    fn decode_number(&mut self) -> Result<Amf0Value> {
        let remaining = self.buffer.remaining();
        let value = self.buffer.read_f64_be().map_err(|_| {
            Error::amf_decode(format!("Number needs 8 bytes, {} left", remaining))
        })?;
        Ok(Amf0Value::Number(value))
    }

    fn decode_boolean(&mut self) -> Result<Amf0Value> {
        let value = self
            .buffer
            .read_u8()
            .map_err(|_| Error::amf_decode("Boolean without a value byte"))?;
        Ok(Amf0Value::Boolean(value != 0))
    }

    fn decode_string(&mut self) -> Result<Amf0Value> {
        let len = self
            .buffer
            .read_u16_be()
            .map_err(|_| Error::amf_decode("String without a length"))? as usize;
        let bytes = self.buffer.read_bytes(len).map_err(|_| {
            Error::amf_decode(format!(
                "String declares {} bytes, {} left",
                len,
                self.buffer.remaining()
            ))
        })?;
        let string = String::from_utf8(bytes)
            .map_err(|e| Error::amf_decode(format!("Invalid UTF-8 in string: {}", e)))?;
        Ok(Amf0Value::String(string))
    }

    fn decode_ecma_array(&mut self) -> Result<Amf0Value> {
        // The count is advisory; pairs run until the terminator
        let _count = self
            .buffer
            .read_u32_be()
            .map_err(|_| Error::amf_decode("ECMA array without a count"))?;
        self.decode_object().map(Amf0Value::EcmaArray)
    }

    fn decode_object(&mut self) -> Result<Amf0Object> {
        let mut object = Amf0Object::new();
        while self.has_remaining() {
            if self.buffer.starts_with(&markers::OBJECT_TERMINATOR) {
                self.buffer.skip(markers::OBJECT_TERMINATOR.len());
                break;
            }

            let Ok(name_len) = self.buffer.read_u16_be() else {
                break;
            };
            let Ok(name) = self.buffer.read_bytes(name_len as usize) else {
                break;
            };
            let name = String::from_utf8(name)
                .map_err(|e| Error::amf_decode(format!("Invalid UTF-8 in property name: {}", e)))?;

            if !self.has_remaining() {
                break;
            }
            let value = self.decode()?;
            object.insert(name, value);
        }
        Ok(object)
    }
}

/// Decode every value in `bytes`
pub fn decode_values(bytes: &[u8]) -> Result<Vec<Amf0Value>> {
    let mut buffer = ByteBuffer::from_slice(bytes);
    Amf0Decoder::new(&mut buffer).decode_all()
}
