//! Byte streams underneath the module format.
//!
//! [`AstStream`] is the primitive layer of the symmetric walk: one method
//! per primitive, each either writing the referenced variable out or
//! reading into it, depending on the direction of the concrete stream.
//! Integers are little-endian; strings are `u32` length + UTF-8 bytes;
//! shared strings go through a per-stream interning table (writer-side map
//! from string to index, reader-side vector) so repeated file names cost
//! four bytes.

use indexmap::IndexMap;
use thiserror::Error;

/// Deserialization and stream-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializationError {
    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("invalid magic number (not a compiled shader module)")]
    InvalidMagic,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),

    #[error("invalid {what} tag {tag}")]
    InvalidTag { what: &'static str, tag: u8 },

    #[error("string data is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid shared string index {0}")]
    InvalidStringIndex(u32),

    #[error("trailing bytes after module end")]
    TrailingBytes,
}

pub type Result<T> = std::result::Result<T, SerializationError>;

/// Direction-agnostic primitive value stream.
///
/// Every method either writes `*value` (writing stream) or overwrites it
/// with the next stream value (reading stream), letting one walk method
/// describe both directions.
pub trait AstStream {
    fn is_writing(&self) -> bool;

    fn value_u8(&mut self, value: &mut u8) -> Result<()>;
    fn value_u16(&mut self, value: &mut u16) -> Result<()>;
    fn value_u32(&mut self, value: &mut u32) -> Result<()>;
    fn value_u64(&mut self, value: &mut u64) -> Result<()>;
    fn value_i32(&mut self, value: &mut i32) -> Result<()>;
    fn value_f32(&mut self, value: &mut f32) -> Result<()>;
    fn value_bool(&mut self, value: &mut bool) -> Result<()>;

    /// Inline string: `u32` length + bytes.
    fn value_string(&mut self, value: &mut String) -> Result<()>;

    /// Interned string: an index into the stream's string table, with new
    /// entries spelled out inline on first use.
    fn shared_string(&mut self, value: &mut String) -> Result<()>;

    /// Fixed magic bytes; mismatch on read is [`SerializationError::InvalidMagic`].
    fn magic(&mut self, expected: &[u8]) -> Result<()>;
}

/// Writing stream backed by a growable byte buffer.
#[derive(Default)]
pub struct WriteStream {
    bytes: Vec<u8>,
    string_indices: IndexMap<String, u32>,
}

impl WriteStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// The serialized bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl AstStream for WriteStream {
    fn is_writing(&self) -> bool {
        true
    }

    fn value_u8(&mut self, value: &mut u8) -> Result<()> {
        self.bytes.push(*value);
        Ok(())
    }

    fn value_u16(&mut self, value: &mut u16) -> Result<()> {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn value_u32(&mut self, value: &mut u32) -> Result<()> {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn value_u64(&mut self, value: &mut u64) -> Result<()> {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn value_i32(&mut self, value: &mut i32) -> Result<()> {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn value_f32(&mut self, value: &mut f32) -> Result<()> {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn value_bool(&mut self, value: &mut bool) -> Result<()> {
        self.bytes.push(u8::from(*value));
        Ok(())
    }

    fn value_string(&mut self, value: &mut String) -> Result<()> {
        let mut length = value.len() as u32;
        self.value_u32(&mut length)?;
        self.bytes.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn shared_string(&mut self, value: &mut String) -> Result<()> {
        if let Some(index) = self.string_indices.get(value.as_str()) {
            let mut index = *index;
            return self.value_u32(&mut index);
        }

        // new entry: emit the next index followed by the inline string
        let mut index = self.string_indices.len() as u32;
        self.string_indices.insert(value.clone(), index);
        self.value_u32(&mut index)?;
        self.value_string(value)
    }

    fn magic(&mut self, expected: &[u8]) -> Result<()> {
        self.bytes.extend_from_slice(expected);
        Ok(())
    }
}

/// Reading stream over a byte slice.
pub struct ReadStream<'a> {
    bytes: &'a [u8],
    offset: usize,
    strings: Vec<String>,
}

impl<'a> ReadStream<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            strings: Vec::new(),
        }
    }

    /// Whether every byte has been consumed.
    pub fn is_at_end(&self) -> bool {
        self.offset == self.bytes.len()
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(count)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(SerializationError::UnexpectedEof)?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }
}

macro_rules! read_le {
    ($self:expr, $ty:ty) => {{
        let bytes = $self.take(std::mem::size_of::<$ty>())?;
        <$ty>::from_le_bytes(bytes.try_into().expect("slice length checked"))
    }};
}

impl AstStream for ReadStream<'_> {
    fn is_writing(&self) -> bool {
        false
    }

    fn value_u8(&mut self, value: &mut u8) -> Result<()> {
        *value = read_le!(self, u8);
        Ok(())
    }

    fn value_u16(&mut self, value: &mut u16) -> Result<()> {
        *value = read_le!(self, u16);
        Ok(())
    }

    fn value_u32(&mut self, value: &mut u32) -> Result<()> {
        *value = read_le!(self, u32);
        Ok(())
    }

    fn value_u64(&mut self, value: &mut u64) -> Result<()> {
        *value = read_le!(self, u64);
        Ok(())
    }

    fn value_i32(&mut self, value: &mut i32) -> Result<()> {
        *value = read_le!(self, i32);
        Ok(())
    }

    fn value_f32(&mut self, value: &mut f32) -> Result<()> {
        *value = f32::from_bits(read_le!(self, u32));
        Ok(())
    }

    fn value_bool(&mut self, value: &mut bool) -> Result<()> {
        *value = read_le!(self, u8) != 0;
        Ok(())
    }

    fn value_string(&mut self, value: &mut String) -> Result<()> {
        let mut length = 0u32;
        self.value_u32(&mut length)?;
        let bytes = self.take(length as usize)?;
        *value = std::str::from_utf8(bytes)
            .map_err(|_| SerializationError::InvalidUtf8)?
            .to_string();
        Ok(())
    }

    fn shared_string(&mut self, value: &mut String) -> Result<()> {
        let mut index = 0u32;
        self.value_u32(&mut index)?;

        match (index as usize).cmp(&self.strings.len()) {
            std::cmp::Ordering::Less => {
                *value = self.strings[index as usize].clone();
                Ok(())
            }
            std::cmp::Ordering::Equal => {
                self.value_string(value)?;
                self.strings.push(value.clone());
                Ok(())
            }
            std::cmp::Ordering::Greater => Err(SerializationError::InvalidStringIndex(index)),
        }
    }

    fn magic(&mut self, expected: &[u8]) -> Result<()> {
        let bytes = self.take(expected.len())?;
        if bytes != expected {
            return Err(SerializationError::InvalidMagic);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_round_trip() {
        let mut writer = WriteStream::new();
        let mut a = 0x1234u16;
        let mut b = -42i32;
        let mut c = 1.5f32;
        let mut d = true;
        writer.value_u16(&mut a).unwrap();
        writer.value_i32(&mut b).unwrap();
        writer.value_f32(&mut c).unwrap();
        writer.value_bool(&mut d).unwrap();

        let bytes = writer.into_bytes();
        let mut reader = ReadStream::new(&bytes);
        let (mut a2, mut b2, mut c2, mut d2) = (0u16, 0i32, 0f32, false);
        reader.value_u16(&mut a2).unwrap();
        reader.value_i32(&mut b2).unwrap();
        reader.value_f32(&mut c2).unwrap();
        reader.value_bool(&mut d2).unwrap();

        assert_eq!((a2, b2, c2, d2), (0x1234, -42, 1.5, true));
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_shared_string_interning() {
        let mut writer = WriteStream::new();
        let mut first = "shader.nzsl".to_string();
        let mut second = "shader.nzsl".to_string();
        let mut third = "other.nzsl".to_string();
        writer.shared_string(&mut first).unwrap();
        writer.shared_string(&mut second).unwrap();
        writer.shared_string(&mut third).unwrap();

        let bytes = writer.into_bytes();

        // second occurrence is only a 4-byte index
        let first_cost = 4 + 4 + "shader.nzsl".len();
        let third_cost = 4 + 4 + "other.nzsl".len();
        assert_eq!(bytes.len(), first_cost + 4 + third_cost);

        let mut reader = ReadStream::new(&bytes);
        let mut out = String::new();
        reader.shared_string(&mut out).unwrap();
        assert_eq!(out, "shader.nzsl");
        reader.shared_string(&mut out).unwrap();
        assert_eq!(out, "shader.nzsl");
        reader.shared_string(&mut out).unwrap();
        assert_eq!(out, "other.nzsl");
    }

    #[test]
    fn test_invalid_shared_string_index() {
        let mut writer = WriteStream::new();
        let mut index = 7u32;
        writer.value_u32(&mut index).unwrap();

        let bytes = writer.into_bytes();
        let mut reader = ReadStream::new(&bytes);
        let mut out = String::new();
        assert_eq!(
            reader.shared_string(&mut out),
            Err(SerializationError::InvalidStringIndex(7))
        );
    }

    #[test]
    fn test_eof_detection() {
        let mut reader = ReadStream::new(&[1, 2]);
        let mut value = 0u32;
        assert_eq!(
            reader.value_u32(&mut value),
            Err(SerializationError::UnexpectedEof)
        );
    }

    #[test]
    fn test_magic_mismatch() {
        let mut reader = ReadStream::new(b"XXXXX");
        assert_eq!(
            reader.magic(b"NZSLB"),
            Err(SerializationError::InvalidMagic)
        );
    }
}
