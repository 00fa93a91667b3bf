//! Flat, little-endian message payloads.
//!
//! Every value is aligned to 4 bytes. Strings are a `u32` byte length
//! (including the NUL terminator), the bytes, a NUL, then zero padding.

use byteorder::{ByteOrder, LittleEndian};
use flinger_gui::TransportError;

/// Calculates the padded length of a string or blob.
fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// A request or reply payload with a read cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parcel {
    data: Vec<u8>,
    pos: usize,
}

impl Parcel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps received bytes for reading.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Parcel { data, pos: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes not yet consumed by reads.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn write_u32(&mut self, value: u32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.data.extend_from_slice(&buf);
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_i32(&mut buf, value);
        self.data.extend_from_slice(&buf);
    }

    pub fn write_u64(&mut self, value: u64) {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, value);
        self.data.extend_from_slice(&buf);
    }

    pub fn write_i64(&mut self, value: i64) {
        let mut buf = [0u8; 8];
        LittleEndian::write_i64(&mut buf, value);
        self.data.extend_from_slice(&buf);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_i32(i32::from(value));
    }

    pub fn write_string(&mut self, value: &str) {
        let len_with_nul = value.len() + 1;
        self.write_u32(len_with_nul as u32);
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        let padding = padded_len(len_with_nul) - len_with_nul;
        self.data.extend(std::iter::repeat(0).take(padding));
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&[u8], TransportError> {
        if self.remaining() < len {
            return Err(TransportError::Malformed(format!(
                "need {} bytes for {}, {} left",
                len,
                what,
                self.remaining()
            )));
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.data[start..self.pos])
    }

    pub fn read_u32(&mut self) -> Result<u32, TransportError> {
        self.take(4, "u32").map(LittleEndian::read_u32)
    }

    pub fn read_i32(&mut self) -> Result<i32, TransportError> {
        self.take(4, "i32").map(LittleEndian::read_i32)
    }

    pub fn read_u64(&mut self) -> Result<u64, TransportError> {
        self.take(8, "u64").map(LittleEndian::read_u64)
    }

    pub fn read_i64(&mut self) -> Result<i64, TransportError> {
        self.take(8, "i64").map(LittleEndian::read_i64)
    }

    pub fn read_bool(&mut self) -> Result<bool, TransportError> {
        Ok(self.read_i32()? != 0)
    }

    pub fn read_string(&mut self) -> Result<String, TransportError> {
        let len = self.read_u32()? as usize;
        if len == 0 {
            return Err(TransportError::Malformed("string length cannot be 0".to_string()));
        }
        let padded = padded_len(len);
        let bytes = self.take(padded, "string")?;
        let (text, terminator) = bytes[..len].split_at(len - 1);
        if terminator != [0] {
            return Err(TransportError::Malformed("string is not NUL terminated".to_string()));
        }
        std::str::from_utf8(text)
            .map(str::to_string)
            .map_err(|e| TransportError::Malformed(format!("invalid UTF-8 string: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_string_padding() {
        let mut parcel = Parcel::new();
        parcel.write_string("abc");
        // 4 length bytes, "abc\0", no padding needed.
        assert_eq!(parcel.len(), 8);
        parcel.write_string("abcd");
        // "abcd\0" padded to 8.
        assert_eq!(parcel.len(), 8 + 12);
        assert_eq!(&parcel.as_bytes()[0..4], &[4, 0, 0, 0]);
    }

    #[test]
    fn test_mixed_values_read_back_in_order() {
        let mut parcel = Parcel::new();
        parcel.write_i32(-7);
        parcel.write_string("android.gui.SurfaceTexture");
        parcel.write_u64(0xDEAD_BEEF_0000_0001);
        parcel.write_bool(true);
        parcel.write_i64(-1);

        let mut reader = Parcel::from_bytes(parcel.into_bytes());
        assert_eq!(reader.read_i32().unwrap(), -7);
        assert_eq!(reader.read_string().unwrap(), "android.gui.SurfaceTexture");
        assert_eq!(reader.read_u64().unwrap(), 0xDEAD_BEEF_0000_0001);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_i64().unwrap(), -1);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut parcel = Parcel::new();
        parcel.write_u32(0x0102_0304);
        assert_eq!(parcel.as_bytes(), &[4, 3, 2, 1]);
    }

    #[test]
    fn test_short_read_is_malformed() {
        let mut reader = Parcel::from_bytes(vec![1, 2]);
        assert_matches!(reader.read_u32(), Err(TransportError::Malformed(_)));
    }

    #[test]
    fn test_string_missing_terminator() {
        let mut reader = Parcel::from_bytes(vec![4, 0, 0, 0, b'a', b'b', b'c', b'd']);
        assert_matches!(reader.read_string(), Err(TransportError::Malformed(_)));
    }

    #[test]
    fn test_zero_length_string_rejected() {
        let mut reader = Parcel::from_bytes(vec![0, 0, 0, 0]);
        assert_matches!(reader.read_string(), Err(TransportError::Malformed(_)));
    }
}
