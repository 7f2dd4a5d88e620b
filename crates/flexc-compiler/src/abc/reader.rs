//! Primitive readers and writers for the ABC encodings.
//!
//! `u30`, `u32` and `s32` are little-endian base-128 with at most five bytes;
//! `d64` is an IEEE double in little-endian order; strings are a `u30` byte
//! length followed by UTF-8.

use super::DecodeError;

pub struct AbcReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> AbcReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or(DecodeError::UnexpectedEof { offset: self.pos })?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let start = self.pos;
        let mut result: u32 = 0;
        for i in 0..5 {
            let b = self.read_u8()?;
            result |= ((b & 0x7f) as u32) << (7 * i);
            if b & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(DecodeError::IntegerTooLong { offset: start })
    }

    /// An unsigned value known to fit in 30 bits. Extra high bits are
    /// discarded.
    pub fn read_u30(&mut self) -> Result<u32, DecodeError> {
        Ok(self.read_u32()? & 0x3fff_ffff)
    }

    pub fn read_s32(&mut self) -> Result<i32, DecodeError> {
        let start = self.pos;
        let mut result: u32 = 0;
        let mut shift = 0;
        for _ in 0..5 {
            let b = self.read_u8()?;
            result |= ((b & 0x7f) as u32) << shift;
            shift += 7;
            if b & 0x80 == 0 {
                if shift < 32 && b & 0x40 != 0 {
                    result |= !0u32 << shift;
                }
                return Ok(result as i32);
            }
        }
        Err(DecodeError::IntegerTooLong { offset: start })
    }

    pub fn read_d64(&mut self) -> Result<f64, DecodeError> {
        let bytes = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(buf))
    }

    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u30()? as usize;
        let start = self.pos;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| DecodeError::InvalidUtf8 { offset: start })
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(DecodeError::UnexpectedEof {
                offset: self.data.len(),
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

#[derive(Debug, Default)]
pub struct AbcWriter {
    buf: Vec<u8>,
}

impl AbcWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, mut v: u32) {
        loop {
            let b = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                self.buf.push(b);
                return;
            }
            self.buf.push(b | 0x80);
        }
    }

    pub fn write_u30(&mut self, v: u32) {
        self.write_u32(v & 0x3fff_ffff);
    }

    pub fn write_s32(&mut self, v: i32) {
        let mut v = v as i64;
        loop {
            let b = (v & 0x7f) as u8;
            v >>= 7;
            let done = (v == 0 && b & 0x40 == 0) || (v == -1 && b & 0x40 != 0);
            if done {
                self.buf.push(b);
                return;
            }
            self.buf.push(b | 0x80);
        }
    }

    pub fn write_d64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_u30(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u30_encodings() {
        let mut r = AbcReader::new(&[0x05, 0xff, 0x01, 0x80, 0x80, 0x01]);
        assert_eq!(r.read_u30().unwrap(), 5);
        assert_eq!(r.read_u30().unwrap(), 255);
        assert_eq!(r.read_u30().unwrap(), 1 << 14);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn s32_sign_extension() {
        let mut w = AbcWriter::new();
        w.write_s32(-1);
        w.write_s32(-200);
        w.write_s32(63);
        w.write_s32(64);
        w.write_s32(i32::MIN);
        let bytes = w.into_bytes();
        assert_eq!(bytes[0], 0x7f);

        let mut r = AbcReader::new(&bytes);
        assert_eq!(r.read_s32().unwrap(), -1);
        assert_eq!(r.read_s32().unwrap(), -200);
        assert_eq!(r.read_s32().unwrap(), 63);
        assert_eq!(r.read_s32().unwrap(), 64);
        assert_eq!(r.read_s32().unwrap(), i32::MIN);
    }

    #[test]
    fn overlong_integer_is_rejected() {
        let mut r = AbcReader::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]);
        assert_eq!(
            r.read_u32(),
            Err(DecodeError::IntegerTooLong { offset: 0 })
        );
    }

    #[test]
    fn truncated_input() {
        let mut r = AbcReader::new(&[0x03, b'a']);
        assert!(matches!(
            r.read_string(),
            Err(DecodeError::UnexpectedEof { .. })
        ));
        let mut r = AbcReader::new(&[0x01]);
        assert!(r.read_u16().is_err());
    }

    #[test]
    fn invalid_utf8() {
        let mut r = AbcReader::new(&[0x02, 0xc3, 0x28]);
        assert_eq!(r.read_string(), Err(DecodeError::InvalidUtf8 { offset: 1 }));
    }

    #[test]
    fn doubles_and_strings() {
        let mut w = AbcWriter::new();
        w.write_d64(2.5);
        w.write_string("héllo");
        let bytes = w.into_bytes();
        let mut r = AbcReader::new(&bytes);
        assert_eq!(r.read_d64().unwrap(), 2.5);
        assert_eq!(r.read_string().unwrap(), "héllo");
    }
}
