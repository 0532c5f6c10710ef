//! Byte-level I/O for dex containers
//!
//! [`DexReader`] is a bounds-checked little-endian cursor over an in-memory
//! file image, [`DexWriter`] the matching growable sink. Both understand the
//! LEB128 variants used throughout the format.

use crate::core::error::{DexError, Result};
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::Path;

/// Round `value` up to the next multiple of `alignment` (a power of two).
pub const fn align_up(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) & !(alignment - 1)
}

/// Encoded length of `value` as unsigned LEB128.
pub const fn uleb128_size(value: u32) -> u32 {
    match value {
        0..=0x7f => 1,
        0x80..=0x3fff => 2,
        0x4000..=0x1f_ffff => 3,
        0x20_0000..=0x0fff_ffff => 4,
        _ => 5,
    }
}

/// Encoded length of `value` as signed LEB128.
pub fn sleb128_size(value: i32) -> u32 {
    let mut value = value;
    let mut size = 0;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        size += 1;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            return size;
        }
    }
}

/// Read-only cursor over a dex file image
pub struct DexReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DexReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        DexReader { data, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(DexError::UnexpectedEof {
                offset: pos,
                needed: pos - self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Skip forward to the next multiple of `alignment`.
    pub fn align(&mut self, alignment: u32) -> Result<()> {
        let aligned = align_up(self.pos as u32, alignment) as usize;
        self.seek(aligned)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|end| *end <= self.data.len())
            .ok_or(DexError::UnexpectedEof {
                offset: self.pos,
                needed: count,
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read an unsigned LEB128 value, also reporting how many bytes it used.
    pub fn read_uleb128_with_len(&mut self) -> Result<(u32, usize)> {
        let start = self.pos;
        let mut result: u32 = 0;
        for i in 0..5 {
            let byte = self.read_u8()?;
            result |= ((byte & 0x7f) as u32) << (i * 7);
            if byte & 0x80 == 0 {
                return Ok((result, i + 1));
            }
        }
        Err(DexError::invalid(start, "uleb128 longer than 5 bytes"))
    }

    pub fn read_uleb128(&mut self) -> Result<u32> {
        Ok(self.read_uleb128_with_len()?.0)
    }

    pub fn read_sleb128(&mut self) -> Result<i32> {
        let start = self.pos;
        let mut result: i32 = 0;
        for i in 0..5 {
            let byte = self.read_u8()?;
            result |= ((byte & 0x7f) as i32) << (i * 7);
            if byte & 0x80 == 0 {
                let shift = (i + 1) * 7;
                if shift < 32 && byte & 0x40 != 0 {
                    result |= -1i32 << shift;
                }
                return Ok(result);
            }
        }
        Err(DexError::invalid(start, "sleb128 longer than 5 bytes"))
    }

    /// Read a `uleb128p1` value; the encoded `0` (meaning -1) maps to `None`.
    pub fn read_uleb128p1(&mut self) -> Result<Option<u32>> {
        Ok(self.read_uleb128()?.checked_sub(1))
    }
}

/// Growable sink that tracks its own write position
#[derive(Debug, Default)]
pub struct DexWriter {
    buf: Vec<u8>,
}

impl DexWriter {
    pub fn new() -> Self {
        DexWriter { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        DexWriter {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn position(&self) -> u32 {
        self.buf.len() as u32
    }

    /// Pad with zero bytes up to the next multiple of `alignment`.
    pub fn align(&mut self, alignment: u32) {
        let target = align_up(self.position(), alignment) as usize;
        self.buf.resize(target, 0);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_uleb128(&mut self, value: u32) {
        let mut value = value;
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    pub fn write_sleb128(&mut self, value: i32) {
        let mut value = value;
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
            if done {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    pub fn write_uleb128p1(&mut self, value: Option<u32>) {
        self.write_uleb128(value.map_or(0, |v| v + 1));
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Read a whole dex file into memory
pub fn read_dex<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let mut file = OpenOptions::new().read(true).open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Write a finished dex image to disk, replacing any existing file
pub fn write_dex<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(0x70, 4), 0x70);
        assert_eq!(align_up(7, 1), 7);
    }

    #[test]
    fn test_uleb128_known_encodings() {
        let mut out = DexWriter::new();
        out.write_uleb128(0);
        out.write_uleb128(127);
        out.write_uleb128(128);
        out.write_uleb128(0xffff_ffff);
        assert_eq!(
            out.as_slice(),
            &[0x00, 0x7f, 0x80, 0x01, 0xff, 0xff, 0xff, 0xff, 0x0f]
        );

        let mut reader = DexReader::new(out.as_slice());
        assert_eq!(reader.read_uleb128().unwrap(), 0);
        assert_eq!(reader.read_uleb128().unwrap(), 127);
        assert_eq!(reader.read_uleb128_with_len().unwrap(), (128, 2));
        assert_eq!(reader.read_uleb128().unwrap(), 0xffff_ffff);
        assert_eq!(uleb128_size(128), 2);
        assert_eq!(uleb128_size(0xffff_ffff), 5);
    }

    #[test]
    fn test_sleb128_known_encodings() {
        let mut out = DexWriter::new();
        out.write_sleb128(0);
        out.write_sleb128(-1);
        out.write_sleb128(63);
        out.write_sleb128(64);
        out.write_sleb128(-128);
        assert_eq!(out.as_slice(), &[0x00, 0x7f, 0x3f, 0xc0, 0x00, 0x80, 0x7f]);
        assert_eq!(sleb128_size(64), 2);
        assert_eq!(sleb128_size(-64), 1);

        let mut reader = DexReader::new(out.as_slice());
        for expected in [0, -1, 63, 64, -128] {
            assert_eq!(reader.read_sleb128().unwrap(), expected);
        }
    }

    #[test]
    fn test_signed_form_reads_as_longer_uleb() {
        // 64 written as sleb128 takes two bytes; read back as uleb128 the value
        // is the same but the length gives the encoding away.
        let mut out = DexWriter::new();
        out.write_sleb128(64);
        let mut reader = DexReader::new(out.as_slice());
        assert_eq!(reader.read_uleb128_with_len().unwrap(), (64, 2));
        assert_eq!(uleb128_size(64), 1);
    }

    #[test]
    fn test_uleb128p1() {
        let mut out = DexWriter::new();
        out.write_uleb128p1(None);
        out.write_uleb128p1(Some(5));
        let mut reader = DexReader::new(out.as_slice());
        assert_eq!(reader.read_uleb128p1().unwrap(), None);
        assert_eq!(reader.read_uleb128p1().unwrap(), Some(5));
    }

    #[test]
    fn test_reader_eof() {
        let mut reader = DexReader::new(&[1, 2, 3]);
        assert_eq!(reader.read_u16().unwrap(), 0x0201);
        assert!(matches!(
            reader.read_u32(),
            Err(DexError::UnexpectedEof { offset: 2, needed: 4 })
        ));
        assert!(reader.seek(4).is_err());
        assert!(reader.seek(3).is_ok());
    }

    #[test]
    fn test_overlong_uleb_rejected() {
        let mut reader = DexReader::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]);
        assert!(matches!(
            reader.read_uleb128(),
            Err(DexError::InvalidValue { offset: 0, .. })
        ));
    }

    #[test]
    fn test_writer_align_pads_with_zeros() {
        let mut out = DexWriter::new();
        out.write_u8(0xaa);
        out.align(4);
        assert_eq!(out.as_slice(), &[0xaa, 0, 0, 0]);
        out.align(4);
        assert_eq!(out.position(), 4);
    }

    #[test]
    fn test_file_helpers() {
        let temp = NamedTempFile::new().unwrap();
        write_dex(temp.path(), b"dex\n035\0").unwrap();
        assert_eq!(read_dex(temp.path()).unwrap(), b"dex\n035\0");
    }
}
