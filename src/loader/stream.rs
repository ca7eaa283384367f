use crate::types::RuntimeError;
use alloc::{boxed::Box, string::String, vec::Vec};

/// A decoder-level failure.
///
/// The loader distinguishes more kinds than the public error surface;
/// [`From<LoaderError> for RuntimeError`] collapses them to the stable
/// exit kinds.
#[derive(Debug, PartialEq, Eq)]
pub enum LoaderError {
    /// The input violates the binary format.
    Malformed(&'static str),
    /// The input is well-formed but uses a feature outside the
    /// supported surface.
    Unsupported(&'static str),
    /// Allocation failure while materialising a section.
    OutOfMemory,
    /// The underlying byte source failed.
    Io,
}

impl core::fmt::Display for LoaderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LoaderError::Malformed(what) => write!(f, "malformed module: {what}"),
            LoaderError::Unsupported(what) => write!(f, "unsupported: {what}"),
            LoaderError::OutOfMemory => write!(f, "out of memory"),
            LoaderError::Io => write!(f, "i/o failure"),
        }
    }
}

impl From<LoaderError> for RuntimeError {
    fn from(err: LoaderError) -> Self {
        match err {
            LoaderError::Malformed(_) | LoaderError::Io => RuntimeError::Stream,
            LoaderError::Unsupported(_) => RuntimeError::Unsupported,
            LoaderError::OutOfMemory => RuntimeError::OutOfMemory,
        }
    }
}

/// Random-access byte source backing a module image.
///
/// Bodies and data segments are read back through this on demand, so
/// the full image never has to stay resident when the source is
/// external storage.
pub trait ByteSource: Send + Sync {
    /// Total length of the source in bytes.
    fn len(&self) -> u64;

    /// Fills `buf` from `offset`, failing unless the whole range is
    /// available.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), LoaderError>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A byte source over an owned in-memory buffer.
pub struct MemorySource {
    bytes: Box<[u8]>,
}

impl MemorySource {
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), LoaderError> {
        let start = usize::try_from(offset).map_err(|_| LoaderError::Io)?;
        let slice = self
            .bytes
            .get(start..start.checked_add(buf.len()).ok_or(LoaderError::Io)?)
            .ok_or(LoaderError::Io)?;
        buf.copy_from_slice(slice);
        Ok(())
    }
}

/// A byte source over a seekable file.
#[cfg(feature = "std")]
pub struct FileSource {
    file: std::sync::Mutex<std::fs::File>,
    len: u64,
}

#[cfg(feature = "std")]
impl FileSource {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, LoaderError> {
        let file = std::fs::File::open(path).map_err(|_| LoaderError::Io)?;
        let len = file.metadata().map_err(|_| LoaderError::Io)?.len();
        Ok(Self {
            file: std::sync::Mutex::new(file),
            len,
        })
    }
}

#[cfg(feature = "std")]
impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), LoaderError> {
        use std::io::{Read, Seek, SeekFrom};
        let mut file = self.file.lock().map_err(|_| LoaderError::Io)?;
        file.seek(SeekFrom::Start(offset)).map_err(|_| LoaderError::Io)?;
        file.read_exact(buf).map_err(|_| LoaderError::Io)
    }
}

/// A cursor over a [`ByteSource`] with strict LEB128 decoding.
///
/// Over-long and truncated sequences fail with
/// [`LoaderError::Malformed`]; redundant encodings within the
/// `ceil(N/7)` byte bound are accepted as the format allows.
pub struct SourceReader<'a> {
    source: &'a dyn ByteSource,
    pos: u64,
    end: u64,
}

impl<'a> SourceReader<'a> {
    pub fn new(source: &'a dyn ByteSource) -> Self {
        Self {
            source,
            pos: 0,
            end: source.len(),
        }
    }

    /// A reader restricted to `[offset, offset + len)`.
    pub fn window(source: &'a dyn ByteSource, offset: u64, len: u64) -> Result<Self, LoaderError> {
        let end = offset.checked_add(len).ok_or(LoaderError::Malformed("window overflow"))?;
        if end > source.len() {
            return Err(LoaderError::Malformed("window past end of source"));
        }
        Ok(Self {
            source,
            pos: offset,
            end,
        })
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn set_pos(&mut self, pos: u64) -> Result<(), LoaderError> {
        if pos > self.end {
            return Err(LoaderError::Malformed("seek past end"));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn remaining(&self) -> u64 {
        self.end - self.pos
    }

    pub fn skip(&mut self, count: u64) -> Result<(), LoaderError> {
        let next = self
            .pos
            .checked_add(count)
            .ok_or(LoaderError::Malformed("skip overflow"))?;
        self.set_pos(next)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), LoaderError> {
        if (buf.len() as u64) > self.remaining() {
            return Err(LoaderError::Malformed("unexpected end of stream"));
        }
        self.source.read_at(self.pos, buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8, LoaderError> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, LoaderError> {
        let mut buf = alloc::vec![0u8; count];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Unsigned LEB128 limited to `bits` significant bits.
    pub fn read_uleb(&mut self, bits: u32) -> Result<u64, LoaderError> {
        let mut result: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            if shift >= bits {
                return Err(LoaderError::Malformed("uleb128 too long"));
            }
            let byte = self.read_byte()?;
            let low = (byte & 0x7F) as u64;
            if shift + 7 > bits && (byte & 0x7F) >> (bits - shift) != 0 {
                return Err(LoaderError::Malformed("uleb128 out of range"));
            }
            result |= low << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    /// Signed LEB128 limited to `bits` significant bits.
    pub fn read_sleb(&mut self, bits: u32) -> Result<i64, LoaderError> {
        let mut result: i64 = 0;
        let mut shift: u32 = 0;
        loop {
            if shift >= bits {
                return Err(LoaderError::Malformed("sleb128 too long"));
            }
            let byte = self.read_byte()?;
            result |= (((byte & 0x7F) as i64)) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && (byte & 0x40) != 0 {
                    result |= -1i64 << shift;
                }
                if bits < 64 {
                    let min = -(1i64 << (bits - 1));
                    let max = (1i64 << (bits - 1)) - 1;
                    if result < min || result > max {
                        return Err(LoaderError::Malformed("sleb128 out of range"));
                    }
                }
                return Ok(result);
            }
        }
    }

    pub fn read_u32_leb(&mut self) -> Result<u32, LoaderError> {
        Ok(self.read_uleb(32)? as u32)
    }

    pub fn read_u64_leb(&mut self) -> Result<u64, LoaderError> {
        self.read_uleb(64)
    }

    pub fn read_s32_leb(&mut self) -> Result<i32, LoaderError> {
        Ok(self.read_sleb(32)? as i32)
    }

    pub fn read_s64_leb(&mut self) -> Result<i64, LoaderError> {
        self.read_sleb(64)
    }

    /// The 33-bit signed integer used by block type encodings.
    pub fn read_s33_leb(&mut self) -> Result<i64, LoaderError> {
        self.read_sleb(33)
    }

    pub fn read_f32_bits(&mut self) -> Result<u32, LoaderError> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_f64_bits(&mut self) -> Result<u64, LoaderError> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// A length-prefixed UTF-8 name.
    pub fn read_name(&mut self) -> Result<String, LoaderError> {
        let len = self.read_u32_leb()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|_| LoaderError::Malformed("name is not utf-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_over(bytes: &[u8]) -> (MemorySource, u64) {
        (MemorySource::new(bytes.to_vec()), bytes.len() as u64)
    }

    #[test]
    fn uleb_basic() {
        let (source, _) = reader_over(&[0xE5, 0x8E, 0x26]);
        let mut reader = SourceReader::new(&source);
        assert_eq!(reader.read_u32_leb().unwrap(), 624485);
    }

    #[test]
    fn uleb_redundant_zero_accepted() {
        // 5-byte encoding of 0 stays within ceil(32/7) bytes.
        let (source, _) = reader_over(&[0x80, 0x80, 0x80, 0x80, 0x00]);
        let mut reader = SourceReader::new(&source);
        assert_eq!(reader.read_u32_leb().unwrap(), 0);
    }

    #[test]
    fn uleb_overlong_rejected() {
        let (source, _) = reader_over(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x00]);
        let mut reader = SourceReader::new(&source);
        assert!(reader.read_u32_leb().is_err());
    }

    #[test]
    fn uleb_out_of_range_final_byte() {
        // The fifth byte may only contribute 4 bits for a 32-bit read.
        let (source, _) = reader_over(&[0xFF, 0xFF, 0xFF, 0xFF, 0x10]);
        let mut reader = SourceReader::new(&source);
        assert!(reader.read_u32_leb().is_err());
    }

    #[test]
    fn sleb_negative() {
        let (source, _) = reader_over(&[0x7F]);
        let mut reader = SourceReader::new(&source);
        assert_eq!(reader.read_s32_leb().unwrap(), -1);

        let (source, _) = reader_over(&[0xC0, 0xBB, 0x78]);
        let mut reader = SourceReader::new(&source);
        assert_eq!(reader.read_s32_leb().unwrap(), -123456);
    }

    #[test]
    fn sleb_padding_must_extend_sign() {
        // -1 padded to five bytes is valid; broken padding is not.
        let (source, _) = reader_over(&[0xFF, 0xFF, 0xFF, 0xFF, 0x7F]);
        let mut reader = SourceReader::new(&source);
        assert_eq!(reader.read_s32_leb().unwrap(), -1);

        let (source, _) = reader_over(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
        let mut reader = SourceReader::new(&source);
        assert!(reader.read_s32_leb().is_err());
    }

    #[test]
    fn truncated_sequence_fails() {
        let (source, _) = reader_over(&[0x80]);
        let mut reader = SourceReader::new(&source);
        assert!(reader.read_u32_leb().is_err());
    }

    #[test]
    fn window_bounds() {
        let source = MemorySource::new(alloc::vec![1u8, 2, 3, 4]);
        let mut reader = SourceReader::window(&source, 1, 2).unwrap();
        assert_eq!(reader.read_byte().unwrap(), 2);
        assert_eq!(reader.read_byte().unwrap(), 3);
        assert!(reader.read_byte().is_err());
        assert!(SourceReader::window(&source, 3, 2).is_err());
    }
}
