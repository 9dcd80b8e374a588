//! Save-state encoding.
//!
//! Snapshots are a flat sequence of fixed-width fields written in a fixed
//! order per component:
//!
//! - `bool`: one byte, 0 or 1 (anything else is rejected on load)
//! - `u16`/`u32`/`u64`: little endian
//! - strings: `u32` little-endian byte length, then UTF-8
//!
//! There is no per-field tagging. Containers that mix components should add
//! their own magic and version bytes in front.

use std::fmt;

/// Errors raised while decoding a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The buffer ended before the field at `offset` was complete.
    UnexpectedEnd { offset: usize },
    /// A boolean field held something other than 0 or 1.
    InvalidBool { offset: usize, value: u8 },
    /// A string field was not valid UTF-8.
    InvalidUtf8 { offset: usize },
    /// A field decoded but its value is out of range for its type.
    InvalidValue { field: &'static str, value: u64 },
    /// Container magic bytes did not match.
    BadMagic,
    /// Container version is newer (or older) than this build understands.
    UnsupportedVersion(u8),
    /// Bytes were left over after the last field.
    TrailingBytes(usize),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd { offset } => {
                write!(f, "snapshot truncated at offset {offset}")
            }
            Self::InvalidBool { offset, value } => {
                write!(f, "invalid boolean {value:#04X} at offset {offset}")
            }
            Self::InvalidUtf8 { offset } => {
                write!(f, "string at offset {offset} is not valid UTF-8")
            }
            Self::InvalidValue { field, value } => {
                write!(f, "invalid value {value} for {field}")
            }
            Self::BadMagic => write!(f, "not a snapshot (bad magic)"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported snapshot version {v}"),
            Self::TrailingBytes(n) => write!(f, "{n} unexpected bytes after snapshot"),
        }
    }
}

impl std::error::Error for SnapshotError {}

/// A component whose state can be written to and restored from a snapshot.
///
/// `load_state` must leave `self` untouched when it returns an error:
/// decode into a scratch value first, then swap it in.
pub trait SaveState {
    fn save_state(&self, w: &mut SnapshotWriter);

    fn load_state(&mut self, r: &mut SnapshotReader<'_>) -> Result<(), SnapshotError>;
}

/// Appends fields to a byte buffer.
#[derive(Debug, Default)]
pub struct SnapshotWriter {
    data: Vec<u8>,
}

impl SnapshotWriter {
    #[must_use]
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn write_bool(&mut self, value: bool) {
        self.data.push(u8::from(value));
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Raw bytes with no length prefix. The reader must know the size.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_u32(value.len() as u32);
        self.data.extend_from_slice(value.as_bytes());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Reads fields back in the order they were written.
#[derive(Debug)]
pub struct SnapshotReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SnapshotReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SnapshotError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(SnapshotError::UnexpectedEnd { offset: self.pos })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], SnapshotError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_bool(&mut self) -> Result<bool, SnapshotError> {
        let offset = self.pos;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(SnapshotError::InvalidBool { offset, value }),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, SnapshotError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, SnapshotError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, SnapshotError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, SnapshotError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], SnapshotError> {
        self.take(len)
    }

    pub fn read_string(&mut self) -> Result<String, SnapshotError> {
        let len = self.read_u32()? as usize;
        let offset = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| SnapshotError::InvalidUtf8 { offset })
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Fail if anything is left over.
    pub fn finish(&self) -> Result<(), SnapshotError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(SnapshotError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_little_endian_and_ordered() {
        let mut w = SnapshotWriter::new();
        w.write_bool(true);
        w.write_u16(0x1234);
        w.write_string("ZX");
        assert_eq!(
            w.into_bytes(),
            vec![0x01, 0x34, 0x12, 0x02, 0x00, 0x00, 0x00, b'Z', b'X']
        );
    }

    #[test]
    fn reader_returns_fields_in_write_order() {
        let mut w = SnapshotWriter::new();
        w.write_u8(7);
        w.write_u32(0xDEAD_BEEF);
        w.write_u64(65_000);
        w.write_string("chroma");
        let bytes = w.into_bytes();

        let mut r = SnapshotReader::new(&bytes);
        assert_eq!(r.read_u8(), Ok(7));
        assert_eq!(r.read_u32(), Ok(0xDEAD_BEEF));
        assert_eq!(r.read_u64(), Ok(65_000));
        assert_eq!(r.read_string().as_deref(), Ok("chroma"));
        assert_eq!(r.finish(), Ok(()));
    }

    #[test]
    fn truncated_buffer_is_an_error() {
        let mut r = SnapshotReader::new(&[0x34]);
        assert_eq!(r.read_u16(), Err(SnapshotError::UnexpectedEnd { offset: 0 }));
    }

    #[test]
    fn bool_must_be_zero_or_one() {
        let mut r = SnapshotReader::new(&[0x02]);
        assert_eq!(
            r.read_bool(),
            Err(SnapshotError::InvalidBool { offset: 0, value: 2 })
        );
    }

    #[test]
    fn oversized_string_length_does_not_panic() {
        let mut r = SnapshotReader::new(&[0xFF, 0xFF, 0xFF, 0xFF, b'a']);
        assert!(matches!(
            r.read_string(),
            Err(SnapshotError::UnexpectedEnd { .. })
        ));
    }
}
