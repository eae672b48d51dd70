//! Positioned read/write of the primitives the MSB format is built from.
//!
//! Everything here is little-endian; the format has no byte-order option
//! (see the file header's `big_endian`/`bit_big_endian` flags, which this
//! crate only ever writes as zero and rejects otherwise on read).

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{ReadBytesExt, WriteBytesExt, LE};

use crate::error::{FormatError, MsbError, Result};

/// Wraps a seekable byte stream with the primitive operations every entry
/// and header decoder/encoder is built from.
pub struct ByteStream<S> {
    inner: S,
}

impl<S> ByteStream<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S: Seek> ByteStream<S> {
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.seek(SeekFrom::Current(0))?)
    }

    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Saves the cursor, seeks to `pos`, runs `f`, then restores the
    /// cursor — even if `f` fails.
    pub fn with_position<T>(
        &mut self,
        pos: u64,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved = self.position()?;
        self.seek(pos)?;
        let result = f(self);
        self.seek(saved)?;
        result
    }

    /// Advances the cursor to the next multiple of `align` (which must be
    /// a power of two), writing zero bytes to get there.
    pub fn align_write(&mut self, align: u64) -> Result<()>
    where
        S: Write,
    {
        let pos = self.position()?;
        let padded = round_up(pos, align);
        for _ in 0..(padded - pos) {
            self.inner.write_u8(0)?;
        }
        Ok(())
    }

    /// Advances the cursor to the next multiple of `align`, asserting the
    /// skipped bytes are all zero.
    pub fn align_read(&mut self, align: u64) -> Result<()>
    where
        S: Read,
    {
        let pos = self.position()?;
        let padded = round_up(pos, align);
        self.assert_padding((padded - pos) as usize, 0)
    }
}

pub fn round_up(value: u64, align: u64) -> u64 {
    let rem = value % align;
    if rem == 0 {
        value
    } else {
        value + (align - rem)
    }
}

impl<S: Read> ByteStream<S> {
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.inner.read_u8()?)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.inner.read_i8()?)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.inner.read_u16::<LE>()?)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.inner.read_i16::<LE>()?)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.inner.read_u32::<LE>()?)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.inner.read_i32::<LE>()?)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(self.inner.read_u64::<LE>()?)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.inner.read_i64::<LE>()?)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(self.inner.read_f32::<LE>()?)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(self.inner.read_f64::<LE>()?)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads bytes at `offset`, restoring the cursor afterward.
    pub fn peek_bytes(&mut self, offset: u64, len: usize) -> Result<Vec<u8>>
    where
        S: Seek,
    {
        self.with_position(offset, |s| s.read_bytes(len))
    }

    /// Reads a primitive at `offset`, restoring the cursor afterward.
    pub fn peek_u32(&mut self, offset: u64) -> Result<u32>
    where
        S: Seek,
    {
        self.with_position(offset, |s| s.read_u32())
    }

    pub fn assert_padding(&mut self, len: usize, fill: u8) -> Result<()> {
        let bytes = self.read_bytes(len)?;
        if bytes.iter().any(|&b| b != fill) {
            return Err(MsbError::Format(FormatError::with_value(
                "padding",
                format!("expected {len} bytes of 0x{fill:02X}"),
                bytes,
            )));
        }
        Ok(())
    }

    /// Reads a null-terminated UTF-16LE string.
    pub fn read_utf16(&mut self) -> Result<String> {
        let mut units = Vec::new();
        loop {
            let unit = self.read_u16()?;
            if unit == 0 {
                break;
            }
            units.push(unit);
        }
        char::decode_utf16(units)
            .collect::<std::result::Result<String, _>>()
            .map_err(|e| {
                MsbError::Format(FormatError::new(
                    "utf16_string",
                    format!("invalid UTF-16 sequence: {e}"),
                ))
            })
    }
}

impl<S: Write> ByteStream<S> {
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        Ok(self.inner.write_u8(value)?)
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        Ok(self.inner.write_i8(value)?)
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(value as u8)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        Ok(self.inner.write_u16::<LE>(value)?)
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        Ok(self.inner.write_i16::<LE>(value)?)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        Ok(self.inner.write_u32::<LE>(value)?)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        Ok(self.inner.write_i32::<LE>(value)?)
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        Ok(self.inner.write_u64::<LE>(value)?)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        Ok(self.inner.write_i64::<LE>(value)?)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        Ok(self.inner.write_f32::<LE>(value)?)
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        Ok(self.inner.write_f64::<LE>(value)?)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub fn write_padding(&mut self, len: usize, fill: u8) -> Result<()> {
        self.write_bytes(&vec![fill; len])
    }

    /// Writes `value`, transcoded to UTF-16LE, followed by a null word.
    /// Transcoding is limited to the BMP, matching the game's own string
    /// tables.
    pub fn write_utf16(&mut self, value: &str) -> Result<()> {
        for unit in value.encode_utf16() {
            self.write_u16(unit)?;
        }
        self.write_u16(0)
    }
}
