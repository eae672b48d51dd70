//! Forward-offset bookkeeping for the write side.
//!
//! Headers in this format routinely reference data that hasn't been
//! written yet (a name, a sub-struct, the next entry). The `Reserver`
//! is the only mechanism that writes those forward offsets: reserve a
//! zeroed slot now, remember its position, fill it once the real value is
//! known, and refuse to let the write finish with anything still zeroed.

use std::collections::HashMap;
use std::io::{Seek, Write};

use crate::byte_stream::ByteStream;
use crate::error::{FormatError, MsbError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetWidth {
    Bits32,
    Bits64,
}

impl OffsetWidth {
    fn byte_len(self) -> u64 {
        match self {
            OffsetWidth::Bits32 => 4,
            OffsetWidth::Bits64 => 8,
        }
    }
}

struct StructSlot {
    position: u64,
    size: usize,
}

/// Tracks reserved-but-not-yet-filled offsets and struct regions for a
/// single write pass (one entry, one Param, or the top-level file).
pub struct Reserver {
    width: OffsetWidth,
    relative_base: Option<u64>,
    offsets: HashMap<String, u64>,
    structs: HashMap<String, StructSlot>,
    finished: bool,
}

impl Reserver {
    pub fn new(width: OffsetWidth) -> Self {
        Self {
            width,
            relative_base: None,
            offsets: HashMap::new(),
            structs: HashMap::new(),
            finished: false,
        }
    }

    pub fn set_relative_position_start(&mut self, base: u64) {
        self.relative_base = Some(base);
    }

    pub fn clear_relative_position_start(&mut self) {
        self.relative_base = None;
    }

    /// Records the current cursor as the reservation site for `label` and
    /// writes a zeroed slot of the configured width.
    pub fn reserve_offset<S: Write + Seek>(
        &mut self,
        stream: &mut ByteStream<S>,
        label: &str,
    ) -> Result<()> {
        let pos = stream.position()?;
        self.offsets.insert(label.to_string(), pos);
        match self.width {
            OffsetWidth::Bits32 => stream.write_u32(0)?,
            OffsetWidth::Bits64 => stream.write_u64(0)?,
        }
        Ok(())
    }

    pub fn reserve_struct<S: Write + Seek>(
        &mut self,
        stream: &mut ByteStream<S>,
        label: &str,
        size: usize,
    ) -> Result<()> {
        let pos = stream.position()?;
        self.structs.insert(
            label.to_string(),
            StructSlot {
                position: pos,
                size,
            },
        );
        stream.write_padding(size, 0)
    }

    fn take_offset(&mut self, label: &str) -> Result<u64> {
        self.offsets.remove(label).ok_or_else(|| {
            MsbError::Format(FormatError::new(
                label,
                "offset was not reserved (or was already filled)",
            ))
        })
    }

    pub fn fill_offset<S: Write + Seek>(
        &mut self,
        stream: &mut ByteStream<S>,
        label: &str,
        value: u64,
    ) -> Result<()> {
        if self.width == OffsetWidth::Bits32 && value > u32::MAX as u64 {
            return Err(MsbError::Format(FormatError::with_value(
                label,
                "offset exceeds 32-bit width",
                value,
            )));
        }
        let pos = self.take_offset(label)?;
        let saved = stream.position()?;
        stream.seek(pos)?;
        match self.width {
            OffsetWidth::Bits32 => stream.write_u32(value as u32)?,
            OffsetWidth::Bits64 => stream.write_u64(value)?,
        }
        stream.seek(saved)?;
        Ok(())
    }

    pub fn fill_offset_with_current<S: Write + Seek>(
        &mut self,
        stream: &mut ByteStream<S>,
        label: &str,
    ) -> Result<()> {
        let value = stream.position()?;
        self.fill_offset(stream, label, value)
    }

    pub fn fill_offset_with_relative_current<S: Write + Seek>(
        &mut self,
        stream: &mut ByteStream<S>,
        label: &str,
    ) -> Result<()> {
        let base = self.relative_base.unwrap_or(0);
        let value = stream.position()?.saturating_sub(base);
        self.fill_offset(stream, label, value)
    }

    pub fn fill_struct<S: Write + Seek>(
        &mut self,
        stream: &mut ByteStream<S>,
        label: &str,
        bytes: &[u8],
    ) -> Result<()> {
        let slot = self.structs.remove(label).ok_or_else(|| {
            MsbError::Format(FormatError::new(
                label,
                "struct was not reserved (or was already filled)",
            ))
        })?;
        if bytes.len() != slot.size {
            return Err(MsbError::Format(FormatError::with_value(
                label,
                format!("struct size mismatch, expected {}", slot.size),
                bytes.len(),
            )));
        }
        let saved = stream.position()?;
        stream.seek(slot.position)?;
        stream.write_bytes(bytes)?;
        stream.seek(saved)?;
        Ok(())
    }

    /// Fails if any reservation is still unfilled. Must be called exactly
    /// once; calling it twice is itself an error.
    pub fn finish(mut self) -> Result<()> {
        if self.finished {
            return Err(MsbError::Format(FormatError::new(
                "reserver",
                "finish() called twice",
            )));
        }
        self.finished = true;
        if let Some(label) = self.offsets.keys().next().or_else(|| self.structs.keys().next()) {
            return Err(MsbError::Format(FormatError::new(
                label.clone(),
                "reservation was never filled",
            )));
        }
        Ok(())
    }
}

impl Drop for Reserver {
    fn drop(&mut self) {
        if !self.finished {
            log::error!("Reserver dropped without finish() having been called");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reserve_and_fill_all_succeeds() {
        let mut stream = ByteStream::new(Cursor::new(Vec::new()));
        let mut r = Reserver::new(OffsetWidth::Bits64);
        r.reserve_offset(&mut stream, "a").unwrap();
        r.reserve_offset(&mut stream, "b").unwrap();
        stream.write_u32(0xAABBCCDD).unwrap();
        r.fill_offset(&mut stream, "b", 100).unwrap();
        r.fill_offset(&mut stream, "a", 200).unwrap();
        r.finish().unwrap();
    }

    #[test]
    fn unfilled_offset_fails_finish() {
        let mut stream = ByteStream::new(Cursor::new(Vec::new()));
        let mut r = Reserver::new(OffsetWidth::Bits64);
        r.reserve_offset(&mut stream, "a").unwrap();
        assert!(r.finish().is_err());
    }

    #[test]
    fn fill_wrong_width_rejected() {
        let mut stream = ByteStream::new(Cursor::new(Vec::new()));
        let mut r = Reserver::new(OffsetWidth::Bits32);
        r.reserve_offset(&mut stream, "a").unwrap();
        let err = r.fill_offset(&mut stream, "a", u64::MAX).unwrap_err();
        assert!(matches!(err, MsbError::Format(_)));
    }
}
