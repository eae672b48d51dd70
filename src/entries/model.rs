use std::io::{Read, Seek, Write};

use crate::byte_stream::ByteStream;
use crate::error::{FormatError, MsbError, Result};
use crate::reserver::{OffsetWidth, Reserver};

#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "strum1", derive(strum::Display, strum::EnumIter))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ModelType {
    MapPiece = 0,
    Character = 2,
    Player = 4,
    Collision = 5,
    Asset = 10,
}

impl ModelType {
    pub fn from_code(code: u32) -> Result<Self> {
        Ok(match code {
            0 => ModelType::MapPiece,
            2 => ModelType::Character,
            4 => ModelType::Player,
            5 => ModelType::Collision,
            10 => ModelType::Asset,
            other => {
                return Err(MsbError::Format(FormatError::with_value(
                    "model_type",
                    "unrecognized model subtype code",
                    other,
                )))
            }
        })
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// The placeholder name a freshly created Model of this subtype is
    /// seeded with, matching the game's own naming convention.
    pub fn default_name(self) -> &'static str {
        match self {
            ModelType::MapPiece => "m999999",
            ModelType::Character => "c9999",
            ModelType::Player => "c0000",
            ModelType::Collision => "h999999",
            ModelType::Asset => "AEG999_999",
        }
    }
}

/// A referenced geometry or character asset. Subtypes only differ in
/// tag and default name — there is no per-subtype data block.
#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub subtype: ModelType,
    pub sib_path: String,
    /// Recomputed from the Part list on every serialize; ignored on read.
    pub instance_count: i32,
    pub unk1c: i32,
}

impl Model {
    pub fn new(subtype: ModelType) -> Self {
        Self {
            name: subtype.default_name().to_string(),
            subtype,
            sib_path: String::new(),
            instance_count: 0,
            unk1c: 0,
        }
    }

    pub fn deserialize<S: Read + Seek>(stream: &mut ByteStream<S>) -> Result<Self> {
        let start = stream.position()?;
        let name_offset = stream.read_i64()?;
        let sib_path_offset = stream.read_i64()?;
        let subtype_code = stream.read_u32()?;
        let subtype_index = stream.read_i32()?;
        let instance_count = stream.read_i32()?;
        let unk1c = stream.read_i32()?;
        let _ = subtype_index; // staged by the owning EntryParam, not stored here

        let subtype = ModelType::from_code(subtype_code)?;

        let name = stream.with_position(start + name_offset as u64, |s| s.read_utf16())?;
        let sib_path = if sib_path_offset != 0 {
            stream.with_position(start + sib_path_offset as u64, |s| s.read_utf16())?
        } else {
            String::new()
        };

        Ok(Self {
            name,
            subtype,
            sib_path,
            instance_count,
            unk1c,
        })
    }

    pub fn serialize<S: Write + Seek>(
        &self,
        stream: &mut ByteStream<S>,
        subtype_index: i32,
    ) -> Result<()> {
        let start = stream.position()?;
        let mut r = Reserver::new(OffsetWidth::Bits64);
        r.reserve_offset(stream, "name")?;
        r.reserve_offset(stream, "sib_path")?;
        stream.write_u32(self.subtype.code())?;
        stream.write_i32(subtype_index)?;
        stream.write_i32(self.instance_count)?;
        stream.write_i32(self.unk1c)?;

        r.fill_offset(stream, "name", stream.position()? - start)?;
        stream.write_utf16(&self.name)?;
        stream.align_write(8)?;

        if self.sib_path.is_empty() {
            r.fill_offset(stream, "sib_path", 0)?;
        } else {
            r.fill_offset(stream, "sib_path", stream.position()? - start)?;
            stream.write_utf16(&self.sib_path)?;
            stream.align_write(8)?;
        }

        r.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips() {
        let mut model = Model::new(ModelType::Character);
        model.sib_path = "N:\\map\\m10_00_00_00\\model.sib".to_string();
        model.instance_count = 4;

        let mut buf = ByteStream::new(Cursor::new(Vec::new()));
        model.serialize(&mut buf, 7).unwrap();

        let mut cursor = buf.into_inner();
        cursor.set_position(0);
        let mut reader = ByteStream::new(cursor);
        let decoded = Model::deserialize(&mut reader).unwrap();

        assert_eq!(decoded.name, model.name);
        assert_eq!(decoded.subtype, model.subtype);
        assert_eq!(decoded.sib_path, model.sib_path);
        assert_eq!(decoded.instance_count, model.instance_count);
    }

    #[test]
    fn default_names_follow_convention() {
        assert_eq!(Model::new(ModelType::MapPiece).name, "m999999");
        assert_eq!(Model::new(ModelType::Collision).name, "h999999");
    }
}
