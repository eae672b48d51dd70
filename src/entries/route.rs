use std::io::{Read, Seek, Write};

use crate::byte_stream::ByteStream;
use crate::entries::{SubtypeIndexOverride, NO_SUBTYPE_OVERRIDE};
use crate::error::{FormatError, MsbError, Result};
use crate::reserver::{OffsetWidth, Reserver};

/// Route carries no subtype data of its own; the subtype only affects
/// which in-game system consumes the entry.
#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "strum1", derive(strum::Display, strum::EnumIter))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RouteType {
    MufflingPortal = 0,
    MufflingBox = 1,
    Other = 0xFFFF_FFFF,
}

impl RouteType {
    pub fn from_code(code: u32) -> Result<Self> {
        Ok(match code {
            0 => RouteType::MufflingPortal,
            1 => RouteType::MufflingBox,
            0xFFFF_FFFF => RouteType::Other,
            other => {
                return Err(MsbError::Format(FormatError::with_value(
                    "route_type",
                    "unrecognized route subtype code",
                    other,
                )))
            }
        })
    }

    pub fn code(self) -> u32 {
        self as u32
    }
}

#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub name: String,
    pub subtype: RouteType,
    pub subtype_index_override: SubtypeIndexOverride,
    pub unk08: i32,
    pub unk0c: i32,
}

impl Route {
    pub fn new(subtype: RouteType) -> Self {
        Self {
            name: String::new(),
            subtype,
            subtype_index_override: NO_SUBTYPE_OVERRIDE,
            unk08: 0,
            unk0c: 0,
        }
    }

    pub fn deserialize<S: Read + Seek>(stream: &mut ByteStream<S>) -> Result<Self> {
        let start = stream.position()?;
        let name_offset = stream.read_i64()?;
        let subtype_code = stream.read_u32()?;
        let subtype_index = stream.read_i32()?;
        let unk08 = stream.read_i32()?;
        let unk0c = stream.read_i32()?;

        let subtype = RouteType::from_code(subtype_code)?;
        let subtype_index_override = if subtype == RouteType::Other {
            subtype_index
        } else {
            NO_SUBTYPE_OVERRIDE
        };

        let name = stream.with_position(start + name_offset as u64, |s| s.read_utf16())?;

        Ok(Self {
            name,
            subtype,
            subtype_index_override,
            unk08,
            unk0c,
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
        stream.write_u32(self.subtype.code())?;
        let written_index = if self.subtype == RouteType::Other {
            self.subtype_index_override
        } else {
            subtype_index
        };
        stream.write_i32(written_index)?;
        stream.write_i32(self.unk08)?;
        stream.write_i32(self.unk0c)?;

        r.fill_offset(stream, "name", stream.position()? - start)?;
        stream.write_utf16(&self.name)?;
        stream.align_write(8)?;

        r.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips() {
        let mut route = Route::new(RouteType::MufflingBox);
        route.name = "route_01".to_string();
        route.unk08 = 5;

        let mut buf = ByteStream::new(Cursor::new(Vec::new()));
        route.serialize(&mut buf, 3).unwrap();

        let mut cursor = buf.into_inner();
        cursor.set_position(0);
        let decoded = Route::deserialize(&mut ByteStream::new(cursor)).unwrap();
        assert_eq!(decoded, route);
    }
}
