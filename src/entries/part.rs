use std::io::{Read, Seek, Write};

use crate::byte_stream::ByteStream;
use crate::entries::event::Event;
use crate::entries::model::Model;
use crate::entries::{EntityId, NO_ENTITY_ID};
use crate::error::{FormatError, MsbError, Result};
use crate::groups::GroupBitSet;
use crate::reference::Reference;
use crate::reserver::{OffsetWidth, Reserver};

/// The closed set of Part subtypes. Codes are non-contiguous in the
/// source format.
#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "strum1", derive(strum::Display, strum::EnumIter))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PartType {
    MapPiece = 0,
    Character = 2,
    PlayerStart = 4,
    Collision = 5,
    DummyAsset = 9,
    DummyCharacter = 10,
    ConnectCollision = 11,
    Asset = 13,
}

impl PartType {
    pub fn from_code(code: u32) -> Result<Self> {
        use PartType::*;
        Ok(match code {
            0 => MapPiece,
            2 => Character,
            4 => PlayerStart,
            5 => Collision,
            9 => DummyAsset,
            10 => DummyCharacter,
            11 => ConnectCollision,
            13 => Asset,
            other => {
                return Err(MsbError::Format(FormatError::with_value(
                    "part_type",
                    "unrecognized part subtype code",
                    other,
                )))
            }
        })
    }

    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Closed set of observed `CollisionPart` hit-filter values. `Raw`
/// preserves any byte this crate hasn't seen documented, since the set
/// is known to be incomplete.
#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionHitFilter {
    Normal,
    CameraOnly,
    NpcOnly,
    Raw(u8),
}

impl CollisionHitFilter {
    pub fn from_byte(b: u8) -> Self {
        match b {
            8 => CollisionHitFilter::Normal,
            9 => CollisionHitFilter::CameraOnly,
            11 => CollisionHitFilter::NpcOnly,
            other => CollisionHitFilter::Raw(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            CollisionHitFilter::Normal => 8,
            CollisionHitFilter::CameraOnly => 9,
            CollisionHitFilter::NpcOnly => 11,
            CollisionHitFilter::Raw(b) => b,
        }
    }
}

/// Which of the eleven optional sub-structs a given `PartType` declares.
/// Deserialize/serialize iterate this table instead of a long run of
/// per-subtype conditionals.
#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default)]
pub struct PartSchema {
    pub draw_info_1: bool,
    pub draw_info_2: bool,
    pub gparam: bool,
    pub scene_gparam: bool,
    pub grass_config: bool,
    pub unk_struct_8: bool,
    pub unk_struct_9: bool,
    pub tile_load_config: bool,
    pub unk_struct_11: bool,
}

impl PartType {
    pub fn schema(self) -> PartSchema {
        use PartType::*;
        match self {
            MapPiece => PartSchema {
                draw_info_1: true,
                gparam: true,
                grass_config: true,
                unk_struct_8: true,
                unk_struct_9: true,
                tile_load_config: true,
                unk_struct_11: true,
                ..Default::default()
            },
            Character | DummyCharacter => PartSchema {
                draw_info_1: true,
                draw_info_2: true,
                gparam: true,
                ..Default::default()
            },
            PlayerStart => PartSchema {
                draw_info_1: true,
                ..Default::default()
            },
            Collision => PartSchema {
                draw_info_1: true,
                draw_info_2: true,
                scene_gparam: true,
                tile_load_config: true,
                ..Default::default()
            },
            ConnectCollision => PartSchema {
                draw_info_1: true,
                ..Default::default()
            },
            DummyAsset | Asset => PartSchema {
                draw_info_1: true,
                draw_info_2: true,
                gparam: true,
                ..Default::default()
            },
        }
    }
}

#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DrawInfo1 {
    pub display_groups: GroupBitSet<256>,
    pub draw_groups: GroupBitSet<256>,
    pub collision_mask: GroupBitSet<1024>,
    pub condition_type: u8,
}

impl Default for DrawInfo1 {
    fn default() -> Self {
        Self {
            display_groups: GroupBitSet::all_off(),
            draw_groups: GroupBitSet::all_off(),
            collision_mask: GroupBitSet::all_off(),
            condition_type: 0,
        }
    }
}

#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrawInfo2 {
    pub display_groups_2: GroupBitSet<256>,
    pub unk04: i32,
}

#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GParam {
    pub light_set_id: i32,
    pub fog_id: i32,
    pub light_scattering_id: i32,
    pub env_map_id: i32,
}

#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SceneGParam {
    pub transition_time: f32,
    pub unk04: i32,
}

#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GrassConfig {
    pub density_min: f32,
    pub density_max: f32,
}

#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UnkPartStruct8 {
    pub unk00: i32,
}

#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UnkPartStruct9 {
    pub unk00: i32,
}

#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TileLoadConfig {
    pub load_distance: f32,
}

#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UnkPartStruct11 {
    pub unk00: i32,
}

/// A placed instance of a Model.
#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: String,
    pub subtype: PartType,
    pub model: Reference<Model>,
    pub sib_path: String,
    pub translate: [f32; 3],
    pub rotate: [f32; 3],
    pub scale: [f32; 3],
    pub entity_id: EntityId,
    pub draw_info_1: Option<DrawInfo1>,
    pub draw_info_2: Option<DrawInfo2>,
    pub gparam: Option<GParam>,
    pub scene_gparam: Option<SceneGParam>,
    pub grass_config: Option<GrassConfig>,
    pub unk_struct_8: Option<UnkPartStruct8>,
    pub unk_struct_9: Option<UnkPartStruct9>,
    pub tile_load_config: Option<TileLoadConfig>,
    pub unk_struct_11: Option<UnkPartStruct11>,
    /// `CollisionPart` only.
    pub collision_hit_filter: Option<CollisionHitFilter>,
    /// `ConnectCollisionPart` only — indexes into the Collision-subtype-
    /// only sub-list, not the flat Part list.
    pub connected_collision: Reference<Part>,
    /// `CharacterPart` only — indexes into the Event list's
    /// PatrolRoute-subtype-only sub-list.
    pub patrol_route_event: Reference<Event>,

    pub(crate) model_staging: i32,
    pub(crate) connected_collision_staging: i32,
    /// 16-bit on disk — `CharacterPart`'s only index field that isn't a
    /// plain i32, so it's the one that can overflow on serialize.
    pub(crate) patrol_route_event_staging: i16,
}

impl Part {
    pub fn new(subtype: PartType) -> Self {
        let schema = subtype.schema();
        Self {
            name: String::new(),
            subtype,
            model: None,
            sib_path: String::new(),
            translate: [0.0; 3],
            rotate: [0.0; 3],
            scale: [1.0; 3],
            entity_id: NO_ENTITY_ID,
            draw_info_1: schema.draw_info_1.then(DrawInfo1::default),
            draw_info_2: schema.draw_info_2.then(DrawInfo2::default),
            gparam: schema.gparam.then(GParam::default),
            scene_gparam: schema.scene_gparam.then(SceneGParam::default),
            grass_config: schema.grass_config.then(GrassConfig::default),
            unk_struct_8: schema.unk_struct_8.then(UnkPartStruct8::default),
            unk_struct_9: schema.unk_struct_9.then(UnkPartStruct9::default),
            tile_load_config: schema.tile_load_config.then(TileLoadConfig::default),
            unk_struct_11: schema.unk_struct_11.then(UnkPartStruct11::default),
            collision_hit_filter: (subtype == PartType::Collision)
                .then(|| CollisionHitFilter::Normal),
            connected_collision: None,
            patrol_route_event: None,
            model_staging: -1,
            connected_collision_staging: -1,
            patrol_route_event_staging: -1i16,
        }
    }

    pub fn deserialize<S: Read + Seek>(stream: &mut ByteStream<S>) -> Result<Self> {
        let start = stream.position()?;
        let name_offset = stream.read_i64()?;
        let subtype_code = stream.read_u32()?;
        let subtype_index = stream.read_i32()?;
        let _ = subtype_index;
        let model_index = stream.read_i32()?;
        let sib_path_offset = stream.read_i64()?;
        let translate = [stream.read_f32()?, stream.read_f32()?, stream.read_f32()?];
        let rotate = [stream.read_f32()?, stream.read_f32()?, stream.read_f32()?];
        let scale = [stream.read_f32()?, stream.read_f32()?, stream.read_f32()?];
        let entity_id = stream.read_u32()?;
        let connected_collision_index = stream.read_i32()?;
        let patrol_route_event_index = stream.read_i16()?;
        stream.assert_padding(2, 0)?;

        let draw_info_1_offset = stream.read_i64()?;
        let draw_info_2_offset = stream.read_i64()?;
        let gparam_offset = stream.read_i64()?;
        let scene_gparam_offset = stream.read_i64()?;
        let grass_config_offset = stream.read_i64()?;
        let unk_struct_8_offset = stream.read_i64()?;
        let unk_struct_9_offset = stream.read_i64()?;
        let tile_load_config_offset = stream.read_i64()?;
        let unk_struct_11_offset = stream.read_i64()?;
        let subtype_data_offset = stream.read_i64()?;

        let subtype = PartType::from_code(subtype_code)?;
        let schema = subtype.schema();

        let name = stream.with_position(start + name_offset as u64, |s| s.read_utf16())?;
        let sib_path = if sib_path_offset != 0 {
            stream.with_position(start + sib_path_offset as u64, |s| s.read_utf16())?
        } else {
            String::new()
        };

        let draw_info_1 = read_required_zero_or(
            stream, start, draw_info_1_offset, schema.draw_info_1, "draw_info_1",
            |s| {
                Ok(DrawInfo1 {
                    display_groups: GroupBitSet::from_words(&read_words(s, 8)?),
                    draw_groups: GroupBitSet::from_words(&read_words(s, 8)?),
                    collision_mask: GroupBitSet::from_words(&read_words(s, 32)?),
                    condition_type: {
                        let b = s.read_u8()?;
                        s.assert_padding(3, 0)?;
                        b
                    },
                })
            },
        )?;

        let draw_info_2 = read_required_zero_or(
            stream, start, draw_info_2_offset, schema.draw_info_2, "draw_info_2",
            |s| {
                Ok(DrawInfo2 {
                    display_groups_2: GroupBitSet::from_words(&read_words(s, 8)?),
                    unk04: s.read_i32()?,
                })
            },
        )?;

        let gparam = read_required_zero_or(stream, start, gparam_offset, schema.gparam, "gparam", |s| {
            Ok(GParam {
                light_set_id: s.read_i32()?,
                fog_id: s.read_i32()?,
                light_scattering_id: s.read_i32()?,
                env_map_id: s.read_i32()?,
            })
        })?;

        let scene_gparam = read_required_zero_or(
            stream, start, scene_gparam_offset, schema.scene_gparam, "scene_gparam",
            |s| {
                Ok(SceneGParam {
                    transition_time: s.read_f32()?,
                    unk04: s.read_i32()?,
                })
            },
        )?;

        let grass_config = read_required_zero_or(
            stream, start, grass_config_offset, schema.grass_config, "grass_config",
            |s| {
                Ok(GrassConfig {
                    density_min: s.read_f32()?,
                    density_max: s.read_f32()?,
                })
            },
        )?;

        let unk_struct_8 = read_required_zero_or(
            stream, start, unk_struct_8_offset, schema.unk_struct_8, "unk_struct_8",
            |s| Ok(UnkPartStruct8 { unk00: s.read_i32()? }),
        )?;

        let unk_struct_9 = read_required_zero_or(
            stream, start, unk_struct_9_offset, schema.unk_struct_9, "unk_struct_9",
            |s| Ok(UnkPartStruct9 { unk00: s.read_i32()? }),
        )?;

        let tile_load_config = read_required_zero_or(
            stream, start, tile_load_config_offset, schema.tile_load_config, "tile_load_config",
            |s| Ok(TileLoadConfig { load_distance: s.read_f32()? }),
        )?;

        let unk_struct_11 = read_required_zero_or(
            stream, start, unk_struct_11_offset, schema.unk_struct_11, "unk_struct_11",
            |s| Ok(UnkPartStruct11 { unk00: s.read_i32()? }),
        )?;

        let collision_hit_filter = if subtype == PartType::Collision {
            if subtype_data_offset == 0 {
                return Err(MsbError::Format(FormatError::new(
                    "subtype_data",
                    "CollisionPart requires subtype data",
                )));
            }
            Some(stream.with_position(start + subtype_data_offset as u64, |s| {
                Ok(CollisionHitFilter::from_byte(s.read_u8()?))
            })?)
        } else {
            if subtype_data_offset != 0 {
                return Err(MsbError::Format(FormatError::new(
                    "subtype_data",
                    "subtype declares no subtype data but a non-zero offset was found",
                )));
            }
            None
        };

        Ok(Self {
            name,
            subtype,
            model: None,
            sib_path,
            translate,
            rotate,
            scale,
            entity_id,
            draw_info_1,
            draw_info_2,
            gparam,
            scene_gparam,
            grass_config,
            unk_struct_8,
            unk_struct_9,
            tile_load_config,
            unk_struct_11,
            collision_hit_filter,
            connected_collision: None,
            patrol_route_event: None,
            model_staging: model_index,
            connected_collision_staging: connected_collision_index,
            patrol_route_event_staging: patrol_route_event_index,
        })
    }

    pub fn serialize<S: Write + Seek>(
        &self,
        stream: &mut ByteStream<S>,
        subtype_index: i32,
        model_index: i32,
        connected_collision_index: i32,
        patrol_route_event_index: i16,
    ) -> Result<()> {
        let start = stream.position()?;
        let mut r = Reserver::new(OffsetWidth::Bits64);
        r.reserve_offset(stream, "name")?;
        stream.write_u32(self.subtype.code())?;
        stream.write_i32(subtype_index)?;
        stream.write_i32(model_index)?;
        r.reserve_offset(stream, "sib_path")?;
        for v in self.translate {
            stream.write_f32(v)?;
        }
        for v in self.rotate {
            stream.write_f32(v)?;
        }
        for v in self.scale {
            stream.write_f32(v)?;
        }
        stream.write_u32(self.entity_id)?;
        stream.write_i32(connected_collision_index)?;
        stream.write_i16(patrol_route_event_index)?;
        stream.write_padding(2, 0)?;

        r.reserve_offset(stream, "draw_info_1")?;
        r.reserve_offset(stream, "draw_info_2")?;
        r.reserve_offset(stream, "gparam")?;
        r.reserve_offset(stream, "scene_gparam")?;
        r.reserve_offset(stream, "grass_config")?;
        r.reserve_offset(stream, "unk_struct_8")?;
        r.reserve_offset(stream, "unk_struct_9")?;
        r.reserve_offset(stream, "tile_load_config")?;
        r.reserve_offset(stream, "unk_struct_11")?;
        r.reserve_offset(stream, "subtype_data")?;

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

        write_optional(stream, &mut r, "draw_info_1", start, &self.draw_info_1, |s, d| {
            write_words(s, &d.display_groups.to_words())?;
            write_words(s, &d.draw_groups.to_words())?;
            write_words(s, &d.collision_mask.to_words())?;
            s.write_u8(d.condition_type)?;
            s.write_padding(3, 0)
        })?;

        write_optional(stream, &mut r, "draw_info_2", start, &self.draw_info_2, |s, d| {
            write_words(s, &d.display_groups_2.to_words())?;
            s.write_i32(d.unk04)
        })?;

        write_optional(stream, &mut r, "gparam", start, &self.gparam, |s, g| {
            s.write_i32(g.light_set_id)?;
            s.write_i32(g.fog_id)?;
            s.write_i32(g.light_scattering_id)?;
            s.write_i32(g.env_map_id)
        })?;

        write_optional(stream, &mut r, "scene_gparam", start, &self.scene_gparam, |s, g| {
            s.write_f32(g.transition_time)?;
            s.write_i32(g.unk04)
        })?;

        write_optional(stream, &mut r, "grass_config", start, &self.grass_config, |s, g| {
            s.write_f32(g.density_min)?;
            s.write_f32(g.density_max)
        })?;

        write_optional(stream, &mut r, "unk_struct_8", start, &self.unk_struct_8, |s, u| {
            s.write_i32(u.unk00)
        })?;

        write_optional(stream, &mut r, "unk_struct_9", start, &self.unk_struct_9, |s, u| {
            s.write_i32(u.unk00)
        })?;

        write_optional(
            stream, &mut r, "tile_load_config", start, &self.tile_load_config,
            |s, t| s.write_f32(t.load_distance),
        )?;

        write_optional(stream, &mut r, "unk_struct_11", start, &self.unk_struct_11, |s, u| {
            s.write_i32(u.unk00)
        })?;

        if let Some(filter) = self.collision_hit_filter {
            r.fill_offset(stream, "subtype_data", stream.position()? - start)?;
            stream.write_u8(filter.to_byte())?;
            stream.align_write(4)?;
        } else {
            r.fill_offset(stream, "subtype_data", 0)?;
        }

        r.finish()
    }
}

fn read_words<S: Read>(stream: &mut ByteStream<S>, count: usize) -> Result<Vec<u32>> {
    let mut words = Vec::with_capacity(count);
    for _ in 0..count {
        words.push(stream.read_u32()?);
    }
    Ok(words)
}

fn write_words<S: Write>(stream: &mut ByteStream<S>, words: &[u32]) -> Result<()> {
    for w in words {
        stream.write_u32(*w)?;
    }
    Ok(())
}

fn read_required_zero_or<S: Read + Seek, T>(
    stream: &mut ByteStream<S>,
    start: u64,
    offset: i64,
    required: bool,
    field: &str,
    decode: impl FnOnce(&mut ByteStream<S>) -> Result<T>,
) -> Result<Option<T>> {
    if required {
        if offset == 0 {
            return Err(MsbError::Format(FormatError::new(
                field,
                "required sub-struct offset was zero",
            )));
        }
        Ok(Some(stream.with_position(start + offset as u64, decode)?))
    } else {
        if offset != 0 {
            return Err(MsbError::Format(FormatError::new(
                field,
                "unused sub-struct offset was non-zero",
            )));
        }
        Ok(None)
    }
}

fn write_optional<S: Write + Seek, T>(
    stream: &mut ByteStream<S>,
    r: &mut Reserver,
    label: &str,
    start: u64,
    value: &Option<T>,
    encode: impl FnOnce(&mut ByteStream<S>, &T) -> Result<()>,
) -> Result<()> {
    match value {
        Some(v) => {
            r.fill_offset(stream, label, stream.position()? - start)?;
            encode(stream, v)?;
            stream.align_write(4)
        }
        None => r.fill_offset(stream, label, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn map_piece_round_trips() {
        let mut part = Part::new(PartType::MapPiece);
        part.name = "m1234B0A12".to_string();
        part.translate = [10.0, 0.0, -5.0];
        if let Some(gparam) = &mut part.gparam {
            gparam.light_set_id = 3;
        }

        let mut buf = ByteStream::new(Cursor::new(Vec::new()));
        part.serialize(&mut buf, 0, -1, -1, -1).unwrap();

        let mut cursor = buf.into_inner();
        cursor.set_position(0);
        let decoded = Part::deserialize(&mut ByteStream::new(cursor)).unwrap();
        assert_eq!(decoded.name, part.name);
        assert_eq!(decoded.translate, part.translate);
        assert_eq!(decoded.gparam, part.gparam);
        assert!(decoded.draw_info_2.is_none());
    }

    #[test]
    fn collision_part_requires_hit_filter() {
        let mut part = Part::new(PartType::Collision);
        part.collision_hit_filter = Some(CollisionHitFilter::CameraOnly);

        let mut buf = ByteStream::new(Cursor::new(Vec::new()));
        part.serialize(&mut buf, 0, -1, -1, -1).unwrap();

        let mut cursor = buf.into_inner();
        cursor.set_position(0);
        let decoded = Part::deserialize(&mut ByteStream::new(cursor)).unwrap();
        assert_eq!(decoded.collision_hit_filter, Some(CollisionHitFilter::CameraOnly));
    }
}
