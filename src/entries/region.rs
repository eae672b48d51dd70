use std::io::{Read, Seek, Write};

use crate::byte_stream::ByteStream;
use crate::entries::part::Part;
use crate::entries::{EntityId, SubtypeIndexOverride, NO_ENTITY_ID, NO_SUBTYPE_OVERRIDE};
use crate::error::{FormatError, MsbError, Result};
use crate::reference::Reference;
use crate::reserver::{OffsetWidth, Reserver};
use crate::shape::{CompositeChildren, Shape, ShapeType, COMPOSITE_CHILD_SLOTS};

/// The closed set of Region subtypes. Real subtype-specific fields
/// beyond the common Region layout (translate/rotate/shape/arrays) are
/// preserved as an opaque, size-per-subtype byte blob rather than
/// hand-coded field-by-field — see `DESIGN.md` for why.
#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "strum1", derive(strum::Display, strum::EnumIter))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RegionType {
    General = 0,
    InvasionPoint = 1,
    EnvironmentMapPoint = 2,
    Sound = 4,
    Sfx = 5,
    WindSfx = 6,
    SpawnPoint = 8,
    Message = 9,
    WalkRoute = 10,
    WarpPoint = 11,
    ActivationArea = 12,
    Event = 13,
    Logic = 14,
    EnvironmentMapEffectBox = 17,
    WindArea = 18,
    Connection = 19,
    PatrolRouteEvent = 20,
    BuddySummonPoint = 21,
    MufflingBox = 22,
    MufflingPortal = 23,
    SoundOverride = 24,
    PatrolRoute = 25,
    MapPoint = 26,
    WeatherOverride = 27,
    AutoDrawGroupPoint = 28,
    GroupDefeatReward = 29,
    MapNameTrigger = 30,
    MountJump = 31,
    Dummy = 32,
    FallPreventionRemoval = 33,
    NavmeshCost = 34,
    HitsetEditArea = 35,
    NpcSpawnPoint = 36,
    OtherArea = 37,
    Other = 0xFFFF_FFFF,
}

impl RegionType {
    pub fn from_code(code: u32) -> Result<Self> {
        use RegionType::*;
        Ok(match code {
            0 => General,
            1 => InvasionPoint,
            2 => EnvironmentMapPoint,
            4 => Sound,
            5 => Sfx,
            6 => WindSfx,
            8 => SpawnPoint,
            9 => Message,
            10 => WalkRoute,
            11 => WarpPoint,
            12 => ActivationArea,
            13 => Event,
            14 => Logic,
            17 => EnvironmentMapEffectBox,
            18 => WindArea,
            19 => Connection,
            20 => PatrolRouteEvent,
            21 => BuddySummonPoint,
            22 => MufflingBox,
            23 => MufflingPortal,
            24 => SoundOverride,
            25 => PatrolRoute,
            26 => MapPoint,
            27 => WeatherOverride,
            28 => AutoDrawGroupPoint,
            29 => GroupDefeatReward,
            30 => MapNameTrigger,
            31 => MountJump,
            32 => Dummy,
            33 => FallPreventionRemoval,
            34 => NavmeshCost,
            35 => HitsetEditArea,
            36 => NpcSpawnPoint,
            37 => OtherArea,
            0xFFFF_FFFF => Other,
            other => {
                return Err(MsbError::Format(FormatError::with_value(
                    "region_type",
                    "unrecognized region subtype code",
                    other,
                )))
            }
        })
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// Size in bytes of the opaque subtype-data block this subtype
    /// carries. Most subtypes carry none; a handful of observed
    /// subtypes carry a small fixed block that this crate preserves
    /// verbatim without interpreting.
    pub fn subtype_data_size(self) -> usize {
        match self {
            RegionType::InvasionPoint => 4,
            RegionType::EnvironmentMapEffectBox => 8,
            RegionType::MufflingBox | RegionType::MufflingPortal => 4,
            _ => 0,
        }
    }
}

/// A 3D trigger volume or point.
#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    pub subtype: RegionType,
    pub subtype_index_override: SubtypeIndexOverride,
    pub entity_id: EntityId,
    pub translate: [f32; 3],
    pub rotate: [f32; 3],
    pub shape: Shape,
    /// Present iff `shape` is `Shape::Composite`.
    pub composite_children: Option<CompositeChildren<Region>>,
    pub unk_indices_a: Vec<i16>,
    pub unk_indices_b: Vec<i16>,
    pub attached_part: Reference<Part>,
    /// Raw bytes for fields this crate doesn't interpret; preserved
    /// verbatim across a round trip. Sized per `RegionType::subtype_data_size`.
    pub subtype_data: Vec<u8>,
    /// Staging index for `attached_part`, valid only between a deserialize
    /// pass and the top-level reference-resolution pass that consumes it.
    pub(crate) attached_part_staging: i32,
    /// Staging indices for `composite_children`'s eight slots, same
    /// lifetime rule as `attached_part_staging`.
    pub(crate) composite_staging: Option<[i32; COMPOSITE_CHILD_SLOTS]>,
}

impl Region {
    pub fn new(subtype: RegionType) -> Self {
        Self {
            name: String::new(),
            subtype,
            subtype_index_override: NO_SUBTYPE_OVERRIDE,
            entity_id: NO_ENTITY_ID,
            translate: [0.0; 3],
            rotate: [0.0; 3],
            shape: Shape::Point,
            composite_children: None,
            unk_indices_a: Vec::new(),
            unk_indices_b: Vec::new(),
            attached_part: None,
            subtype_data: vec![0u8; subtype.subtype_data_size()],
            attached_part_staging: -1,
            composite_staging: None,
        }
    }

    /// Replaces the shape, creating or destroying the composite-children
    /// sidecar as the new shape enters or leaves `Composite`.
    pub fn set_shape(&mut self, shape: Shape) {
        match (self.shape.is_composite(), shape.is_composite()) {
            (false, true) => self.composite_children = Some(CompositeChildren::new()),
            (true, false) => self.composite_children = None,
            _ => {}
        }
        self.shape = shape;
    }

    pub fn deserialize<S: Read + Seek>(stream: &mut ByteStream<S>) -> Result<Self> {
        let start = stream.position()?;
        let name_offset = stream.read_i64()?;
        let subtype_code = stream.read_u32()?;
        let subtype_index = stream.read_i32()?;
        let entity_id = stream.read_u32()?;
        let translate = [stream.read_f32()?, stream.read_f32()?, stream.read_f32()?];
        let rotate = [stream.read_f32()?, stream.read_f32()?, stream.read_f32()?];
        let shape_code = stream.read_u32()?;
        let shape_data_offset = stream.read_i64()?;
        let indices_a_offset = stream.read_i64()?;
        let indices_b_offset = stream.read_i64()?;
        let attached_part_index = stream.read_i32()?;
        stream.assert_padding(4, 0)?; // alignment after attached_part_index
        let subtype_data_offset = stream.read_i64()?;

        let subtype = RegionType::from_code(subtype_code)?;
        let subtype_index_override = if subtype == RegionType::Other {
            subtype_index
        } else {
            NO_SUBTYPE_OVERRIDE
        };

        let name = stream.with_position(start + name_offset as u64, |s| s.read_utf16())?;

        let shape_type = ShapeType::from_code(shape_code)?;
        let mut composite_staging = None;
        let mut composite_unk04 = [0i32; COMPOSITE_CHILD_SLOTS];
        let shape = match shape_type {
            ShapeType::Point => {
                if shape_data_offset != 0 {
                    return Err(MsbError::Format(FormatError::new(
                        "region.shape_data_offset",
                        "Point shape must not declare a shape-data offset",
                    )));
                }
                Shape::Point
            }
            ShapeType::Circle => Shape::Circle {
                radius: stream.with_position(start + shape_data_offset as u64, |s| s.read_f32())?,
            },
            ShapeType::Sphere => Shape::Sphere {
                radius: stream.with_position(start + shape_data_offset as u64, |s| s.read_f32())?,
            },
            ShapeType::Cylinder => {
                let (radius, height) = stream.with_position(start + shape_data_offset as u64, |s| {
                    Ok((s.read_f32()?, s.read_f32()?))
                })?;
                Shape::Cylinder { radius, height }
            }
            ShapeType::Rectangle => {
                let (width, depth) = stream.with_position(start + shape_data_offset as u64, |s| {
                    Ok((s.read_f32()?, s.read_f32()?))
                })?;
                Shape::Rectangle { width, depth }
            }
            ShapeType::Box => {
                let (width, depth, height) =
                    stream.with_position(start + shape_data_offset as u64, |s| {
                        Ok((s.read_f32()?, s.read_f32()?, s.read_f32()?))
                    })?;
                Shape::Box {
                    width,
                    depth,
                    height,
                }
            }
            ShapeType::Composite => {
                let (indices, unk04) = stream.with_position(start + shape_data_offset as u64, |s| {
                    let mut indices = [0i32; COMPOSITE_CHILD_SLOTS];
                    let mut unk04 = [0i32; COMPOSITE_CHILD_SLOTS];
                    for i in 0..COMPOSITE_CHILD_SLOTS {
                        indices[i] = s.read_i32()?;
                        unk04[i] = s.read_i32()?;
                    }
                    Ok((indices, unk04))
                })?;
                composite_staging = Some(indices);
                composite_unk04 = unk04;
                Shape::Composite
            }
        };

        let indices_a = read_i16_array(stream, start as i64, indices_a_offset)?;
        let indices_b = read_i16_array(stream, start as i64, indices_b_offset)?;

        let subtype_data = if subtype_data_offset != 0 {
            stream.with_position(
                start + subtype_data_offset as u64,
                |s| s.read_bytes(subtype.subtype_data_size()),
            )?
        } else {
            Vec::new()
        };

        let composite_children = composite_staging.map(|_| {
            let mut c = CompositeChildren::new();
            c.unk04 = composite_unk04;
            c
        });

        Ok(Self {
            name,
            subtype,
            subtype_index_override,
            entity_id,
            translate,
            rotate,
            shape,
            composite_children,
            unk_indices_a: indices_a,
            unk_indices_b: indices_b,
            attached_part: None,
            subtype_data,
            attached_part_staging: attached_part_index,
            composite_staging,
        })
    }

    pub fn serialize<S: Write + Seek>(
        &self,
        stream: &mut ByteStream<S>,
        subtype_index: i32,
        attached_part_index: i32,
        composite_indices: Option<[i32; COMPOSITE_CHILD_SLOTS]>,
    ) -> Result<()> {
        let start = stream.position()?;
        let mut r = Reserver::new(OffsetWidth::Bits64);
        r.reserve_offset(stream, "name")?;
        stream.write_u32(self.subtype.code())?;
        let written_index = if self.subtype == RegionType::Other {
            self.subtype_index_override
        } else {
            subtype_index
        };
        stream.write_i32(written_index)?;
        stream.write_u32(self.entity_id)?;
        for v in self.translate {
            stream.write_f32(v)?;
        }
        for v in self.rotate {
            stream.write_f32(v)?;
        }
        stream.write_u32(self.shape.shape_type().code())?;
        r.reserve_offset(stream, "shape_data")?;
        r.reserve_offset(stream, "indices_a")?;
        r.reserve_offset(stream, "indices_b")?;
        stream.write_i32(attached_part_index)?;
        stream.write_padding(4, 0)?;
        r.reserve_offset(stream, "subtype_data")?;

        r.fill_offset(stream, "name", stream.position()? - start)?;
        stream.write_utf16(&self.name)?;
        stream.align_write(8)?;

        match self.shape {
            Shape::Point => {
                r.fill_offset(stream, "shape_data", 0)?;
            }
            Shape::Circle { radius } | Shape::Sphere { radius } => {
                r.fill_offset(stream, "shape_data", stream.position()? - start)?;
                stream.write_f32(radius)?;
            }
            Shape::Cylinder { radius, height } => {
                r.fill_offset(stream, "shape_data", stream.position()? - start)?;
                stream.write_f32(radius)?;
                stream.write_f32(height)?;
            }
            Shape::Rectangle { width, depth } => {
                r.fill_offset(stream, "shape_data", stream.position()? - start)?;
                stream.write_f32(width)?;
                stream.write_f32(depth)?;
            }
            Shape::Box {
                width,
                depth,
                height,
            } => {
                r.fill_offset(stream, "shape_data", stream.position()? - start)?;
                stream.write_f32(width)?;
                stream.write_f32(depth)?;
                stream.write_f32(height)?;
            }
            Shape::Composite => {
                r.fill_offset(stream, "shape_data", stream.position()? - start)?;
                let indices = composite_indices.unwrap_or([-1; COMPOSITE_CHILD_SLOTS]);
                let unk04 = self
                    .composite_children
                    .as_ref()
                    .map(|c| c.unk04)
                    .unwrap_or([0; COMPOSITE_CHILD_SLOTS]);
                for i in 0..COMPOSITE_CHILD_SLOTS {
                    stream.write_i32(indices[i])?;
                    stream.write_i32(unk04[i])?;
                }
            }
        }

        write_i16_array(stream, &mut r, "indices_a", start, &self.unk_indices_a)?;
        write_i16_array(stream, &mut r, "indices_b", start, &self.unk_indices_b)?;

        if self.subtype_data.is_empty() {
            r.fill_offset(stream, "subtype_data", 0)?;
        } else {
            r.fill_offset(stream, "subtype_data", stream.position()? - start)?;
            stream.write_bytes(&self.subtype_data)?;
            stream.align_write(4)?;
        }

        r.finish()
    }
}

fn read_i16_array<S: Read + Seek>(
    stream: &mut ByteStream<S>,
    start: i64,
    offset: i64,
) -> Result<Vec<i16>> {
    if offset == 0 {
        return Ok(Vec::new());
    }
    stream.with_position((start + offset) as u64, |s| {
        let count = s.read_i32()?;
        let mut values = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            values.push(s.read_i16()?);
        }
        Ok(values)
    })
}

fn write_i16_array<S: Write + Seek>(
    stream: &mut ByteStream<S>,
    r: &mut Reserver,
    label: &str,
    start: u64,
    values: &[i16],
) -> Result<()> {
    if values.is_empty() {
        r.fill_offset(stream, label, 0)
    } else {
        r.fill_offset(stream, label, stream.position()? - start)?;
        stream.write_i32(values.len() as i32)?;
        for v in values {
            stream.write_i16(*v)?;
        }
        stream.align_write(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn point_region_round_trips() {
        let mut region = Region::new(RegionType::General);
        region.name = "region_point".to_string();
        region.translate = [1.0, 2.0, 3.0];
        region.unk_indices_a = vec![1, 2, 3];

        let mut buf = ByteStream::new(Cursor::new(Vec::new()));
        region.serialize(&mut buf, 0, -1, None).unwrap();

        let mut cursor = buf.into_inner();
        cursor.set_position(0);
        let decoded = Region::deserialize(&mut ByteStream::new(cursor)).unwrap();
        assert_eq!(decoded.name, region.name);
        assert_eq!(decoded.translate, region.translate);
        assert_eq!(decoded.unk_indices_a, region.unk_indices_a);
        assert_eq!(decoded.shape, Shape::Point);
    }

    #[test]
    fn setting_composite_shape_creates_sidecar() {
        let mut region = Region::new(RegionType::General);
        assert!(region.composite_children.is_none());
        region.set_shape(Shape::Composite);
        assert!(region.composite_children.is_some());
        region.set_shape(Shape::Point);
        assert!(region.composite_children.is_none());
    }
}
