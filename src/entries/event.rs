use std::io::{Read, Seek, Write};

use crate::byte_stream::ByteStream;
use crate::entries::part::Part;
use crate::entries::region::Region;
use crate::entries::{SubtypeIndexOverride, NO_SUBTYPE_OVERRIDE};
use crate::error::{FormatError, MsbError, Result};
use crate::reference::{self, EntryId, Reference};
use crate::reserver::{OffsetWidth, Reserver};

pub const SPAWNER_PART_SLOTS: usize = 32;
pub const SPAWNER_REGION_SLOTS: usize = 8;
pub const PLATOON_PART_SLOTS: usize = 32;
pub const PATROL_ROUTE_REGION_SLOTS: usize = 64;

#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "strum1", derive(strum::Display, strum::EnumIter))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventType {
    Treasure = 4,
    Spawner = 5,
    ObjAct = 7,
    Navigation = 10,
    NpcInvasion = 12,
    Platoon = 15,
    PatrolRoute = 20,
    Mount = 21,
    SignPool = 23,
    RetryPoint = 24,
    AreaTeam = 25,
    Other = 0xFFFF_FFFF,
}

impl EventType {
    pub fn from_code(code: u32) -> Result<Self> {
        use EventType::*;
        Ok(match code {
            4 => Treasure,
            5 => Spawner,
            7 => ObjAct,
            10 => Navigation,
            12 => NpcInvasion,
            15 => Platoon,
            20 => PatrolRoute,
            21 => Mount,
            23 => SignPool,
            24 => RetryPoint,
            25 => AreaTeam,
            0xFFFF_FFFF => Other,
            other => {
                return Err(MsbError::Format(FormatError::with_value(
                    "event_type",
                    "unrecognized event subtype code",
                    other,
                )))
            }
        })
    }

    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Per-subtype event payload. Subtypes whose exact fields this crate
/// doesn't otherwise need to interpret (`ObjAct`, `Navigation`, `Mount`,
/// `SignPool`, `RetryPoint`, `AreaTeam`, `Other`) are preserved as an
/// opaque byte blob rather than itemized field-by-field.
///
/// The subtypes carrying fixed-size reference arrays keep both the live
/// `Reference` array and a parallel staging-index array: the staging
/// array is what's actually read/written on disk, and is kept in sync
/// with the live references by `Event::restage_arrays` (write side) and
/// `Event::wire_arrays` (read side) — the same staging-then-wiring
/// pattern `Msb` uses for every other reference field.
#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    Treasure {
        item_lot: i32,
        action_button_param: i32,
    },
    Spawner {
        max_count: i16,
        spawn_count: i16,
        interval: f32,
        limit_count: i16,
        spawn_parts: Box<[Reference<Part>; SPAWNER_PART_SLOTS]>,
        #[cfg_attr(feature = "derive_serde", serde(skip))]
        spawn_parts_staging: Box<[i32; SPAWNER_PART_SLOTS]>,
        spawn_regions: Box<[Reference<Region>; SPAWNER_REGION_SLOTS]>,
        #[cfg_attr(feature = "derive_serde", serde(skip))]
        spawn_regions_staging: Box<[i32; SPAWNER_REGION_SLOTS]>,
    },
    NpcInvasion {
        host_event_entity_id: i32,
        invasion_point_index: i32,
        invasion_flag_id: i32,
        end_event_flag_id: i32,
    },
    Platoon {
        platoon_id_script_active: i32,
        state: i32,
        platoon_parts: Box<[Reference<Part>; PLATOON_PART_SLOTS]>,
        #[cfg_attr(feature = "derive_serde", serde(skip))]
        platoon_parts_staging: Box<[i32; PLATOON_PART_SLOTS]>,
    },
    PatrolRoute {
        patrol_regions: Box<[Reference<Region>; PATROL_ROUTE_REGION_SLOTS]>,
        #[cfg_attr(feature = "derive_serde", serde(skip))]
        patrol_regions_staging: Box<[i16; PATROL_ROUTE_REGION_SLOTS]>,
    },
    Opaque(Vec<u8>),
}

impl EventData {
    fn empty_for(subtype: EventType) -> Self {
        match subtype {
            EventType::Treasure => EventData::Treasure {
                item_lot: 0,
                action_button_param: -1,
            },
            EventType::Spawner => EventData::Spawner {
                max_count: 1,
                spawn_count: 1,
                interval: 1.0,
                limit_count: -1,
                spawn_parts: Box::new([None; SPAWNER_PART_SLOTS]),
                spawn_parts_staging: Box::new([-1; SPAWNER_PART_SLOTS]),
                spawn_regions: Box::new([None; SPAWNER_REGION_SLOTS]),
                spawn_regions_staging: Box::new([-1; SPAWNER_REGION_SLOTS]),
            },
            EventType::NpcInvasion => EventData::NpcInvasion {
                host_event_entity_id: 0,
                invasion_point_index: 0,
                invasion_flag_id: 0,
                end_event_flag_id: 0,
            },
            EventType::Platoon => EventData::Platoon {
                platoon_id_script_active: 0,
                state: 0,
                platoon_parts: Box::new([None; PLATOON_PART_SLOTS]),
                platoon_parts_staging: Box::new([-1; PLATOON_PART_SLOTS]),
            },
            EventType::PatrolRoute => EventData::PatrolRoute {
                patrol_regions: Box::new([None; PATROL_ROUTE_REGION_SLOTS]),
                patrol_regions_staging: Box::new([-1; PATROL_ROUTE_REGION_SLOTS]),
            },
            _ => EventData::Opaque(Vec::new()),
        }
    }

    /// Converts live references into staging indices against the given
    /// file-order vectors. Called just before serialize.
    pub fn restage(&mut self, part_order: &[EntryId<Part>], region_order: &[EntryId<Region>]) -> Result<()> {
        match self {
            EventData::Spawner {
                spawn_parts,
                spawn_parts_staging,
                spawn_regions,
                spawn_regions_staging,
                ..
            } => {
                for i in 0..SPAWNER_PART_SLOTS {
                    spawn_parts_staging[i] = reference::to_index(spawn_parts[i], part_order, "spawn_parts")?;
                }
                for i in 0..SPAWNER_REGION_SLOTS {
                    spawn_regions_staging[i] =
                        reference::to_index(spawn_regions[i], region_order, "spawn_regions")?;
                }
            }
            EventData::Platoon {
                platoon_parts,
                platoon_parts_staging,
                ..
            } => {
                for i in 0..PLATOON_PART_SLOTS {
                    platoon_parts_staging[i] =
                        reference::to_index(platoon_parts[i], part_order, "platoon_parts")?;
                }
            }
            EventData::PatrolRoute {
                patrol_regions,
                patrol_regions_staging,
                ..
            } => {
                for i in 0..PATROL_ROUTE_REGION_SLOTS {
                    patrol_regions_staging[i] =
                        reference::to_index16(patrol_regions[i], region_order, "patrol_regions")?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Wires live references from staging indices against the given
    /// file-order vectors. Called during the post-deserialize pass.
    pub fn wire(&mut self, part_order: &[EntryId<Part>], region_order: &[EntryId<Region>]) {
        match self {
            EventData::Spawner {
                spawn_parts,
                spawn_parts_staging,
                spawn_regions,
                spawn_regions_staging,
                ..
            } => {
                for i in 0..SPAWNER_PART_SLOTS {
                    spawn_parts[i] = reference::from_index(part_order, spawn_parts_staging[i] as i64, "spawn_parts");
                }
                for i in 0..SPAWNER_REGION_SLOTS {
                    spawn_regions[i] =
                        reference::from_index(region_order, spawn_regions_staging[i] as i64, "spawn_regions");
                }
            }
            EventData::Platoon {
                platoon_parts,
                platoon_parts_staging,
                ..
            } => {
                for i in 0..PLATOON_PART_SLOTS {
                    platoon_parts[i] =
                        reference::from_index(part_order, platoon_parts_staging[i] as i64, "platoon_parts");
                }
            }
            EventData::PatrolRoute {
                patrol_regions,
                patrol_regions_staging,
                ..
            } => {
                for i in 0..PATROL_ROUTE_REGION_SLOTS {
                    patrol_regions[i] =
                        reference::from_index(region_order, patrol_regions_staging[i] as i64, "patrol_regions");
                }
            }
            _ => {}
        }
    }
}

/// A logical trigger attached to a Part and/or a Region.
#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub subtype: EventType,
    pub subtype_index_override: SubtypeIndexOverride,
    pub attached_part: Reference<Part>,
    pub attached_region: Reference<Region>,
    pub map_id: [u8; 4],
    pub unk04: i32,
    pub unk08: i32,
    pub unk0c: i32,
    pub data: EventData,
    pub(crate) attached_part_staging: i32,
    pub(crate) attached_region_staging: i32,
}

impl Event {
    pub fn new(subtype: EventType) -> Self {
        Self {
            name: String::new(),
            subtype,
            subtype_index_override: NO_SUBTYPE_OVERRIDE,
            attached_part: None,
            attached_region: None,
            map_id: [0; 4],
            unk04: 0,
            unk08: 0,
            unk0c: 0,
            data: EventData::empty_for(subtype),
            attached_part_staging: -1,
            attached_region_staging: -1,
        }
    }

    pub fn restage_arrays(&mut self, part_order: &[EntryId<Part>], region_order: &[EntryId<Region>]) -> Result<()> {
        self.data.restage(part_order, region_order)
    }

    pub fn wire_arrays(&mut self, part_order: &[EntryId<Part>], region_order: &[EntryId<Region>]) {
        self.data.wire(part_order, region_order)
    }

    pub fn deserialize<S: Read + Seek>(stream: &mut ByteStream<S>) -> Result<Self> {
        let start = stream.position()?;
        let name_offset = stream.read_i64()?;
        let subtype_code = stream.read_u32()?;
        let subtype_index = stream.read_i32()?;
        let _unk14 = stream.read_i32()?;
        let attached_part_index = stream.read_i32()?;
        let attached_region_index = stream.read_i32()?;
        let map_id = [
            stream.read_u8()?,
            stream.read_u8()?,
            stream.read_u8()?,
            stream.read_u8()?,
        ];
        let unk08 = stream.read_i32()?;
        let unk0c = stream.read_i32()?;
        let subtype_data_offset = stream.read_i64()?;
        let extra_data_offset = stream.read_i64()?;

        let subtype = EventType::from_code(subtype_code)?;
        let subtype_index_override = if subtype == EventType::Other {
            subtype_index
        } else {
            NO_SUBTYPE_OVERRIDE
        };

        let name = stream.with_position(start + name_offset as u64, |s| s.read_utf16())?;

        let data = if subtype_data_offset != 0 {
            stream.with_position(start + subtype_data_offset as u64, |s| {
                read_event_data(s, subtype)
            })?
        } else {
            EventData::empty_for(subtype)
        };

        let unk04 = if extra_data_offset != 0 {
            stream.with_position(start + extra_data_offset as u64, |s| s.read_i32())?
        } else {
            0
        };

        Ok(Self {
            name,
            subtype,
            subtype_index_override,
            attached_part: None,
            attached_region: None,
            map_id,
            unk04,
            unk08,
            unk0c,
            data,
            attached_part_staging: attached_part_index,
            attached_region_staging: attached_region_index,
        })
    }

    pub fn serialize<S: Write + Seek>(
        &self,
        stream: &mut ByteStream<S>,
        subtype_index: i32,
        attached_part_index: i32,
        attached_region_index: i32,
    ) -> Result<()> {
        let start = stream.position()?;
        let mut r = Reserver::new(OffsetWidth::Bits64);
        r.reserve_offset(stream, "name")?;
        stream.write_u32(self.subtype.code())?;
        let written_index = if self.subtype == EventType::Other {
            self.subtype_index_override
        } else {
            subtype_index
        };
        stream.write_i32(written_index)?;
        stream.write_i32(-1)?; // hUnk14, unused
        stream.write_i32(attached_part_index)?;
        stream.write_i32(attached_region_index)?;
        stream.write_bytes(&self.map_id)?;
        stream.write_i32(self.unk08)?;
        stream.write_i32(self.unk0c)?;
        r.reserve_offset(stream, "subtype_data")?;
        r.reserve_offset(stream, "extra_data")?;

        r.fill_offset(stream, "name", stream.position()? - start)?;
        stream.write_utf16(&self.name)?;
        stream.align_write(8)?;

        r.fill_offset(stream, "subtype_data", stream.position()? - start)?;
        write_event_data(stream, &self.data)?;
        stream.align_write(8)?;

        r.fill_offset(stream, "extra_data", stream.position()? - start)?;
        stream.write_i32(self.unk04)?;
        stream.write_i32(0)?;
        stream.write_i32(0)?;
        stream.align_write(8)?;

        r.finish()
    }
}

fn read_event_data<S: Read + Seek>(stream: &mut ByteStream<S>, subtype: EventType) -> Result<EventData> {
    Ok(match subtype {
        EventType::Treasure => EventData::Treasure {
            item_lot: stream.read_i32()?,
            action_button_param: stream.read_i32()?,
        },
        EventType::Spawner => {
            let max_count = stream.read_i16()?;
            let spawn_count = stream.read_i16()?;
            let interval = stream.read_f32()?;
            let limit_count = stream.read_i16()?;
            stream.assert_padding(2, 0)?;
            let mut spawn_parts_staging = [0i32; SPAWNER_PART_SLOTS];
            for v in spawn_parts_staging.iter_mut() {
                *v = stream.read_i32()?;
            }
            let mut spawn_regions_staging = [0i32; SPAWNER_REGION_SLOTS];
            for v in spawn_regions_staging.iter_mut() {
                *v = stream.read_i32()?;
            }
            EventData::Spawner {
                max_count,
                spawn_count,
                interval,
                limit_count,
                spawn_parts: Box::new([None; SPAWNER_PART_SLOTS]),
                spawn_parts_staging: Box::new(spawn_parts_staging),
                spawn_regions: Box::new([None; SPAWNER_REGION_SLOTS]),
                spawn_regions_staging: Box::new(spawn_regions_staging),
            }
        }
        EventType::NpcInvasion => EventData::NpcInvasion {
            host_event_entity_id: stream.read_i32()?,
            invasion_point_index: stream.read_i32()?,
            invasion_flag_id: stream.read_i32()?,
            end_event_flag_id: stream.read_i32()?,
        },
        EventType::Platoon => {
            let platoon_id_script_active = stream.read_i32()?;
            let state = stream.read_i32()?;
            let mut staging = [0i32; PLATOON_PART_SLOTS];
            for v in staging.iter_mut() {
                *v = stream.read_i32()?;
            }
            EventData::Platoon {
                platoon_id_script_active,
                state,
                platoon_parts: Box::new([None; PLATOON_PART_SLOTS]),
                platoon_parts_staging: Box::new(staging),
            }
        }
        EventType::PatrolRoute => {
            let mut staging = [0i16; PATROL_ROUTE_REGION_SLOTS];
            for v in staging.iter_mut() {
                *v = stream.read_i16()?;
            }
            EventData::PatrolRoute {
                patrol_regions: Box::new([None; PATROL_ROUTE_REGION_SLOTS]),
                patrol_regions_staging: Box::new(staging),
            }
        }
        _ => EventData::Opaque(Vec::new()),
    })
}

fn write_event_data<S: Write + Seek>(stream: &mut ByteStream<S>, data: &EventData) -> Result<()> {
    match data {
        EventData::Treasure {
            item_lot,
            action_button_param,
        } => {
            stream.write_i32(*item_lot)?;
            stream.write_i32(*action_button_param)?;
        }
        EventData::Spawner {
            max_count,
            spawn_count,
            interval,
            limit_count,
            spawn_parts_staging,
            spawn_regions_staging,
            ..
        } => {
            stream.write_i16(*max_count)?;
            stream.write_i16(*spawn_count)?;
            stream.write_f32(*interval)?;
            stream.write_i16(*limit_count)?;
            stream.write_padding(2, 0)?;
            for v in spawn_parts_staging.iter() {
                stream.write_i32(*v)?;
            }
            for v in spawn_regions_staging.iter() {
                stream.write_i32(*v)?;
            }
        }
        EventData::NpcInvasion {
            host_event_entity_id,
            invasion_point_index,
            invasion_flag_id,
            end_event_flag_id,
        } => {
            stream.write_i32(*host_event_entity_id)?;
            stream.write_i32(*invasion_point_index)?;
            stream.write_i32(*invasion_flag_id)?;
            stream.write_i32(*end_event_flag_id)?;
        }
        EventData::Platoon {
            platoon_id_script_active,
            state,
            platoon_parts_staging,
            ..
        } => {
            stream.write_i32(*platoon_id_script_active)?;
            stream.write_i32(*state)?;
            for v in platoon_parts_staging.iter() {
                stream.write_i32(*v)?;
            }
        }
        EventData::PatrolRoute {
            patrol_regions_staging,
            ..
        } => {
            for v in patrol_regions_staging.iter() {
                stream.write_i16(*v)?;
            }
        }
        EventData::Opaque(bytes) => {
            stream.write_bytes(bytes)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn treasure_event_round_trips() {
        let mut event = Event::new(EventType::Treasure);
        event.name = "treasure_0".to_string();
        if let EventData::Treasure { item_lot, .. } = &mut event.data {
            *item_lot = 5000;
        }

        let mut buf = ByteStream::new(Cursor::new(Vec::new()));
        event.serialize(&mut buf, 0, -1, -1).unwrap();

        let mut cursor = buf.into_inner();
        cursor.set_position(0);
        let decoded = Event::deserialize(&mut ByteStream::new(cursor)).unwrap();
        assert_eq!(decoded.name, event.name);
        assert_eq!(decoded.data, event.data);
    }

    #[test]
    fn patrol_route_staging_round_trips() {
        let mut event = Event::new(EventType::PatrolRoute);
        if let EventData::PatrolRoute {
            patrol_regions_staging,
            ..
        } = &mut event.data
        {
            patrol_regions_staging[3] = 7;
        }

        let mut buf = ByteStream::new(Cursor::new(Vec::new()));
        event.serialize(&mut buf, 0, -1, -1).unwrap();

        let mut cursor = buf.into_inner();
        cursor.set_position(0);
        let decoded = Event::deserialize(&mut ByteStream::new(cursor)).unwrap();
        match decoded.data {
            EventData::PatrolRoute {
                patrol_regions_staging,
                ..
            } => assert_eq!(patrol_regions_staging[3], 7),
            _ => panic!("expected PatrolRoute data"),
        }
    }
}
