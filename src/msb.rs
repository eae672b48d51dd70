//! Top-level container: file header, the six Params in fixed order, and
//! the two-pass reference resolution that turns staged indices into
//! live references (on read) or back again (on write).

use std::io::{Read, Seek, Write};

use crate::byte_stream::ByteStream;
use crate::entries::event::{Event, EventType};
use crate::entries::layer::Layer;
use crate::entries::model::{Model, ModelType};
use crate::entries::part::{Part, PartType};
use crate::entries::region::{Region, RegionType};
use crate::entries::route::{Route, RouteType};
use crate::error::{FormatError, MsbError, Result};
use crate::param::{serialize_param, EntryParam};
use crate::reference::{self, EntryId};

const SIGNATURE: [u8; 4] = *b"MSB ";
const FORMAT_VERSION: i32 = 1;
const HEADER_SIZE: i32 = 16;
const UNICODE_FLAG: u8 = 1;
const RESERVED_BYTE: u8 = 255;

const MODEL_PARAM_NAME: &str = "MODEL_PARAM_ST";
const EVENT_PARAM_NAME: &str = "EVENT_PARAM_ST";
const REGION_PARAM_NAME: &str = "POINT_PARAM_ST";
const ROUTE_PARAM_NAME: &str = "ROUTE_PARAM_ST";
const LAYER_PARAM_NAME: &str = "LAYER_PARAM_ST";
const PART_PARAM_NAME: &str = "PARTS_PARAM_ST";

const MODEL_ORDER: [ModelType; 5] = [
    ModelType::MapPiece,
    ModelType::Character,
    ModelType::Player,
    ModelType::Collision,
    ModelType::Asset,
];

const EVENT_ORDER: [EventType; 12] = [
    EventType::Treasure,
    EventType::Spawner,
    EventType::ObjAct,
    EventType::Navigation,
    EventType::NpcInvasion,
    EventType::Platoon,
    EventType::PatrolRoute,
    EventType::Mount,
    EventType::SignPool,
    EventType::RetryPoint,
    EventType::AreaTeam,
    EventType::Other,
];

const REGION_ORDER: [RegionType; 35] = [
    RegionType::General,
    RegionType::InvasionPoint,
    RegionType::EnvironmentMapPoint,
    RegionType::Sound,
    RegionType::Sfx,
    RegionType::WindSfx,
    RegionType::SpawnPoint,
    RegionType::Message,
    RegionType::WalkRoute,
    RegionType::WarpPoint,
    RegionType::ActivationArea,
    RegionType::Event,
    RegionType::Logic,
    RegionType::EnvironmentMapEffectBox,
    RegionType::WindArea,
    RegionType::Connection,
    RegionType::PatrolRouteEvent,
    RegionType::BuddySummonPoint,
    RegionType::MufflingBox,
    RegionType::MufflingPortal,
    RegionType::SoundOverride,
    RegionType::PatrolRoute,
    RegionType::MapPoint,
    RegionType::WeatherOverride,
    RegionType::AutoDrawGroupPoint,
    RegionType::GroupDefeatReward,
    RegionType::MapNameTrigger,
    RegionType::MountJump,
    RegionType::Dummy,
    RegionType::FallPreventionRemoval,
    RegionType::NavmeshCost,
    RegionType::HitsetEditArea,
    RegionType::NpcSpawnPoint,
    RegionType::OtherArea,
    RegionType::Other,
];

const ROUTE_ORDER: [RouteType; 3] = [RouteType::MufflingPortal, RouteType::MufflingBox, RouteType::Other];

const PART_ORDER: [PartType; 8] = [
    PartType::MapPiece,
    PartType::Character,
    PartType::PlayerStart,
    PartType::Collision,
    PartType::DummyAsset,
    PartType::DummyCharacter,
    PartType::ConnectCollision,
    PartType::Asset,
];

/// One loaded (or freshly created) map-description file.
pub struct Msb {
    pub models: EntryParam<Model>,
    pub events: EntryParam<Event>,
    pub regions: EntryParam<Region>,
    pub routes: EntryParam<Route>,
    pub layers: EntryParam<Layer>,
    pub parts: EntryParam<Part>,
}

impl Default for Msb {
    fn default() -> Self {
        Self::new()
    }
}

impl Msb {
    pub fn new() -> Self {
        Self {
            models: EntryParam::new(MODEL_PARAM_NAME, 0),
            events: EntryParam::new(EVENT_PARAM_NAME, 0),
            regions: EntryParam::new(REGION_PARAM_NAME, 0),
            routes: EntryParam::new(ROUTE_PARAM_NAME, 0),
            layers: EntryParam::new(LAYER_PARAM_NAME, 0),
            parts: EntryParam::new(PART_PARAM_NAME, 0),
        }
    }

    pub fn read_from<S: Read + Seek>(stream: &mut S) -> Result<Self> {
        let mut stream = ByteStream::new(stream);
        read_header(&mut stream)?;

        let model_start = stream.position()?;
        let (models, model_order, next1) = EntryParam::<Model>::deserialize(&mut stream, MODEL_PARAM_NAME)?;

        stream.seek(model_start + next1 as u64)?;
        let event_start = stream.position()?;
        let (mut events, event_order, next2) = EntryParam::<Event>::deserialize(&mut stream, EVENT_PARAM_NAME)?;

        stream.seek(event_start + next2 as u64)?;
        let region_start = stream.position()?;
        let (mut regions, region_order, next3) =
            EntryParam::<Region>::deserialize(&mut stream, REGION_PARAM_NAME)?;

        stream.seek(region_start + next3 as u64)?;
        let route_start = stream.position()?;
        let (routes, _route_order, next4) = EntryParam::<Route>::deserialize(&mut stream, ROUTE_PARAM_NAME)?;

        stream.seek(route_start + next4 as u64)?;
        let layer_start = stream.position()?;
        let (layers, _layer_order, next5) = EntryParam::<Layer>::deserialize(&mut stream, LAYER_PARAM_NAME)?;

        stream.seek(layer_start + next5 as u64)?;
        let (mut parts, part_order, _next6) = EntryParam::<Part>::deserialize(&mut stream, PART_PARAM_NAME)?;

        wire_references(
            &mut events,
            &event_order,
            &mut regions,
            &region_order,
            &mut parts,
            &part_order,
            &model_order,
        );

        Ok(Self {
            models,
            events,
            regions,
            routes,
            layers,
            parts,
        })
    }

    pub fn write_to<S: Write + Seek>(&mut self, stream: &mut S) -> Result<()> {
        let model_order = self.models.file_order(&MODEL_ORDER, |m| m.subtype);
        let event_order = self.events.file_order(&EVENT_ORDER, |e| e.subtype);
        let region_order = self.regions.file_order(&REGION_ORDER, |r| r.subtype);
        let route_order = self.routes.file_order(&ROUTE_ORDER, |r| r.subtype);
        let part_order = self.parts.file_order(&PART_ORDER, |p| p.subtype);

        let collision_only_order: Vec<EntryId<Part>> = part_order
            .iter()
            .copied()
            .filter(|&id| self.parts.get(id).map(|p| p.subtype) == Some(PartType::Collision))
            .collect();
        let patrol_route_only_order: Vec<EntryId<Event>> = event_order
            .iter()
            .copied()
            .filter(|&id| self.events.get(id).map(|e| e.subtype) == Some(EventType::PatrolRoute))
            .collect();

        recompute_model_instance_counts(&mut self.models, &self.parts, &part_order);
        restage_references(
            &mut self.events,
            &event_order,
            &region_order,
            &part_order,
            &mut self.regions,
            &region_order,
            &part_order,
            &mut self.parts,
            &model_order,
            &collision_only_order,
            &patrol_route_only_order,
        )?;

        let mut stream = ByteStream::new(stream);
        write_header(&mut stream)?;

        let model_start = stream.position()?;
        let models = &self.models;
        let next1 = serialize_param(&mut stream, MODEL_PARAM_NAME, models.version, &model_order, |s, id| {
            let idx = models.subtype_index(&model_order, id, |m| m.subtype);
            models.get(id).unwrap().serialize(s, idx)
        })?;

        let event_start = stream.position()?;
        patch_next_offset(&mut stream, next1, event_start - model_start)?;
        let events = &self.events;
        let next2 = serialize_param(&mut stream, EVENT_PARAM_NAME, events.version, &event_order, |s, id| {
            let idx = events.subtype_index(&event_order, id, |e| e.subtype);
            let e = events.get(id).unwrap();
            e.serialize(s, idx, e.attached_part_staging, e.attached_region_staging)
        })?;

        let region_start = stream.position()?;
        patch_next_offset(&mut stream, next2, region_start - event_start)?;
        let regions = &self.regions;
        let next3 = serialize_param(&mut stream, REGION_PARAM_NAME, regions.version, &region_order, |s, id| {
            let idx = regions.subtype_index(&region_order, id, |r| r.subtype);
            let r = regions.get(id).unwrap();
            r.serialize(s, idx, r.attached_part_staging, r.composite_staging)
        })?;

        let route_start = stream.position()?;
        patch_next_offset(&mut stream, next3, route_start - region_start)?;
        let routes = &self.routes;
        let next4 = serialize_param(&mut stream, ROUTE_PARAM_NAME, routes.version, &route_order, |s, id| {
            let idx = routes.subtype_index(&route_order, id, |r| r.subtype);
            routes.get(id).unwrap().serialize(s, idx)
        })?;

        let layer_start = stream.position()?;
        patch_next_offset(&mut stream, next4, layer_start - route_start)?;
        let empty_layer_order: Vec<EntryId<Layer>> = Vec::new();
        let next5 = serialize_param(
            &mut stream,
            LAYER_PARAM_NAME,
            self.layers.version,
            &empty_layer_order,
            |_s, _id| unreachable!("the Layer Param never has entries to encode"),
        )?;

        let part_start = stream.position()?;
        patch_next_offset(&mut stream, next5, part_start - layer_start)?;
        let parts = &self.parts;
        let next6 = serialize_param(&mut stream, PART_PARAM_NAME, parts.version, &part_order, |s, id| {
            let idx = parts.subtype_index(&part_order, id, |p| p.subtype);
            let p = parts.get(id).unwrap();
            p.serialize(
                s,
                idx,
                p.model_staging,
                p.connected_collision_staging,
                p.patrol_route_event_staging,
            )
        })?;

        patch_next_offset(&mut stream, next6, 0)?;

        Ok(())
    }
}

fn read_header<S: Read + Seek>(stream: &mut ByteStream<S>) -> Result<()> {
    let signature = stream.read_bytes(4)?;
    if signature != SIGNATURE {
        return Err(MsbError::Format(FormatError::with_value(
            "signature",
            "expected `MSB `",
            signature,
        )));
    }
    let version = stream.read_i32()?;
    if version != FORMAT_VERSION {
        return Err(MsbError::Format(FormatError::with_value(
            "version",
            "unsupported format version",
            version,
        )));
    }
    let header_size = stream.read_i32()?;
    if header_size != HEADER_SIZE {
        return Err(MsbError::Format(FormatError::with_value(
            "header_size",
            "expected 16",
            header_size,
        )));
    }
    stream.assert_padding(2, 0)?; // big_endian, bit_big_endian
    let unicode = stream.read_u8()?;
    if unicode != UNICODE_FLAG {
        return Err(MsbError::Format(FormatError::with_value(
            "unicode_flag",
            "only UTF-16 string tables are supported",
            unicode,
        )));
    }
    let reserved = stream.read_u8()?;
    if reserved != RESERVED_BYTE {
        return Err(MsbError::Format(FormatError::with_value(
            "reserved",
            "expected 0xFF",
            reserved,
        )));
    }
    Ok(())
}

fn write_header<S: Write + Seek>(stream: &mut ByteStream<S>) -> Result<()> {
    stream.write_bytes(&SIGNATURE)?;
    stream.write_i32(FORMAT_VERSION)?;
    stream.write_i32(HEADER_SIZE)?;
    stream.write_padding(2, 0)?;
    stream.write_u8(UNICODE_FLAG)?;
    stream.write_u8(RESERVED_BYTE)?;
    Ok(())
}

fn patch_next_offset<S: Write + Seek>(
    stream: &mut ByteStream<S>,
    slot_position: u64,
    value: u64,
) -> Result<()> {
    let saved = stream.position()?;
    stream.seek(slot_position)?;
    stream.write_i64(value as i64)?;
    stream.seek(saved)?;
    Ok(())
}

fn recompute_model_instance_counts(
    models: &mut EntryParam<Model>,
    parts: &EntryParam<Part>,
    part_order: &[EntryId<Part>],
) {
    let model_ids: Vec<EntryId<Model>> = models.iter().map(|(id, _)| id).collect();
    for model_id in model_ids {
        let count = part_order
            .iter()
            .filter(|&&pid| parts.get(pid).and_then(|p| p.model) == Some(model_id))
            .count() as i32;
        if let Some(model) = models.get_mut(model_id) {
            model.instance_count = count;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn restage_references(
    events: &mut EntryParam<Event>,
    event_order: &[EntryId<Event>],
    region_order_for_events: &[EntryId<Region>],
    part_order_for_events: &[EntryId<Part>],
    regions: &mut EntryParam<Region>,
    region_order: &[EntryId<Region>],
    part_order_for_regions: &[EntryId<Part>],
    parts: &mut EntryParam<Part>,
    model_order: &[EntryId<Model>],
    collision_only_order: &[EntryId<Part>],
    patrol_route_only_order: &[EntryId<Event>],
) -> Result<()> {
    for &id in event_order {
        let event = events.get_mut(id).expect("file_order yields only live ids");
        event.attached_part_staging =
            reference::to_index(event.attached_part, part_order_for_events, "attached_part")?;
        event.attached_region_staging =
            reference::to_index(event.attached_region, region_order_for_events, "attached_region")?;
        event.restage_arrays(part_order_for_events, region_order_for_events)?;
    }

    for &id in region_order {
        let region = regions.get_mut(id).expect("file_order yields only live ids");
        region.attached_part_staging =
            reference::to_index(region.attached_part, part_order_for_regions, "attached_part")?;
        if let Some(children) = &region.composite_children {
            let mut staged = [-1i32; crate::shape::COMPOSITE_CHILD_SLOTS];
            for i in 0..crate::shape::COMPOSITE_CHILD_SLOTS {
                staged[i] = reference::to_index(children.children[i], region_order, "composite_children")?;
            }
            region.composite_staging = Some(staged);
        } else {
            region.composite_staging = None;
        }
    }

    for &id in parts.iter().map(|(id, _)| id).collect::<Vec<_>>().iter() {
        let part = parts.get_mut(id).expect("arena iteration yields only live ids");
        part.model_staging = reference::to_index(part.model, model_order, "model")?;
        part.connected_collision_staging =
            reference::to_index(part.connected_collision, collision_only_order, "connected_collision")?;
        part.patrol_route_event_staging = reference::to_index16(
            part.patrol_route_event,
            patrol_route_only_order,
            "patrol_route_event",
        )?;
    }

    Ok(())
}

fn wire_references(
    events: &mut EntryParam<Event>,
    event_order: &[EntryId<Event>],
    regions: &mut EntryParam<Region>,
    region_order: &[EntryId<Region>],
    parts: &mut EntryParam<Part>,
    part_order: &[EntryId<Part>],
    model_order: &[EntryId<Model>],
) {
    let collision_only_order: Vec<EntryId<Part>> = part_order
        .iter()
        .copied()
        .filter(|&id| parts.get(id).map(|p| p.subtype) == Some(PartType::Collision))
        .collect();
    let patrol_route_only_order: Vec<EntryId<Event>> = event_order
        .iter()
        .copied()
        .filter(|&id| events.get(id).map(|e| e.subtype) == Some(EventType::PatrolRoute))
        .collect();

    for &id in event_order {
        let event = events.get_mut(id).expect("file_order yields only live ids");
        event.attached_part = reference::from_index(part_order, event.attached_part_staging as i64, "attached_part");
        event.attached_region =
            reference::from_index(region_order, event.attached_region_staging as i64, "attached_region");
        event.wire_arrays(part_order, region_order);
    }

    for &id in region_order {
        let region = regions.get_mut(id).expect("file_order yields only live ids");
        region.attached_part =
            reference::from_index(part_order, region.attached_part_staging as i64, "attached_part");
        if let Some(staged) = region.composite_staging {
            let mut children = crate::shape::CompositeChildren::new();
            children.unk04 = region
                .composite_children
                .as_ref()
                .map(|c| c.unk04)
                .unwrap_or([0; crate::shape::COMPOSITE_CHILD_SLOTS]);
            for i in 0..crate::shape::COMPOSITE_CHILD_SLOTS {
                children.children[i] = reference::from_index(region_order, staged[i] as i64, "composite_children");
            }
            region.composite_children = Some(children);
        }
    }

    let part_ids: Vec<EntryId<Part>> = parts.iter().map(|(id, _)| id).collect();
    for id in part_ids {
        let part = parts.get_mut(id).expect("arena iteration yields only live ids");
        part.model = reference::from_index(model_order, part.model_staging as i64, "model");
        part.connected_collision = reference::from_index(
            &collision_only_order,
            part.connected_collision_staging as i64,
            "connected_collision",
        );
        part.patrol_route_event = reference::from_index(
            &patrol_route_only_order,
            part.patrol_route_event_staging as i64,
            "patrol_route_event",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_msb_round_trips_with_exact_header_bytes() {
        let mut msb = Msb::new();
        let mut buf = Vec::new();
        msb.write_to(&mut Cursor::new(&mut buf)).unwrap();

        assert_eq!(
            &buf[0..16],
            &[0x4D, 0x53, 0x42, 0x20, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0xFF]
        );

        let reloaded = Msb::read_from(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(reloaded.models.len(), 0);
        assert_eq!(reloaded.events.len(), 0);
        assert_eq!(reloaded.regions.len(), 0);
        assert_eq!(reloaded.routes.len(), 0);
        assert_eq!(reloaded.layers.len(), 0);
        assert_eq!(reloaded.parts.len(), 0);
    }

    #[test]
    fn malformed_signature_is_rejected() {
        let mut msb = Msb::new();
        let mut buf = Vec::new();
        msb.write_to(&mut Cursor::new(&mut buf)).unwrap();
        buf[0] = b'X';

        let err = Msb::read_from(&mut Cursor::new(&buf)).unwrap_err();
        match err {
            MsbError::Format(e) => assert_eq!(e.field, "signature"),
            other => panic!("expected a FormatError, got {other:?}"),
        }
    }

    #[test]
    fn model_instance_count_recomputed_from_parts() {
        let mut msb = Msb::new();
        let m = msb.models.add(Model::new(ModelType::MapPiece));
        let n = msb.models.add(Model::new(ModelType::MapPiece));

        for _ in 0..4 {
            let mut part = Part::new(PartType::MapPiece);
            part.model = Some(m);
            msb.parts.add(part);
        }
        let mut part_n = Part::new(PartType::MapPiece);
        part_n.model = Some(n);
        msb.parts.add(part_n);
        msb.parts.add(Part::new(PartType::MapPiece));
        msb.parts.add(Part::new(PartType::MapPiece));

        let mut buf = Vec::new();
        msb.write_to(&mut Cursor::new(&mut buf)).unwrap();
        let reloaded = Msb::read_from(&mut Cursor::new(&buf)).unwrap();

        let counts: Vec<i32> = reloaded.models.iter().map(|(_, m)| m.instance_count).collect();
        assert!(counts.contains(&4));
        assert!(counts.contains(&1));
    }

    #[test]
    fn spawner_reference_nulls_after_deleting_target() {
        let mut msb = Msb::new();
        let mut character = Part::new(PartType::Character);
        character.name = "C".to_string();
        let c_id = msb.parts.add(character);

        let mut spawner = Event::new(EventType::Spawner);
        if let crate::entries::event::EventData::Spawner { spawn_parts, .. } = &mut spawner.data {
            spawn_parts[3] = Some(c_id);
        }
        msb.events.add(spawner);

        msb.parts.remove(c_id);

        let mut buf = Vec::new();
        msb.write_to(&mut Cursor::new(&mut buf)).unwrap();
        let reloaded = Msb::read_from(&mut Cursor::new(&buf)).unwrap();

        let (_, ev) = reloaded.events.iter().next().unwrap();
        if let crate::entries::event::EventData::Spawner { spawn_parts, .. } = &ev.data {
            assert!(spawn_parts[3].is_none());
        } else {
            panic!("expected Spawner data");
        }
    }
}
