use std::io::Cursor;

use msb::entries::event::{EventData, EventType};
use msb::entries::model::ModelType;
use msb::entries::part::PartType;
use msb::entries::region::RegionType;
use msb::shape::Shape;
use msb::{Model, Msb, Part, Region};

#[test]
fn rename_propagation_keeps_reference_resolved() {
    let mut msb = Msb::new();
    let model_id = msb.models.add(Model::new(ModelType::MapPiece));

    let mut part = Part::new(PartType::MapPiece);
    part.model = Some(model_id);
    msb.parts.add(part);

    msb.models.get_mut(model_id).unwrap().name = "m999999".to_string();

    let mut buf = Vec::new();
    msb.write_to(&mut Cursor::new(&mut buf)).unwrap();
    let reloaded = Msb::read_from(&mut Cursor::new(&buf)).unwrap();

    let (_, model) = reloaded.models.iter().next().unwrap();
    assert_eq!(model.name, "m999999");
    let (_, part) = reloaded.parts.iter().next().unwrap();
    assert!(part.model.is_some());
}

#[test]
fn composite_shape_preserves_populated_slots() {
    let mut msb = Msb::new();
    let mut targets = Vec::new();
    for i in 0..3 {
        let mut r = Region::new(RegionType::General);
        r.name = format!("child_{i}");
        targets.push(msb.regions.add(r));
    }

    let mut composite = Region::new(RegionType::General);
    composite.name = "composite".to_string();
    composite.set_shape(Shape::Composite);
    {
        let children = composite.composite_children.as_mut().unwrap();
        children.set(0, Some(targets[0]));
        children.set(2, Some(targets[1]));
        children.set(5, Some(targets[2]));
    }
    msb.regions.add(composite);

    let mut buf = Vec::new();
    msb.write_to(&mut Cursor::new(&mut buf)).unwrap();
    let reloaded = Msb::read_from(&mut Cursor::new(&buf)).unwrap();

    let composite = reloaded
        .regions
        .iter()
        .map(|(_, r)| r)
        .find(|r| r.name == "composite")
        .unwrap();
    let children = composite.composite_children.as_ref().unwrap();
    assert!(children.children[0].is_some());
    assert!(children.children[2].is_some());
    assert!(children.children[5].is_some());
    for slot in [1, 3, 4, 6, 7] {
        assert!(children.children[slot].is_none(), "slot {slot} should be empty");
    }
}

#[test]
fn patrol_route_index_overflow_on_serialize_is_rejected() {
    let mut msb = Msb::new();

    for i in 0..32_900 {
        let mut e = msb::entries::event::Event::new(EventType::PatrolRoute);
        e.name = format!("patrol_{i}");
        msb.events.add(e);
    }

    let mut character = Part::new(PartType::Character);
    let last_patrol_id = msb.events.iter().map(|(id, _)| id).last().unwrap();
    character.patrol_route_event = Some(last_patrol_id);
    msb.parts.add(character);

    let mut buf = Vec::new();
    let result = msb.write_to(&mut Cursor::new(&mut buf));
    assert!(result.is_err());
}

#[test]
fn opaque_event_subtype_data_round_trips_verbatim() {
    let mut msb = Msb::new();
    let event = msb::entries::event::Event::new(EventType::Mount);
    assert!(matches!(event.data, EventData::Opaque(_)));
    msb.events.add(event);

    let mut buf = Vec::new();
    msb.write_to(&mut Cursor::new(&mut buf)).unwrap();
    let reloaded = Msb::read_from(&mut Cursor::new(&buf)).unwrap();
    assert_eq!(reloaded.events.len(), 1);
}
