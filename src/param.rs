//! A typed list of entries of one supertype, grouped by subtype for
//! write order but flattened to file order for reference resolution.
//!
//! Entries are no longer addressed through a virtual base pointer (the
//! original design's `EntryParam` held `vector<Entry*>`); instead each
//! Param owns an `Arena<T>`, and callers hold `EntryId<T>` handles that
//! stay valid across any future add/remove.

use std::collections::HashMap;
use std::hash::Hash;
use std::io::{Read, Seek, Write};

use crate::byte_stream::ByteStream;
use crate::entries::{Event, Layer, Model, Part, Region, Route};
use crate::error::{FormatError, MsbError, Result};
use crate::reference::{Arena, EntryId};
use crate::reserver::{OffsetWidth, Reserver};

/// Implemented by every concrete entry type so `EntryParam` can decode
/// one without the caller naming the type explicitly.
pub trait Decodable: Sized {
    fn decode<S: Read + Seek>(stream: &mut ByteStream<S>) -> Result<Self>;
}

impl Decodable for Model {
    fn decode<S: Read + Seek>(stream: &mut ByteStream<S>) -> Result<Self> {
        Model::deserialize(stream)
    }
}

impl Decodable for Event {
    fn decode<S: Read + Seek>(stream: &mut ByteStream<S>) -> Result<Self> {
        Event::deserialize(stream)
    }
}

impl Decodable for Region {
    fn decode<S: Read + Seek>(stream: &mut ByteStream<S>) -> Result<Self> {
        Region::deserialize(stream)
    }
}

impl Decodable for Route {
    fn decode<S: Read + Seek>(stream: &mut ByteStream<S>) -> Result<Self> {
        Route::deserialize(stream)
    }
}

impl Decodable for Part {
    fn decode<S: Read + Seek>(stream: &mut ByteStream<S>) -> Result<Self> {
        Part::deserialize(stream)
    }
}

impl Decodable for Layer {
    fn decode<S: Read + Seek>(_stream: &mut ByteStream<S>) -> Result<Self> {
        unreachable!("the Layer Param never has entries to decode")
    }
}

/// Owns every entry of one supertype. `K` is the subtype key used to
/// group entries for the fixed write order (a `PartType`, `RegionType`,
/// and so on); it carries no data of its own, just identity and order.
pub struct EntryParam<T> {
    pub param_name: &'static str,
    pub version: i32,
    arena: Arena<T>,
}

impl<T> EntryParam<T> {
    pub fn new(param_name: &'static str, version: i32) -> Self {
        Self {
            param_name,
            version,
            arena: Arena::new(),
        }
    }

    pub fn add(&mut self, entry: T) -> EntryId<T> {
        self.arena.insert(entry)
    }

    /// Removes the entry. Any `Reference<T>` aimed at it resolves to
    /// `None` from this point on.
    pub fn remove(&mut self, id: EntryId<T>) -> Option<T> {
        self.arena.remove(id)
    }

    pub fn get(&self, id: EntryId<T>) -> Option<&T> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: EntryId<T>) -> Option<&mut T> {
        self.arena.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntryId<T>, &T)> {
        self.arena.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntryId<T>, &mut T)> {
        self.arena.iter_mut()
    }

    /// The order entries are written in: grouped by subtype in
    /// `subtype_order`, insertion order within a subtype. This is also
    /// the order every index field in this Param is resolved against.
    pub fn file_order<K: Eq + Hash + Clone>(
        &self,
        subtype_order: &[K],
        key_of: impl Fn(&T) -> K,
    ) -> Vec<EntryId<T>> {
        let mut buckets: HashMap<K, Vec<EntryId<T>>> = HashMap::new();
        for (id, entry) in self.arena.iter() {
            buckets.entry(key_of(entry)).or_default().push(id);
        }
        let mut order = Vec::with_capacity(self.arena.len());
        for key in subtype_order {
            if let Some(ids) = buckets.remove(key) {
                order.extend(ids);
            }
        }
        order
    }

    /// Per-subtype running index of `id` within `order`, i.e. its
    /// position among only the entries sharing its subtype key.
    pub fn subtype_index<K: Eq + Hash + Clone>(
        &self,
        order: &[EntryId<T>],
        id: EntryId<T>,
        key_of: impl Fn(&T) -> K,
    ) -> i32 {
        let target_key = self.get(id).map(&key_of);
        let mut count = 0i32;
        for &oid in order {
            if oid == id {
                return count;
            }
            if self.get(oid).map(&key_of) == target_key {
                count += 1;
            }
        }
        0
    }
}

impl<T: Decodable> EntryParam<T> {
    /// Reads a whole Param: version, entry-offset table, param-name
    /// validation, then one decode per entry offset. Returns the decoded
    /// Param plus the flat file-order id vector and the raw
    /// "next-Param offset" position for the caller to follow.
    pub fn deserialize<S: Read + Seek>(
        stream: &mut ByteStream<S>,
        param_name: &'static str,
    ) -> Result<(Self, Vec<EntryId<T>>, i64)> {
        let start = stream.position()?;
        let version = stream.read_i32()?;
        let offset_count = stream.read_i32()?;
        if offset_count < 1 {
            return Err(MsbError::Format(FormatError::with_value(
                "entry_offset_count",
                "must include at least the next-Param offset slot",
                offset_count,
            )));
        }
        let param_name_offset = stream.read_i64()?;

        let entry_count = offset_count as usize - 1;
        let mut entry_offsets = Vec::with_capacity(entry_count);
        for _ in 0..entry_count {
            entry_offsets.push(stream.read_i64()?);
        }
        let next_param_offset = stream.read_i64()?;

        let actual_name =
            stream.with_position(start + param_name_offset as u64, |s| s.read_utf16())?;
        if actual_name != param_name {
            return Err(MsbError::Format(FormatError::with_value(
                "param_name",
                format!("expected `{param_name}`"),
                actual_name,
            )));
        }

        let mut param = Self::new(param_name, version);
        let mut order = Vec::with_capacity(entry_count);
        for offset in entry_offsets {
            let entry = stream.with_position(start + offset as u64, T::decode)?;
            order.push(param.add(entry));
        }

        Ok((param, order, next_param_offset))
    }
}

/// Writes a whole Param using `encode_entry` to serialize each entry in
/// file order. `encode_entry` is responsible for resolving whatever
/// reference indices that entry type needs; this function only handles
/// the offset table, param name, and next-Param offset bookkeeping
/// common to every supertype.
///
/// Returns the absolute stream position of the "next-Param offset"
/// slot, which the caller (the top-level container) fills in once the
/// following Param's start position — or zero, for the last Param — is
/// known.
pub fn serialize_param<S: Write + Seek, T>(
    stream: &mut ByteStream<S>,
    param_name: &str,
    version: i32,
    order: &[EntryId<T>],
    mut encode_entry: impl FnMut(&mut ByteStream<S>, EntryId<T>) -> Result<()>,
) -> Result<u64> {
    let start = stream.position()?;
    let mut r = Reserver::new(OffsetWidth::Bits64);
    stream.write_i32(version)?;
    stream.write_i32(order.len() as i32 + 1)?;
    r.reserve_offset(stream, "param_name")?;
    for i in 0..order.len() {
        r.reserve_offset(stream, &format!("entry_{i}"))?;
    }
    let next_param_offset_position = stream.position()?;
    stream.write_i64(0)?;

    r.fill_offset(stream, "param_name", stream.position()? - start)?;
    stream.write_utf16(param_name)?;
    stream.align_write(8)?;

    for (i, &id) in order.iter().enumerate() {
        r.fill_offset(stream, &format!("entry_{i}"), stream.position()? - start)?;
        encode_entry(stream, id)?;
    }

    r.finish()?;
    Ok(next_param_offset_position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::route::{Route, RouteType};
    use std::io::Cursor;

    #[test]
    fn file_order_groups_by_subtype_then_insertion() {
        let mut param: EntryParam<Route> = EntryParam::new("ROUTE_PARAM_ST", 0);
        let a = param.add(Route::new(RouteType::MufflingBox));
        let b = param.add(Route::new(RouteType::MufflingPortal));
        let c = param.add(Route::new(RouteType::MufflingBox));

        let order = param.file_order(
            &[RouteType::MufflingPortal, RouteType::MufflingBox, RouteType::Other],
            |r| r.subtype,
        );
        assert_eq!(order, vec![b, a, c]);
        assert_eq!(param.subtype_index(&order, a, |r| r.subtype), 0);
        assert_eq!(param.subtype_index(&order, c, |r| r.subtype), 1);
    }

    #[test]
    fn round_trips_through_serialize_param() {
        let mut param: EntryParam<Route> = EntryParam::new("ROUTE_PARAM_ST", 0);
        let mut route = Route::new(RouteType::MufflingBox);
        route.name = "r0".to_string();
        let id = param.add(route);
        let order = param.file_order(&[RouteType::MufflingBox], |r| r.subtype);

        let mut buf = ByteStream::new(Cursor::new(Vec::new()));
        let next_pos = serialize_param(&mut buf, "ROUTE_PARAM_ST", 0, &order, |s, eid| {
            let subtype_index = param.subtype_index(&order, eid, |r| r.subtype);
            param.get(eid).unwrap().serialize(s, subtype_index)
        })
        .unwrap();
        assert!(next_pos > 0);

        let mut cursor = buf.into_inner();
        cursor.set_position(0);
        let (decoded, decoded_order, next_param_offset) =
            EntryParam::<Route>::deserialize(&mut ByteStream::new(cursor), "ROUTE_PARAM_ST")
                .unwrap();
        assert_eq!(decoded_order.len(), 1);
        assert_eq!(next_param_offset, 0);
        assert_eq!(decoded.get(decoded_order[0]).unwrap().name, "r0");
        let _ = id;
    }
}
