//! Non-owning, destruction-safe links between entries.
//!
//! The original implementation keeps raw back-pointers: every entry
//! tracks the set of `EntryReference`s aimed at it and notifies them on
//! destruction. In Rust, a generational arena gets the same safety for
//! free — a `Reference<T>` is just a `(index, generation)` pair, and it
//! silently resolves to `None` once the slot it names has been reused or
//! freed, with no bookkeeping on the target's side. See `DESIGN.md` for
//! the write-up of this substitution.

use std::marker::PhantomData;

use crate::error::{FormatError, MsbError, Result};

/// An index into an `Arena<T>`, tagged with the generation it was issued
/// for. Stale ids (pointing at a freed-and-reused slot) compare unequal
/// to the slot's current generation and resolve to nothing.
pub struct EntryId<T> {
    index: usize,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for EntryId<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for EntryId<T> {}
impl<T> PartialEq for EntryId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}
impl<T> Eq for EntryId<T> {}
impl<T> std::hash::Hash for EntryId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}
impl<T> std::fmt::Debug for EntryId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EntryId({}, gen {})", self.index, self.generation)
    }
}

// Written by hand rather than derived: `PhantomData<fn() -> T>` would
// otherwise saddle every `EntryId<T>` with a spurious `T: Serialize`/
// `T: Deserialize` bound.
#[cfg(feature = "derive_serde")]
impl<T> serde::Serialize for EntryId<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeTuple;
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.index)?;
        tup.serialize_element(&self.generation)?;
        tup.end()
    }
}

#[cfg(feature = "derive_serde")]
impl<'de, T> serde::Deserialize<'de> for EntryId<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (index, generation) = <(usize, u32)>::deserialize(deserializer)?;
        Ok(EntryId {
            index,
            generation,
            _marker: PhantomData,
        })
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Owns every entry of one subtype bucket (or, flattened, a whole
/// supertype). Removal bumps the slot's generation instead of shifting
/// indices, so outstanding `EntryId`s naturally detect staleness.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: T) -> EntryId<T> {
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        EntryId {
            index: self.slots.len() - 1,
            generation: 0,
            _marker: PhantomData,
        }
    }

    /// Removes the entry, invalidating every `EntryId` that named it.
    pub fn remove(&mut self, id: EntryId<T>) -> Option<T> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.generation += 1;
        slot.value.take()
    }

    pub fn get(&self, id: EntryId<T>) -> Option<&T> {
        let slot = self.slots.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, id: EntryId<T>) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Live entries in slot order, paired with the id each was inserted
    /// under. This is the "file order" vector every reference index is
    /// resolved against.
    pub fn iter(&self) -> impl Iterator<Item = (EntryId<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|v| {
                (
                    EntryId {
                        index,
                        generation: slot.generation,
                        _marker: PhantomData,
                    },
                    v,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntryId<T>, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value.as_mut().map(move |v| {
                (
                    EntryId {
                        index,
                        generation,
                        _marker: PhantomData,
                    },
                    v,
                )
            })
        })
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A non-owning link to an entry of type `T`. `None` is the null state.
pub type Reference<T> = Option<EntryId<T>>;

/// Resolves a reference's file-order index against `order` (a vector of
/// ids in the order they'll be (or were) written). Null resolves to -1.
/// A non-null reference absent from `order` — the target was removed from
/// its arena since the reference was set, or points at an entry that
/// never belonged to this sub-list — resolves to -1 the same way, logged
/// rather than failing the write, matching the destruction-invalidation
/// behavior of the original's reference list.
pub fn to_index<T>(reference: Reference<T>, order: &[EntryId<T>], field: &str) -> Result<i32> {
    match reference {
        None => Ok(-1),
        Some(id) => Ok(match order.iter().position(|&o| o == id) {
            Some(pos) => pos as i32,
            None => {
                log::warn!("reference in field `{field}` points outside its file-order list; nulling");
                -1
            }
        }),
    }
}

/// As `to_index`, but fails if the resulting index doesn't fit in 16
/// bits (the format's index fields are signed 16-bit in a few places —
/// e.g. `PatrolRouteEvent`'s region-index array). 32,767 is the largest
/// index that still fits; 32,768 and above overflow.
pub fn to_index16<T>(reference: Reference<T>, order: &[EntryId<T>], field: &str) -> Result<i16> {
    let index = to_index(reference, order, field)?;
    if index > i16::MAX as i32 {
        return Err(MsbError::Format(FormatError::with_value(
            field,
            "index exceeds 16-bit range",
            index,
        )));
    }
    Ok(index as i16)
}

/// Wires a reference from a staged index read off disk. `-1` clears it;
/// an out-of-range index is logged and nulled rather than failing the
/// whole deserialize (see the error-handling policy for the
/// reference-resolution pass).
pub fn from_index<T>(order: &[EntryId<T>], index: i64, field: &str) -> Reference<T> {
    if index < 0 {
        return None;
    }
    match order.get(index as usize) {
        Some(&id) => Some(id),
        None => {
            log::warn!("field `{field}` referenced index {index} which is out of range; nulling");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_id_resolves_to_none() {
        let mut arena: Arena<&'static str> = Arena::new();
        let id = arena.insert("hello");
        assert_eq!(arena.get(id), Some(&"hello"));
        arena.remove(id);
        assert_eq!(arena.get(id), None);
    }

    #[test]
    fn reused_slot_does_not_alias_stale_id() {
        let mut arena: Arena<&'static str> = Arena::new();
        let first = arena.insert("a");
        arena.remove(first);
        let second = arena.insert("b");
        assert_eq!(arena.get(first), None);
        assert_eq!(arena.get(second), Some(&"b"));
    }

    #[test]
    fn index_round_trip() {
        let mut arena: Arena<&'static str> = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        let order: Vec<_> = arena.iter().map(|(id, _)| id).collect();
        assert_eq!(to_index(Some(b), &order, "f").unwrap(), 1);
        assert_eq!(to_index(None, &order, "f").unwrap(), -1);
        assert_eq!(from_index(&order, 0, "f"), Some(a));
        assert_eq!(from_index(&order, -1, "f"), None);
    }

    #[test]
    fn reference_to_removed_target_resolves_to_null_index() {
        let mut arena: Arena<&'static str> = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        arena.remove(b);
        let order: Vec<_> = arena.iter().map(|(id, _)| id).collect();
        assert_eq!(to_index(Some(b), &order, "f").unwrap(), -1);
        assert_eq!(to_index(Some(a), &order, "f").unwrap(), 0);
    }

    #[test]
    fn to_index16_boundary() {
        let mut arena: Arena<u8> = Arena::new();
        let mut order = Vec::new();
        for _ in 0..32_769 {
            order.push(arena.insert(0));
        }
        let at_max = order[32_767];
        let past_max = order[32_768];
        assert_eq!(to_index16(Some(at_max), &order, "f").unwrap(), 32_767);
        assert!(to_index16(Some(past_max), &order, "f").is_err());
    }
}
