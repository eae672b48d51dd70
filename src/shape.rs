//! The polymorphic geometry attached to a Region.

use crate::error::{FormatError, MsbError, Result};
use crate::reference::{EntryId, Reference};

#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ShapeType {
    Point = 0,
    Circle = 1,
    Sphere = 2,
    Cylinder = 3,
    Rectangle = 4,
    Box = 5,
    Composite = 6,
}

impl ShapeType {
    pub fn from_code(code: u32) -> Result<Self> {
        Ok(match code {
            0 => ShapeType::Point,
            1 => ShapeType::Circle,
            2 => ShapeType::Sphere,
            3 => ShapeType::Cylinder,
            4 => ShapeType::Rectangle,
            5 => ShapeType::Box,
            6 => ShapeType::Composite,
            other => {
                return Err(MsbError::Format(FormatError::with_value(
                    "shape_type",
                    "unrecognized shape type code",
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
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Point,
    Circle { radius: f32 },
    Sphere { radius: f32 },
    Cylinder { radius: f32, height: f32 },
    Rectangle { width: f32, depth: f32 },
    Box { width: f32, depth: f32, height: f32 },
    /// No stored geometry of its own — a Region in this shape carries a
    /// `CompositeChildren` sidecar instead (see below).
    Composite,
}

impl Shape {
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Point => ShapeType::Point,
            Shape::Circle { .. } => ShapeType::Circle,
            Shape::Sphere { .. } => ShapeType::Sphere,
            Shape::Cylinder { .. } => ShapeType::Cylinder,
            Shape::Rectangle { .. } => ShapeType::Rectangle,
            Shape::Box { .. } => ShapeType::Box,
            Shape::Composite => ShapeType::Composite,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Shape::Composite)
    }
}

pub const COMPOSITE_CHILD_SLOTS: usize = 8;

/// The eight-slot sidecar a Region carries only while its shape is
/// `Composite`. Child region indices and their paired "unk04" values are
/// decoded together as 16 raw i32s on read; the reference-resolution
/// pass then converts the index half into live references.
///
/// Generic over the Region entry type so this module doesn't need to
/// depend on `crate::entries::region` (which depends on this module for
/// `Shape` itself).
#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "derive_serde", serde(bound = ""))]
#[derive(Debug, Clone)]
pub struct CompositeChildren<Region> {
    pub children: [Reference<Region>; COMPOSITE_CHILD_SLOTS],
    pub unk04: [i32; COMPOSITE_CHILD_SLOTS],
}

impl<Region> Default for CompositeChildren<Region> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Region> CompositeChildren<Region> {
    pub fn new() -> Self {
        Self {
            children: [None; COMPOSITE_CHILD_SLOTS],
            unk04: [0; COMPOSITE_CHILD_SLOTS],
        }
    }

    pub fn set(&mut self, slot: usize, target: Option<EntryId<Region>>) {
        self.children[slot] = target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_type_round_trips_through_code() {
        for t in [
            ShapeType::Point,
            ShapeType::Circle,
            ShapeType::Sphere,
            ShapeType::Cylinder,
            ShapeType::Rectangle,
            ShapeType::Box,
            ShapeType::Composite,
        ] {
            assert_eq!(ShapeType::from_code(t.code()).unwrap(), t);
        }
    }

    #[test]
    fn unknown_code_is_format_error() {
        assert!(ShapeType::from_code(99).is_err());
    }
}
