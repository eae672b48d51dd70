//! Reader/writer for the MapStudio map-description container (MSB): the
//! entry taxonomy, cross-entry reference graph, shape system, and the
//! offset-reservation machinery that lets headers forward-reference data
//! not yet written.

pub mod byte_stream;
pub mod entries;
pub mod error;
pub mod groups;
pub mod msb;
pub mod param;
pub mod reference;
pub mod reserver;
pub mod shape;

pub use entries::{Event, Layer, Model, Part, Region, Route};
pub use error::{FormatError, MsbError, Result};
pub use msb::Msb;
pub use reference::{EntryId, Reference};
pub use shape::{Shape, ShapeType};
