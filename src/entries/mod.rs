//! The entry taxonomy: six supertypes, each with a closed set of
//! subtypes. Every supertype is modeled as a tagged union — a shared
//! struct for the fields common to the supertype, with a subtype enum
//! carrying whatever per-subtype data exists — rather than virtual
//! dispatch, per the recommendation in the format's own design notes.

pub mod event;
pub mod layer;
pub mod model;
pub mod part;
pub mod region;
pub mod route;

pub use event::Event;
pub use layer::Layer;
pub use model::Model;
pub use part::Part;
pub use region::Region;
pub use route::Route;

/// A 32-bit id used by the scripting layer. Regions and some Parts carry
/// one; Events and Models do not.
pub type EntityId = u32;

pub const NO_ENTITY_ID: EntityId = 0;

/// Subtype-index override preserved verbatim for `Other`-tagged entries
/// (Events, Regions' adjacent Route, and Routes). `-1` means "no
/// override, use the running per-subtype counter."
pub type SubtypeIndexOverride = i32;

pub const NO_SUBTYPE_OVERRIDE: SubtypeIndexOverride = -1;
