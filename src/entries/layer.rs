//! The Layer Param is always empty. `Layer` exists only so the type
//! system has something to name in `EntryParam<Layer>`; nothing ever
//! constructs one.

#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {}

impl Layer {
    /// Always empty; the Layer Param never carries entries and this
    /// subtype enum is uninhabited, so no caller can accidentally build
    /// one and try to add it.
    pub const SUBTYPE_COUNT: usize = 0;
}
