//! Radio power and RAT restriction collaborators

use crate::models::RatMask;

/// Identity of a radio power reference holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerTag {
    /// The data object of a slot
    DataSlot(usize),
}

/// Reference-counted radio power control
///
/// Every `power_on(tag)` is matched by one `power_off(tag)`; the radio stays
/// powered while any tag holds a reference.
pub trait PowerControl: Send {
    fn power_on(&mut self, tag: PowerTag);
    fn power_off(&mut self, tag: PowerTag);
}

/// Per-slot allowed RAT mask setter used during handover
pub trait RatControl: Send {
    fn set_allowed_rat_mask(&mut self, slot: usize, mask: RatMask, urgent: bool);
}
