//! Network registration state and restrictions

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::RadioTech;

bitflags! {
    /// Restricted state reported by the network
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RestrictedState: u32 {
        const CS_EMERGENCY = 0x01;
        const CS_NORMAL = 0x02;
        const CS_ALL = 0x04;
        const PS_ALL = 0x10;
    }
}

impl RestrictedState {
    /// Whether packet-switched data is blocked
    pub fn blocks_data(&self) -> bool {
        self.contains(RestrictedState::PS_ALL)
    }
}

/// Data registration state of one slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkState {
    /// Current data radio technology
    pub tech: RadioTech,
    /// Registered on a roaming network
    pub roaming: bool,
}
