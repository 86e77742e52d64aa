//! Data call snapshots reported by the modem

use serde::{Deserialize, Serialize};

use crate::radio::FailCause;

/// IP protocol negotiated for a data call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Ip,
    Ipv6,
    Ipv4v6,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Protocol::Ip => "IP",
            Protocol::Ipv6 => "IPV6",
            Protocol::Ipv4v6 => "IPV4V6",
        };
        f.write_str(s)
    }
}

/// Link activity of a data call as reported by the modem
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    /// Context is not active
    #[default]
    Inactive,
    /// Context is active but the physical link is down
    Dormant,
    /// Context is active and the physical link is up
    Active,
}

/// Immutable snapshot of one packet data session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCall {
    /// Session identifier, unique within a slot at a point in time
    pub cid: i32,
    /// Fail cause (`FailCause::None` on success)
    pub status: FailCause,
    /// Link activity
    pub state: CallState,
    /// Negotiated protocol
    pub protocol: Protocol,
    /// Modem-suggested retry time in milliseconds (negative means no hint)
    pub retry_time_ms: i32,
    /// Interface MTU (0 when unknown)
    pub mtu: u32,
    /// Network interface name
    pub ifname: String,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub dnses: Vec<String>,
    #[serde(default)]
    pub gateways: Vec<String>,
    #[serde(default)]
    pub pcscf: Vec<String>,
}

impl DataCall {
    /// Whether the modem reports this call as up and not failed
    pub fn is_active(&self) -> bool {
        self.status.is_none() && self.state != CallState::Inactive
    }
}

/// Sort a call list by cid, the order every list in the engine is kept in.
pub fn sort_calls(calls: &mut [DataCall]) {
    calls.sort_by_key(|call| call.cid);
}

/// Find a call by cid in a list sorted by cid
pub fn find_call(calls: &[DataCall], cid: i32) -> Option<&DataCall> {
    calls
        .binary_search_by_key(&cid, |call| call.cid)
        .ok()
        .map(|i| &calls[i])
}
