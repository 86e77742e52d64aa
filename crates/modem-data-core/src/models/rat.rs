//! Radio access technologies and RAT masks

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Set of radio access technologies a slot may use
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RatMask: u8 {
        const GSM = 1 << 0;
        const UMTS = 1 << 1;
        const LTE = 1 << 2;
        const NR = 1 << 3;
    }
}

impl Default for RatMask {
    fn default() -> Self {
        RatMask::GSM | RatMask::UMTS | RatMask::LTE
    }
}

impl RatMask {
    /// Highest access mode in the mask, if any
    pub fn highest(&self) -> Option<AccessMode> {
        AccessMode::ALL
            .iter()
            .rev()
            .copied()
            .find(|mode| self.contains(mode.bit()))
    }

    /// Restrict this mask to `ceiling`, keeping the mask unchanged if
    /// nothing would be left.
    pub fn restrict(self, ceiling: RatMask) -> RatMask {
        let limited = self & ceiling;
        if limited.is_empty() {
            self
        } else {
            limited
        }
    }
}

/// Single access mode, ordered from slowest to fastest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Gsm,
    Umts,
    Lte,
    Nr,
}

impl AccessMode {
    pub const ALL: [AccessMode; 4] = [
        AccessMode::Gsm,
        AccessMode::Umts,
        AccessMode::Lte,
        AccessMode::Nr,
    ];

    /// The mask bit for this mode
    pub fn bit(&self) -> RatMask {
        match self {
            AccessMode::Gsm => RatMask::GSM,
            AccessMode::Umts => RatMask::UMTS,
            AccessMode::Lte => RatMask::LTE,
            AccessMode::Nr => RatMask::NR,
        }
    }

    /// This mode and everything slower, e.g. `Umts` gives GSM | UMTS
    pub fn and_below(&self) -> RatMask {
        AccessMode::ALL
            .iter()
            .filter(|mode| *mode <= self)
            .fold(RatMask::empty(), |mask, mode| mask | mode.bit())
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessMode::Gsm => "gsm",
            AccessMode::Umts => "umts",
            AccessMode::Lte => "lte",
            AccessMode::Nr => "nr",
        };
        f.write_str(s)
    }
}

/// Radio access network passed with a data call setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessNetwork {
    Unknown,
    Geran,
    Utran,
    Eutran,
    Ngran,
}

/// Data radio technology reported by network registration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioTech {
    #[default]
    Unknown,
    Gprs,
    Edge,
    Gsm,
    Umts,
    Hsdpa,
    Hsupa,
    Hspa,
    Hspap,
    TdScdma,
    Lte,
    LteCa,
    Nr,
}

impl RadioTech {
    /// Access mode family of this technology
    pub fn access_mode(&self) -> Option<AccessMode> {
        match self {
            RadioTech::Unknown => None,
            RadioTech::Gprs | RadioTech::Edge | RadioTech::Gsm => Some(AccessMode::Gsm),
            RadioTech::Umts
            | RadioTech::Hsdpa
            | RadioTech::Hsupa
            | RadioTech::Hspa
            | RadioTech::Hspap
            | RadioTech::TdScdma => Some(AccessMode::Umts),
            RadioTech::Lte | RadioTech::LteCa => Some(AccessMode::Lte),
            RadioTech::Nr => Some(AccessMode::Nr),
        }
    }

    /// Radio access network to request a data call on
    pub fn access_network(&self) -> AccessNetwork {
        match self.access_mode() {
            None => AccessNetwork::Unknown,
            Some(AccessMode::Gsm) => AccessNetwork::Geran,
            Some(AccessMode::Umts) => AccessNetwork::Utran,
            Some(AccessMode::Lte) => AccessNetwork::Eutran,
            Some(AccessMode::Nr) => AccessNetwork::Ngran,
        }
    }

    pub fn is_lte(&self) -> bool {
        self.access_mode() == Some(AccessMode::Lte)
    }
}
