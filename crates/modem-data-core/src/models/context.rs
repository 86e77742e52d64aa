//! Context (APN) parameters supplied by the GPRS layer

use serde::{Deserialize, Serialize};

use super::Protocol;

/// Authentication method for a data context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    #[default]
    None,
    Pap,
    Chap,
    Any,
}

/// What a data context is used for; selects the data profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    #[default]
    Internet,
    Mms,
    Ims,
}

/// Role a slot is asked to take for mobile data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataRole {
    /// No data wanted on this slot
    #[default]
    None,
    /// Data is needed for MMS only
    Mms,
    /// Full internet access, entitled to the fastest RAT
    Internet,
}

/// Context parameters for a data call setup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextParams {
    /// Access point name
    pub apn: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub auth: AuthMethod,
}

impl ContextParams {
    pub fn new(apn: impl Into<String>) -> Self {
        Self {
            apn: apn.into(),
            ..Default::default()
        }
    }
}
