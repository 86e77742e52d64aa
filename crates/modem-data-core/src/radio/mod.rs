//! Hardware request/response vocabulary
//!
//! The engine never marshals anything itself. It hands typed `RadioRequest`s
//! to a [`RadioTransport`](crate::RadioTransport) and later receives a
//! `RadioResponse` for the serial the transport returned.

mod error;
mod fail_cause;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use error::RadioError;
pub use fail_cause::FailCause;

use crate::models::{AccessNetwork, AuthMethod, DataCall, Protocol, RestrictedState};

/// Request codes, echoed back in every response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestCode {
    SetupDataCall,
    DeactivateDataCall,
    LastDataCallFailCause,
    GetDataCallList,
    SetDataAllowed,
    SetPreferredDataModem,
    GetPhoneCapability,
}

impl fmt::Display for RequestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Data profile sent with a setup request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataProfile {
    pub profile_id: i32,
    pub apn: String,
    pub protocol: Protocol,
    pub roaming_protocol: Protocol,
    pub auth: AuthMethod,
    pub username: String,
    pub password: String,
}

/// Parameters of a data call setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupDataCall {
    pub access_network: AccessNetwork,
    pub profile: DataProfile,
    pub is_roaming: bool,
}

/// A hardware request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioRequest {
    SetupDataCall(SetupDataCall),
    DeactivateDataCall { cid: i32 },
    LastDataCallFailCause,
    GetDataCallList,
    SetDataAllowed { allow: bool },
    SetPreferredDataModem { modem_id: u8 },
    GetPhoneCapability,
}

impl RadioRequest {
    pub fn code(&self) -> RequestCode {
        match self {
            RadioRequest::SetupDataCall(_) => RequestCode::SetupDataCall,
            RadioRequest::DeactivateDataCall { .. } => RequestCode::DeactivateDataCall,
            RadioRequest::LastDataCallFailCause => RequestCode::LastDataCallFailCause,
            RadioRequest::GetDataCallList => RequestCode::GetDataCallList,
            RadioRequest::SetDataAllowed { .. } => RequestCode::SetDataAllowed,
            RadioRequest::SetPreferredDataModem { .. } => RequestCode::SetPreferredDataModem,
            RadioRequest::GetPhoneCapability => RequestCode::GetPhoneCapability,
        }
    }
}

/// Modem capability returned by the configuration interface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneCapability {
    /// Maximum number of concurrently active data sessions
    pub max_active_data: u8,
    /// Maximum number of concurrently active internet sessions
    pub max_active_internet_data: u8,
    /// Logical modem ids, indexed by slot
    pub logical_modems: Vec<u8>,
}

/// Version of the modem configuration interface
///
/// Interfaces from 1.1 on support `SetPreferredDataModem` and
/// `GetPhoneCapability`; older ones need `SetDataAllowed` per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RadioConfigInterface {
    V1_0,
    V1_1,
    V1_2,
    V1_3,
}

impl RadioConfigInterface {
    pub fn supports_preferred_data_modem(&self) -> bool {
        *self >= RadioConfigInterface::V1_1
    }
}

/// Whether the link completed the round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    Ok,
    Failed,
}

/// Typed payload of a response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResponsePayload {
    #[default]
    None,
    DataCall(DataCall),
    DataCallList(Vec<DataCall>),
    FailCause(FailCause),
    PhoneCapability(PhoneCapability),
}

/// Completion of a hardware request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioResponse {
    pub status: TransportStatus,
    /// Echo of the request code
    pub code: RequestCode,
    pub error: RadioError,
    pub payload: ResponsePayload,
}

impl RadioResponse {
    pub fn ok(code: RequestCode, payload: ResponsePayload) -> Self {
        Self {
            status: TransportStatus::Ok,
            code,
            error: RadioError::None,
            payload,
        }
    }

    pub fn error(code: RequestCode, error: RadioError) -> Self {
        Self {
            status: TransportStatus::Ok,
            code,
            error,
            payload: ResponsePayload::None,
        }
    }

    pub fn transport_failure(code: RequestCode) -> Self {
        Self {
            status: TransportStatus::Failed,
            code,
            error: RadioError::None,
            payload: ResponsePayload::None,
        }
    }

    /// Transport completed and the radio reported no error
    pub fn is_success(&self) -> bool {
        self.status == TransportStatus::Ok && self.error.is_none()
    }
}

/// Unsolicited indication from one slot's modem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indication {
    /// Authoritative list of active data calls
    DataCallListChanged(Vec<DataCall>),
    RestrictedStateChanged(RestrictedState),
}
