//! Protocol-level radio errors

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error code carried by a hardware response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum RadioError {
    #[default]
    None,
    RadioNotAvailable,
    GenericFailure,
    RequestNotSupported,
    Cancelled,
    OpNotAllowedBeforeRegToNw,
    SimAbsent,
    SubscriptionNotAvailable,
    ModeNotSupported,
    MissingResource,
    NoSuchElement,
    NoMemory,
    InternalErr,
    SystemErr,
    ModemErr,
    InvalidState,
    NoResources,
    SimErr,
    InvalidArguments,
    InvalidSimState,
    InvalidModemState,
    InvalidCallId,
    /// Code not in the table
    Unknown(i32),
}

impl RadioError {
    pub fn is_none(&self) -> bool {
        *self == RadioError::None
    }

    /// Errors that go away on their own: the radio is still starting up
    /// or the SIM is still initializing.
    pub fn is_transient(&self) -> bool {
        matches!(self, RadioError::RadioNotAvailable | RadioError::InvalidState)
    }
}

impl From<i32> for RadioError {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::None,
            1 => Self::RadioNotAvailable,
            2 => Self::GenericFailure,
            6 => Self::RequestNotSupported,
            7 => Self::Cancelled,
            9 => Self::OpNotAllowedBeforeRegToNw,
            11 => Self::SimAbsent,
            12 => Self::SubscriptionNotAvailable,
            13 => Self::ModeNotSupported,
            16 => Self::MissingResource,
            17 => Self::NoSuchElement,
            37 => Self::NoMemory,
            38 => Self::InternalErr,
            39 => Self::SystemErr,
            40 => Self::ModemErr,
            41 => Self::InvalidState,
            42 => Self::NoResources,
            43 => Self::SimErr,
            44 => Self::InvalidArguments,
            45 => Self::InvalidSimState,
            46 => Self::InvalidModemState,
            47 => Self::InvalidCallId,
            other => Self::Unknown(other),
        }
    }
}

impl From<RadioError> for i32 {
    fn from(err: RadioError) -> Self {
        match err {
            RadioError::None => 0,
            RadioError::RadioNotAvailable => 1,
            RadioError::GenericFailure => 2,
            RadioError::RequestNotSupported => 6,
            RadioError::Cancelled => 7,
            RadioError::OpNotAllowedBeforeRegToNw => 9,
            RadioError::SimAbsent => 11,
            RadioError::SubscriptionNotAvailable => 12,
            RadioError::ModeNotSupported => 13,
            RadioError::MissingResource => 16,
            RadioError::NoSuchElement => 17,
            RadioError::NoMemory => 37,
            RadioError::InternalErr => 38,
            RadioError::SystemErr => 39,
            RadioError::ModemErr => 40,
            RadioError::InvalidState => 41,
            RadioError::NoResources => 42,
            RadioError::SimErr => 43,
            RadioError::InvalidArguments => 44,
            RadioError::InvalidSimState => 45,
            RadioError::InvalidModemState => 46,
            RadioError::InvalidCallId => 47,
            RadioError::Unknown(v) => v,
        }
    }
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(v) => write!(f, "Unknown({})", v),
            other => {
                let code: i32 = (*other).into();
                write!(f, "{:?}({})", other, code)
            }
        }
    }
}

impl std::error::Error for RadioError {}
