//! Data engine errors

use modem_data_core::{FailCause, RadioError, RequestCode, TransportError};
use thiserror::Error;

/// Outcome of a failed data request as seen by the caller
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataError {
    /// The hardware link did not complete the round trip
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The radio answered with a protocol-level error
    #[error("Radio error: {0}")]
    Radio(#[from] RadioError),

    /// Setup was answered but the call came back failed
    #[error("Data call failed: {0}")]
    CallFailed(FailCause),

    /// The response code does not match the submitted request
    #[error("Unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        expected: RequestCode,
        actual: RequestCode,
    },

    /// The response carried no usable payload
    #[error("Malformed {0} response")]
    InvalidPayload(RequestCode),

    /// The request was cancelled before it completed
    #[error("Request cancelled")]
    Cancelled,

    #[error("No such slot: {0}")]
    NoSuchSlot(usize),

    #[error("Slot {0} is already attached")]
    SlotExists(usize),

    /// The data service is not running
    #[error("Data service not ready")]
    NotReady,
}

impl DataError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DataError::Cancelled)
    }
}

pub type DataResult<T> = Result<T, DataError>;
