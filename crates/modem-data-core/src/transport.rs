//! Hardware request submission interface

use thiserror::Error;

use crate::radio::RadioRequest;

/// Serial number of a submitted request, unique per transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Serial(pub u64);

impl std::fmt::Display for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which hardware client a request goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The radio client of one SIM slot
    Slot(usize),
    /// The modem-wide configuration client
    Config,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Submit failed: {0}")]
    SubmitFailed(String),

    #[error("Request not supported: {0}")]
    Unsupported(String),

    #[error("Round trip did not complete")]
    RoundTripFailed,
}

/// Submit side of the hardware protocol
///
/// `submit` returns as soon as the request is handed to the link. The
/// completion for the returned serial is delivered later, on the same
/// thread of control, through the engine's response entry point.
pub trait RadioTransport: Send {
    /// Submit a request, returning its serial
    fn submit(&mut self, target: Target, request: RadioRequest) -> Result<Serial, TransportError>;

    /// Drop an outstanding request; its completion must not be delivered
    fn cancel(&mut self, serial: Serial);
}
