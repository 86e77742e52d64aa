//! modem-data-core - Core models and collaborator traits for the modem data engine
//!
//! This crate provides the types shared between the data-call engine and the
//! hardware side it drives: data call snapshots, radio access technology masks,
//! the hardware request/response vocabulary, and the traits implemented by the
//! transport, radio power and RAT restriction collaborators.

pub mod control;
pub mod models;
pub mod radio;
pub mod transport;

pub use control::{PowerControl, PowerTag, RatControl};
pub use models::*;
pub use radio::{
    DataProfile, FailCause, Indication, PhoneCapability, RadioConfigInterface, RadioError,
    RadioRequest, RadioResponse, RequestCode, ResponsePayload, SetupDataCall, TransportStatus,
};
pub use transport::{RadioTransport, Serial, Target, TransportError};
