//! modem-data - Data-call request queue and multi-slot data arbitration
//!
//! This crate drives the data-call lifecycle of a packet-radio modem over an
//! asynchronous request/response protocol and decides which SIM slot may use
//! mobile data.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DataService                           │
//! │  tokio task: commands, radio events, timers                  │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                     DataManager                        │  │
//! │  │  arbitration │ handover │ call lists │ retries         │  │
//! │  │                                                        │  │
//! │  │  ┌──────────────┐  ┌──────────────┐                    │  │
//! │  │  │ DataObject 0 │  │ DataObject 1 │  ...               │  │
//! │  │  │ RequestQueue │  │ RequestQueue │                    │  │
//! │  │  └──────────────┘  └──────────────┘                    │  │
//! │  └───────┬──────────────────┬──────────────────┬──────────┘  │
//! │          │                  │                  │             │
//! │  ┌───────┴────────┐ ┌───────┴──────┐ ┌─────────┴─────────┐   │
//! │  │ RadioTransport │ │ PowerControl │ │    RatControl     │   │
//! │  └────────────────┘ └──────────────┘ └───────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod calls;
pub mod config;
pub mod error;
pub mod manager;
pub mod mock;
pub mod notify;
pub mod object;
pub mod service;

mod power;
mod queue;
mod request;
mod timer;

pub use calls::{CallEvent, HangupReason};
pub use config::{ConfigError, DataConfig, HangupConfig, ProfileConfig, SlotConfig};
pub use error::{DataError, DataResult};
pub use manager::DataManager;
pub use notify::{DataEvent, DataProperties, EventHandler, HandlerId};
pub use object::{DataFlags, DataObject};
pub use request::{CallOwner, DeactivateCallback, RequestFlags, RequestId, SetupCallback};
pub use service::{DataService, DataServiceHandle, PendingRequest, RadioEvent};

// Re-export for convenience
pub use modem_data_core::{
    AccessMode, ContextParams, ContextType, DataCall, DataRole, Indication, NetworkState,
    RadioConfigInterface, RadioResponse, RadioTech, RatMask, RestrictedState,
};
