//! Shared data models for the modem data engine

mod call;
mod context;
mod network;
mod rat;

pub use call::*;
pub use context::*;
pub use network::*;
pub use rat::*;
