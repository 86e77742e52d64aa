//! Request variants
//!
//! A [`DataRequest`] is one unit of hardware work queued on a slot. The
//! variant payload decides which hardware call it turns into; the caller's
//! completion callback lives inside the variant and is resolved exactly once,
//! by completion or by cancellation.

use std::fmt;

use bitflags::bitflags;
use modem_data_core::{ContextParams, ContextType, DataCall, RequestCode, Serial};
use tracing::debug;

use crate::error::{DataError, DataResult};
use crate::timer::TimerId;

/// Identifier of a queued or pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Opaque ownership cookie for the grab table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallOwner(pub u64);

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct RequestFlags: u8 {
        /// The caller's callback has been resolved
        const COMPLETED = 0x01;
        /// Drop the request when the slot becomes allowed
        const CANCEL_WHEN_ALLOWED = 0x02;
        /// Drop the request when the slot loses data permission
        const CANCEL_WHEN_DISALLOWED = 0x04;
    }
}

pub type SetupCallback = Box<dyn FnOnce(DataResult<DataCall>) + Send>;
pub type DeactivateCallback = Box<dyn FnOnce(DataResult<()>) + Send>;

pub(crate) struct SetupRequest {
    pub params: ContextParams,
    pub context_type: ContextType,
    /// Grab the new call for this owner when setup succeeds
    pub owner: Option<CallOwner>,
    /// Silent retries done after an unspecified failure
    pub retry_count: u32,
    pub callback: Option<SetupCallback>,
}

pub(crate) struct DeactivateRequest {
    pub cid: i32,
    pub callback: Option<DeactivateCallback>,
}

pub(crate) enum RequestKind {
    Setup(SetupRequest),
    Deactivate(DeactivateRequest),
    AllowData { allow: bool },
    SetPreferredModem,
}

pub(crate) struct DataRequest {
    pub id: RequestId,
    pub kind: RequestKind,
    pub flags: RequestFlags,
    /// Hardware handle while submitted
    pub serial: Option<Serial>,
    /// Retry timer while waiting to be resubmitted
    pub retry_timer: Option<TimerId>,
    /// Retries after transient radio errors
    pub transient_retries: u32,
}

impl DataRequest {
    pub fn new(id: RequestId, kind: RequestKind) -> Self {
        let flags = match &kind {
            RequestKind::Setup(_) => RequestFlags::CANCEL_WHEN_DISALLOWED,
            RequestKind::Deactivate(_) => RequestFlags::empty(),
            RequestKind::AllowData { allow: true } => RequestFlags::CANCEL_WHEN_DISALLOWED,
            RequestKind::AllowData { allow: false } => RequestFlags::CANCEL_WHEN_ALLOWED,
            RequestKind::SetPreferredModem => RequestFlags::CANCEL_WHEN_DISALLOWED,
        };
        Self {
            id,
            kind,
            flags,
            serial: None,
            retry_timer: None,
            transient_retries: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match &self.kind {
            RequestKind::Setup(_) => "SETUP",
            RequestKind::Deactivate(_) => "DEACTIVATE",
            RequestKind::AllowData { .. } => "ALLOW",
            RequestKind::SetPreferredModem => "SET_DATA_MODEM",
        }
    }

    /// Hardware request code this request is answered with
    pub fn code(&self) -> RequestCode {
        match &self.kind {
            RequestKind::Setup(_) => RequestCode::SetupDataCall,
            RequestKind::Deactivate(_) => RequestCode::DeactivateDataCall,
            RequestKind::AllowData { .. } => RequestCode::SetDataAllowed,
            RequestKind::SetPreferredModem => RequestCode::SetPreferredDataModem,
        }
    }

    /// Requests that govern the slot's data power state retry indefinitely
    pub fn retries_forever(&self) -> bool {
        matches!(
            self.kind,
            RequestKind::AllowData { .. } | RequestKind::SetPreferredModem
        )
    }

    pub fn is_setup(&self) -> bool {
        matches!(self.kind, RequestKind::Setup(_))
    }

    /// Whether this request switches data on (true) or off (false)
    pub fn switches(&self) -> Option<bool> {
        match self.kind {
            RequestKind::AllowData { allow } => Some(allow),
            RequestKind::SetPreferredModem => Some(true),
            _ => None,
        }
    }

    /// Cid this request tears down, if it is a deactivation
    pub fn deactivates(&self) -> Option<i32> {
        match &self.kind {
            RequestKind::Deactivate(deact) => Some(deact.cid),
            _ => None,
        }
    }

    /// Resolve the callback of a setup request
    pub fn complete_setup(&mut self, result: DataResult<DataCall>) {
        self.flags |= RequestFlags::COMPLETED;
        if let RequestKind::Setup(setup) = &mut self.kind {
            if let Some(cb) = setup.callback.take() {
                cb(result);
            }
        }
    }

    /// Resolve the callback of a deactivate request
    pub fn complete_deactivate(&mut self, result: DataResult<()>) {
        self.flags |= RequestFlags::COMPLETED;
        if let RequestKind::Deactivate(deact) = &mut self.kind {
            if let Some(cb) = deact.callback.take() {
                cb(result);
            }
        }
    }

    /// Resolve whatever callback the request carries with an error
    pub fn fail(&mut self, err: DataError) {
        match &self.kind {
            RequestKind::Setup(_) => self.complete_setup(Err(err)),
            RequestKind::Deactivate(_) => self.complete_deactivate(Err(err)),
            RequestKind::AllowData { .. } | RequestKind::SetPreferredModem => {
                self.flags |= RequestFlags::COMPLETED;
            }
        }
    }

    /// Resolve the callback with a cancellation outcome, unless already done.
    ///
    /// The hardware handle and retry timer must already be released by the
    /// owner of the transport and timers.
    pub fn cancel(&mut self) {
        if self.flags.contains(RequestFlags::COMPLETED) {
            return;
        }
        debug!(request = self.name(), id = %self.id, "cancelled");
        self.serial = None;
        self.retry_timer = None;
        self.fail(DataError::Cancelled);
    }
}

impl fmt::Debug for DataRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataRequest")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("flags", &self.flags)
            .field("serial", &self.serial)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn setup(id: u64, log: Arc<Mutex<Vec<DataResult<DataCall>>>>) -> DataRequest {
        DataRequest::new(
            RequestId(id),
            RequestKind::Setup(SetupRequest {
                params: ContextParams::new("internet"),
                context_type: ContextType::Internet,
                owner: None,
                retry_count: 0,
                callback: Some(Box::new(move |res| log.lock().push(res))),
            }),
        )
    }

    #[test]
    fn test_flags_by_variant() {
        let allow = DataRequest::new(RequestId(1), RequestKind::AllowData { allow: true });
        assert_eq!(allow.flags, RequestFlags::CANCEL_WHEN_DISALLOWED);

        let disallow = DataRequest::new(RequestId(2), RequestKind::AllowData { allow: false });
        assert_eq!(disallow.flags, RequestFlags::CANCEL_WHEN_ALLOWED);
        assert!(disallow.retries_forever());

        let deact = DataRequest::new(
            RequestId(3),
            RequestKind::Deactivate(DeactivateRequest {
                cid: 4,
                callback: None,
            }),
        );
        assert!(deact.flags.is_empty());
        assert_eq!(deact.deactivates(), Some(4));
        assert_eq!(deact.code(), RequestCode::DeactivateDataCall);
    }

    #[test]
    fn test_cancel_fires_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut req = setup(1, log.clone());

        req.cancel();
        req.cancel();
        req.complete_setup(Ok(DataCall::default()));

        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0], Err(DataError::Cancelled));
    }

    #[test]
    fn test_cancel_after_completion_is_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut req = setup(1, log.clone());

        req.complete_setup(Err(DataError::CallFailed(
            modem_data_core::FailCause::ErrorUnspecified,
        )));
        req.cancel();

        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert!(matches!(log[0], Err(DataError::CallFailed(_))));
    }
}
