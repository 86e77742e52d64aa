//! Per-slot data object

use std::collections::HashMap;

use bitflags::bitflags;
use modem_data_core::{
    AccessMode, DataCall, NetworkState, PowerTag, RatMask, RestrictedState, Serial,
};

use crate::queue::RequestQueue;
use crate::request::{CallOwner, DataRequest};

bitflags! {
    /// Data state of a slot
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct DataFlags: u8 {
        /// Selected as the data slot
        const ALLOWED = 0x01;
        /// Entitled to the fastest access technology
        const MAX_SPEED = 0x02;
        /// The hardware acknowledged data on this slot
        const ON = 0x04;
    }
}

/// Data state of one SIM slot
#[derive(Debug)]
pub struct DataObject {
    slot: usize,
    pub(crate) flags: DataFlags,
    pub(crate) restricted: RestrictedState,
    /// Sorted by cid
    pub(crate) calls: Vec<DataCall>,
    pub(crate) grab: HashMap<i32, CallOwner>,
    pub(crate) queue: RequestQueue,
    pub(crate) downgraded_tech: bool,
    pub(crate) network: NetworkState,
    pub(crate) imsi: Option<String>,
    /// Access technologies the modem supports
    pub(crate) techs: RatMask,
    /// Preferred technologies from the SIM settings
    pub(crate) pref_mode: RatMask,
    /// Last mask handed to the RAT setter
    pub(crate) applied_rat: Option<RatMask>,
    /// Outstanding call list query issued at attach
    pub(crate) init: Option<Serial>,
    /// Value of `is_allowed` last reported to handlers
    pub(crate) reported_allowed: bool,
}

impl DataObject {
    pub(crate) fn new(slot: usize, techs: RatMask) -> Self {
        Self {
            slot,
            flags: DataFlags::empty(),
            restricted: RestrictedState::empty(),
            calls: Vec::new(),
            grab: HashMap::new(),
            queue: RequestQueue::default(),
            downgraded_tech: false,
            network: NetworkState::default(),
            imsi: None,
            techs,
            pref_mode: RatMask::all(),
            applied_rat: None,
            init: None,
            reported_allowed: false,
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn flags(&self) -> DataFlags {
        self.flags
    }

    /// Usable for data: selected, switched on and not restricted
    pub fn is_allowed(&self) -> bool {
        self.flags.contains(DataFlags::ALLOWED | DataFlags::ON) && !self.restricted.blocks_data()
    }

    pub fn calls(&self) -> &[DataCall] {
        &self.calls
    }

    pub fn restricted_state(&self) -> RestrictedState {
        self.restricted
    }

    pub fn downgraded_tech(&self) -> bool {
        self.downgraded_tech
    }

    pub fn network(&self) -> NetworkState {
        self.network
    }

    pub fn imsi(&self) -> Option<&str> {
        self.imsi.as_deref()
    }

    pub fn grab_owner(&self, cid: i32) -> Option<CallOwner> {
        self.grab.get(&cid).copied()
    }

    /// Still waiting for the initial call list
    pub fn is_initializing(&self) -> bool {
        self.init.is_some()
    }

    pub fn has_pending_request(&self) -> bool {
        self.queue.has_pending()
    }

    pub fn queued_requests(&self) -> usize {
        self.queue.queued_len()
    }

    /// Has requests queued or in flight, or has not finished initializing
    pub(crate) fn is_busy(&self) -> bool {
        self.init.is_some() || !self.queue.is_idle()
    }

    pub(crate) fn power_tag(&self) -> PowerTag {
        PowerTag::DataSlot(self.slot)
    }

    /// Technologies this slot may use on its own account
    pub(crate) fn own_mask(&self) -> RatMask {
        let mask = self.techs.restrict(self.pref_mode);
        if self.downgraded_tech {
            mask.restrict(AccessMode::Umts.and_below())
        } else {
            mask
        }
    }

    /// Fastest mode the SIM settings and the modem allow
    pub(crate) fn max_supported_mode(&self) -> Option<AccessMode> {
        self.techs.restrict(self.pref_mode).highest()
    }

    /// First call that is up, unclaimed and not already being torn down.
    ///
    /// Nothing is stray while a setup is in flight, its call may not have
    /// been claimed yet.
    pub(crate) fn find_stray(&self) -> Option<i32> {
        if self.queue.pending().is_some_and(DataRequest::is_setup) {
            return None;
        }
        self.calls
            .iter()
            .find(|call| {
                call.is_active()
                    && !self.grab.contains_key(&call.cid)
                    && !self.queue.is_releasing(call.cid)
            })
            .map(|call| call.cid)
    }

    /// Drop claims on calls that no longer exist
    pub(crate) fn prune_grabs(&mut self) {
        let calls = &self.calls;
        self.grab
            .retain(|cid, _| modem_data_core::find_call(calls, *cid).is_some());
    }

    pub(crate) fn remove_call(&mut self, cid: i32) -> Option<DataCall> {
        let pos = self.calls.iter().position(|call| call.cid == cid)?;
        self.grab.remove(&cid);
        Some(self.calls.remove(pos))
    }

    /// Insert or replace a call, keeping the list sorted
    pub(crate) fn upsert_call(&mut self, call: DataCall) -> bool {
        match self.calls.binary_search_by_key(&call.cid, |c| c.cid) {
            Ok(i) => {
                if self.calls[i] == call {
                    false
                } else {
                    self.calls[i] = call;
                    true
                }
            }
            Err(i) => {
                self.calls.insert(i, call);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modem_data_core::CallState;

    fn call(cid: i32) -> DataCall {
        DataCall {
            cid,
            state: CallState::Active,
            ..Default::default()
        }
    }

    #[test]
    fn test_is_allowed_needs_allowed_and_on() {
        let mut obj = DataObject::new(0, RatMask::default());
        assert!(!obj.is_allowed());

        obj.flags |= DataFlags::ALLOWED;
        assert!(!obj.is_allowed());

        obj.flags |= DataFlags::ON;
        assert!(obj.is_allowed());

        obj.restricted = RestrictedState::CS_ALL;
        assert!(obj.is_allowed());

        obj.restricted = RestrictedState::PS_ALL;
        assert!(!obj.is_allowed());
    }

    #[test]
    fn test_own_mask_with_downgrade() {
        let mut obj = DataObject::new(0, RatMask::default());
        assert_eq!(obj.own_mask(), RatMask::default());
        assert_eq!(obj.max_supported_mode(), Some(AccessMode::Lte));

        obj.downgraded_tech = true;
        assert_eq!(obj.own_mask(), RatMask::GSM | RatMask::UMTS);

        obj.downgraded_tech = false;
        obj.pref_mode = RatMask::GSM;
        assert_eq!(obj.own_mask(), RatMask::GSM);
        assert_eq!(obj.max_supported_mode(), Some(AccessMode::Gsm));
    }

    #[test]
    fn test_find_stray_skips_grabbed_and_inactive() {
        let mut obj = DataObject::new(0, RatMask::default());
        let mut inactive = call(1);
        inactive.state = CallState::Inactive;
        obj.calls = vec![inactive, call(2), call(3)];
        obj.grab.insert(2, CallOwner(9));

        assert_eq!(obj.find_stray(), Some(3));

        obj.grab.insert(3, CallOwner(9));
        assert_eq!(obj.find_stray(), None);
    }

    #[test]
    fn test_upsert_and_prune() {
        let mut obj = DataObject::new(0, RatMask::default());
        assert!(obj.upsert_call(call(3)));
        assert!(obj.upsert_call(call(1)));
        assert!(!obj.upsert_call(call(1)));
        let cids: Vec<i32> = obj.calls.iter().map(|c| c.cid).collect();
        assert_eq!(cids, vec![1, 3]);

        obj.grab.insert(1, CallOwner(1));
        obj.grab.insert(7, CallOwner(1));
        obj.prune_grabs();
        assert_eq!(obj.grab_owner(1), Some(CallOwner(1)));
        assert_eq!(obj.grab_owner(7), None);

        assert!(obj.remove_call(1).is_some());
        assert_eq!(obj.grab_owner(1), None);
    }
}
