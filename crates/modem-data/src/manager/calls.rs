//! Call setup/teardown entry points, call list reconciliation and grabs

use modem_data_core::{
    find_call, sort_calls, ContextParams, ContextType, DataCall, Indication, RadioRequest,
    RadioResponse, RequestCode, ResponsePayload, Serial, Target,
};
use tracing::{debug, error, info, warn};

use super::{DataManager, Inflight};
use crate::calls::{classify, diff_calls, CallDiff, CallEvent, HangupReason};
use crate::error::DataResult;
use crate::notify::DataEvent;
use crate::request::{
    CallOwner, DeactivateCallback, DeactivateRequest, RequestId, RequestKind, SetupRequest,
};

impl DataManager {
    /// Queue a data call setup on a slot.
    ///
    /// When `owner` is given the new call is grabbed for it before the
    /// callback fires.
    pub fn call_setup<F>(
        &mut self,
        slot: usize,
        params: ContextParams,
        context_type: ContextType,
        owner: Option<CallOwner>,
        callback: F,
    ) -> DataResult<RequestId>
    where
        F: FnOnce(DataResult<DataCall>) + Send + 'static,
    {
        self.require(slot)?;
        debug!(slot, apn = %params.apn, ?context_type, "Data call setup requested");
        let id = self.enqueue(
            slot,
            RequestKind::Setup(SetupRequest {
                params,
                context_type,
                owner,
                retry_count: 0,
                callback: Some(Box::new(callback)),
            }),
        )?;
        self.sync_allowed();
        Ok(id)
    }

    /// Queue the deactivation of a data call
    pub fn call_deactivate<F>(
        &mut self,
        slot: usize,
        cid: i32,
        callback: F,
    ) -> DataResult<RequestId>
    where
        F: FnOnce(DataResult<()>) + Send + 'static,
    {
        self.require(slot)?;
        let id = self.deactivate(slot, cid, Some(Box::new(callback)))?;
        self.sync_allowed();
        Ok(id)
    }

    fn deactivate(
        &mut self,
        slot: usize,
        cid: i32,
        callback: Option<DeactivateCallback>,
    ) -> DataResult<RequestId> {
        self.enqueue(slot, RequestKind::Deactivate(DeactivateRequest { cid, callback }))
    }

    /// Deactivate every active call of a slot not already being torn down
    pub(super) fn deactivate_all(&mut self, slot: usize) {
        let Some(obj) = self.slot(slot) else {
            return;
        };
        let cids: Vec<i32> = obj
            .calls
            .iter()
            .filter(|call| call.status.is_none() && !obj.queue.is_releasing(call.cid))
            .map(|call| call.cid)
            .collect();
        for cid in cids {
            if let Err(err) = self.deactivate(slot, cid, None) {
                warn!(slot, cid, %err, "Failed to queue deactivation");
            }
        }
    }

    // =========================================================================
    // Grabs
    // =========================================================================

    /// Claim a listed call. Succeeds if unclaimed or already claimed by `owner`.
    pub fn call_grab(&mut self, slot: usize, cid: i32, owner: CallOwner) -> bool {
        let Some(obj) = self.object_mut(slot) else {
            return false;
        };
        if find_call(&obj.calls, cid).is_none() {
            debug!(slot, cid, "Refusing claim on unknown call");
            return false;
        }
        match obj.grab.get(&cid) {
            Some(prev) => *prev == owner,
            None => {
                obj.grab.insert(cid, owner);
                true
            }
        }
    }

    /// Drop a claim, only if it is held by `owner`
    pub fn call_release(&mut self, slot: usize, cid: i32, owner: CallOwner) {
        if let Some(obj) = self.object_mut(slot) {
            if obj.grab.get(&cid) == Some(&owner) {
                obj.grab.remove(&cid);
            }
        }
    }

    // =========================================================================
    // Call list
    // =========================================================================

    /// Deliver an unsolicited indication from a slot's modem
    pub fn handle_indication(&mut self, slot: usize, indication: Indication) {
        match indication {
            Indication::DataCallListChanged(calls) => self.reconcile(slot, calls),
            Indication::RestrictedStateChanged(state) => {
                if let Some(obj) = self.object_mut(slot) {
                    debug!(slot, ?state, "Restricted state");
                    obj.restricted = state;
                }
            }
        }
        self.sync_allowed();
    }

    /// Query the call list outside the request queue
    pub(super) fn poll_calls(&mut self, slot: usize) {
        let polling = self
            .inflight
            .values()
            .any(|f| *f == Inflight::CallList { slot });
        if polling {
            return;
        }
        match self
            .transport
            .submit(Target::Slot(slot), RadioRequest::GetDataCallList)
        {
            Ok(serial) => {
                self.inflight.insert(serial, Inflight::CallList { slot });
            }
            Err(err) => warn!(slot, %err, "Call list query failed"),
        }
    }

    pub(super) fn on_call_list(&mut self, slot: usize, serial: Serial, response: RadioResponse) {
        let Some(obj) = self.object_mut(slot) else {
            return;
        };
        let initializing = obj.init == Some(serial);
        if initializing {
            obj.init = None;
        }

        if response.code != RequestCode::GetDataCallList {
            error!(
                slot,
                expected = %RequestCode::GetDataCallList,
                actual = %response.code,
                "Unexpected response"
            );
        } else {
            let success = response.is_success();
            match response.payload {
                ResponsePayload::DataCallList(calls) if success => self.reconcile(slot, calls),
                _ => warn!(slot, error = %response.error, "Call list query failed"),
            }
        }

        if initializing {
            info!(slot, "Data slot initialized");
            self.submit_next(slot);
        }
    }

    /// Replace a slot's call list with a fresh one from the modem
    fn reconcile(&mut self, slot: usize, mut calls: Vec<DataCall>) {
        let Some(idx) = self.index(slot) else {
            return;
        };
        sort_calls(&mut calls);

        let obj = &mut self.objects[idx];
        let diffs = diff_calls(&obj.calls, &calls);
        obj.calls = calls;
        obj.prune_grabs();

        let mut events = Vec::new();
        let mut queries = Vec::new();
        for diff in diffs {
            match diff {
                CallDiff::Added(call) => events.push(CallEvent::Added(call)),
                CallDiff::Changed(call) => events.push(CallEvent::Changed(call)),
                CallDiff::Removed(old) => {
                    let cid = old.cid;
                    if obj.queue.is_releasing(cid) {
                        events.push(CallEvent::Disconnected {
                            cid,
                            reason: HangupReason::Local,
                        });
                    } else {
                        queries.push(cid);
                    }
                }
            }
        }
        let changed = !events.is_empty() || !queries.is_empty();
        let stray = obj.find_stray();

        for event in events {
            self.emit(DataEvent::Call { slot, event });
        }
        if changed {
            self.emit(DataEvent::CallsChanged { slot });
        }
        for cid in queries {
            self.query_fail_cause(slot, cid);
        }
        if let Some(cid) = stray {
            info!(slot, cid, "Deactivating unclaimed call");
            if let Err(err) = self.deactivate(slot, cid, None) {
                warn!(slot, cid, %err, "Failed to queue deactivation");
            }
        }
    }

    fn query_fail_cause(&mut self, slot: usize, cid: i32) {
        match self
            .transport
            .submit(Target::Slot(slot), RadioRequest::LastDataCallFailCause)
        {
            Ok(serial) => {
                self.inflight
                    .insert(serial, Inflight::FailCause { slot, cid });
            }
            Err(err) => {
                warn!(slot, cid, %err, "Fail cause query failed");
                self.emit(DataEvent::Call {
                    slot,
                    event: CallEvent::Disconnected {
                        cid,
                        reason: HangupReason::Unknown,
                    },
                });
            }
        }
    }

    pub(super) fn on_fail_cause(&mut self, slot: usize, cid: i32, response: RadioResponse) {
        if self.index(slot).is_none() {
            return;
        }
        let success = response.is_success() && response.code == RequestCode::LastDataCallFailCause;
        let reason = match response.payload {
            ResponsePayload::FailCause(cause) if success => {
                classify(cause, &self.config.hangup.local_causes)
            }
            _ => {
                warn!(slot, cid, error = %response.error, "Fail cause unavailable");
                HangupReason::Unknown
            }
        };
        debug!(slot, cid, ?reason, "Call disconnected");
        self.emit(DataEvent::Call {
            slot,
            event: CallEvent::Disconnected { cid, reason },
        });
    }

    /// A setup completed: record and claim the new call
    pub(super) fn on_call_established(
        &mut self,
        slot: usize,
        call: DataCall,
        owner: Option<CallOwner>,
    ) {
        let Some(obj) = self.object_mut(slot) else {
            return;
        };
        let restore = obj.downgraded_tech;
        obj.downgraded_tech = false;
        if let Some(owner) = owner {
            obj.grab.entry(call.cid).or_insert(owner);
        }
        let existed = find_call(&obj.calls, call.cid).is_some();
        let changed = obj.upsert_call(call.clone());

        if restore {
            info!(slot, "Restoring access technology");
            self.check_network_mode();
        }
        if changed {
            let event = if existed {
                DataEvent::Call {
                    slot,
                    event: CallEvent::Changed(call),
                }
            } else {
                DataEvent::added(slot, call)
            };
            self.emit(event);
            self.emit(DataEvent::CallsChanged { slot });
        }
    }

    /// A deactivation completed: forget the call
    pub(super) fn on_call_deactivated(&mut self, slot: usize, cid: i32) {
        let removed = self
            .object_mut(slot)
            .and_then(|obj| obj.remove_call(cid))
            .is_some();
        if removed {
            self.emit(DataEvent::Call {
                slot,
                event: CallEvent::Disconnected {
                    cid,
                    reason: HangupReason::Local,
                },
            });
            self.emit(DataEvent::CallsChanged { slot });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use modem_data_core::{
        CallState, ContextParams, ContextType, FailCause, RadioError, RadioRequest, RadioResponse,
        RequestCode, ResponsePayload,
    };
    use pretty_assertions::assert_eq;

    use crate::calls::{CallEvent, HangupReason};
    use crate::config::DataConfig;
    use crate::error::{DataError, DataResult};
    use crate::manager::tests::{call_list, Harness, Log};
    use crate::mock::mock_call;
    use crate::notify::DataEvent;
    use crate::request::CallOwner;

    // =============================================================================
    // Call lists
    // =============================================================================

    #[test]
    fn test_call_list_reconciliation_events() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        for _ in 0..3 {
            h.connect(0, CallOwner(7));
        }
        h.manager.handle_indication(
            0,
            call_list(vec![
                mock_call(3, Default::default()),
                mock_call(1, Default::default()),
                mock_call(2, Default::default()),
            ]),
        );
        let cids: Vec<i32> = h.manager.slot(0).unwrap().calls().iter().map(|c| c.cid).collect();
        assert_eq!(cids, vec![1, 2, 3]);
        h.clear_events();

        let mut changed = mock_call(2, Default::default());
        changed.state = CallState::Dormant;
        let mut failed = mock_call(3, Default::default());
        failed.status = FailCause::NetworkFailure;
        h.manager.handle_indication(
            0,
            call_list(vec![mock_call(1, Default::default()), changed.clone(), failed]),
        );
        h.manager
            .handle_indication(0, call_list(vec![changed.clone()]));
        // One fail cause query per vanished call, answered in order
        h.respond(
            RequestCode::LastDataCallFailCause,
            RadioResponse::ok(
                RequestCode::LastDataCallFailCause,
                ResponsePayload::FailCause(FailCause::RegularDeactivation),
            ),
        );
        h.respond(
            RequestCode::LastDataCallFailCause,
            RadioResponse::ok(
                RequestCode::LastDataCallFailCause,
                ResponsePayload::FailCause(FailCause::NetworkFailure),
            ),
        );

        let mut failed = mock_call(3, Default::default());
        failed.status = FailCause::NetworkFailure;
        assert_eq!(
            h.events(),
            vec![
                DataEvent::Call {
                    slot: 0,
                    event: CallEvent::Changed(changed.clone())
                },
                DataEvent::Call {
                    slot: 0,
                    event: CallEvent::Changed(failed)
                },
                DataEvent::CallsChanged { slot: 0 },
                DataEvent::CallsChanged { slot: 0 },
                DataEvent::Call {
                    slot: 0,
                    event: CallEvent::Disconnected {
                        cid: 1,
                        reason: HangupReason::Local
                    }
                },
                DataEvent::Call {
                    slot: 0,
                    event: CallEvent::Disconnected {
                        cid: 3,
                        reason: HangupReason::Remote(FailCause::NetworkFailure)
                    }
                },
            ]
        );
        // Claims on vanished calls are pruned
        assert_eq!(h.manager.slot(0).unwrap().grab_owner(1), None);
        assert_eq!(h.manager.slot(0).unwrap().grab_owner(2), Some(CallOwner(7)));
    }

    #[test]
    fn test_locally_released_call_needs_no_query() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let cid = h.connect(0, CallOwner(1));
        h.manager.call_deactivate(0, cid, |_| {}).unwrap();
        h.clear_events();

        h.manager.handle_indication(0, call_list(vec![]));
        assert_eq!(h.radio.count(RequestCode::LastDataCallFailCause), 0);
        assert_eq!(
            h.events()[0],
            DataEvent::Call {
                slot: 0,
                event: CallEvent::Disconnected {
                    cid,
                    reason: HangupReason::Local
                }
            }
        );

        // The deactivation completing later reports nothing twice
        h.clear_events();
        h.drive();
        assert!(h.events().is_empty());
    }

    #[test]
    fn test_fail_cause_query_failure_reports_unknown() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let cid = h.connect(0, CallOwner(1));
        h.clear_events();

        h.manager.handle_indication(0, call_list(vec![]));
        h.respond(
            RequestCode::LastDataCallFailCause,
            RadioResponse::error(RequestCode::LastDataCallFailCause, RadioError::GenericFailure),
        );
        assert!(h.events().contains(&DataEvent::Call {
            slot: 0,
            event: CallEvent::Disconnected {
                cid,
                reason: HangupReason::Unknown
            }
        }));
    }

    #[test]
    fn test_unclaimed_calls_deactivated_one_per_pass() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let owned = h.connect(0, CallOwner(1));
        assert_eq!(owned, 1);
        h.manager.handle_indication(
            0,
            call_list(vec![
                mock_call(1, Default::default()),
                mock_call(2, Default::default()),
                mock_call(3, Default::default()),
            ]),
        );
        assert_eq!(h.radio.count(RequestCode::DeactivateDataCall), 1);
        let sub = h.respond_ok(RequestCode::DeactivateDataCall);
        assert_eq!(sub.request, RadioRequest::DeactivateDataCall { cid: 2 });

        // Next pass picks the next stray, the claimed call is left alone
        let calls = h.manager.slot(0).unwrap().calls().to_vec();
        h.manager.handle_indication(0, call_list(calls));
        let sub = h.respond_ok(RequestCode::DeactivateDataCall);
        assert_eq!(sub.request, RadioRequest::DeactivateDataCall { cid: 3 });

        let calls = h.manager.slot(0).unwrap().calls().to_vec();
        h.manager.handle_indication(0, call_list(calls));
        assert_eq!(h.radio.count(RequestCode::DeactivateDataCall), 2);
        assert_eq!(h.manager.slot(0).unwrap().grab_owner(owned), Some(CallOwner(1)));
    }

    #[test]
    fn test_grab_requires_listed_call() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        assert!(!h.manager.call_grab(0, 5, CallOwner(1)));
        assert!(!h.manager.call_grab(3, 5, CallOwner(1)));

        // The call showing up later is not owned by the refused claim
        h.manager
            .handle_indication(0, call_list(vec![mock_call(5, Default::default())]));
        assert_eq!(h.manager.slot(0).unwrap().grab_owner(5), None);
        let sub = h.respond_ok(RequestCode::DeactivateDataCall);
        assert_eq!(sub.request, RadioRequest::DeactivateDataCall { cid: 5 });
    }

    #[test]
    fn test_setup_owner_claims_new_call() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let owner = CallOwner(42);
        h.manager
            .call_setup(
                0,
                ContextParams::new("internet"),
                ContextType::Internet,
                Some(owner),
                |_| {},
            )
            .unwrap();

        // An indication racing the setup response does not kill the new call
        let sub = h.radio.take(RequestCode::SetupDataCall).unwrap();
        let response = h.radio.default_response(&sub);
        h.manager
            .handle_indication(0, call_list(h.radio.calls(0)));
        assert_eq!(h.radio.count(RequestCode::DeactivateDataCall), 0);
        h.manager.handle_response(sub.serial, response);

        let cid = h.manager.slot(0).unwrap().calls()[0].cid;
        assert_eq!(h.manager.slot(0).unwrap().grab_owner(cid), Some(owner));
        assert!(!h.manager.call_grab(0, cid, CallOwner(1)));
        assert!(h.manager.call_grab(0, cid, owner));

        h.manager.call_release(0, cid, CallOwner(1));
        assert_eq!(h.manager.slot(0).unwrap().grab_owner(cid), Some(owner));
        h.manager.call_release(0, cid, owner);
        assert_eq!(h.manager.slot(0).unwrap().grab_owner(cid), None);
    }

    #[test]
    fn test_deactivate_success_reports_local_hangup() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let cid = h.connect(0, CallOwner(1));
        h.clear_events();

        let result: Log<DataResult<()>> = Arc::default();
        let sink = result.clone();
        h.manager
            .call_deactivate(0, cid, move |res| sink.lock().push(res))
            .unwrap();
        h.drive();

        assert_eq!(result.lock().as_slice(), &[Ok(())]);
        assert_eq!(
            h.events(),
            vec![
                DataEvent::Call {
                    slot: 0,
                    event: CallEvent::Disconnected {
                        cid,
                        reason: HangupReason::Local
                    }
                },
                DataEvent::CallsChanged { slot: 0 },
            ]
        );
    }

    #[test]
    fn test_deactivate_failure_polls_call_list() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let calls_before = h.radio.count(RequestCode::GetDataCallList);
        let result: Log<DataResult<()>> = Arc::default();
        let sink = result.clone();
        h.manager
            .call_deactivate(0, 9, move |res| sink.lock().push(res))
            .unwrap();
        h.respond(
            RequestCode::DeactivateDataCall,
            RadioResponse::error(RequestCode::DeactivateDataCall, RadioError::InvalidCallId),
        );
        assert_eq!(
            result.lock().as_slice(),
            &[Err(DataError::Radio(RadioError::InvalidCallId))]
        );
        assert_eq!(h.radio.count(RequestCode::GetDataCallList), calls_before + 1);
    }
}
