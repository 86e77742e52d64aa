//! Request submission, completion and retry

use std::time::{Duration, Instant};

use modem_data_core::{
    AccessNetwork, ContextType, DataProfile, FailCause, RadioRequest, RadioResponse,
    RequestCode, ResponsePayload, Serial, SetupDataCall, Target, TransportError,
    TransportStatus,
};
use tracing::{debug, error, info, warn};

use super::{DataManager, Inflight};
use crate::error::{DataError, DataResult};
use crate::object::DataFlags;
use crate::request::{DataRequest, RequestFlags, RequestId, RequestKind};
use crate::timer::TimerEvent;

/// What happens to a request after its response was handled
enum Outcome {
    /// The callback has fired, move on to the next request
    Done,
    /// Resubmit right away
    RetryNow,
    /// Keep the request pending and resubmit after a delay
    RetryAfter(Duration),
}

impl DataManager {
    // =========================================================================
    // Queue
    // =========================================================================

    /// Append a request to a slot's queue, submitting it if the slot is idle
    pub(super) fn enqueue(&mut self, slot: usize, kind: RequestKind) -> DataResult<RequestId> {
        let id = self.next_id();
        let obj = self.object_mut(slot).ok_or(DataError::NoSuchSlot(slot))?;
        let req = DataRequest::new(id, kind);
        debug!(slot, request = req.name(), %id, "Request queued");
        obj.queue.push(req);
        self.submit_next(slot);
        Ok(id)
    }

    /// Submit queued requests until one is genuinely in flight
    pub(super) fn submit_next(&mut self, slot: usize) {
        loop {
            let Some(obj) = self.object_mut(slot) else {
                return;
            };
            if obj.is_initializing() || obj.queue.has_pending() {
                break;
            }
            let Some(mut req) = obj.queue.pop_front() else {
                break;
            };

            match self.submit(slot, &req) {
                Ok(serial) => {
                    debug!(slot, request = req.name(), %serial, "Request submitted");
                    req.serial = Some(serial);
                    self.inflight
                        .insert(serial, Inflight::Request { slot, id: req.id });
                    if let Some(obj) = self.object_mut(slot) {
                        obj.queue.set_pending(req);
                    }
                    break;
                }
                Err(err) => {
                    warn!(slot, request = req.name(), %err, "Request submit failed");
                    if req.retries_forever() {
                        self.hold_off_arbitration();
                    }
                    req.fail(DataError::Transport(err));
                }
            }
        }

        self.update_power(slot);
        self.check_data();
    }

    fn submit(&mut self, slot: usize, req: &DataRequest) -> Result<Serial, TransportError> {
        let (target, request) = self.build_request(slot, req)?;
        self.transport.submit(target, request)
    }

    fn build_request(
        &self,
        slot: usize,
        req: &DataRequest,
    ) -> Result<(Target, RadioRequest), TransportError> {
        let obj = self
            .slot(slot)
            .ok_or_else(|| TransportError::SubmitFailed(format!("slot {} is gone", slot)))?;

        let built = match &req.kind {
            RequestKind::Setup(setup) => {
                let profiles = &self.config.profiles;
                let profile_id = match setup.context_type {
                    ContextType::Internet => profiles.default,
                    ContextType::Mms => profiles.mms,
                    ContextType::Ims => profiles.ims,
                };
                let access_network = match setup.context_type {
                    ContextType::Ims => AccessNetwork::Eutran,
                    _ => obj.network.tech.access_network(),
                };
                let params = &setup.params;
                let request = RadioRequest::SetupDataCall(SetupDataCall {
                    access_network,
                    profile: DataProfile {
                        profile_id,
                        apn: params.apn.clone(),
                        protocol: params.protocol,
                        roaming_protocol: params.protocol,
                        auth: params.auth,
                        username: params.username.clone(),
                        password: params.password.clone(),
                    },
                    is_roaming: obj.network.roaming,
                });
                (Target::Slot(slot), request)
            }
            RequestKind::Deactivate(deact) => (
                Target::Slot(slot),
                RadioRequest::DeactivateDataCall { cid: deact.cid },
            ),
            RequestKind::AllowData { allow } => (
                Target::Slot(slot),
                RadioRequest::SetDataAllowed { allow: *allow },
            ),
            RequestKind::SetPreferredModem => {
                let logical = self
                    .capability
                    .as_ref()
                    .and_then(|cap| cap.logical_modems.get(slot).copied());
                let modem_id = match logical {
                    Some(id) => id,
                    None => u8::try_from(slot).map_err(|_| {
                        TransportError::SubmitFailed(format!("slot {} has no modem id", slot))
                    })?,
                };
                (
                    Target::Config,
                    RadioRequest::SetPreferredDataModem { modem_id },
                )
            }
        };
        Ok(built)
    }

    /// Resubmit a request that stays pending
    fn resubmit(&mut self, slot: usize, mut req: DataRequest) {
        req.retry_timer = None;
        match self.submit(slot, &req) {
            Ok(serial) => {
                debug!(slot, request = req.name(), %serial, "Request resubmitted");
                req.serial = Some(serial);
                self.inflight
                    .insert(serial, Inflight::Request { slot, id: req.id });
                if let Some(obj) = self.object_mut(slot) {
                    obj.queue.set_pending(req);
                }
            }
            Err(err) => {
                warn!(slot, request = req.name(), %err, "Request resubmit failed");
                req.fail(DataError::Transport(err));
                self.submit_next(slot);
            }
        }
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancel a queued or pending request.
    ///
    /// The request's callback fires with a cancellation before this returns.
    /// Returns false if no such request is queued, e.g. it already completed.
    pub fn cancel(&mut self, id: RequestId) -> bool {
        let Some(slot) = self
            .objects
            .iter()
            .find(|obj| obj.queue.contains(id))
            .map(|obj| obj.slot())
        else {
            return false;
        };
        let Some((req, was_pending)) = self
            .object_mut(slot)
            .and_then(|obj| obj.queue.remove(id))
        else {
            return false;
        };

        self.drop_request(req);
        if was_pending {
            self.submit_next(slot);
        } else {
            self.update_power(slot);
            self.check_data();
        }
        self.sync_allowed();
        true
    }

    /// Cancel every request of a slot carrying `flag`
    pub(super) fn cancel_requests(&mut self, slot: usize, flag: RequestFlags) {
        let Some(obj) = self.object_mut(slot) else {
            return;
        };
        let had_pending = obj.queue.has_pending();
        let removed = obj.queue.drain_flagged(flag);
        let lost_pending = had_pending && !obj.queue.has_pending();
        if removed.is_empty() {
            return;
        }

        for req in removed {
            self.drop_request(req);
        }
        if lost_pending {
            self.submit_next(slot);
        } else {
            self.update_power(slot);
        }
    }

    /// Release the hardware handle and timer of a request and cancel it
    pub(super) fn drop_request(&mut self, mut req: DataRequest) {
        if let Some(serial) = req.serial.take() {
            self.inflight.remove(&serial);
            self.transport.cancel(serial);
        }
        if let Some(timer) = req.retry_timer.take() {
            self.timers.cancel(timer);
        }
        req.cancel();
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Deliver the completion of a submitted hardware request
    pub fn handle_response(&mut self, serial: Serial, response: RadioResponse) {
        match self.inflight.remove(&serial) {
            None => debug!(%serial, code = %response.code, "Response for unknown serial"),
            Some(Inflight::Request { slot, id }) => self.complete_request(slot, id, response),
            Some(Inflight::CallList { slot }) => self.on_call_list(slot, serial, response),
            Some(Inflight::FailCause { slot, cid }) => self.on_fail_cause(slot, cid, response),
            Some(Inflight::Capability) => self.on_capability(response),
        }
        self.sync_allowed();
    }

    fn complete_request(&mut self, slot: usize, id: RequestId, response: RadioResponse) {
        let Some(mut req) = self
            .object_mut(slot)
            .and_then(|obj| obj.queue.take_pending(id))
        else {
            return;
        };
        req.serial = None;

        let expected = req.code();
        let outcome = if response.code != expected {
            error!(
                slot,
                request = req.name(),
                %expected,
                actual = %response.code,
                "Unexpected response"
            );
            req.fail(DataError::UnexpectedResponse {
                expected,
                actual: response.code,
            });
            Outcome::Done
        } else if response.status == TransportStatus::Failed {
            warn!(slot, request = req.name(), "Request did not complete");
            if req.retries_forever() {
                self.hold_off_arbitration();
            }
            req.fail(DataError::Transport(TransportError::RoundTripFailed));
            Outcome::Done
        } else if response.error.is_transient()
            && (req.retries_forever() || req.transient_retries < self.config.transient_retry_limit)
        {
            req.transient_retries += 1;
            debug!(
                slot,
                request = req.name(),
                error = %response.error,
                attempt = req.transient_retries,
                "Radio not ready, retrying"
            );
            Outcome::RetryAfter(self.config.transient_retry_delay())
        } else if let Some(on) = req.switches() {
            self.complete_switch(slot, &mut req, on, response)
        } else if req.deactivates().is_some() {
            self.complete_deactivate(slot, &mut req, response)
        } else {
            self.complete_setup(slot, &mut req, response)
        };

        match outcome {
            Outcome::Done => self.submit_next(slot),
            Outcome::RetryNow => self.resubmit(slot, req),
            Outcome::RetryAfter(delay) => {
                let at = Instant::now() + delay;
                req.retry_timer = Some(self.timers.schedule(at, TimerEvent::Retry { slot, id }));
                if let Some(obj) = self.object_mut(slot) {
                    obj.queue.set_pending(req);
                }
            }
        }
    }

    fn complete_setup(
        &mut self,
        slot: usize,
        req: &mut DataRequest,
        response: RadioResponse,
    ) -> Outcome {
        if !response.error.is_none() {
            warn!(slot, error = %response.error, "Data call setup failed");
            req.complete_setup(Err(DataError::Radio(response.error)));
            return Outcome::Done;
        }
        let call = match response.payload {
            ResponsePayload::DataCall(call) => call,
            ResponsePayload::DataCallList(mut calls) if calls.len() == 1 => calls.remove(0),
            other => {
                error!(slot, payload = ?other, "Malformed setup response");
                req.complete_setup(Err(DataError::InvalidPayload(RequestCode::SetupDataCall)));
                return Outcome::Done;
            }
        };

        match call.status {
            FailCause::ErrorUnspecified => {
                let limit = self.config.setup_retry_limit;
                if let RequestKind::Setup(setup) = &mut req.kind {
                    if setup.retry_count < limit {
                        setup.retry_count += 1;
                        debug!(slot, retry = setup.retry_count, limit, "Silent setup retry");
                        return if setup.retry_count == 1 {
                            Outcome::RetryNow
                        } else {
                            Outcome::RetryAfter(self.config.setup_retry_delay())
                        };
                    }
                }
            }
            FailCause::MultiConnToSamePdnNotAllowed => self.downgrade_tech(slot),
            _ => {}
        }

        if !call.status.is_none() {
            warn!(slot, cid = call.cid, status = %call.status, "Data call setup failed");
            req.complete_setup(Err(DataError::CallFailed(call.status)));
            return Outcome::Done;
        }

        let owner = match &req.kind {
            RequestKind::Setup(setup) => setup.owner,
            _ => None,
        };
        info!(slot, cid = call.cid, ifname = %call.ifname, "Data call established");
        self.on_call_established(slot, call.clone(), owner);
        req.complete_setup(Ok(call));
        Outcome::Done
    }

    fn complete_deactivate(
        &mut self,
        slot: usize,
        req: &mut DataRequest,
        response: RadioResponse,
    ) -> Outcome {
        let Some(cid) = req.deactivates() else {
            return Outcome::Done;
        };
        if response.error.is_none() {
            info!(slot, cid, "Data call deactivated");
            self.on_call_deactivated(slot, cid);
            req.complete_deactivate(Ok(()));
        } else {
            warn!(slot, cid, error = %response.error, "Data call deactivation failed");
            req.complete_deactivate(Err(DataError::Radio(response.error)));
            self.poll_calls(slot);
        }
        Outcome::Done
    }

    /// Completion of a request that switches data on or off
    fn complete_switch(
        &mut self,
        slot: usize,
        req: &mut DataRequest,
        on: bool,
        response: RadioResponse,
    ) -> Outcome {
        req.flags |= RequestFlags::COMPLETED;
        if response.error.is_none() {
            if let Some(obj) = self.object_mut(slot) {
                obj.flags.set(DataFlags::ON, on);
            }
            info!(slot, request = req.name(), "Data {}", if on { "on" } else { "off" });
        } else {
            warn!(slot, request = req.name(), error = %response.error, "Data switch refused");
            if on {
                self.hold_off_arbitration();
            }
        }
        Outcome::Done
    }

    /// Setup hit the one-PDN-per-APN limit on LTE: fall back to UMTS
    fn downgrade_tech(&mut self, slot: usize) {
        let Some(obj) = self.object_mut(slot) else {
            return;
        };
        if !obj.downgraded_tech && obj.network.tech.is_lte() {
            obj.downgraded_tech = true;
            info!(slot, "Downgrading access technology");
            self.check_network_mode();
        }
    }

    fn on_capability(&mut self, response: RadioResponse) {
        let success = response.is_success();
        match response.payload {
            ResponsePayload::PhoneCapability(cap) if success => {
                info!(
                    max_active_data = cap.max_active_data,
                    logical_modems = ?cap.logical_modems,
                    "Phone capability"
                );
                self.capability = Some(cap);
            }
            _ => {
                warn!(error = %response.error, "Phone capability query failed");
                self.schedule_capability_retry();
            }
        }
    }

    // =========================================================================
    // Timers
    // =========================================================================

    /// Earliest instant at which `handle_timeout` has work to do
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn handle_timeout(&mut self, now: Instant) {
        for event in self.timers.expire(now) {
            match event {
                TimerEvent::Retry { slot, id } => {
                    if let Some(req) = self
                        .object_mut(slot)
                        .and_then(|obj| obj.queue.take_pending(id))
                    {
                        self.resubmit(slot, req);
                    }
                }
                TimerEvent::Capability => self.query_capability(),
                TimerEvent::Rearbitrate => {
                    self.holdoff = false;
                    self.check_data();
                }
            }
        }
        self.sync_allowed();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use modem_data_core::{
        AccessNetwork, ContextParams, ContextType, DataRole, FailCause, NetworkState, PowerTag,
        RadioConfigInterface, RadioError, RadioRequest, RadioResponse, RadioTech, RatMask,
        RequestCode, ResponsePayload, Target,
    };
    use pretty_assertions::assert_eq;

    use crate::config::DataConfig;
    use crate::error::DataError;
    use crate::manager::tests::{failed_call, Harness, Log};

    // =============================================================================
    // Request queue
    // =============================================================================

    #[test]
    fn test_requests_complete_in_submission_order() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let order: Log<&'static str> = Arc::default();
        for name in ["A", "B", "C"] {
            let sink = order.clone();
            h.manager
                .call_setup(
                    0,
                    ContextParams::new(name),
                    ContextType::Internet,
                    None,
                    move |_| sink.lock().push(name),
                )
                .unwrap();
        }

        // Only one request is ever in flight
        assert_eq!(h.radio.outstanding().len(), 1);
        h.drive();
        assert_eq!(order.lock().as_slice(), &["A", "B", "C"]);

        let apns: Vec<String> = h
            .radio
            .submissions()
            .into_iter()
            .filter_map(|sub| match sub.request {
                RadioRequest::SetupDataCall(setup) => Some(setup.profile.apn),
                _ => None,
            })
            .collect();
        assert_eq!(apns, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_cancel_pending_yields_single_cancellation() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let (id, log) = h.setup(0, "internet");
        let sub = h.radio.outstanding()[0].clone();

        assert!(h.manager.cancel(id));
        assert_eq!(log.lock().as_slice(), &[Err(DataError::Cancelled)]);
        assert_eq!(h.radio.cancelled(), vec![sub.serial]);

        // A late completion for the cancelled serial is ignored
        h.manager
            .handle_response(sub.serial, h.radio.default_response(&sub));
        assert_eq!(log.lock().len(), 1);
        assert!(h.manager.slot(0).unwrap().calls().is_empty());
        assert!(!h.power.is_on(PowerTag::DataSlot(0)));
    }

    #[test]
    fn test_cancel_completed_request_is_noop() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let (id, log) = h.setup(0, "internet");
        h.drive();
        assert_eq!(log.lock().len(), 1);

        assert!(!h.manager.cancel(id));
        assert!(!h.manager.cancel(id));
        assert_eq!(log.lock().len(), 1);
        assert!(log.lock()[0].is_ok());
    }

    #[test]
    fn test_cancel_buried_request_keeps_pending_one() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let (_, first) = h.setup(0, "first");
        let (second_id, second) = h.setup(0, "second");
        let (_, third) = h.setup(0, "third");

        assert!(h.manager.cancel(second_id));
        assert_eq!(second.lock().as_slice(), &[Err(DataError::Cancelled)]);
        assert!(h.radio.cancelled().is_empty());

        h.drive();
        assert!(first.lock()[0].is_ok());
        assert!(third.lock()[0].is_ok());
        assert_eq!(h.radio.count(RequestCode::SetupDataCall), 2);
    }

    #[test]
    fn test_submit_failure_frees_request_and_moves_on() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        h.radio.set_fail_submit(true);
        let (_, log) = h.setup(0, "internet");
        assert!(matches!(
            log.lock().as_slice(),
            [Err(DataError::Transport(_))]
        ));
        assert!(h.manager.slot(0).unwrap().queued_requests() == 0);
        assert!(!h.manager.slot(0).unwrap().has_pending_request());
        assert!(!h.power.is_on(PowerTag::DataSlot(0)));

        h.radio.set_fail_submit(false);
        let (_, log) = h.setup(0, "internet");
        h.drive();
        assert!(log.lock()[0].is_ok());
    }

    #[test]
    fn test_transport_failure_surfaces() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let (_, log) = h.setup(0, "internet");
        h.respond(
            RequestCode::SetupDataCall,
            RadioResponse::transport_failure(RequestCode::SetupDataCall),
        );
        assert!(matches!(
            log.lock().as_slice(),
            [Err(DataError::Transport(_))]
        ));
    }

    #[test]
    fn test_unexpected_response_is_not_retried() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let (_, log) = h.setup(0, "internet");
        h.respond(
            RequestCode::SetupDataCall,
            RadioResponse::ok(RequestCode::GetDataCallList, ResponsePayload::None),
        );
        assert_eq!(
            log.lock().as_slice(),
            &[Err(DataError::UnexpectedResponse {
                expected: RequestCode::SetupDataCall,
                actual: RequestCode::GetDataCallList,
            })]
        );
        assert_eq!(h.radio.count(RequestCode::SetupDataCall), 1);
        assert!(h.manager.poll_timeout().is_none());
    }

    #[test]
    fn test_power_follows_queue() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let tag = PowerTag::DataSlot(0);
        assert!(h.power.events().is_empty());

        h.setup(0, "a");
        h.setup(0, "b");
        assert!(h.power.is_on(tag));
        h.drive();
        assert!(!h.power.is_on(tag));
        assert_eq!(h.power.events(), vec![(tag, true), (tag, false)]);
    }

    // =============================================================================
    // Retries
    // =============================================================================

    #[test]
    fn test_transient_setup_retries_are_bounded() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let (_, log) = h.setup(0, "internet");

        for _ in 0..3 {
            h.respond(
                RequestCode::SetupDataCall,
                RadioResponse::error(RequestCode::SetupDataCall, RadioError::RadioNotAvailable),
            );
            assert!(log.lock().is_empty());
            assert!(h.manager.slot(0).unwrap().has_pending_request());
            assert!(h.radio.outstanding().is_empty());
            h.fire_timers();
        }
        h.respond(
            RequestCode::SetupDataCall,
            RadioResponse::error(RequestCode::SetupDataCall, RadioError::RadioNotAvailable),
        );
        assert_eq!(
            log.lock().as_slice(),
            &[Err(DataError::Radio(RadioError::RadioNotAvailable))]
        );
        assert_eq!(h.radio.count(RequestCode::SetupDataCall), 4);
    }

    #[test]
    fn test_allow_data_retries_forever() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        h.manager.allow(0, DataRole::Internet).unwrap();

        for _ in 0..10 {
            h.respond(
                RequestCode::SetDataAllowed,
                RadioResponse::error(RequestCode::SetDataAllowed, RadioError::InvalidState),
            );
            h.fire_timers();
        }
        h.respond_ok(RequestCode::SetDataAllowed);
        assert!(h.manager.is_allowed(0));
        assert_eq!(h.radio.count(RequestCode::SetDataAllowed), 11);
    }

    #[test]
    fn test_cancel_during_retry_delay_clears_timer() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let (id, log) = h.setup(0, "internet");
        h.respond(
            RequestCode::SetupDataCall,
            RadioResponse::error(RequestCode::SetupDataCall, RadioError::InvalidState),
        );
        assert!(h.manager.poll_timeout().is_some());

        assert!(h.manager.cancel(id));
        assert_eq!(log.lock().as_slice(), &[Err(DataError::Cancelled)]);
        assert!(h.manager.poll_timeout().is_none());
    }

    #[test]
    fn test_unspecified_failure_retries_silently() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let (_, log) = h.setup(0, "internet");

        // First retry goes out immediately
        h.respond(RequestCode::SetupDataCall, failed_call(FailCause::ErrorUnspecified));
        assert_eq!(h.radio.count(RequestCode::SetupDataCall), 2);
        assert!(h.manager.poll_timeout().is_none());

        // Later ones after the configured delay
        for attempt in 3..=5 {
            h.respond(RequestCode::SetupDataCall, failed_call(FailCause::ErrorUnspecified));
            assert!(log.lock().is_empty());
            assert_eq!(h.radio.count(RequestCode::SetupDataCall), attempt - 1);
            h.fire_timers();
            assert_eq!(h.radio.count(RequestCode::SetupDataCall), attempt);
        }

        h.respond(RequestCode::SetupDataCall, failed_call(FailCause::ErrorUnspecified));
        assert_eq!(
            log.lock().as_slice(),
            &[Err(DataError::CallFailed(FailCause::ErrorUnspecified))]
        );
    }

    #[test]
    fn test_unspecified_failure_recovers() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let (_, log) = h.setup(0, "internet");
        h.respond(RequestCode::SetupDataCall, failed_call(FailCause::ErrorUnspecified));
        h.respond_ok(RequestCode::SetupDataCall);
        assert!(log.lock()[0].is_ok());
        assert_eq!(h.manager.slot(0).unwrap().calls().len(), 1);
    }

    #[test]
    fn test_other_fail_cause_is_not_retried() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        let (_, log) = h.setup(0, "internet");
        h.respond(RequestCode::SetupDataCall, failed_call(FailCause::MissingUnknownApn));
        assert_eq!(
            log.lock().as_slice(),
            &[Err(DataError::CallFailed(FailCause::MissingUnknownApn))]
        );
        assert_eq!(h.radio.count(RequestCode::SetupDataCall), 1);
    }

    // =============================================================================
    // Setup parameters and technology downgrade
    // =============================================================================

    #[test]
    fn test_setup_parameters() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        h.manager.on_network_changed(
            0,
            NetworkState {
                tech: RadioTech::Hspa,
                roaming: true,
            },
        );

        let mut params = ContextParams::new("mms.example");
        params.username = "user".into();
        h.manager
            .call_setup(0, params, ContextType::Mms, None, |_| {})
            .unwrap();
        h.manager
            .call_setup(0, ContextParams::new("ims"), ContextType::Ims, None, |_| {})
            .unwrap();
        h.drive();

        let setups: Vec<_> = h
            .radio
            .submissions()
            .into_iter()
            .filter_map(|sub| match sub.request {
                RadioRequest::SetupDataCall(setup) => Some((sub.target, setup)),
                _ => None,
            })
            .collect();
        let (target, mms) = &setups[0];
        assert_eq!(*target, Target::Slot(0));
        assert_eq!(mms.profile.profile_id, 1001);
        assert_eq!(mms.profile.username, "user");
        assert_eq!(mms.access_network, AccessNetwork::Utran);
        assert!(mms.is_roaming);

        let (_, ims) = &setups[1];
        assert_eq!(ims.profile.profile_id, 2);
        assert_eq!(ims.access_network, AccessNetwork::Eutran);
    }

    #[test]
    fn test_multi_pdn_failure_on_lte_downgrades() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        h.manager.on_network_changed(
            0,
            NetworkState {
                tech: RadioTech::Lte,
                roaming: false,
            },
        );
        assert_eq!(h.rat.mask(0), Some(RatMask::default()));

        let (_, log) = h.setup(0, "internet");
        h.respond(
            RequestCode::SetupDataCall,
            failed_call(FailCause::MultiConnToSamePdnNotAllowed),
        );
        assert_eq!(
            log.lock().as_slice(),
            &[Err(DataError::CallFailed(
                FailCause::MultiConnToSamePdnNotAllowed
            ))]
        );
        assert!(h.manager.slot(0).unwrap().downgraded_tech());
        assert_eq!(h.rat.mask(0), Some(RatMask::GSM | RatMask::UMTS));

        // A second failure while downgraded changes nothing
        let updates = h.rat.updates().len();
        h.setup(0, "internet");
        h.respond(
            RequestCode::SetupDataCall,
            failed_call(FailCause::MultiConnToSamePdnNotAllowed),
        );
        assert_eq!(h.rat.updates().len(), updates);

        let (_, log) = h.setup(0, "internet");
        h.drive();
        assert!(log.lock()[0].is_ok());
        assert!(!h.manager.slot(0).unwrap().downgraded_tech());
        assert_eq!(h.rat.mask(0), Some(RatMask::default()));
    }

    #[test]
    fn test_multi_pdn_failure_off_lte_does_not_downgrade() {
        let mut h = Harness::new(DataConfig::default(), &[0]);
        h.manager.on_network_changed(
            0,
            NetworkState {
                tech: RadioTech::Umts,
                roaming: false,
            },
        );
        h.setup(0, "internet");
        h.respond(
            RequestCode::SetupDataCall,
            failed_call(FailCause::MultiConnToSamePdnNotAllowed),
        );
        assert!(!h.manager.slot(0).unwrap().downgraded_tech());
    }

    #[test]
    fn test_preferred_modem_without_modem_id_is_held_off() {
        let mut h = Harness::new(DataConfig::default(), &[300]);
        h.manager.set_radio_config(Some(RadioConfigInterface::V1_1));
        h.respond_ok(RequestCode::GetPhoneCapability);

        h.manager.allow(300, DataRole::Internet).unwrap();
        assert_eq!(h.radio.count(RequestCode::SetPreferredDataModem), 0);
        assert!(!h.manager.is_allowed(300));
        assert!(!h.manager.slot(300).unwrap().has_pending_request());
        assert!(h.manager.poll_timeout().is_some());
    }
}
