//! Mock modem and recording collaborators
//!
//! `MockRadioTransport` records every submission. Tests answer submissions
//! by hand with [`DataManager::handle_response`] or with [`drive`]; the
//! daemon builds it with an event sink so it answers on its own.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use modem_data_core::{
    CallState, DataCall, FailCause, PhoneCapability, PowerControl, PowerTag, Protocol,
    RadioRequest, RadioResponse, RadioTransport, RatControl, RatMask, RequestCode,
    ResponsePayload, Serial, Target, TransportError,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::manager::DataManager;
use crate::service::RadioEvent;

/// A request seen by the mock transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub serial: Serial,
    pub target: Target,
    pub request: RadioRequest,
}

impl Submission {
    pub fn code(&self) -> RequestCode {
        self.request.code()
    }
}

struct AutoRespond {
    tx: mpsc::UnboundedSender<RadioEvent>,
    latency: Duration,
}

struct MockState {
    next_serial: u64,
    next_cid: i32,
    submissions: Vec<Submission>,
    outstanding: VecDeque<Submission>,
    cancelled: Vec<Serial>,
    fail_submit: bool,
    calls: HashMap<usize, Vec<DataCall>>,
    capability: PhoneCapability,
    auto: Option<AutoRespond>,
}

/// Mock transport for testing
#[derive(Clone)]
pub struct MockRadioTransport {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockRadioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRadioTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                next_serial: 0,
                next_cid: 1,
                submissions: Vec::new(),
                outstanding: VecDeque::new(),
                cancelled: Vec::new(),
                fail_submit: false,
                calls: HashMap::new(),
                capability: PhoneCapability {
                    max_active_data: 1,
                    max_active_internet_data: 1,
                    logical_modems: vec![0, 1],
                },
                auto: None,
            })),
        }
    }

    /// Answer every submission with its default response on `tx`
    pub fn with_event_sink(tx: mpsc::UnboundedSender<RadioEvent>, latency: Duration) -> Self {
        let mock = Self::new();
        mock.state.lock().auto = Some(AutoRespond { tx, latency });
        mock
    }

    /// Make every following submit fail synchronously
    pub fn set_fail_submit(&self, fail: bool) {
        self.state.lock().fail_submit = fail;
    }

    pub fn set_capability(&self, capability: PhoneCapability) {
        self.state.lock().capability = capability;
    }

    /// Replace the calls the mock modem reports for a slot
    pub fn set_calls(&self, slot: usize, calls: Vec<DataCall>) {
        self.state.lock().calls.insert(slot, calls);
    }

    pub fn calls(&self, slot: usize) -> Vec<DataCall> {
        self.state
            .lock()
            .calls
            .get(&slot)
            .cloned()
            .unwrap_or_default()
    }

    /// Every submission so far, in order
    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().submissions.clone()
    }

    /// Submissions not yet taken or cancelled
    pub fn outstanding(&self) -> Vec<Submission> {
        self.state.lock().outstanding.iter().cloned().collect()
    }

    /// Take the oldest outstanding submission with the given code
    pub fn take(&self, code: RequestCode) -> Option<Submission> {
        let mut state = self.state.lock();
        let pos = state.outstanding.iter().position(|sub| sub.code() == code)?;
        state.outstanding.remove(pos)
    }

    /// Take the oldest outstanding submission
    pub fn take_next(&self) -> Option<Submission> {
        self.state.lock().outstanding.pop_front()
    }

    pub fn take_all(&self) -> Vec<Submission> {
        self.state.lock().outstanding.drain(..).collect()
    }

    pub fn cancelled(&self) -> Vec<Serial> {
        self.state.lock().cancelled.clone()
    }

    /// Number of submissions so far with the given code
    pub fn count(&self, code: RequestCode) -> usize {
        self.state
            .lock()
            .submissions
            .iter()
            .filter(|sub| sub.code() == code)
            .count()
    }

    /// Successful response for a submission, updating the mock call lists
    pub fn default_response(&self, sub: &Submission) -> RadioResponse {
        let mut state = self.state.lock();
        state.respond(sub)
    }
}

impl MockState {
    fn respond(&mut self, sub: &Submission) -> RadioResponse {
        let slot = match sub.target {
            Target::Slot(slot) => slot,
            Target::Config => 0,
        };
        let code = sub.code();
        let payload = match &sub.request {
            RadioRequest::SetupDataCall(setup) => {
                let cid = self.next_cid;
                self.next_cid += 1;
                let call = mock_call(cid, setup.profile.protocol);
                let calls = self.calls.entry(slot).or_default();
                calls.push(call.clone());
                ResponsePayload::DataCall(call)
            }
            RadioRequest::DeactivateDataCall { cid } => {
                if let Some(calls) = self.calls.get_mut(&slot) {
                    calls.retain(|call| call.cid != *cid);
                }
                ResponsePayload::None
            }
            RadioRequest::GetDataCallList => {
                ResponsePayload::DataCallList(self.calls.get(&slot).cloned().unwrap_or_default())
            }
            RadioRequest::LastDataCallFailCause => {
                ResponsePayload::FailCause(FailCause::RegularDeactivation)
            }
            RadioRequest::GetPhoneCapability => {
                ResponsePayload::PhoneCapability(self.capability.clone())
            }
            RadioRequest::SetDataAllowed { .. } | RadioRequest::SetPreferredDataModem { .. } => {
                ResponsePayload::None
            }
        };
        RadioResponse::ok(code, payload)
    }
}

/// An active call as the mock modem reports it
pub fn mock_call(cid: i32, protocol: Protocol) -> DataCall {
    DataCall {
        cid,
        status: FailCause::None,
        state: CallState::Active,
        protocol,
        retry_time_ms: -1,
        mtu: 1500,
        ifname: format!("rmnet_data{}", cid - 1),
        addresses: vec![format!("10.0.{}.2/30", cid)],
        dnses: vec!["10.0.0.53".to_string()],
        gateways: vec![format!("10.0.{}.1", cid)],
        pcscf: Vec::new(),
    }
}

impl RadioTransport for MockRadioTransport {
    fn submit(&mut self, target: Target, request: RadioRequest) -> Result<Serial, TransportError> {
        let mut state = self.state.lock();
        if state.fail_submit {
            return Err(TransportError::SubmitFailed("mock submit failure".into()));
        }
        state.next_serial += 1;
        let sub = Submission {
            serial: Serial(state.next_serial),
            target,
            request,
        };
        state.submissions.push(sub.clone());

        let auto = state
            .auto
            .as_ref()
            .map(|auto| (auto.tx.clone(), auto.latency));
        match auto {
            Some((tx, latency)) => {
                let response = state.respond(&sub);
                let event = RadioEvent::Response {
                    serial: sub.serial,
                    response,
                };
                if latency.is_zero() {
                    let _ = tx.send(event);
                } else {
                    tokio::spawn(async move {
                        tokio::time::sleep(latency).await;
                        let _ = tx.send(event);
                    });
                }
            }
            None => state.outstanding.push_back(sub.clone()),
        }
        Ok(sub.serial)
    }

    fn cancel(&mut self, serial: Serial) {
        let mut state = self.state.lock();
        state.outstanding.retain(|sub| sub.serial != serial);
        state.cancelled.push(serial);
    }
}

/// Answer outstanding submissions with default responses, oldest first,
/// until none are left. Returns the number of responses delivered.
pub fn drive(manager: &mut DataManager, radio: &MockRadioTransport) -> usize {
    let mut delivered = 0;
    while let Some(sub) = radio.take_next() {
        let response = radio.default_response(&sub);
        manager.handle_response(sub.serial, response);
        delivered += 1;
    }
    delivered
}

// =============================================================================
// Recording collaborators
// =============================================================================

/// Power control that records every call
#[derive(Clone, Default)]
pub struct RecordingPower {
    events: Arc<Mutex<Vec<(PowerTag, bool)>>>,
}

impl RecordingPower {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(tag, on)` pairs in call order
    pub fn events(&self) -> Vec<(PowerTag, bool)> {
        self.events.lock().clone()
    }

    /// Whether `tag` currently holds a reference
    pub fn is_on(&self, tag: PowerTag) -> bool {
        let refs: i32 = self
            .events
            .lock()
            .iter()
            .filter(|(t, _)| *t == tag)
            .map(|(_, on)| if *on { 1 } else { -1 })
            .sum();
        refs > 0
    }
}

impl PowerControl for RecordingPower {
    fn power_on(&mut self, tag: PowerTag) {
        self.events.lock().push((tag, true));
    }

    fn power_off(&mut self, tag: PowerTag) {
        self.events.lock().push((tag, false));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatUpdate {
    pub slot: usize,
    pub mask: RatMask,
    pub urgent: bool,
}

/// RAT setter that records every call
#[derive(Clone, Default)]
pub struct RecordingRatControl {
    updates: Arc<Mutex<Vec<RatUpdate>>>,
}

impl RecordingRatControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<RatUpdate> {
        self.updates.lock().clone()
    }

    /// Last mask set for a slot
    pub fn mask(&self, slot: usize) -> Option<RatMask> {
        self.updates
            .lock()
            .iter()
            .rev()
            .find(|update| update.slot == slot)
            .map(|update| update.mask)
    }
}

impl RatControl for RecordingRatControl {
    fn set_allowed_rat_mask(&mut self, slot: usize, mask: RatMask, urgent: bool) {
        self.updates.lock().push(RatUpdate { slot, mask, urgent });
    }
}
