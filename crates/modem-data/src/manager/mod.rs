//! Data manager
//!
//! Owns every slot's [`DataObject`] and arbitrates which one may carry mobile
//! data. All entry points take `&mut self` and run to completion; hardware
//! completions come back through [`DataManager::handle_response`], unsolicited
//! updates through [`DataManager::handle_indication`] and timer expiry
//! through [`DataManager::handle_timeout`].

mod arbitration;
mod calls;
mod dispatch;

use std::collections::HashMap;
use std::time::Instant;

use modem_data_core::{
    NetworkState, PhoneCapability, PowerControl, RadioConfigInterface, RadioRequest,
    RadioTransport, RatControl, RatMask, Serial, Target,
};
use tracing::{info, warn};

use crate::config::{DataConfig, SlotConfig};
use crate::error::{DataError, DataResult};
use crate::notify::{DataEvent, DataProperties, EventHandler, EventHub, HandlerId};
use crate::object::DataObject;
use crate::power::PowerRefs;
use crate::request::RequestId;
use crate::timer::{TimerEvent, Timers};

/// What an outstanding serial belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inflight {
    /// The pending request of a slot's queue
    Request { slot: usize, id: RequestId },
    /// Call list query, at attach or after a failed deactivation
    CallList { slot: usize },
    /// Fail cause query for a call that vanished
    FailCause { slot: usize, cid: i32 },
    Capability,
}

impl Inflight {
    fn slot(&self) -> Option<usize> {
        match self {
            Inflight::Request { slot, .. }
            | Inflight::CallList { slot }
            | Inflight::FailCause { slot, .. } => Some(*slot),
            Inflight::Capability => None,
        }
    }
}

pub struct DataManager {
    config: DataConfig,
    transport: Box<dyn RadioTransport>,
    rat: Box<dyn RatControl>,
    power: PowerRefs,
    /// Sorted by slot
    objects: Vec<DataObject>,
    radio_config: Option<RadioConfigInterface>,
    capability: Option<PhoneCapability>,
    inflight: HashMap<Serial, Inflight>,
    timers: Timers,
    events: EventHub,
    next_request_id: u64,
    /// Set while `check_data` runs, it must not nest
    checking_data: bool,
    /// Switch-on is held off after the hardware refused it
    holdoff: bool,
}

impl DataManager {
    pub fn new(
        config: DataConfig,
        transport: Box<dyn RadioTransport>,
        power: Box<dyn PowerControl>,
        rat: Box<dyn RatControl>,
    ) -> Self {
        Self {
            config,
            transport,
            rat,
            power: PowerRefs::new(power),
            objects: Vec::new(),
            radio_config: None,
            capability: None,
            inflight: HashMap::new(),
            timers: Timers::default(),
            events: EventHub::default(),
            next_request_id: 0,
            checking_data: false,
            holdoff: false,
        }
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    pub fn radio_config(&self) -> Option<RadioConfigInterface> {
        self.radio_config
    }

    pub fn capability(&self) -> Option<&PhoneCapability> {
        self.capability.as_ref()
    }

    pub fn slots(&self) -> &[DataObject] {
        &self.objects
    }

    pub fn slot(&self, slot: usize) -> Option<&DataObject> {
        self.index(slot).map(|i| &self.objects[i])
    }

    pub fn is_allowed(&self, slot: usize) -> bool {
        self.slot(slot).is_some_and(DataObject::is_allowed)
    }

    // =========================================================================
    // Slot lifecycle
    // =========================================================================

    /// Create the data object of a slot and start its initialization
    pub fn attach_slot(&mut self, slot_config: &SlotConfig) -> DataResult<()> {
        let slot = slot_config.slot;
        let pos = match self.objects.binary_search_by_key(&slot, DataObject::slot) {
            Ok(_) => return Err(DataError::SlotExists(slot)),
            Err(pos) => pos,
        };

        let mut obj = DataObject::new(slot, slot_config.rat_mask());
        match self
            .transport
            .submit(Target::Slot(slot), RadioRequest::GetDataCallList)
        {
            Ok(serial) => {
                obj.init = Some(serial);
                self.inflight.insert(serial, Inflight::CallList { slot });
            }
            Err(err) => {
                warn!(slot, %err, "Initial call list query failed");
            }
        }
        self.objects.insert(pos, obj);
        info!(slot, techs = ?slot_config.rat_mask(), "Data slot attached");

        self.query_capability();
        self.check_network_mode();
        self.sync_allowed();
        Ok(())
    }

    /// Destroy the data object of a slot, cancelling everything it had queued
    pub fn detach_slot(&mut self, slot: usize) -> DataResult<()> {
        let idx = self.index(slot).ok_or(DataError::NoSuchSlot(slot))?;
        let mut obj = self.objects.remove(idx);

        for req in obj.queue.drain_all() {
            self.drop_request(req);
        }
        let serials: Vec<Serial> = self
            .inflight
            .iter()
            .filter(|(_, owner)| owner.slot() == Some(slot))
            .map(|(serial, _)| *serial)
            .collect();
        for serial in serials {
            self.inflight.remove(&serial);
            self.transport.cancel(serial);
        }
        self.timers
            .cancel_where(|ev| matches!(ev, TimerEvent::Retry { slot: s, .. } if *s == slot));
        self.power.set(obj.power_tag(), false);

        if obj.reported_allowed {
            self.events.emit(&DataEvent::AllowedChanged {
                slot,
                allowed: false,
            });
        }
        info!(slot, "Data slot detached");

        self.check_network_mode();
        self.check_data();
        self.sync_allowed();
        Ok(())
    }

    // =========================================================================
    // Settings and network state
    // =========================================================================

    pub fn on_network_changed(&mut self, slot: usize, state: NetworkState) {
        if let Some(obj) = self.object_mut(slot) {
            obj.network = state;
        }
    }

    pub fn on_imsi_changed(&mut self, slot: usize, imsi: Option<String>) {
        let Some(obj) = self.object_mut(slot) else {
            return;
        };
        if obj.imsi != imsi {
            obj.imsi = imsi;
            self.check_network_mode();
            self.check_data();
            self.sync_allowed();
        }
    }

    pub fn on_pref_mode_changed(&mut self, slot: usize, mask: RatMask) {
        let Some(obj) = self.object_mut(slot) else {
            return;
        };
        if obj.pref_mode != mask {
            obj.pref_mode = mask;
            self.check_network_mode();
        }
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    pub fn add_handler(&mut self, properties: DataProperties, handler: EventHandler) -> HandlerId {
        self.events.add(properties, handler)
    }

    pub fn remove_handler(&mut self, id: HandlerId) -> bool {
        self.events.remove(id)
    }

    fn emit(&mut self, event: DataEvent) {
        self.events.emit(&event);
    }

    /// Report every slot whose `is_allowed` flipped since the last report
    fn sync_allowed(&mut self) {
        let mut changed = Vec::new();
        for obj in &mut self.objects {
            let allowed = obj.is_allowed();
            if allowed != obj.reported_allowed {
                obj.reported_allowed = allowed;
                changed.push(DataEvent::AllowedChanged {
                    slot: obj.slot(),
                    allowed,
                });
            }
        }
        for event in changed {
            self.emit(event);
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn index(&self, slot: usize) -> Option<usize> {
        self.objects
            .binary_search_by_key(&slot, DataObject::slot)
            .ok()
    }

    fn object_mut(&mut self, slot: usize) -> Option<&mut DataObject> {
        let i = self.index(slot)?;
        Some(&mut self.objects[i])
    }

    fn require(&self, slot: usize) -> DataResult<()> {
        self.index(slot)
            .map(|_| ())
            .ok_or(DataError::NoSuchSlot(slot))
    }

    fn next_id(&mut self) -> RequestId {
        self.next_request_id += 1;
        RequestId(self.next_request_id)
    }

    fn update_power(&mut self, slot: usize) {
        if let Some(obj) = self.slot(slot) {
            let tag = obj.power_tag();
            let busy = !obj.queue.is_idle();
            self.power.set(tag, busy);
        }
    }
}
