//! Allow/disallow transitions, data switch-on and RAT handover

use std::time::Instant;

use modem_data_core::{AccessMode, DataRole, RadioConfigInterface, RadioRequest, Target};
use tracing::{debug, info, warn};

use super::{DataManager, Inflight};
use crate::error::{DataError, DataResult};
use crate::object::DataFlags;
use crate::request::{RequestFlags, RequestKind};
use crate::timer::TimerEvent;

impl DataManager {
    /// Ask for data on a slot for the given role
    pub fn allow(&mut self, slot: usize, role: DataRole) -> DataResult<()> {
        let flags = self
            .slot(slot)
            .map(|obj| obj.flags)
            .ok_or(DataError::NoSuchSlot(slot))?;

        if role == DataRole::None {
            if flags.contains(DataFlags::ALLOWED) {
                self.disallow(slot);
            }
            self.sync_allowed();
            return Ok(());
        }

        let mut speed_changed = false;
        if role == DataRole::Internet && !flags.contains(DataFlags::MAX_SPEED) {
            for obj in &mut self.objects {
                obj.flags.remove(DataFlags::MAX_SPEED);
            }
            if let Some(obj) = self.object_mut(slot) {
                obj.flags.insert(DataFlags::MAX_SPEED);
            }
            info!(slot, "Max speed granted");
            speed_changed = true;
        }

        if flags.contains(DataFlags::ALLOWED) {
            if speed_changed {
                self.check_network_mode();
            }
        } else {
            let others: Vec<usize> = self
                .objects
                .iter()
                .filter(|obj| obj.slot() != slot && obj.flags.contains(DataFlags::ALLOWED))
                .map(|obj| obj.slot())
                .collect();
            for other in others {
                self.disallow(other);
            }

            if let Some(obj) = self.object_mut(slot) {
                obj.flags.insert(DataFlags::ALLOWED);
                obj.flags.remove(DataFlags::ON);
            }
            info!(slot, ?role, "Data allowed");

            self.cancel_requests(slot, RequestFlags::CANCEL_WHEN_ALLOWED);
            if speed_changed {
                self.check_network_mode();
            }
            self.check_data();
        }

        self.update_power(slot);
        self.sync_allowed();
        Ok(())
    }

    /// Take data permission away from a slot
    pub(super) fn disallow(&mut self, slot: usize) {
        let Some(obj) = self.object_mut(slot) else {
            return;
        };
        obj.flags.remove(DataFlags::ALLOWED);
        info!(slot, "Data disallowed");

        self.cancel_requests(slot, RequestFlags::CANCEL_WHEN_DISALLOWED);
        self.deactivate_all(slot);

        // The modem may already have seen a switch-on
        match self.switch_request(false) {
            Some(kind) => {
                if let Err(err) = self.enqueue(slot, kind) {
                    warn!(slot, %err, "Failed to queue data switch-off");
                }
            }
            None => {
                if let Some(obj) = self.object_mut(slot) {
                    if obj.flags.contains(DataFlags::ON) {
                        obj.flags.remove(DataFlags::ON);
                        info!(slot, "Data off");
                    }
                }
            }
        }

        self.update_power(slot);
        self.check_data();
    }

    /// Switch the allowed slot on once every queue has drained
    pub(super) fn check_data(&mut self) {
        if self.checking_data || self.holdoff {
            return;
        }
        if self.objects.iter().any(|obj| obj.is_busy()) {
            return;
        }
        let Some(obj) = self
            .objects
            .iter()
            .find(|obj| obj.flags.contains(DataFlags::ALLOWED))
        else {
            return;
        };
        if obj.flags.contains(DataFlags::ON) {
            return;
        }

        let slot = obj.slot();
        self.checking_data = true;
        self.switch_on(slot);
        self.checking_data = false;
    }

    fn switch_on(&mut self, slot: usize) {
        if self.handover_active() {
            if let Some(obj) = self.object_mut(slot) {
                let mask = obj.own_mask();
                if obj.applied_rat != Some(mask) {
                    obj.applied_rat = Some(mask);
                    debug!(slot, ?mask, "Lifting RAT restriction for data slot");
                    self.rat.set_allowed_rat_mask(slot, mask, true);
                }
            }
        }

        info!(slot, "Switching data on");
        match self.switch_request(true) {
            Some(kind) => {
                if let Err(err) = self.enqueue(slot, kind) {
                    warn!(slot, %err, "Failed to queue data switch-on");
                }
            }
            None => {
                if let Some(obj) = self.object_mut(slot) {
                    obj.flags.insert(DataFlags::ON);
                }
                info!(slot, "Data on");
            }
        }
    }

    /// Hardware request that turns data on or off for the current tier
    fn switch_request(&self, on: bool) -> Option<RequestKind> {
        if self.preferred_modem_tier() {
            on.then_some(RequestKind::SetPreferredModem)
        } else if self.config.set_data_allowed {
            Some(RequestKind::AllowData { allow: on })
        } else {
            None
        }
    }

    pub(super) fn preferred_modem_tier(&self) -> bool {
        self.radio_config
            .is_some_and(|iface| iface.supports_preferred_data_modem())
    }

    /// Stop switching data on for a while after the hardware refused it
    pub(super) fn hold_off_arbitration(&mut self) {
        if !self.holdoff {
            self.holdoff = true;
            let at = Instant::now() + self.config.transient_retry_delay();
            self.timers.schedule(at, TimerEvent::Rearbitrate);
            debug!("Data switch-on held off");
        }
    }

    // =========================================================================
    // Handover
    // =========================================================================

    /// Handover needs the feature enabled and more than one SIM present
    pub(super) fn handover_active(&self) -> bool {
        self.config.handover && self.objects.iter().filter(|obj| obj.imsi.is_some()).count() > 1
    }

    /// Slot that keeps the fast access technologies during handover
    fn preferred_data_slot(&self) -> Option<usize> {
        let mut best: Option<(usize, AccessMode)> = None;
        for obj in &self.objects {
            if obj.flags.contains(DataFlags::MAX_SPEED)
                && obj.pref_mode.highest().is_some_and(|mode| mode > AccessMode::Gsm)
            {
                return Some(obj.slot());
            }
            if let Some(mode) = obj.max_supported_mode() {
                if best.map_or(true, |(_, best_mode)| mode > best_mode) {
                    best = Some((obj.slot(), mode));
                }
            }
        }
        best.map(|(slot, _)| slot)
    }

    /// Push each slot's allowed RAT mask to the RAT setter
    pub(super) fn check_network_mode(&mut self) {
        let handover = self.handover_active();
        let data_slot = if handover {
            self.preferred_data_slot()
        } else {
            None
        };
        let ceiling = self.config.non_data_mode.and_below();

        for obj in &mut self.objects {
            let mut mask = obj.own_mask();
            if handover && data_slot != Some(obj.slot()) {
                mask = mask.restrict(ceiling);
            }
            if obj.applied_rat != Some(mask) {
                debug!(slot = obj.slot(), ?mask, "Allowed RAT mask");
                obj.applied_rat = Some(mask);
                self.rat.set_allowed_rat_mask(obj.slot(), mask, false);
            }
        }
    }

    // =========================================================================
    // Capability tier
    // =========================================================================

    /// Set the configuration interface version, `None` when it is gone
    pub fn set_radio_config(&mut self, iface: Option<RadioConfigInterface>) {
        let was_preferred = self.preferred_modem_tier();
        self.radio_config = iface;
        let preferred = self.preferred_modem_tier();

        if was_preferred != preferred {
            info!(?iface, preferred_data_modem = preferred, "Capability tier changed");
            for obj in &mut self.objects {
                obj.flags.remove(DataFlags::ON);
            }
            self.check_data();
        }
        if !preferred {
            self.capability = None;
        }
        self.query_capability();
        self.sync_allowed();
    }

    /// Ask for the phone capability unless it is known or being fetched
    pub(super) fn query_capability(&mut self) {
        if !self.preferred_modem_tier()
            || self.capability.is_some()
            || self.inflight.values().any(|f| *f == Inflight::Capability)
            || self.timers.contains(&TimerEvent::Capability)
        {
            return;
        }
        match self
            .transport
            .submit(Target::Config, RadioRequest::GetPhoneCapability)
        {
            Ok(serial) => {
                self.inflight.insert(serial, Inflight::Capability);
            }
            Err(err) => {
                warn!(%err, "Phone capability query failed");
                self.schedule_capability_retry();
            }
        }
    }

    pub(super) fn schedule_capability_retry(&mut self) {
        let at = Instant::now() + self.config.capability_retry_delay();
        self.timers.schedule(at, TimerEvent::Capability);
    }
}
