//! Radio power references held on behalf of busy slots

use std::collections::HashSet;

use modem_data_core::{PowerControl, PowerTag};
use tracing::debug;

/// Keeps at most one power reference per tag
pub(crate) struct PowerRefs {
    control: Box<dyn PowerControl>,
    held: HashSet<PowerTag>,
}

impl PowerRefs {
    pub fn new(control: Box<dyn PowerControl>) -> Self {
        Self {
            control,
            held: HashSet::new(),
        }
    }

    /// Take or drop the reference for `tag`, only acting on a change
    pub fn set(&mut self, tag: PowerTag, on: bool) {
        if on {
            if self.held.insert(tag) {
                debug!(?tag, "power on");
                self.control.power_on(tag);
            }
        } else if self.held.remove(&tag) {
            debug!(?tag, "power off");
            self.control.power_off(tag);
        }
    }

    pub fn is_held(&self, tag: PowerTag) -> bool {
        self.held.contains(&tag)
    }
}
