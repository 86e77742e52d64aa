//! Property-change notification

use bitflags::bitflags;
use modem_data_core::DataCall;

use crate::calls::CallEvent;

bitflags! {
    /// Properties a handler can subscribe to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DataProperties: u8 {
        const ALLOWED = 0x01;
        const CALLS = 0x02;
    }
}

/// Change notification emitted by the data manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataEvent {
    /// The slot's `is_allowed` predicate flipped
    AllowedChanged { slot: usize, allowed: bool },
    /// The slot's call list changed
    CallsChanged { slot: usize },
    /// A single call was added, changed or disconnected
    Call { slot: usize, event: CallEvent },
}

impl DataEvent {
    pub fn slot(&self) -> usize {
        match self {
            DataEvent::AllowedChanged { slot, .. }
            | DataEvent::CallsChanged { slot }
            | DataEvent::Call { slot, .. } => *slot,
        }
    }

    pub fn property(&self) -> DataProperties {
        match self {
            DataEvent::AllowedChanged { .. } => DataProperties::ALLOWED,
            DataEvent::CallsChanged { .. } | DataEvent::Call { .. } => DataProperties::CALLS,
        }
    }

    pub(crate) fn added(slot: usize, call: DataCall) -> Self {
        DataEvent::Call {
            slot,
            event: CallEvent::Added(call),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

pub type EventHandler = Box<dyn FnMut(&DataEvent) + Send>;

struct Subscription {
    id: HandlerId,
    properties: DataProperties,
    handler: EventHandler,
}

/// Registry of event handlers
#[derive(Default)]
pub(crate) struct EventHub {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

impl EventHub {
    pub fn add(&mut self, properties: DataProperties, handler: EventHandler) -> HandlerId {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        self.subscriptions.push(Subscription {
            id,
            properties,
            handler,
        });
        id
    }

    pub fn remove(&mut self, id: HandlerId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.id != id);
        self.subscriptions.len() != before
    }

    pub fn emit(&mut self, event: &DataEvent) {
        let property = event.property();
        for sub in &mut self.subscriptions {
            if sub.properties.intersects(property) {
                (sub.handler)(event);
            }
        }
    }
}
