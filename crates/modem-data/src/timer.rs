//! Deadline-ordered timers for retries
//!
//! The manager never sleeps. It exposes the earliest deadline through
//! `poll_timeout` and is told when time has passed through `handle_timeout`.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::request::RequestId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TimerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerEvent {
    /// Resubmit the pending request of a slot
    Retry { slot: usize, id: RequestId },
    /// Query the phone capability again
    Capability,
    /// End the arbitration hold-off after a failed switch-on
    Rearbitrate,
}

#[derive(Debug, Default)]
pub(crate) struct Timers {
    next_id: u64,
    entries: BTreeMap<(Instant, u64), TimerEvent>,
    deadlines: HashMap<u64, Instant>,
}

impl Timers {
    pub fn schedule(&mut self, at: Instant, event: TimerEvent) -> TimerId {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.insert((at, id), event);
        self.deadlines.insert(id, at);
        TimerId(id)
    }

    pub fn cancel(&mut self, timer: TimerId) {
        if let Some(at) = self.deadlines.remove(&timer.0) {
            self.entries.remove(&(at, timer.0));
        }
    }

    /// Drop every timer matching the predicate
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&TimerEvent) -> bool) {
        let doomed: Vec<(Instant, u64)> = self
            .entries
            .iter()
            .filter(|(_, event)| pred(event))
            .map(|(key, _)| *key)
            .collect();
        for key in doomed {
            self.entries.remove(&key);
            self.deadlines.remove(&key.1);
        }
    }

    pub fn contains(&self, event: &TimerEvent) -> bool {
        self.entries.values().any(|e| e == event)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(at, _)| *at)
    }

    /// Remove and return the events due at `now`, earliest first
    pub fn expire(&mut self, now: Instant) -> Vec<TimerEvent> {
        let mut due = Vec::new();
        while let Some(entry) = self.entries.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ((_, id), event) = entry.remove_entry();
            self.deadlines.remove(&id);
            due.push(event);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_expire_in_deadline_order() {
        let mut timers = Timers::default();
        let now = Instant::now();

        timers.schedule(now + Duration::from_millis(20), TimerEvent::Capability);
        timers.schedule(
            now + Duration::from_millis(10),
            TimerEvent::Retry {
                slot: 0,
                id: RequestId(1),
            },
        );
        assert_eq!(timers.next_deadline(), Some(now + Duration::from_millis(10)));

        assert!(timers.expire(now).is_empty());

        let due = timers.expire(now + Duration::from_millis(30));
        assert_eq!(
            due,
            vec![
                TimerEvent::Retry {
                    slot: 0,
                    id: RequestId(1)
                },
                TimerEvent::Capability
            ]
        );
        assert!(timers.next_deadline().is_none());
    }

    #[test]
    fn test_cancel() {
        let mut timers = Timers::default();
        let now = Instant::now();

        let a = timers.schedule(now, TimerEvent::Capability);
        timers.schedule(now, TimerEvent::Rearbitrate);
        timers.cancel(a);
        timers.cancel(a);

        assert!(!timers.contains(&TimerEvent::Capability));
        assert_eq!(timers.expire(now), vec![TimerEvent::Rearbitrate]);
    }

    #[test]
    fn test_cancel_where() {
        let mut timers = Timers::default();
        let now = Instant::now();

        for slot in 0..3 {
            timers.schedule(
                now,
                TimerEvent::Retry {
                    slot,
                    id: RequestId(slot as u64),
                },
            );
        }
        timers.cancel_where(|event| matches!(event, TimerEvent::Retry { slot: 1, .. }));
        assert_eq!(timers.expire(now).len(), 2);
    }
}
