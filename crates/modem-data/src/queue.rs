//! Per-slot request queue
//!
//! A FIFO of requests plus the single request in flight. The queue is a pure
//! container; submission and completion are driven by the manager, which owns
//! the transport.

use std::collections::VecDeque;

use crate::request::{DataRequest, RequestFlags, RequestId};

#[derive(Debug, Default)]
pub(crate) struct RequestQueue {
    queue: VecDeque<DataRequest>,
    pending: Option<DataRequest>,
}

impl RequestQueue {
    pub fn push(&mut self, req: DataRequest) {
        self.queue.push_back(req);
    }

    pub fn pop_front(&mut self) -> Option<DataRequest> {
        self.queue.pop_front()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Nothing queued and nothing in flight
    pub fn is_idle(&self) -> bool {
        self.pending.is_none() && self.queue.is_empty()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn pending(&self) -> Option<&DataRequest> {
        self.pending.as_ref()
    }

    pub fn set_pending(&mut self, req: DataRequest) {
        debug_assert!(self.pending.is_none());
        self.pending = Some(req);
    }

    /// Take the pending request if it has the given id
    pub fn take_pending(&mut self, id: RequestId) -> Option<DataRequest> {
        match &self.pending {
            Some(req) if req.id == id => self.pending.take(),
            _ => None,
        }
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.iter().any(|req| req.id == id)
    }

    /// Remove a request wherever it sits. The flag tells whether it was the
    /// pending one.
    pub fn remove(&mut self, id: RequestId) -> Option<(DataRequest, bool)> {
        if let Some(req) = self.take_pending(id) {
            return Some((req, true));
        }
        let pos = self.queue.iter().position(|req| req.id == id)?;
        self.queue.remove(pos).map(|req| (req, false))
    }

    /// Remove every request carrying `flag`, pending one first
    pub fn drain_flagged(&mut self, flag: RequestFlags) -> Vec<DataRequest> {
        let mut removed = Vec::new();
        if self
            .pending
            .as_ref()
            .is_some_and(|req| req.flags.contains(flag))
        {
            removed.extend(self.pending.take());
        }
        let (drained, kept): (VecDeque<_>, VecDeque<_>) = self
            .queue
            .drain(..)
            .partition(|req| req.flags.contains(flag));
        self.queue = kept;
        removed.extend(drained);
        removed
    }

    /// Remove everything, pending request first
    pub fn drain_all(&mut self) -> Vec<DataRequest> {
        let mut removed: Vec<DataRequest> = self.pending.take().into_iter().collect();
        removed.extend(self.queue.drain(..));
        removed
    }

    /// Whether a deactivation of `cid` is queued or in flight
    pub fn is_releasing(&self, cid: i32) -> bool {
        self.iter().any(|req| req.deactivates() == Some(cid))
    }

    /// Pending request first, then the queue in order
    pub fn iter(&self) -> impl Iterator<Item = &DataRequest> {
        self.pending.iter().chain(self.queue.iter())
    }
}
