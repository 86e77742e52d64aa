//! Call list reconciliation
//!
//! Call lists are kept sorted by cid, so the old and new lists are compared
//! with a single merge walk.

use std::cmp::Ordering;

use modem_data_core::{DataCall, FailCause};

/// Why a call went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HangupReason {
    /// Torn down from this side
    Local,
    /// Dropped by the network with the given cause
    Remote(FailCause),
    /// The cause could not be determined
    Unknown,
}

/// Change to a single call of a slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Added(DataCall),
    Changed(DataCall),
    Disconnected { cid: i32, reason: HangupReason },
}

/// Difference between two call lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CallDiff {
    Added(DataCall),
    Changed(DataCall),
    /// The last snapshot of a call missing from the new list
    Removed(DataCall),
}

/// Merge-walk two cid-sorted lists
pub(crate) fn diff_calls(old: &[DataCall], new: &[DataCall]) -> Vec<CallDiff> {
    let mut diffs = Vec::new();
    let mut old_iter = old.iter().peekable();
    let mut new_iter = new.iter().peekable();

    loop {
        match (old_iter.peek(), new_iter.peek()) {
            (Some(o), Some(n)) => match o.cid.cmp(&n.cid) {
                Ordering::Less => {
                    diffs.push(CallDiff::Removed((*o).clone()));
                    old_iter.next();
                }
                Ordering::Greater => {
                    diffs.push(CallDiff::Added((*n).clone()));
                    new_iter.next();
                }
                Ordering::Equal => {
                    if o != n {
                        diffs.push(CallDiff::Changed((*n).clone()));
                    }
                    old_iter.next();
                    new_iter.next();
                }
            },
            (Some(o), None) => {
                diffs.push(CallDiff::Removed((*o).clone()));
                old_iter.next();
            }
            (None, Some(n)) => {
                diffs.push(CallDiff::Added((*n).clone()));
                new_iter.next();
            }
            (None, None) => break,
        }
    }
    diffs
}

/// Classify the fail cause of a vanished call
pub(crate) fn classify(cause: FailCause, local_causes: &[FailCause]) -> HangupReason {
    if local_causes.contains(&cause) {
        HangupReason::Local
    } else {
        HangupReason::Remote(cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modem_data_core::CallState;
    use pretty_assertions::assert_eq;

    fn call(cid: i32) -> DataCall {
        DataCall {
            cid,
            state: CallState::Active,
            ifname: format!("rmnet{}", cid),
            ..Default::default()
        }
    }

    #[test]
    fn test_diff_added_removed_changed() {
        let old = vec![call(1), call(2), call(4)];
        let mut changed = call(2);
        changed.mtu = 1400;
        let new = vec![changed.clone(), call(3), call(4)];

        assert_eq!(
            diff_calls(&old, &new),
            vec![
                CallDiff::Removed(call(1)),
                CallDiff::Changed(changed),
                CallDiff::Added(call(3)),
            ]
        );
    }

    #[test]
    fn test_diff_identical_lists() {
        let calls = vec![call(1), call(2)];
        assert!(diff_calls(&calls, &calls).is_empty());
    }

    #[test]
    fn test_diff_against_empty() {
        assert_eq!(
            diff_calls(&[], &[call(5)]),
            vec![CallDiff::Added(call(5))]
        );
        assert_eq!(
            diff_calls(&[call(5), call(6)], &[]),
            vec![CallDiff::Removed(call(5)), CallDiff::Removed(call(6))]
        );
    }

    #[test]
    fn test_classify() {
        let local = [FailCause::RegularDeactivation];
        assert_eq!(
            classify(FailCause::RegularDeactivation, &local),
            HangupReason::Local
        );
        assert_eq!(
            classify(FailCause::NetworkFailure, &local),
            HangupReason::Remote(FailCause::NetworkFailure)
        );
    }
}
