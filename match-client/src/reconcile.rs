//! The one place where incoming snapshots meet the snapshot we hold.
//!
//! Both the poll path and the dispatch path funnel through [`reduce`], so the
//! version-ordering invariant lives in a single pure function: adopt the
//! incoming snapshot iff it is strictly newer than the current one (or there
//! is no current one). This makes reconciliation commutative with respect to
//! out-of-order arrivals from overlapping requests.

use protocol::MatchSnapshot;

/// Decides which snapshot to keep. Returns the kept snapshot and whether the
/// incoming one was adopted. A stale incoming snapshot is not an error; it is
/// the expected outcome of overlapping requests and gets dropped silently.
pub fn reduce(
    current: Option<MatchSnapshot>,
    incoming: MatchSnapshot,
) -> (MatchSnapshot, bool) {
    match current {
        None => (incoming, true),
        Some(current) if incoming.version > current.version => (incoming, true),
        Some(current) => {
            tracing::debug!(
                held = current.version,
                incoming = incoming.version,
                "dropping stale snapshot"
            );
            (current, false)
        }
    }
}
