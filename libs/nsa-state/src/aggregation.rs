//! Parent/child aggregation rule (spec §3, §4.2): a parent reaches a
//! state only when every child has reached it. The data-plane version of
//! a parent is the maximum of its children; `consistent` is the
//! conjunction of children consistency *and* equal versions.

use crate::dataplane::DataPlaneStatus;

/// Returns `Some(state)` when every child reports the same state
/// (the parent may advance to it), `None` otherwise.
pub fn aggregate_uniform<T: Copy + PartialEq>(children: &[T]) -> Option<T> {
    let first = *children.first()?;
    if children.iter().all(|c| *c == first) {
        Some(first)
    } else {
        None
    }
}

/// Aggregate data-plane status across children per §3's invariant.
pub fn aggregate_dataplane(children: &[DataPlaneStatus]) -> DataPlaneStatus {
    if children.is_empty() {
        return DataPlaneStatus::default();
    }
    let version = children.iter().map(|c| c.version).max().unwrap_or(0);
    let consistent = children
        .iter()
        .all(|c| c.consistent && c.version == version);
    let active = children.iter().all(|c| c.active);
    DataPlaneStatus {
        active,
        version,
        consistent,
    }
}
