//! Reservation Calendar (spec §4.3): a per-resource interval store.
//!
//! The resource key is an opaque identifier produced by the Connection
//! Manager from `(port, label_type, label_value)` — this crate only ever
//! sees the opaque string, never the triple it was derived from.

use chrono::{DateTime, Utc};
use nsa_types::NsaError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type Interval = (DateTime<Utc>, DateTime<Utc>);

fn overlaps(a: Interval, b: Interval) -> bool {
    a.0.max(b.0) < a.1.min(b.1)
}

#[derive(Debug, Default)]
pub struct ReservationCalendar {
    resources: Mutex<HashMap<String, Vec<Interval>>>,
}

impl ReservationCalendar {
    pub fn new() -> Self {
        ReservationCalendar::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Succeeds iff no existing interval on this resource overlaps
    /// `[start, end)`. Intervals are half-open; two reservations sharing
    /// an instant are legal (spec §4.3).
    pub fn check(&self, resource: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let resources = self.resources.lock();
        match resources.get(resource) {
            Some(intervals) => !intervals.iter().any(|&existing| overlaps(existing, (start, end))),
            None => true,
        }
    }

    pub fn add(&self, resource: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), NsaError> {
        let mut resources = self.resources.lock();
        let intervals = resources.entry(resource.to_string()).or_default();
        if intervals.iter().any(|&existing| overlaps(existing, (start, end))) {
            return Err(NsaError::ResourceUnavailable(format!(
                "resource {resource} already booked for an overlapping interval"
            )));
        }
        intervals.push((start, end));
        Ok(())
    }

    /// No-op if the interval is absent (spec §4.3).
    pub fn remove(&self, resource: &str, start: DateTime<Utc>, end: DateTime<Utc>) {
        let mut resources = self.resources.lock();
        if let Some(intervals) = resources.get_mut(resource) {
            intervals.retain(|&iv| iv != (start, end));
            if intervals.is_empty() {
                resources.remove(resource);
            }
        }
    }

    /// True iff the resource has no booked intervals remaining; used by
    /// tests to assert full cleanup after a terminate.
    pub fn is_empty_for(&self, resource: &str) -> bool {
        self.resources
            .lock()
            .get(resource)
            .map(|intervals| intervals.is_empty())
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t(offset_secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + offset_secs, 0).unwrap()
    }

    #[test]
    fn add_then_check_conflicts() {
        let cal = ReservationCalendar::new();
        cal.add("r1", t(0), t(10)).unwrap();
        assert!(!cal.check("r1", t(5), t(15)));
        assert!(cal.check("r1", t(10), t(20)), "touching boundary is legal (half-open)");
    }

    #[test]
    fn add_rejects_overlap() {
        let cal = ReservationCalendar::new();
        cal.add("r1", t(0), t(10)).unwrap();
        assert!(cal.add("r1", t(5), t(15)).is_err());
    }

    #[test]
    fn consecutive_reservations_both_succeed() {
        let cal = ReservationCalendar::new();
        cal.add("r1", t(0), t(10)).unwrap();
        cal.add("r1", t(10), t(20)).unwrap();
        assert!(cal.is_empty_for("r2"));
    }

    #[test]
    fn remove_is_noop_when_absent() {
        let cal = ReservationCalendar::new();
        cal.remove("nope", t(0), t(10));
    }

    #[test]
    fn remove_clears_the_booking() {
        let cal = ReservationCalendar::new();
        cal.add("r1", t(0), t(10)).unwrap();
        cal.remove("r1", t(0), t(10));
        assert!(cal.is_empty_for("r1"));
        assert!(cal.check("r1", t(0), t(10)));
    }

    proptest::proptest! {
        #[test]
        fn overlap_check_matches_definition(a_start in 0i64..100, a_len in 1i64..50, b_start in 0i64..100, b_len in 1i64..50) {
            let a = (t(a_start), t(a_start + a_len));
            let b = (t(b_start), t(b_start + b_len));
            let expected = a.0.max(b.0) < a.1.min(b.1);
            assert_eq!(overlaps(a, b), expected);
        }
    }
}
