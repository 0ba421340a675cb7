//! Label algebra (spec §3): a label's value set is a union of sorted
//! disjoint integer ranges, e.g. VLAN 1780-1789 ∪ 1800.
//!
//! Ranges are inclusive `[lo, hi]` and non-negative, per the design note
//! in §9 ("do not attempt to represent negative or unbounded ranges").

use crate::error::NsaError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    label_type: String,
    /// Sorted, disjoint, non-adjacent inclusive ranges.
    ranges: Vec<(u32, u32)>,
}

impl Label {
    /// Build a label from a type name and a set of (possibly overlapping
    /// or unsorted) inclusive ranges; normalizes by sorting and merging
    /// touching/overlapping ranges, mirroring the reference parser's
    /// range-merge behavior.
    pub fn new(label_type: impl Into<String>, ranges: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mut rs: Vec<(u32, u32)> = ranges.into_iter().collect();
        rs.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(rs.len());
        for (lo, hi) in rs {
            if let Some(last) = merged.last_mut() {
                if lo <= last.1.saturating_add(1) {
                    last.1 = last.1.max(hi);
                    continue;
                }
            }
            merged.push((lo, hi));
        }
        Label {
            label_type: label_type.into(),
            ranges: merged,
        }
    }

    pub fn single(label_type: impl Into<String>, value: u32) -> Self {
        Label::new(label_type, [(value, value)])
    }

    pub fn label_type(&self) -> &str {
        &self.label_type
    }

    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.ranges
    }

    /// True iff this label has exactly one value (spec §3: "a
    /// single-valued STP has exactly one label whose range has one
    /// element").
    pub fn is_single_value(&self) -> bool {
        self.ranges.len() == 1 && self.ranges[0].0 == self.ranges[0].1
    }

    pub fn contains(&self, value: u32) -> bool {
        self.ranges
            .iter()
            .any(|(lo, hi)| *lo <= value && value <= *hi)
    }

    /// Ascending iterator over every value covered by this label. Lazy,
    /// per §9's design note.
    pub fn enumerate(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|&(lo, hi)| lo..=hi)
    }

    /// Element-wise intersection. Two labels are compatible only when
    /// their types match; an empty intersection is an error (spec §3).
    pub fn intersect(&self, other: &Label) -> Result<Label, NsaError> {
        if self.label_type != other.label_type {
            return Err(NsaError::Payload(format!(
                "cannot intersect label types {} and {}",
                self.label_type, other.label_type
            )));
        }

        let mut result = Vec::new();
        let mut i = 0usize;
        let mut j = 0usize;
        while i < self.ranges.len() && j < other.ranges.len() {
            let (a_lo, a_hi) = self.ranges[i];
            let (b_lo, b_hi) = other.ranges[j];
            let lo = a_lo.max(b_lo);
            let hi = a_hi.min(b_hi);
            if lo <= hi {
                result.push((lo, hi));
            }
            if a_hi < b_hi {
                i += 1;
            } else {
                j += 1;
            }
        }

        if result.is_empty() {
            return Err(NsaError::ResourceUnavailable(format!(
                "empty intersection for label type {}",
                self.label_type
            )));
        }

        Ok(Label {
            label_type: self.label_type.clone(),
            ranges: result,
        })
    }
}
