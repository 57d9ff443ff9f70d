//! Summary statistics over scan records
//!
//! Records are grouped by a partition key (subscription id or resource
//! scope) and counted per plan label. The `other` bucket is computed by
//! subtraction from the total, so any label outside P1/P2/Free lands there,
//! including labels the pricing API may introduce later.

use clap::ValueEnum;
use std::collections::BTreeMap;

use crate::core::ScanRecord;
use crate::plan::PlanLabel;

/// Plan counts for one partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanCounts {
    pub p1: usize,
    pub p2: usize,
    pub free: usize,
    /// Reported separately by the Standard-aware summary; also part of `other`
    pub standard: usize,
    /// `total - (p1 + p2 + free)`
    pub other: usize,
    pub total: usize,
}

impl PlanCounts {
    /// Counts the labels of a set of records
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ScanRecord>) -> Self {
        let mut counts = PlanCounts::default();
        for record in records {
            counts.total += 1;
            match record.plan {
                PlanLabel::P1 => counts.p1 += 1,
                PlanLabel::P2 => counts.p2 += 1,
                PlanLabel::Free => counts.free += 1,
                PlanLabel::Standard => counts.standard += 1,
                _ => {}
            }
        }
        counts.other = counts.total - (counts.p1 + counts.p2 + counts.free);
        counts
    }
}

/// Grouping dimension for summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum GroupBy {
    #[default]
    Subscription,
    Scope,
}

impl GroupBy {
    /// Returns the partition key function for this grouping
    pub fn key(&self) -> fn(&ScanRecord) -> String {
        match self {
            GroupBy::Subscription => by_subscription,
            GroupBy::Scope => by_scope,
        }
    }

    pub fn heading(&self) -> &'static str {
        match self {
            GroupBy::Subscription => "Subscription",
            GroupBy::Scope => "Scope",
        }
    }
}

pub fn by_subscription(record: &ScanRecord) -> String {
    record.subscription_id.clone()
}

pub fn by_scope(record: &ScanRecord) -> String {
    record.scope.to_string()
}

/// Counts for the whole record set
pub fn overall(records: &[ScanRecord]) -> PlanCounts {
    PlanCounts::from_records(records)
}

/// Groups records by `partition_key` and counts plans per group
///
/// # Examples
///
/// ```
/// use tierscout::aggregate::{aggregate, by_subscription};
///
/// let counts = aggregate(&[], by_subscription);
/// assert!(counts.is_empty());
/// ```
pub fn aggregate<F>(records: &[ScanRecord], partition_key: F) -> BTreeMap<String, PlanCounts>
where
    F: Fn(&ScanRecord) -> String,
{
    let mut groups: BTreeMap<String, Vec<&ScanRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(partition_key(record)).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(key, group)| (key, PlanCounts::from_records(group)))
        .collect()
}

/// Exact per-label counts for each partition
///
/// Unlike [`aggregate`], every distinct label gets its own entry, so
/// unexpected labels stay visible instead of folding into `other`.
pub fn label_histogram<F>(
    records: &[ScanRecord],
    partition_key: F,
) -> BTreeMap<String, BTreeMap<String, usize>>
where
    F: Fn(&ScanRecord) -> String,
{
    let mut histogram: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for record in records {
        *histogram
            .entry(partition_key(record))
            .or_default()
            .entry(record.plan.to_string())
            .or_default() += 1;
    }
    histogram
}
