//! Priority-tiered merge of listing result sets.
//!
//! Each tier query returns its own batch; the merge produces one
//! deduplicated sequence ordered by tier rank, stable within a tier, and
//! truncated to the grid size. When the same listing appears in several
//! tiers the numerically lowest tier wins and is never downgraded.

use std::collections::HashMap;

use crate::models::{ListingRecord, ListingTier};

/// One tier's query result, in the order the store returned it.
#[derive(Debug, Clone)]
pub struct TierBatch {
    pub tier: ListingTier,
    pub records: Vec<ListingRecord>,
}

impl TierBatch {
    pub fn new(tier: ListingTier, records: Vec<ListingRecord>) -> Self {
        Self { tier, records }
    }
}

/// Merge tiered batches into the ranked feed.
///
/// `fallback` is consulted only when every tier came back empty; an empty
/// result after that is not an error (the caller renders an empty state).
/// Output is deterministic for identical inputs: ordering never depends on
/// map iteration order.
pub fn merge(
    batches: &[TierBatch],
    fallback: &[ListingRecord],
    max_results: usize,
) -> Vec<ListingRecord> {
    // id -> (tier rank, within-tier position, record)
    let mut best: HashMap<&str, (u8, usize, &ListingRecord)> = HashMap::new();

    for batch in batches {
        let rank = batch.tier.rank();
        for (pos, record) in batch.records.iter().enumerate() {
            match best.get(record.id.as_str()) {
                // First sighting, or a strictly better tier: take it.
                // Equal rank keeps the earlier record (stable).
                Some(&(existing_rank, _, _)) if existing_rank <= rank => {}
                _ => {
                    best.insert(record.id.as_str(), (rank, pos, record));
                }
            }
        }
    }

    if best.is_empty() {
        return dedup_in_order(fallback, max_results);
    }

    let mut merged: Vec<(u8, usize, &ListingRecord)> = best.into_values().collect();
    merged.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    merged
        .into_iter()
        .take(max_results)
        .map(|(_, _, record)| record.clone())
        .collect()
}

/// First occurrence of each id wins; order preserved.
fn dedup_in_order(records: &[ListingRecord], max_results: usize) -> Vec<ListingRecord> {
    let mut seen = std::collections::HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.id.as_str()))
        .take(max_results)
        .cloned()
        .collect()
}
