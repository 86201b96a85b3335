//! Runs the tier queries and produces the ranked feed.
//!
//! All five queries are issued concurrently; a failed query degrades to an
//! empty batch for that tier. The merge order is the fixed tier order, so
//! network completion order never affects the ranking.

use std::sync::Arc;

use futures::future::join_all;

use crate::config::FeedConfig;
use crate::constants::{collections, TRENDING_MIN_VIEWS};
use crate::models::{ListingRecord, ListingTier};
use crate::store::{DocumentStoreClient, OrderBy, QueryFilter};

use super::aggregator::{merge, TierBatch};

pub struct FeedLoader {
    store: Arc<dyn DocumentStoreClient>,
    max_results: usize,
    per_tier_limit: usize,
}

impl FeedLoader {
    pub fn new(store: Arc<dyn DocumentStoreClient>, config: &FeedConfig) -> Self {
        Self {
            store,
            max_results: config.max_results,
            per_tier_limit: config.per_tier_limit,
        }
    }

    /// Load and rank the featured feed. Partial failure is the expected
    /// steady state: tiers that fail contribute nothing, and an entirely
    /// empty result is a valid feed, not an error.
    pub async fn load(&self) -> Vec<ListingRecord> {
        let queries = ListingTier::ALL.iter().map(|&tier| self.fetch_tier(tier));
        let mut results = join_all(queries).await;

        // The backstop "any approved" batch only participates when every
        // primary tier came back empty.
        let fallback = results.pop().map(|b| b.records).unwrap_or_default();

        merge(&results, &fallback, self.max_results)
    }

    async fn fetch_tier(&self, tier: ListingTier) -> TierBatch {
        let (filters, order_by) = tier_query(tier);
        let result = self
            .store
            .query(
                collections::LISTINGS,
                &filters,
                order_by,
                Some(self.per_tier_limit),
            )
            .await;

        let records = match result {
            Ok(docs) => docs
                .iter()
                .filter_map(|doc| ListingRecord::from_document(doc, tier, collections::LISTINGS))
                .collect(),
            Err(e) => {
                tracing::warn!("feed: {} tier query failed: {e}", tier.label());
                Vec::new()
            }
        };
        TierBatch::new(tier, records)
    }
}

/// Filters and ordering for each tier's query.
fn tier_query(tier: ListingTier) -> (Vec<QueryFilter>, Option<OrderBy>) {
    let approved = QueryFilter::eq("status", "approved");
    match tier {
        ListingTier::Official => (
            vec![approved, QueryFilter::eq("badge", "official")],
            None,
        ),
        ListingTier::Featured => (
            vec![approved, QueryFilter::eq("featured", true)],
            None,
        ),
        ListingTier::Trending => (
            vec![approved, QueryFilter::gte("views", TRENDING_MIN_VIEWS)],
            Some(OrderBy::desc("views")),
        ),
        ListingTier::Recent => (vec![approved], Some(OrderBy::desc("published_at"))),
        ListingTier::Approved => (vec![approved], None),
    }
}
