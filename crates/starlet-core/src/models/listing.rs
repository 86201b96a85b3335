use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_LISTING_TITLE, LOCATION_FALLBACK, PLACEHOLDER_IMAGE, PRICE_FALLBACK,
};
use crate::store::Document;

/// Priority class of the result set a listing came from.
/// Lower rank = higher display priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ListingTier {
    /// Listings published by the Starlet office itself
    Official,
    /// Paid/featured placements
    Featured,
    /// High view-count listings
    Trending,
    /// Most recently published
    Recent,
    /// Any approved listing - the backstop tier
    Approved,
}

impl ListingTier {
    /// All tiers in display priority order. The aggregator merges in exactly
    /// this order regardless of which query finishes first.
    pub const ALL: [ListingTier; 5] = [
        ListingTier::Official,
        ListingTier::Featured,
        ListingTier::Trending,
        ListingTier::Recent,
        ListingTier::Approved,
    ];

    pub fn rank(self) -> u8 {
        match self {
            ListingTier::Official => 1,
            ListingTier::Featured => 2,
            ListingTier::Trending => 3,
            ListingTier::Recent => 4,
            ListingTier::Approved => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ListingTier::Official => "official",
            ListingTier::Featured => "featured",
            ListingTier::Trending => "trending",
            ListingTier::Recent => "recent",
            ListingTier::Approved => "approved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingKind {
    Property,
    Vehicle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: String,
    pub tier: ListingTier,
    /// Collection the record was queried from; informational only.
    pub source: String,
    pub kind: ListingKind,
    pub title: String,
    pub price: Option<u64>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ListingRecord {
    /// Build a listing from a store document, tagged with the tier of the
    /// query that returned it. Missing display fields fall back at render
    /// time; only a structurally-broken document (non-object fields) is
    /// rejected.
    pub fn from_document(doc: &Document, tier: ListingTier, source: &str) -> Option<Self> {
        if !doc.fields.is_object() {
            return None;
        }

        let kind = match doc.str_field("type") {
            Some("vehicle") => ListingKind::Vehicle,
            _ => ListingKind::Property,
        };

        Some(Self {
            id: doc.id.clone(),
            tier,
            source: source.to_string(),
            kind,
            title: doc
                .str_field("title")
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_LISTING_TITLE)
                .to_string(),
            price: doc.u64_field("price"),
            location: doc.str_field("location").map(str::to_string),
            image_url: doc.str_field("image_url").map(str::to_string),
            created_at: doc.created_at,
        })
    }

    pub fn display_price(&self) -> String {
        match self.price {
            Some(p) => format!("${p}"),
            None => PRICE_FALLBACK.to_string(),
        }
    }

    pub fn display_location(&self) -> &str {
        self.location.as_deref().unwrap_or(LOCATION_FALLBACK)
    }

    pub fn display_image(&self) -> &str {
        self.image_url.as_deref().unwrap_or(PLACEHOLDER_IMAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, fields: serde_json::Value) -> Document {
        Document {
            id: id.to_string(),
            fields,
            created_at: None,
        }
    }

    #[test]
    fn test_from_document_full_fields() {
        let d = doc(
            "l1",
            json!({
                "type": "vehicle",
                "title": "2019 Corolla",
                "price": 8500,
                "location": "Kololo",
                "image_url": "https://cdn.example/l1.jpg",
            }),
        );
        let rec = ListingRecord::from_document(&d, ListingTier::Featured, "listings").unwrap();
        assert_eq!(rec.kind, ListingKind::Vehicle);
        assert_eq!(rec.title, "2019 Corolla");
        assert_eq!(rec.display_price(), "$8500");
        assert_eq!(rec.tier.rank(), 2);
    }

    #[test]
    fn test_missing_fields_fall_back_at_display_time() {
        let d = doc("l2", json!({}));
        let rec = ListingRecord::from_document(&d, ListingTier::Approved, "listings").unwrap();
        assert_eq!(rec.kind, ListingKind::Property);
        assert_eq!(rec.title, DEFAULT_LISTING_TITLE);
        assert_eq!(rec.display_price(), PRICE_FALLBACK);
        assert_eq!(rec.display_location(), LOCATION_FALLBACK);
        assert_eq!(rec.display_image(), PLACEHOLDER_IMAGE);
    }

    #[test]
    fn test_structurally_broken_document_rejected() {
        let d = doc("l3", json!("not an object"));
        assert!(ListingRecord::from_document(&d, ListingTier::Recent, "listings").is_none());
    }

    #[test]
    fn test_tier_order_matches_rank() {
        let ranks: Vec<u8> = ListingTier::ALL.iter().map(|t| t.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }
}
