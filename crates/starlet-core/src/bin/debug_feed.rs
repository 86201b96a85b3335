//! Prints the ranked feed over a seeded in-memory store.
//!
//! Quick check that tier ranking and dedup behave as expected:
//! `cargo run --bin debug_feed`

use std::sync::Arc;

use serde_json::json;
use starlet_core::config::FeedConfig;
use starlet_core::constants::collections;
use starlet_core::feed::FeedLoader;
use starlet_core::store::MemoryDocStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let store = Arc::new(MemoryDocStore::new());

    store.seed(
        collections::LISTINGS,
        "hq-plot",
        json!({
            "status": "approved",
            "badge": "official",
            "title": "Serviced plot, Starlet estate",
            "price": 45_000,
            "published_at": 100,
        }),
    );
    store.seed(
        collections::LISTINGS,
        "lakeview",
        json!({
            "status": "approved",
            "featured": true,
            "title": "4-bed lakeview house",
            "price": 230_000,
            "published_at": 300,
        }),
    );
    store.seed(
        collections::LISTINGS,
        "corolla",
        json!({
            "status": "approved",
            "type": "vehicle",
            "title": "2019 Corolla",
            "views": 412,
            "published_at": 250,
        }),
    );
    store.seed(
        collections::LISTINGS,
        "bungalow",
        json!({
            "status": "approved",
            "title": "2-bed bungalow",
            "published_at": 400,
        }),
    );
    // Duplicate across tiers: featured and trending
    store.seed(
        collections::LISTINGS,
        "hilux",
        json!({
            "status": "approved",
            "type": "vehicle",
            "featured": true,
            "title": "2021 Hilux",
            "views": 900,
            "price": 31_000,
            "published_at": 500,
        }),
    );

    let loader = FeedLoader::new(store, &FeedConfig::default());
    let feed = loader.load().await;

    println!("{:<10} {:<28} {:>16}", "tier", "title", "price");
    for listing in &feed {
        println!(
            "{:<10} {:<28} {:>16}",
            listing.tier.label(),
            listing.title,
            listing.display_price()
        );
    }
    Ok(())
}
