//! Seeded in-memory environment the CLI subcommands run against.

use std::sync::Arc;

use serde_json::json;
use starlet_core::constants::collections;
use starlet_core::store::MemoryDocStore;

pub const DEMO_USER: &str = "buyer-1";
pub const DEMO_AGENT: &str = "agent-starlet";
pub const DEMO_CONVERSATION: &str = "conv-lakeview";

/// A small marketplace snapshot: listings across every tier plus one
/// conversation between the demo buyer and an agent.
pub fn seed_demo_store() -> Arc<MemoryDocStore> {
    let store = Arc::new(MemoryDocStore::new());

    store.seed(
        collections::LISTINGS,
        "hq-plot",
        json!({
            "status": "approved",
            "badge": "official",
            "title": "Serviced plot, Starlet estate",
            "price": 45_000,
            "location": "Entebbe Rd",
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
            "location": "Munyonyo",
            "published_at": 300,
        }),
    );
    store.seed(
        collections::LISTINGS,
        "hilux",
        json!({
            "status": "approved",
            "type": "vehicle",
            "featured": true,
            "views": 900,
            "title": "2021 Hilux",
            "price": 31_000,
            "published_at": 500,
        }),
    );
    store.seed(
        collections::LISTINGS,
        "corolla",
        json!({
            "status": "approved",
            "type": "vehicle",
            "views": 412,
            "title": "2019 Corolla",
            "published_at": 250,
        }),
    );
    store.seed(
        collections::LISTINGS,
        "bungalow",
        json!({
            "status": "approved",
            "title": "2-bed bungalow",
            "location": "Kira",
            "published_at": 400,
        }),
    );

    store.seed(
        collections::CONVERSATIONS,
        DEMO_CONVERSATION,
        json!({
            "participants": [DEMO_USER, DEMO_AGENT],
            "last_message": "Is the lakeview house still available?",
            "unread_count": 1,
        }),
    );
    store.seed(
        collections::MESSAGES,
        "msg-1",
        json!({
            "conversation_id": DEMO_CONVERSATION,
            "sender_id": DEMO_USER,
            "body_type": "text",
            "text": "Is the lakeview house still available?",
            "read_by": [DEMO_USER],
        }),
    );
    store.seed(
        collections::MESSAGES,
        "msg-2",
        json!({
            "conversation_id": DEMO_CONVERSATION,
            "sender_id": DEMO_AGENT,
            "body_type": "text",
            "text": "Yes - viewings are open this weekend.",
            "read_by": [DEMO_AGENT],
        }),
    );

    store
}
