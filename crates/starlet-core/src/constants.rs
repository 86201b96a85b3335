//! Application-wide constants
//!
//! Centralized location for magic strings and configuration values
//! that are used across multiple modules.

/// Number of cards in the featured listing grid.
pub const FEED_MAX_RESULTS: usize = 8;

/// View-count threshold for the trending tier query.
pub const TRENDING_MIN_VIEWS: u64 = 100;

// Display fallbacks for missing listing fields
pub const DEFAULT_LISTING_TITLE: &str = "Untitled listing";
pub const PRICE_FALLBACK: &str = "Price on request";
pub const LOCATION_FALLBACK: &str = "Location not specified";
pub const PLACEHOLDER_IMAGE: &str = "/img/listing-placeholder.svg";

/// Conversation list cache age - beyond this a fresh fetch is required.
pub const CONVERSATIONS_CACHE_MAX_AGE_SECS: u64 = 5 * 60;

/// Message sequence cache age. Short, since live subscriptions supersede it.
pub const MESSAGES_CACHE_MAX_AGE_SECS: u64 = 60;

// Document store collections
pub mod collections {
    /// Property and vehicle listings
    pub const LISTINGS: &str = "listings";
    /// Conversation summaries (participants, preview, unread counts)
    pub const CONVERSATIONS: &str = "conversations";
    /// Individual chat messages
    pub const MESSAGES: &str = "messages";
    /// User profiles (display names, avatars)
    pub const USERS: &str = "users";
}

// Cache key builders, so all call sites agree on the format
pub mod cache_keys {
    pub fn conversations(user_id: &str) -> String {
        format!("conversations:{user_id}")
    }

    pub fn messages(conversation_id: &str) -> String {
        format!("messages:{conversation_id}")
    }
}
