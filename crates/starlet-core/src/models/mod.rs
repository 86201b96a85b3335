pub mod conversation;
pub mod listing;
pub mod message;

pub use conversation::Conversation;
pub use listing::{ListingKind, ListingRecord, ListingTier};
pub use message::{DeliveryStatus, MessageBody, MessageRecord};
