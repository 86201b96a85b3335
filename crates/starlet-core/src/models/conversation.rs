use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::Document;

/// Summary row in the conversation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub participants: Vec<String>,
    /// Preview of the most recent message.
    pub last_message: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
    pub unread_count: u32,
}

impl Conversation {
    pub fn from_document(doc: &Document) -> Option<Self> {
        let participants: Vec<String> = doc
            .fields
            .get("participants")
            .and_then(Value::as_array)?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();

        Some(Self {
            id: doc.id.clone(),
            participants,
            last_message: doc.str_field("last_message").map(str::to_string),
            last_activity: doc.created_at,
            unread_count: doc.u64_field("unread_count").unwrap_or(0) as u32,
        })
    }

    pub fn involves_user(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// The participant shown as the counterpart in a two-party chat.
    pub fn counterpart<'a>(&'a self, user_id: &str) -> Option<&'a str> {
        self.participants
            .iter()
            .map(String::as_str)
            .find(|p| *p != user_id)
    }
}
