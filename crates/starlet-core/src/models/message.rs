use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::store::Document;

/// Delivery state of a message. Transitions only move forward along
/// `Sending -> Sent -> Delivered -> Read`; the single exception is
/// `Sending -> Error` when the send pipeline exhausts its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Delivered,
    Read,
    Error,
}

impl DeliveryStatus {
    fn progress(self) -> u8 {
        match self {
            DeliveryStatus::Sending => 0,
            DeliveryStatus::Sent => 1,
            DeliveryStatus::Delivered => 2,
            DeliveryStatus::Read => 3,
            // Error is terminal and outside the forward chain
            DeliveryStatus::Error => u8::MAX,
        }
    }

    pub fn can_advance_to(self, next: DeliveryStatus) -> bool {
        match (self, next) {
            (DeliveryStatus::Error, _) => false,
            (DeliveryStatus::Sending, DeliveryStatus::Error) => true,
            (_, DeliveryStatus::Error) => false,
            (current, next) => next.progress() > current.progress(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    Text { text: String },
    Image { url: String, caption: Option<String> },
    File { name: String, size: u64, url: String },
}

impl MessageBody {
    pub fn text(text: impl Into<String>) -> Self {
        MessageBody::Text { text: text.into() }
    }

    /// Short form for conversation list previews.
    pub fn preview(&self) -> String {
        match self {
            MessageBody::Text { text } => {
                let mut p: String = text.chars().take(60).collect();
                if text.chars().count() > 60 {
                    p.push('…');
                }
                p
            }
            MessageBody::Image { caption, .. } => match caption {
                Some(c) => format!("[photo] {c}"),
                None => "[photo]".to_string(),
            },
            MessageBody::File { name, .. } => format!("[file: {name}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub body: MessageBody,
    /// Server-assigned once persisted; `None` while the record is optimistic.
    pub created_at: Option<DateTime<Utc>>,
    pub status: DeliveryStatus,
    pub read_by: HashSet<String>,
    /// Echo of the optimistic temp id attached to the write. The store uses
    /// it to pair an authoritative record with the temp it replaces.
    pub client_tag: Option<String>,
}

impl MessageRecord {
    /// Locally-originated record shown before the store confirms the write.
    pub fn optimistic(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        body: MessageBody,
    ) -> Self {
        let temp_id = format!("tmp-{}", uuid::Uuid::new_v4());
        Self {
            id: temp_id.clone(),
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            body,
            created_at: None,
            status: DeliveryStatus::Sending,
            read_by: HashSet::new(),
            client_tag: Some(temp_id),
        }
    }

    pub fn is_optimistic(&self) -> bool {
        self.created_at.is_none()
            && matches!(self.status, DeliveryStatus::Sending | DeliveryStatus::Error)
    }

    /// Parse an authoritative record out of a store document.
    pub fn from_document(doc: &Document) -> Option<Self> {
        let conversation_id = doc.str_field("conversation_id")?.to_string();
        let sender_id = doc.str_field("sender_id")?.to_string();

        let body = match doc.str_field("body_type") {
            Some("image") => MessageBody::Image {
                url: doc.str_field("url")?.to_string(),
                caption: doc.str_field("caption").map(str::to_string),
            },
            Some("file") => MessageBody::File {
                name: doc.str_field("file_name")?.to_string(),
                size: doc.u64_field("file_size").unwrap_or(0),
                url: doc.str_field("url")?.to_string(),
            },
            _ => MessageBody::Text {
                text: doc.str_field("text").unwrap_or_default().to_string(),
            },
        };

        let read_by: HashSet<String> = doc
            .fields
            .get("read_by")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let created_at = doc.created_at.or_else(|| {
            doc.u64_field("created_at_ms")
                .and_then(|ms| Utc.timestamp_millis_opt(ms as i64).single())
        });

        let status = if read_by.iter().any(|r| r != &sender_id) {
            DeliveryStatus::Read
        } else {
            DeliveryStatus::Sent
        };

        Some(Self {
            id: doc.id.clone(),
            conversation_id,
            sender_id,
            body,
            created_at,
            status,
            read_by,
            client_tag: doc.str_field("client_tag").map(str::to_string),
        })
    }

    /// Field map for the store write. The client tag rides along so the
    /// echoed authoritative record can be paired with the optimistic temp.
    pub fn to_fields(&self) -> Value {
        let mut fields = json!({
            "conversation_id": self.conversation_id,
            "sender_id": self.sender_id,
            "read_by": self.read_by.iter().collect::<Vec<_>>(),
        });
        if let Some(tag) = &self.client_tag {
            fields["client_tag"] = json!(tag);
        }
        match &self.body {
            MessageBody::Text { text } => {
                fields["body_type"] = json!("text");
                fields["text"] = json!(text);
            }
            MessageBody::Image { url, caption } => {
                fields["body_type"] = json!("image");
                fields["url"] = json!(url);
                if let Some(c) = caption {
                    fields["caption"] = json!(c);
                }
            }
            MessageBody::File { name, size, url } => {
                fields["body_type"] = json!("file");
                fields["file_name"] = json!(name);
                fields["file_size"] = json!(size);
                fields["url"] = json!(url);
            }
        }
        fields
    }

    /// Move the status forward; backward transitions are ignored.
    /// Returns whether the status changed.
    pub fn advance_status(&mut self, next: DeliveryStatus) -> bool {
        if self.status.can_advance_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Record that `user_id` has read this message.
    pub fn mark_read_by(&mut self, user_id: &str) -> bool {
        let newly = self.read_by.insert(user_id.to_string());
        if newly && user_id != self.sender_id {
            self.advance_status(DeliveryStatus::Read);
        }
        newly
    }
}
