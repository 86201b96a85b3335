//! Shared in-memory messaging state.
//!
//! Single source of truth for open chat views: conversation summaries and
//! the message sequence per conversation. Updated incrementally from
//! subscription snapshots and from the optimistic send pipeline. All
//! mutation happens through `&mut self`; callers share it behind a
//! `parking_lot::Mutex`.

use std::collections::HashMap;

use crate::constants::collections;
use crate::models::{Conversation, DeliveryStatus, MessageRecord};
use crate::store::Snapshot;

#[derive(Default)]
pub struct MessagingStore {
    pub conversations: Vec<Conversation>,
    messages_by_conversation: HashMap<String, Vec<MessageRecord>>,
    /// user id -> display name, for rendering senders
    pub profiles: HashMap<String, String>,
}

impl MessagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest a snapshot pushed by a live subscription. Unknown collections
    /// are ignored rather than treated as errors.
    pub fn handle_snapshot(&mut self, snapshot: &Snapshot) {
        match snapshot.collection.as_str() {
            collections::MESSAGES => {
                for doc in &snapshot.documents {
                    if let Some(record) = MessageRecord::from_document(doc) {
                        self.apply_message(record);
                    }
                }
            }
            collections::CONVERSATIONS => {
                let conversations = snapshot
                    .documents
                    .iter()
                    .filter_map(Conversation::from_document)
                    .collect();
                self.set_conversations(conversations);
            }
            _ => {}
        }
    }

    /// Insert or update an authoritative message.
    ///
    /// Reconciliation is replace-not-merge: when the record's client tag
    /// matches a pending optimistic temp, the temp is removed and the
    /// authoritative record inserted in its place. Re-applying a known id
    /// replaces the content but never moves the status backward.
    pub fn apply_message(&mut self, record: MessageRecord) {
        let conversation_id = record.conversation_id.clone();
        let created_at = record.created_at;
        let preview = record.body.preview();

        let messages = self
            .messages_by_conversation
            .entry(conversation_id.clone())
            .or_default();

        if let Some(tag) = &record.client_tag {
            messages.retain(|m| !(m.is_optimistic() && &m.id == tag));
        }

        match messages.iter_mut().find(|m| m.id == record.id) {
            Some(existing) => {
                let status = if existing.status.can_advance_to(record.status) {
                    record.status
                } else {
                    existing.status
                };
                *existing = MessageRecord { status, ..record };
            }
            None => messages.push(record),
        }

        sort_messages(messages);
        self.touch_conversation(&conversation_id, created_at, preview);
    }

    /// Append a locally-originated record awaiting confirmation.
    pub fn push_optimistic(&mut self, record: MessageRecord) {
        self.messages_by_conversation
            .entry(record.conversation_id.clone())
            .or_default()
            .push(record);
    }

    /// Mark a pending optimistic send as terminally failed.
    pub fn fail_optimistic(&mut self, conversation_id: &str, temp_id: &str) {
        if let Some(messages) = self.messages_by_conversation.get_mut(conversation_id) {
            if let Some(msg) = messages.iter_mut().find(|m| m.id == temp_id) {
                msg.advance_status(DeliveryStatus::Error);
            }
        }
    }

    /// Remove an errored optimistic record for an explicit user retry.
    pub fn take_errored(&mut self, conversation_id: &str, temp_id: &str) -> Option<MessageRecord> {
        let messages = self.messages_by_conversation.get_mut(conversation_id)?;
        let idx = messages
            .iter()
            .position(|m| m.id == temp_id && m.status == DeliveryStatus::Error)?;
        Some(messages.remove(idx))
    }

    pub fn messages(&self, conversation_id: &str) -> &[MessageRecord] {
        self.messages_by_conversation
            .get(conversation_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn set_conversations(&mut self, mut conversations: Vec<Conversation>) {
        conversations.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        self.conversations = conversations;
    }

    /// Fold a read receipt for the whole conversation and reset its unread
    /// counter.
    pub fn mark_conversation_read(&mut self, conversation_id: &str, user_id: &str) {
        if let Some(messages) = self.messages_by_conversation.get_mut(conversation_id) {
            for msg in messages.iter_mut() {
                msg.mark_read_by(user_id);
            }
        }
        if let Some(conv) = self.conversations.iter_mut().find(|c| c.id == conversation_id) {
            conv.unread_count = 0;
        }
    }

    pub fn display_name<'a>(&'a self, user_id: &'a str) -> &'a str {
        self.profiles
            .get(user_id)
            .map(String::as_str)
            .unwrap_or(user_id)
    }

    /// Bump the conversation row for new activity and keep the list sorted.
    fn touch_conversation(
        &mut self,
        conversation_id: &str,
        created_at: Option<chrono::DateTime<chrono::Utc>>,
        preview: String,
    ) {
        let Some(conv) = self
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        else {
            return;
        };

        if created_at >= conv.last_activity {
            conv.last_activity = created_at;
            conv.last_message = Some(preview);
        }
        self.conversations
            .sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
    }
}

/// Chronological order; optimistic records (no server timestamp yet) sort
/// after everything confirmed. Ties break on id for determinism.
fn sort_messages(messages: &mut [MessageRecord]) {
    messages.sort_by(|a, b| {
        let ka = a.created_at.map(|t| t.timestamp_millis()).unwrap_or(i64::MAX);
        let kb = b.created_at.map(|t| t.timestamp_millis()).unwrap_or(i64::MAX);
        ka.cmp(&kb).then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageBody;
    use chrono::{TimeZone, Utc};

    fn authoritative(
        id: &str,
        conversation_id: &str,
        text: &str,
        at_ms: i64,
        client_tag: Option<&str>,
    ) -> MessageRecord {
        MessageRecord {
            id: id.to_string(),
            conversation_id: conversation_id.to_string(),
            sender_id: "u1".to_string(),
            body: MessageBody::text(text),
            created_at: Utc.timestamp_millis_opt(at_ms).single(),
            status: DeliveryStatus::Sent,
            read_by: Default::default(),
            client_tag: client_tag.map(str::to_string),
        }
    }

    #[test]
    fn test_optimistic_replaced_not_merged() {
        let mut store = MessagingStore::new();
        let temp = MessageRecord::optimistic("c1", "u1", MessageBody::text("hello"));
        let temp_id = temp.id.clone();
        store.push_optimistic(temp);
        assert_eq!(store.messages("c1").len(), 1);

        let auth = authoritative("m1", "c1", "hello", 1_000, Some(&temp_id));
        store.apply_message(auth);

        let messages = store.messages("c1");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m1");
        assert!(messages[0].created_at.is_some());
    }

    #[test]
    fn test_unrelated_client_tag_leaves_temp_alone() {
        let mut store = MessagingStore::new();
        let temp = MessageRecord::optimistic("c1", "u1", MessageBody::text("mine"));
        store.push_optimistic(temp);

        store.apply_message(authoritative("m1", "c1", "other", 1_000, Some("tmp-other")));
        assert_eq!(store.messages("c1").len(), 2);
    }

    #[test]
    fn test_reapplied_message_never_regresses_status() {
        let mut store = MessagingStore::new();
        let mut first = authoritative("m1", "c1", "hi", 1_000, None);
        first.status = DeliveryStatus::Read;
        store.apply_message(first);

        // A later snapshot echoes the same message as merely Sent
        store.apply_message(authoritative("m1", "c1", "hi", 1_000, None));
        assert_eq!(store.messages("c1")[0].status, DeliveryStatus::Read);
    }

    #[test]
    fn test_messages_sorted_with_optimistic_last() {
        let mut store = MessagingStore::new();
        store.apply_message(authoritative("m2", "c1", "second", 2_000, None));
        store.apply_message(authoritative("m1", "c1", "first", 1_000, None));
        store.push_optimistic(MessageRecord::optimistic("c1", "u1", MessageBody::text("pending")));
        // A confirmed message arriving after the optimistic push still sorts
        // before it.
        store.apply_message(authoritative("m3", "c1", "third", 3_000, None));

        let ids: Vec<&str> = store.messages("c1").iter().map(|m| m.id.as_str()).collect();
        assert_eq!(&ids[..3], &["m1", "m2", "m3"]);
        assert!(ids[3].starts_with("tmp-"));
    }

    #[test]
    fn test_take_errored_requires_error_state() {
        let mut store = MessagingStore::new();
        let temp = MessageRecord::optimistic("c1", "u1", MessageBody::text("x"));
        let temp_id = temp.id.clone();
        store.push_optimistic(temp);

        // Still sending: not claimable for retry
        assert!(store.take_errored("c1", &temp_id).is_none());

        store.fail_optimistic("c1", &temp_id);
        let taken = store.take_errored("c1", &temp_id).unwrap();
        assert_eq!(taken.status, DeliveryStatus::Error);
        assert!(store.messages("c1").is_empty());
    }

    #[test]
    fn test_mark_conversation_read_resets_unread() {
        let mut store = MessagingStore::new();
        store.set_conversations(vec![Conversation {
            id: "c1".into(),
            participants: vec!["u1".into(), "u2".into()],
            last_message: None,
            last_activity: None,
            unread_count: 3,
        }]);
        store.apply_message(authoritative("m1", "c1", "hi", 1_000, None));

        store.mark_conversation_read("c1", "u2");
        assert_eq!(store.conversations[0].unread_count, 0);
        assert_eq!(store.messages("c1")[0].status, DeliveryStatus::Read);
        assert!(store.messages("c1")[0].read_by.contains("u2"));
    }

    #[test]
    fn test_new_message_bumps_conversation_ordering() {
        let mut store = MessagingStore::new();
        store.set_conversations(vec![
            Conversation {
                id: "c1".into(),
                participants: vec![],
                last_message: None,
                last_activity: Utc.timestamp_millis_opt(5_000).single(),
                unread_count: 0,
            },
            Conversation {
                id: "c2".into(),
                participants: vec![],
                last_message: None,
                last_activity: Utc.timestamp_millis_opt(1_000).single(),
                unread_count: 0,
            },
        ]);
        assert_eq!(store.conversations[0].id, "c1");

        store.apply_message(authoritative("m9", "c2", "newest", 9_000, None));
        assert_eq!(store.conversations[0].id, "c2");
        assert_eq!(store.conversations[0].last_message.as_deref(), Some("newest"));
    }

    #[test]
    fn test_snapshot_ingest_dispatches_by_collection() {
        let mut store = MessagingStore::new();
        let doc = crate::store::Document {
            id: "m1".into(),
            fields: serde_json::json!({
                "conversation_id": "c1",
                "sender_id": "u1",
                "body_type": "text",
                "text": "from snapshot",
                "read_by": [],
            }),
            created_at: Utc.timestamp_millis_opt(1_000).single(),
        };
        store.handle_snapshot(&Snapshot {
            collection: collections::MESSAGES.to_string(),
            documents: vec![doc],
        });
        assert_eq!(store.messages("c1").len(), 1);
    }
}
