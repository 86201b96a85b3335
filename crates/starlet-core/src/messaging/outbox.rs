//! Optimistic send pipeline with bounded exponential backoff.
//!
//! A submitted message appears in the conversation immediately with a
//! temporary id and `Sending` status. The write is issued asynchronously;
//! each failed attempt is followed by its backoff delay. When the write
//! lands, the authoritative record (carrying the temp id as its client tag)
//! replaces the optimistic one. When every attempt fails the record is
//! marked `Error` and stays put until the user explicitly retries.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::constants::{cache_keys, collections};
use crate::models::{MessageBody, MessageRecord};
use crate::store::{DocumentStoreClient, MessageCache};

use super::store::MessagingStore;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Backoff after the zero-indexed `attempt`: `base * multiplier^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * self.multiplier.saturating_pow(attempt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent { message_id: String, attempts: u32 },
    /// Terminal failure; the optimistic record remains visible in `Error`
    /// state until the user retries or discards it.
    Failed { temp_id: String, attempts: u32 },
}

pub struct Outbox {
    store: Arc<dyn DocumentStoreClient>,
    state: Arc<Mutex<MessagingStore>>,
    policy: RetryPolicy,
    message_cache: Option<Arc<MessageCache<Vec<MessageRecord>>>>,
}

impl Outbox {
    pub fn new(
        store: Arc<dyn DocumentStoreClient>,
        state: Arc<Mutex<MessagingStore>>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            state,
            policy,
            message_cache: None,
        }
    }

    /// Wire up cache invalidation: a successful send drops the cached
    /// message sequence for its conversation, so the next read re-fetches
    /// instead of serving a stale list.
    pub fn with_message_cache(mut self, cache: Arc<MessageCache<Vec<MessageRecord>>>) -> Self {
        self.message_cache = Some(cache);
        self
    }

    /// Optimistically append and deliver a new outgoing message.
    pub async fn send(
        &self,
        conversation_id: &str,
        sender_id: &str,
        body: MessageBody,
    ) -> SendOutcome {
        let record = MessageRecord::optimistic(conversation_id, sender_id, body);
        self.state.lock().push_optimistic(record.clone());
        self.deliver(record).await
    }

    /// Re-enter the pipeline for a message that previously exhausted its
    /// retries. The errored record is removed and resent under a fresh
    /// temp id. Returns `None` if no such errored record exists.
    pub async fn retry(&self, conversation_id: &str, temp_id: &str) -> Option<SendOutcome> {
        let errored = self.state.lock().take_errored(conversation_id, temp_id)?;
        Some(self.send(conversation_id, &errored.sender_id, errored.body).await)
    }

    async fn deliver(&self, record: MessageRecord) -> SendOutcome {
        let temp_id = record.id.clone();
        let fields = record.to_fields();
        // Stable document id across retries, so a retried write that
        // actually landed the first time is idempotent.
        let message_id = uuid::Uuid::new_v4().to_string();

        for attempt in 0..self.policy.max_attempts {
            match self
                .store
                .write(collections::MESSAGES, &message_id, fields.clone())
                .await
            {
                Ok(doc) => {
                    // The live subscription delivers the same record to open
                    // views; applying here as well covers conversations with
                    // no listener, and the ingest is idempotent by id.
                    if let Some(authoritative) = MessageRecord::from_document(&doc) {
                        self.state.lock().apply_message(authoritative);
                    }
                    if let Some(cache) = &self.message_cache {
                        cache.invalidate(&cache_keys::messages(&record.conversation_id));
                    }
                    return SendOutcome::Sent {
                        message_id,
                        attempts: attempt + 1,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        "outbox: send attempt {}/{} failed for {temp_id}: {e}",
                        attempt + 1,
                        self.policy.max_attempts
                    );
                    tokio::time::sleep(self.policy.delay_for(attempt)).await;
                }
            }
        }

        self.state
            .lock()
            .fail_optimistic(&record.conversation_id, &temp_id);
        SendOutcome::Failed {
            temp_id,
            attempts: self.policy.max_attempts,
        }
    }
}
