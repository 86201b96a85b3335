//! Live listener lifecycle for open chat views.
//!
//! At most one message subscription is active at a time; opening a
//! conversation tears the previous listener down first, so switching views
//! never leaks listeners or delivers snapshots for a closed conversation.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::constants::collections;
use crate::store::{DocumentStoreClient, QueryFilter, Snapshot, StoreError, SubscriptionHandle};

pub struct ConversationListeners {
    store: Arc<dyn DocumentStoreClient>,
    active: Option<(String, SubscriptionHandle)>,
}

impl ConversationListeners {
    pub fn new(store: Arc<dyn DocumentStoreClient>) -> Self {
        Self {
            store,
            active: None,
        }
    }

    /// Subscribe to a conversation's messages, cancelling any previous
    /// listener first. Snapshots are pushed to `sender` until the next
    /// `open`/`close` call.
    pub fn open(
        &mut self,
        conversation_id: &str,
        sender: UnboundedSender<Snapshot>,
    ) -> Result<(), StoreError> {
        self.close();

        let handle = self.store.subscribe(
            collections::MESSAGES,
            vec![QueryFilter::eq("conversation_id", conversation_id)],
            sender,
        )?;
        tracing::debug!("listeners: opened conversation {conversation_id}");
        self.active = Some((conversation_id.to_string(), handle));
        Ok(())
    }

    /// Tear down the active listener, if any.
    pub fn close(&mut self) {
        if let Some((id, handle)) = self.active.take() {
            tracing::debug!("listeners: closed conversation {id}");
            handle.unsubscribe();
        }
    }

    pub fn active_conversation(&self) -> Option<&str> {
        self.active.as_ref().map(|(id, _)| id.as_str())
    }
}

impl Drop for ConversationListeners {
    fn drop(&mut self) {
        self.close();
    }
}
