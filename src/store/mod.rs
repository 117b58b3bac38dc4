//! Client-side mirror of the backend's conversations.
//!
//! The store applies optimistic updates: a sent message shows up at once as
//! a provisional entry and is swapped for the server's copy when the reply
//! arrives, or removed again if the request fails. The state lock is never
//! held across a network call, so readers see provisional entries while a
//! send is in flight.

use chrono::{ DateTime, Utc };
use log::{ debug, error, info };
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::ConversationApi;
use crate::error::{ Result, StoreError };
use crate::models::chat::{ Conversation, Message, MessageExchange };
use crate::notify::{ Notifier, Toast };

pub const DEFAULT_HISTORY_WARNING_THRESHOLD: usize = 15;
pub const DEFAULT_MESSAGE_LIMIT: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    /// A "Long Conversation" notice is raised once a send would take the
    /// conversation past this many messages.
    pub history_warning_threshold: usize,
    /// Hard cap on messages per conversation. `0` disables it.
    pub message_limit: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            history_warning_threshold: DEFAULT_HISTORY_WARNING_THRESHOLD,
            message_limit: DEFAULT_MESSAGE_LIMIT,
        }
    }
}

#[derive(Default)]
struct StoreState {
    conversations: Vec<Conversation>,
    active_id: Option<String>,
    in_flight: HashSet<String>,
    topics: Vec<String>,
}

impl StoreState {
    fn find(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }
}

/// Swaps the provisional entry for the confirmed pair and refreshes the
/// last-message cache.
fn apply_exchange(conversation: &mut Conversation, provisional_id: &str, exchange: &MessageExchange) {
    let user_id = exchange.user_message.id.as_str();
    conversation.messages.retain(|m| m.id != provisional_id && m.id != user_id);
    conversation.messages.push(exchange.user_message.clone());
    conversation.messages.push(exchange.ai_message.clone());
    conversation.updated_at = Utc::now();
    conversation.last_message = Some(exchange.ai_message.content.clone());
    conversation.last_message_time = Some(exchange.ai_message.timestamp);
}

pub struct ConversationStore {
    api: Arc<dyn ConversationApi>,
    notifier: Arc<dyn Notifier>,
    limits: StoreLimits,
    state: RwLock<StoreState>,
}

impl ConversationStore {
    pub fn new(api: Arc<dyn ConversationApi>, notifier: Arc<dyn Notifier>, limits: StoreLimits) -> Self {
        Self {
            api,
            notifier,
            limits,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub async fn conversations(&self) -> Vec<Conversation> {
        self.state.read().await.conversations.clone()
    }

    pub async fn conversation(&self, id: &str) -> Option<Conversation> {
        self.state.read().await.find(id).cloned()
    }

    pub async fn active_conversation_id(&self) -> Option<String> {
        self.state.read().await.active_id.clone()
    }

    pub async fn active_conversation(&self) -> Option<Conversation> {
        let state = self.state.read().await;
        state.active_id.as_deref().and_then(|id| state.find(id)).cloned()
    }

    /// True while any conversation is waiting for an AI reply.
    pub async fn is_loading_ai_response(&self) -> bool {
        !self.state.read().await.in_flight.is_empty()
    }

    pub async fn is_awaiting_response(&self, id: &str) -> bool {
        self.state.read().await.in_flight.contains(id)
    }

    pub async fn cached_topics(&self) -> Vec<String> {
        self.state.read().await.topics.clone()
    }

    /// Replaces the mirrored list with the server's. Conversations with a
    /// send in flight keep their local messages.
    pub async fn load(&self) -> Result<()> {
        let fresh = match self.api.list_conversations().await {
            Ok(list) => list,
            Err(e) => {
                error!("Failed to load conversations: {}", e);
                self.notifier.notify(Toast::error("Failed to load conversations. Please try again."));
                return Err(e.into());
            }
        };

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let mut merged = Vec::with_capacity(fresh.len());
        for mut conversation in fresh {
            if state.in_flight.contains(&conversation.id) {
                if let Some(local) = state.find(&conversation.id) {
                    conversation.messages = local.messages.clone();
                }
            }
            merged.push(conversation);
        }
        info!("Loaded {} conversations", merged.len());
        state.conversations = merged;
        Ok(())
    }

    /// Creates a conversation on the server, makes it active and, when an
    /// initial message is given, sends it. A failed initial send is reported
    /// but the new conversation id is still returned.
    pub async fn create_conversation(&self, initial_message: Option<&str>) -> Result<String> {
        let conversation = match self.api.create_conversation().await {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to create conversation: {}", e);
                self.notifier.notify(Toast::error("Failed to create conversation. Please try again."));
                return Err(e.into());
            }
        };

        let id = conversation.id.clone();
        {
            let mut state = self.state.write().await;
            state.conversations.retain(|c| c.id != id);
            state.conversations.insert(0, conversation);
            state.active_id = Some(id.clone());
        }
        debug!("Created conversation {}", id);

        if let Some(initial) = initial_message.map(str::trim).filter(|m| !m.is_empty()) {
            let sent = self.send(
                &id,
                initial,
                Some("Failed to send initial message. Please try again.")
            ).await;
            if let Err(e) = sent {
                debug!("Initial message for {} not delivered: {}", id, e);
            }
        }

        Ok(id)
    }

    /// Sets the active conversation and refreshes it from the server.
    /// The selection stays even when the refresh fails.
    pub async fn select_conversation(&self, id: Option<&str>) -> Result<()> {
        self.state.write().await.active_id = id.map(str::to_string);
        let Some(id) = id else {
            return Ok(());
        };

        let fresh = match self.api.get_conversation(id).await {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to fetch conversation {}: {}", id, e);
                self.notifier.notify(Toast::error("Failed to load conversation. Please try again."));
                return Err(e.into());
            }
        };

        let mut state = self.state.write().await;
        if state.in_flight.contains(id) {
            debug!("Skipping refresh of {} while a reply is pending", id);
            return Ok(());
        }
        match state.find_mut(id) {
            Some(local) => {
                *local = fresh;
            }
            None => state.conversations.insert(0, fresh),
        }
        Ok(())
    }

    /// Sends a message with an optimistic provisional entry, reconciled with
    /// the server's copy or rolled back on failure.
    pub async fn add_message(&self, conversation_id: &str, content: &str) -> Result<MessageExchange> {
        self.send(conversation_id, content.trim(), None).await
    }

    async fn send(
        &self,
        conversation_id: &str,
        content: &str,
        failure_description: Option<&str>
    ) -> Result<MessageExchange> {
        let provisional = Message::provisional(content);
        let previous_updated_at: DateTime<Utc>;
        {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let Some(conversation) = state.find(conversation_id) else {
                return Err(StoreError::ConversationNotFound(conversation_id.to_string()));
            };
            if content.is_empty() {
                return Err(StoreError::EmptyMessage);
            }
            if state.in_flight.contains(conversation_id) {
                return Err(StoreError::ResponsePending(conversation_id.to_string()));
            }

            let count = conversation.messages.len();
            let limit = self.limits.message_limit;
            if limit > 0 && count + 2 > limit {
                self.notifier.notify(
                    Toast::info(
                        "Conversation Limit",
                        "This conversation has reached its message limit. Please start a new chat."
                    )
                );
                return Err(StoreError::MessageLimitReached { limit });
            }
            if count + 1 > self.limits.history_warning_threshold {
                self.notifier.notify(
                    Toast::info(
                        "Long Conversation",
                        "This conversation is getting quite long. Consider starting a new chat for new topics."
                    )
                );
            }

            let Some(conversation) = state.find_mut(conversation_id) else {
                return Err(StoreError::ConversationNotFound(conversation_id.to_string()));
            };
            previous_updated_at = conversation.updated_at;
            conversation.messages.push(provisional.clone());
            conversation.updated_at = Utc::now();
            state.in_flight.insert(conversation_id.to_string());
        }

        let result = self.api.add_message(conversation_id, content).await;

        let mut state = self.state.write().await;
        state.in_flight.remove(conversation_id);
        match result {
            Ok(exchange) => {
                match state.find_mut(conversation_id) {
                    Some(conversation) => apply_exchange(conversation, &provisional.id, &exchange),
                    None => debug!("Conversation {} was removed before its reply arrived", conversation_id),
                }
                Ok(exchange)
            }
            Err(e) => {
                if let Some(conversation) = state.find_mut(conversation_id) {
                    conversation.messages.retain(|m| m.id != provisional.id);
                    conversation.updated_at = previous_updated_at;
                }
                drop(state);
                error!("Failed to add message to {}: {}", conversation_id, e);
                let description = failure_description
                    .map(str::to_string)
                    .unwrap_or_else(|| e.to_string());
                self.notifier.notify(Toast::error(description));
                Err(e.into())
            }
        }
    }

    pub async fn delete_conversation(&self, id: &str) -> Result<()> {
        if let Err(e) = self.api.delete_conversation(id).await {
            error!("Failed to delete conversation {}: {}", id, e);
            self.notifier.notify(Toast::error("Failed to delete conversation. Please try again."));
            return Err(e.into());
        }

        let mut state = self.state.write().await;
        state.conversations.retain(|c| c.id != id);
        if state.active_id.as_deref() == Some(id) {
            state.active_id = None;
        }
        debug!("Deleted conversation {}", id);
        Ok(())
    }

    /// Renames a conversation. Only the title changes locally; an unchanged
    /// title sends nothing.
    pub async fn rename_conversation(&self, id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::InvalidTitle);
        }
        if self.state.read().await.find(id).is_some_and(|c| c.title == title) {
            return Ok(());
        }

        if let Err(e) = self.api.rename_conversation(id, title).await {
            error!("Failed to rename conversation {}: {}", id, e);
            self.notifier.notify(Toast::error("Failed to rename conversation. Please try again."));
            return Err(e.into());
        }

        if let Some(conversation) = self.state.write().await.find_mut(id) {
            conversation.title = title.to_string();
        }
        Ok(())
    }

    pub async fn suggested_topics(&self) -> Result<Vec<String>> {
        match self.api.suggested_topics().await {
            Ok(topics) => {
                self.state.write().await.topics = topics.clone();
                Ok(topics)
            }
            Err(e) => {
                error!("Failed to fetch suggested topics: {}", e);
                self.notifier.notify(Toast::error("Failed to load suggested topics."));
                Err(e.into())
            }
        }
    }
}
