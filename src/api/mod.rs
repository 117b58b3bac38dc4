mod http;

pub use http::{ HttpConversationApi, DEFAULT_API_URL };

use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::chat::{ Conversation, MessageExchange };

/// The conversation backend. Persistence and the LLM call live behind it.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError>;

    async fn create_conversation(&self) -> Result<Conversation, ApiError>;

    async fn get_conversation(&self, id: &str) -> Result<Conversation, ApiError>;

    async fn delete_conversation(&self, id: &str) -> Result<(), ApiError>;

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<(), ApiError>;

    /// Sends a user message and returns the stored user message together
    /// with the agent's analysed reply.
    async fn add_message(
        &self,
        conversation_id: &str,
        content: &str
    ) -> Result<MessageExchange, ApiError>;

    async fn suggested_topics(&self) -> Result<Vec<String>, ApiError>;
}
