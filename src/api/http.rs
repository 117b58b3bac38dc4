use async_trait::async_trait;
use log::{ debug, error };
use reqwest::{ Client as HttpClient, Response, header::{ HeaderMap, HeaderValue, ACCEPT } };
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use super::ConversationApi;
use crate::error::ApiError;
use crate::models::api::{
    CreatedConversation,
    ErrorBody,
    MessageExchangeBody,
    NewMessageRequest,
    RenameRequest,
    TopicsResponse,
};
use crate::models::chat::{ Conversation, MessageExchange };

pub const DEFAULT_API_URL: &str = "http://localhost:5001/api";

pub struct HttpConversationApi {
    http: HttpClient,
    base_url: Url,
}

impl HttpConversationApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url.trim())?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        debug!("Conversation API client configured for {}", base_url);
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Turns a non-2xx response into `ApiError::Status`, preferring the
    /// server's own error text over `fallback`.
    async fn check(resp: Response, fallback: &str) -> Result<Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp
            .json::<ErrorBody>().await
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| format!("{}: {}", fallback, status));
        error!("API error response: status={}, message={}", status, message);
        Err(ApiError::Status { status, message })
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        resp.json::<T>().await.map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ConversationApi for HttpConversationApi {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let url = self.endpoint(&["conversations"])?;
        let resp = self.http.get(url).send().await?;
        let resp = Self::check(resp, "Failed to fetch conversations").await?;
        Self::decode(resp).await
    }

    async fn create_conversation(&self) -> Result<Conversation, ApiError> {
        let url = self.endpoint(&["conversations"])?;
        let resp = self.http.post(url).json(&serde_json::json!({})).send().await?;
        let resp = Self::check(resp, "Failed to create conversation").await?;
        let body: CreatedConversation = Self::decode(resp).await?;
        let conversation = body
            .into_conversation()
            .ok_or_else(|| ApiError::InvalidResponse("missing conversation id".to_string()))?;
        debug!("Server created conversation {}", conversation.id);
        Ok(conversation)
    }

    async fn get_conversation(&self, id: &str) -> Result<Conversation, ApiError> {
        if id.trim().is_empty() {
            return Err(ApiError::InvalidConversationId);
        }
        let url = self.endpoint(&["conversations", id])?;
        let resp = self.http.get(url).send().await?;
        let resp = Self::check(resp, "Failed to fetch conversation").await?;
        Self::decode(resp).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), ApiError> {
        if id.trim().is_empty() {
            return Err(ApiError::InvalidConversationId);
        }
        let url = self.endpoint(&["conversations", id])?;
        let resp = self.http.delete(url).send().await?;
        Self::check(resp, "Failed to delete conversation").await?;
        Ok(())
    }

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<(), ApiError> {
        if id.trim().is_empty() {
            return Err(ApiError::InvalidConversationId);
        }
        let url = self.endpoint(&["conversations", id, "title"])?;
        let resp = self.http.put(url).json(&(RenameRequest { title })).send().await?;
        Self::check(resp, "Failed to rename conversation").await?;
        Ok(())
    }

    async fn add_message(
        &self,
        conversation_id: &str,
        content: &str
    ) -> Result<MessageExchange, ApiError> {
        if conversation_id.trim().is_empty() {
            return Err(ApiError::InvalidConversationId);
        }
        if content.trim().is_empty() {
            return Err(ApiError::InvalidContent);
        }

        debug!("Sending message to conversation {}", conversation_id);
        let url = self.endpoint(&["conversations", conversation_id, "messages"])?;
        let resp = self.http.post(url).json(&(NewMessageRequest { content })).send().await?;
        let resp = Self::check(resp, "Failed to add message").await?;
        let body: MessageExchangeBody = Self::decode(resp).await?;
        body.into_exchange().ok_or_else(||
            ApiError::InvalidResponse("expected userMessage and aiMessage".to_string())
        )
    }

    async fn suggested_topics(&self) -> Result<Vec<String>, ApiError> {
        let url = self.endpoint(&["suggested-topics"])?;
        let resp = self.http.get(url).send().await?;
        let resp = Self::check(resp, "Failed to fetch suggested topics").await?;
        let body: TopicsResponse = Self::decode(resp).await?;
        Ok(body.topics)
    }
}
