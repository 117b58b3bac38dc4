//! Request and response bodies exchanged with the conversation backend.

use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };

use super::chat::{ default_title, timestamp, Conversation, Message, MessageExchange };

#[derive(Serialize, Debug)]
pub struct RenameRequest<'a> {
    pub title: &'a str,
}

#[derive(Serialize, Debug)]
pub struct NewMessageRequest<'a> {
    pub content: &'a str,
}

/// `POST /conversations` answers with `{ "id": <conversation> }`, where the
/// backend wraps the whole new conversation under `id`. Older deployments
/// send a bare id string or a flat conversation, so every field is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CreatedConversation {
    pub id: Option<CreatedId>,
    pub title: Option<String>,
    pub messages: Option<Vec<Message>>,
    #[serde(with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(with = "timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
    pub last_message: Option<String>,
    #[serde(with = "timestamp::option")]
    pub last_message_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum CreatedId {
    Id(String),
    Nested(Box<CreatedConversation>),
}

impl CreatedConversation {
    /// Lifts a conversation nested under `id` to the top level. Fields the
    /// nested object leaves out fall back to the outer ones.
    fn flatten(self) -> Self {
        match self.id {
            Some(CreatedId::Nested(inner)) => {
                let inner = inner.flatten();
                Self {
                    id: inner.id,
                    title: inner.title.or(self.title),
                    messages: inner.messages.or(self.messages),
                    created_at: inner.created_at.or(self.created_at),
                    updated_at: inner.updated_at.or(self.updated_at),
                    last_message: inner.last_message.or(self.last_message),
                    last_message_time: inner.last_message_time.or(self.last_message_time),
                }
            }
            id => Self { id, ..self },
        }
    }

    /// Fills the gaps of a partial response. Returns `None` when the server
    /// did not hand out an id.
    pub fn into_conversation(self) -> Option<Conversation> {
        let body = self.flatten();
        let id = match body.id {
            Some(CreatedId::Id(id)) if !id.trim().is_empty() => id,
            _ => {
                return None;
            }
        };
        let title = body.title.filter(|t| !t.trim().is_empty()).unwrap_or_else(default_title);
        let mut conversation = Conversation::new(id, title);
        if let Some(created_at) = body.created_at {
            conversation.created_at = created_at;
        }
        if let Some(updated_at) = body.updated_at {
            conversation.updated_at = updated_at;
        }
        conversation.messages = body.messages.unwrap_or_default();
        conversation.last_message = body.last_message;
        conversation.last_message_time = body.last_message_time;
        Some(conversation)
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageExchangeBody {
    pub user_message: Option<Message>,
    pub ai_message: Option<Message>,
}

impl MessageExchangeBody {
    pub fn into_exchange(self) -> Option<MessageExchange> {
        Some(MessageExchange {
            user_message: self.user_message?,
            ai_message: self.ai_message?,
        })
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct TopicsResponse {
    pub topics: Vec<String>,
}

/// Error payloads use `error` (backend) or `message` (proxies); either wins.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message.or(self.error).filter(|m| !m.trim().is_empty())
    }
}
