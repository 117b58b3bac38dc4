use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid API URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{message}")]
    Status {
        status: StatusCode,
        message: String,
    },

    #[error("Invalid conversation ID: ID is missing")]
    InvalidConversationId,

    #[error("Invalid message content")]
    InvalidContent,

    #[error("Invalid response format from server: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(e) => e.status(),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Title is required")]
    InvalidTitle,

    #[error("Still waiting for a reply in conversation {0}")]
    ResponsePending(String),

    #[error("Conversation has reached the limit of {limit} messages")]
    MessageLimitReached {
        limit: usize,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;
