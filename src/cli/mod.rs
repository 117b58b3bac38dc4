use clap::{ Parser, Subcommand };

use crate::api::DEFAULT_API_URL;
use crate::store::{ StoreLimits, DEFAULT_HISTORY_WARNING_THRESHOLD, DEFAULT_MESSAGE_LIMIT };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Backend Args ---
    /// Base URL of the conversation backend API
    #[arg(long, env = "EMOTION_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Request timeout in seconds for backend calls. The backend waits on the LLM, so keep it generous.
    #[arg(long, env = "EMOTION_API_TIMEOUT", default_value = "30")]
    pub timeout_secs: u64,

    // --- Conversation Args ---
    /// Warn once a conversation grows past this many messages
    #[arg(long, env = "HISTORY_WARNING_THRESHOLD", default_value_t = DEFAULT_HISTORY_WARNING_THRESHOLD)]
    pub history_warning_threshold: usize,

    /// Hard cap on messages per conversation (0 disables it)
    #[arg(long, env = "MESSAGE_LIMIT", default_value_t = DEFAULT_MESSAGE_LIMIT)]
    pub message_limit: usize,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Args {
    pub fn limits(&self) -> StoreLimits {
        StoreLimits {
            history_warning_threshold: self.history_warning_threshold,
            message_limit: self.message_limit,
        }
    }
}

/// One-shot actions. Without a subcommand the interactive chat starts.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List conversations
    List,
    /// Print a conversation with its analyses
    Show {
        id: String,
    },
    /// Start a conversation, optionally with a first message
    New {
        message: Vec<String>,
    },
    /// Send a message to a conversation
    Send {
        id: String,
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Rename a conversation
    Rename {
        id: String,
        #[arg(required = true)]
        title: Vec<String>,
    },
    /// Delete a conversation
    Delete {
        id: String,
    },
    /// Show suggested conversation starters
    Topics,
}
