//! Plain-text views of conversations for the terminal.

use chrono::Local;
use std::fmt::Write;

use crate::models::chat::{ Analysis, Conversation, Message, Role };

const SNIPPET_LEN: usize = 25;

pub const THINKING: &str = "AI is thinking...";

fn truncate(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

/// Sidebar preview: the last message with its author, or the server's
/// cached last reply when the messages are not loaded.
pub fn snippet(conversation: &Conversation) -> String {
    if let Some(last) = conversation.messages.last() {
        return format!("{}: {}", last.role.label(), truncate(&last.content, SNIPPET_LEN));
    }
    match conversation.last_message.as_deref() {
        Some(text) if !text.is_empty() => {
            format!("{}: {}", Role::Agent.label(), truncate(text, SNIPPET_LEN))
        }
        _ => "No messages yet".to_string(),
    }
}

pub fn conversation_list(conversations: &[Conversation], active_id: Option<&str>) -> String {
    if conversations.is_empty() {
        return "No conversations yet. Type a message or /new to start one.\n".to_string();
    }
    let mut out = String::new();
    for (idx, conversation) in conversations.iter().enumerate() {
        let marker = if active_id == Some(conversation.id.as_str()) { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{}{:>3}. {}  |  {}",
            marker,
            idx + 1,
            conversation.title,
            snippet(conversation)
        );
    }
    out
}

fn bullet_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "    {}:", heading);
    for item in items {
        let _ = writeln!(out, "      - {}", item);
    }
}

pub fn analysis_panel(analysis: &Analysis) -> String {
    let mut out = String::new();
    if !analysis.emotional_tone.is_empty() {
        let _ = writeln!(out, "    Tone: {}", analysis.emotional_tone);
    }
    if !analysis.insights.is_empty() {
        let _ = writeln!(out, "    Insights: {}", analysis.insights);
    }
    bullet_list(&mut out, "Possible reasons", &analysis.possible_reasons);
    bullet_list(&mut out, "Suggestions", &analysis.suggestions);
    if !analysis.follow_up_questions.is_empty() {
        let _ = writeln!(out, "    Follow-up questions (/ask <n>):");
        for (idx, question) in analysis.follow_up_questions.iter().enumerate() {
            let _ = writeln!(out, "      {}. {}", idx + 1, question);
        }
    }
    out
}

pub fn message(message: &Message) -> String {
    let mut out = String::new();
    let time = message.timestamp.with_timezone(&Local).format("%H:%M");
    let pending = if message.is_provisional() { " (sending)" } else { "" };
    let _ = writeln!(out, "[{}] {}{}: {}", time, message.role.label(), pending, message.content);
    if let Some(analysis) = &message.analysis {
        out.push_str(&analysis_panel(analysis));
    }
    out
}

pub fn conversation(conversation: &Conversation, awaiting_reply: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", conversation.title);
    if conversation.messages.is_empty() {
        let _ = writeln!(out, "How are you feeling today? Share your thoughts or pick a starter with /topics.");
    }
    for msg in &conversation.messages {
        out.push_str(&message(msg));
    }
    let last_is_user = conversation.messages.last().is_some_and(|m| m.role == Role::User);
    if awaiting_reply && last_is_user {
        let _ = writeln!(out, "{}", THINKING);
    }
    out
}

pub fn topics(topics: &[String]) -> String {
    let mut out = String::new();
    if topics.is_empty() {
        return out;
    }
    let _ = writeln!(out, "Suggested starters (/new <n>):");
    for (idx, topic) in topics.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", idx + 1, topic);
    }
    out
}

pub fn welcome(suggested: &[String]) -> String {
    let mut out = String::from("Welcome to Emotion Insights\n");
    out.push_str(
        "Start a new chat to explore your feelings, or open an existing conversation with /list and /open.\n"
    );
    out.push_str(&topics(suggested));
    out
}

pub fn help() -> &'static str {
    "Commands:
  <text>             send to the active conversation (starts one if none is open)
  /new [text | n]    start a conversation, optionally with a message or the n-th starter
  /list              list conversations
  /open <n | id>     open a conversation
  /rename <title>    rename the active conversation
  /delete [n | id]   delete a conversation (default: the active one)
  /topics            show suggested starters
  /ask <n>           send the n-th follow-up question from the last reply
  /refresh           reload conversations from the server
  /help              show this help
  /quit              exit
"
}
