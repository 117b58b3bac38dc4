use console::style;
use indicatif::{ ProgressBar, ProgressStyle };
use log::debug;
use std::error::Error;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{ AsyncBufReadExt, BufReader };

use crate::error::StoreError;
use crate::store::ConversationStore;
use super::render;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Say(String),
    New(Option<String>),
    List,
    Open(String),
    Rename(String),
    Delete(Option<String>),
    Topics,
    Ask(usize),
    Refresh,
    Help,
    Quit,
    Invalid(String),
    Empty,
}

pub fn parse(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return ReplCommand::Say(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let arg = Some(arg).filter(|a| !a.is_empty()).map(str::to_string);

    match name.to_lowercase().as_str() {
        "new" => ReplCommand::New(arg),
        "list" | "ls" => ReplCommand::List,
        "open" =>
            match arg {
                Some(target) => ReplCommand::Open(target),
                None => ReplCommand::Invalid("Usage: /open <n | id>".to_string()),
            }
        "rename" =>
            match arg {
                Some(title) => ReplCommand::Rename(title),
                None => ReplCommand::Invalid("Usage: /rename <title>".to_string()),
            }
        "delete" | "rm" => ReplCommand::Delete(arg),
        "topics" => ReplCommand::Topics,
        "ask" =>
            match arg.as_deref().and_then(|a| a.parse::<usize>().ok()).filter(|n| *n > 0) {
                Some(n) => ReplCommand::Ask(n),
                None => ReplCommand::Invalid("Usage: /ask <n>".to_string()),
            }
        "refresh" => ReplCommand::Refresh,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        other => ReplCommand::Invalid(format!("Unknown command /{}. Type /help for a list.", other)),
    }
}

/// Backend failures were already shown as toasts; only local refusals
/// still need printing.
fn report(err: StoreError) {
    match err {
        StoreError::Api(e) => debug!("Backend call failed: {}", e),
        StoreError::MessageLimitReached { .. } => debug!("{}", err),
        other => eprintln!("{}", other),
    }
}

/// Accepts a 1-based position in the current list or a raw id.
async fn resolve_target(store: &ConversationStore, target: &str) -> String {
    if let Ok(n) = target.parse::<usize>() {
        let conversations = store.conversations().await;
        if let Some(conversation) = n.checked_sub(1).and_then(|idx| conversations.get(idx)) {
            return conversation.id.clone();
        }
    }
    target.to_string()
}

async fn show_active(store: &ConversationStore) {
    match store.active_conversation().await {
        Some(conversation) => {
            let awaiting = store.is_awaiting_response(&conversation.id).await;
            print!("{}", render::conversation(&conversation, awaiting));
        }
        None => print!("{}", render::welcome(&store.cached_topics().await)),
    }
}

async fn show_list(store: &ConversationStore) {
    let active = store.active_conversation_id().await;
    print!("{}", render::conversation_list(&store.conversations().await, active.as_deref()));
}

/// `/new <n>` picks the n-th suggested starter; other text is sent as is.
fn starter(arg: Option<String>, topics: &[String]) -> Result<Option<String>, String> {
    let Some(arg) = arg else {
        return Ok(None);
    };
    match arg.parse::<usize>() {
        Ok(n) =>
            n
                .checked_sub(1)
                .and_then(|idx| topics.get(idx))
                .map(|topic| Some(topic.clone()))
                .ok_or_else(|| format!("No starter #{}. /topics lists {} suggestion(s).", n, topics.len())),
        Err(_) => Ok(Some(arg)),
    }
}

/// Runs a store call behind a spinner. Once the store reports a reply in
/// flight, the provisional message is echoed and the spinner switches to the
/// thinking notice.
async fn with_spinner<F>(store: &ConversationStore, work: F) -> Result<(), StoreError>
    where F: Future<Output = Result<(), StoreError>>
{
    let pb = ProgressBar::new_spinner().with_message("Contacting backend...");
    if let Ok(spinner_style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(spinner_style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));

    tokio::pin!(work);
    let mut poll = tokio::time::interval(Duration::from_millis(100));
    let mut echoed = false;
    let result = loop {
        tokio::select! {
            result = &mut work => break result,
            _ = poll.tick(), if !echoed => {
                if store.is_loading_ai_response().await {
                    let pending = store
                        .active_conversation().await
                        .and_then(|c| c.messages.last().cloned());
                    if let Some(pending) = pending {
                        pb.println(render::message(&pending).trim_end());
                    }
                    pb.set_message(render::THINKING);
                    echoed = true;
                }
            }
        }
    };
    pb.finish_and_clear();
    result
}

async fn say(store: &ConversationStore, text: &str) {
    let result = with_spinner(store, async {
        match store.active_conversation_id().await {
            Some(id) => store.add_message(&id, text).await.map(|_| ()),
            None => store.create_conversation(Some(text)).await.map(|_| ()),
        }
    }).await;
    if let Err(e) = result {
        report(e);
    }
    show_active(store).await;
}

async fn prompt(store: &ConversationStore) -> std::io::Result<()> {
    let label = store
        .active_conversation().await
        .map(|c| c.title)
        .unwrap_or_else(|| "no conversation".to_string());
    let mut stdout = std::io::stdout();
    write!(stdout, "{} ", style(format!("[{}] >", label)).cyan())?;
    stdout.flush()
}

pub async fn run(store: Arc<ConversationStore>) -> Result<(), Box<dyn Error + Send + Sync>> {
    if let Err(e) = store.load().await {
        report(e);
    }
    if let Err(e) = store.suggested_topics().await {
        report(e);
    }
    show_active(&store).await;
    show_list(&store).await;
    println!("{}", style("Type /help for commands.").cyan());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(&store).await?;
        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match parse(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Say(text) => say(&store, &text).await,
            ReplCommand::New(arg) => {
                let initial = match starter(arg, &store.cached_topics().await) {
                    Ok(initial) => initial,
                    Err(msg) => {
                        eprintln!("{}", msg);
                        continue;
                    }
                };
                let result = with_spinner(&store, async {
                    store.create_conversation(initial.as_deref()).await.map(|_| ())
                }).await;
                if let Err(e) = result {
                    report(e);
                }
                show_active(&store).await;
            }
            ReplCommand::List => show_list(&store).await,
            ReplCommand::Open(target) => {
                let id = resolve_target(&store, &target).await;
                if let Err(e) = store.select_conversation(Some(&id)).await {
                    report(e);
                }
                show_active(&store).await;
            }
            ReplCommand::Rename(title) => {
                match store.active_conversation_id().await {
                    Some(id) => {
                        if let Err(e) = store.rename_conversation(&id, &title).await {
                            report(e);
                        }
                    }
                    None => eprintln!("Open a conversation first."),
                }
            }
            ReplCommand::Delete(target) => {
                let id = match target {
                    Some(t) => Some(resolve_target(&store, &t).await),
                    None => store.active_conversation_id().await,
                };
                match id {
                    Some(id) => {
                        if let Err(e) = store.delete_conversation(&id).await {
                            report(e);
                        }
                        show_list(&store).await;
                    }
                    None => eprintln!("Nothing to delete: no conversation is open."),
                }
            }
            ReplCommand::Topics => {
                if let Err(e) = store.suggested_topics().await {
                    report(e);
                }
                print!("{}", render::topics(&store.cached_topics().await));
            }
            ReplCommand::Ask(n) => {
                let question = store
                    .active_conversation().await
                    .and_then(|c| c.latest_analysis().and_then(|a| a.follow_up_questions.get(n - 1).cloned()));
                match question {
                    Some(q) => say(&store, &q).await,
                    None => eprintln!("No follow-up question #{} in the last reply.", n),
                }
            }
            ReplCommand::Refresh => {
                if let Err(e) = store.load().await {
                    report(e);
                }
                show_list(&store).await;
            }
            ReplCommand::Help => print!("{}", render::help()),
            ReplCommand::Invalid(msg) => eprintln!("{}", msg),
            ReplCommand::Quit => break,
        }
    }

    Ok(())
}
