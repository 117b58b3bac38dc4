use log::debug;

use crate::cli::Command;
use crate::error::{ Result, StoreError };
use crate::store::ConversationStore;
use super::render;

pub async fn execute(store: &ConversationStore, command: Command) -> Result<()> {
    debug!("Running one-shot command {:?}", command);
    match command {
        Command::List => handle_list(store).await,
        Command::Show { id } => handle_show(store, &id).await,
        Command::New { message } => handle_new(store, &message.join(" ")).await,
        Command::Send { id, message } => handle_send(store, &id, &message.join(" ")).await,
        Command::Rename { id, title } => handle_rename(store, &id, &title.join(" ")).await,
        Command::Delete { id } => handle_delete(store, &id).await,
        Command::Topics => handle_topics(store).await,
    }
}

async fn handle_list(store: &ConversationStore) -> Result<()> {
    store.load().await?;
    let conversations = store.conversations().await;
    for conversation in &conversations {
        println!("{}\t{}\t{}", conversation.id, conversation.title, render::snippet(conversation));
    }
    Ok(())
}

async fn handle_show(store: &ConversationStore, id: &str) -> Result<()> {
    store.select_conversation(Some(id)).await?;
    let conversation = store
        .conversation(id).await
        .ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))?;
    print!("{}", render::conversation(&conversation, false));
    Ok(())
}

async fn handle_new(store: &ConversationStore, message: &str) -> Result<()> {
    let initial = Some(message).filter(|m| !m.trim().is_empty());
    let id = store.create_conversation(initial).await?;
    println!("Created conversation {}", id);
    if let Some(conversation) = store.conversation(&id).await {
        print!("{}", render::conversation(&conversation, false));
    }
    Ok(())
}

async fn handle_send(store: &ConversationStore, id: &str, message: &str) -> Result<()> {
    store.select_conversation(Some(id)).await?;
    let exchange = store.add_message(id, message).await?;
    print!("{}", render::message(&exchange.ai_message));
    Ok(())
}

async fn handle_rename(store: &ConversationStore, id: &str, title: &str) -> Result<()> {
    store.rename_conversation(id, title).await?;
    println!("Renamed conversation {} to \"{}\"", id, title.trim());
    Ok(())
}

async fn handle_delete(store: &ConversationStore, id: &str) -> Result<()> {
    store.delete_conversation(id).await?;
    println!("Deleted conversation {}", id);
    Ok(())
}

async fn handle_topics(store: &ConversationStore) -> Result<()> {
    let topics = store.suggested_topics().await?;
    print!("{}", render::topics(&topics));
    Ok(())
}
