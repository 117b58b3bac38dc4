pub mod api;
pub mod cli;
pub mod error;
pub mod models;
pub mod notify;
pub mod store;
pub mod ui;

use api::HttpConversationApi;
use cli::Args;
use log::info;
use notify::{ LogNotifier, Notifier };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use store::ConversationStore;
use ui::ConsoleNotifier;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("API URL: {}", args.api_url);
    info!("Request Timeout: {}s", args.timeout_secs);
    info!("History Warning Threshold: {}", args.history_warning_threshold);
    info!("Message Limit: {}", args.message_limit);
    info!("-------------------------");

    let api = HttpConversationApi::new(&args.api_url, Duration::from_secs(args.timeout_secs))?;
    // One-shot commands report through the log; the interactive loop prints toasts inline.
    let notifier: Arc<dyn Notifier> = if args.command.is_some() {
        Arc::new(LogNotifier)
    } else {
        Arc::new(ConsoleNotifier)
    };
    let store = Arc::new(ConversationStore::new(Arc::new(api), notifier, args.limits()));

    match args.command {
        Some(command) => ui::commands::execute(&store, command).await?,
        None => ui::repl::run(store).await?,
    }

    Ok(())
}
