use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use std::collections::HashSet;
use std::sync::{ Arc, Mutex };
use std::time::Duration;
use tokio::sync::Semaphore;

use emotion_insights::api::ConversationApi;
use emotion_insights::error::{ ApiError, StoreError };
use emotion_insights::models::chat::{ Analysis, Conversation, Message, MessageExchange, Role };
use emotion_insights::notify::{ Notifier, Toast, ToastVariant };
use emotion_insights::store::{ ConversationStore, StoreLimits };

#[derive(Default)]
struct Backend {
    conversations: Vec<Conversation>,
    next_id: usize,
    rename_calls: usize,
}

/// In-memory stand-in for the backend. Operations named in `failing`
/// answer with a 500; sends wait on `gate` when one is installed.
#[derive(Default)]
struct FakeApi {
    backend: Mutex<Backend>,
    failing: Mutex<HashSet<&'static str>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeApi {
    fn gated(gate: Arc<Semaphore>) -> Self {
        Self { gate: Some(gate), ..Default::default() }
    }

    fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    fn check(&self, op: &'static str) -> Result<(), ApiError> {
        if self.failing.lock().unwrap().contains(op) {
            return Err(ApiError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("{} exploded", op),
            });
        }
        Ok(())
    }

    fn not_found() -> ApiError {
        ApiError::Status {
            status: StatusCode::NOT_FOUND,
            message: "Conversation not found".to_string(),
        }
    }

    fn rename_calls(&self) -> usize {
        self.backend.lock().unwrap().rename_calls
    }
}

#[async_trait]
impl ConversationApi for FakeApi {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.check("list")?;
        let backend = self.backend.lock().unwrap();
        Ok(backend.conversations
            .iter()
            .map(|c| {
                let mut summary = c.clone();
                summary.last_message = c.messages.last().map(|m| m.content.clone());
                summary.messages.clear();
                summary
            })
            .collect())
    }

    async fn create_conversation(&self) -> Result<Conversation, ApiError> {
        self.check("create")?;
        let mut backend = self.backend.lock().unwrap();
        backend.next_id += 1;
        let conversation = Conversation::new(
            format!("conv-{}", backend.next_id),
            format!("Chat {}", backend.next_id)
        );
        backend.conversations.insert(0, conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(&self, id: &str) -> Result<Conversation, ApiError> {
        self.check("get")?;
        let backend = self.backend.lock().unwrap();
        backend.conversations.iter().find(|c| c.id == id).cloned().ok_or_else(Self::not_found)
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), ApiError> {
        self.check("delete")?;
        let mut backend = self.backend.lock().unwrap();
        let before = backend.conversations.len();
        backend.conversations.retain(|c| c.id != id);
        if backend.conversations.len() == before {
            return Err(Self::not_found());
        }
        Ok(())
    }

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<(), ApiError> {
        self.check("rename")?;
        let mut backend = self.backend.lock().unwrap();
        backend.rename_calls += 1;
        let conversation = backend.conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(Self::not_found)?;
        conversation.title = title.to_string();
        Ok(())
    }

    async fn add_message(
        &self,
        conversation_id: &str,
        content: &str
    ) -> Result<MessageExchange, ApiError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.check("send")?;

        let mut backend = self.backend.lock().unwrap();
        backend.next_id += 1;
        let n = backend.next_id;
        let Some(conversation) = backend.conversations.iter_mut().find(|c| c.id == conversation_id) else {
            return Err(Self::not_found());
        };
        let user_message = Message {
            id: format!("user-{}", n),
            role: Role::User,
            content: content.to_string(),
            timestamp: Utc::now(),
            analysis: None,
        };
        let ai_message = Message {
            id: format!("agent-{}", n),
            role: Role::Agent,
            content: format!("It sounds like '{}' matters to you.", content),
            timestamp: Utc::now(),
            analysis: Some(Analysis {
                emotional_tone: "reflective".to_string(),
                follow_up_questions: vec!["What would help right now?".to_string()],
                ..Default::default()
            }),
        };
        conversation.messages.push(user_message.clone());
        conversation.messages.push(ai_message.clone());
        Ok(MessageExchange { user_message, ai_message })
    }

    async fn suggested_topics(&self) -> Result<Vec<String>, ApiError> {
        self.check("topics")?;
        Ok(vec!["How are you feeling today?".to_string(), "What brings you joy?".to_string()])
    }
}

#[derive(Default)]
struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingNotifier {
    fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, toast: Toast) {
        self.toasts.lock().unwrap().push(toast);
    }
}

fn store_with(api: Arc<FakeApi>, limits: StoreLimits) -> (ConversationStore, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let store = ConversationStore::new(api, notifier.clone(), limits);
    (store, notifier)
}

fn setup() -> (Arc<FakeApi>, ConversationStore, Arc<RecordingNotifier>) {
    let api = Arc::new(FakeApi::default());
    let (store, notifier) = store_with(api.clone(), StoreLimits::default());
    (api, store, notifier)
}

async fn wait_until_pending(store: &ConversationStore, id: &str) {
    for _ in 0..400 {
        if store.is_awaiting_response(id).await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("send to {} never went in flight", id);
}

#[tokio::test]
async fn creating_with_initial_message_yields_one_exchange() {
    let (_api, store, notifier) = setup();

    let id = store.create_conversation(Some("  I had a rough day  ")).await.unwrap();

    let conversation = store.conversation(&id).await.unwrap();
    assert_eq!(conversation.messages.len(), 2);
    assert_eq!(conversation.messages[0].role, Role::User);
    assert_eq!(conversation.messages[0].content, "I had a rough day");
    assert_eq!(conversation.messages[1].role, Role::Agent);
    assert_eq!(conversation.last_message.as_deref(), Some(conversation.messages[1].content.as_str()));
    assert_eq!(conversation.last_message_time, Some(conversation.messages[1].timestamp));
    assert_eq!(store.active_conversation_id().await.as_deref(), Some(id.as_str()));
    assert!(!store.is_loading_ai_response().await);
    assert!(notifier.toasts().is_empty());
}

#[tokio::test]
async fn new_conversations_go_first_and_become_active() {
    let (_api, store, _notifier) = setup();

    let first = store.create_conversation(None).await.unwrap();
    let second = store.create_conversation(Some("   ")).await.unwrap();

    let ids: Vec<String> = store.conversations().await.into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![second.clone(), first]);
    assert_eq!(store.active_conversation().await.unwrap().id, second);
    assert!(store.active_conversation().await.unwrap().messages.is_empty());
}

#[tokio::test]
async fn failed_create_reports_and_leaves_state_alone() {
    let (api, store, notifier) = setup();
    api.fail("create");

    let err = store.create_conversation(Some("hello")).await.unwrap_err();

    assert!(matches!(err, StoreError::Api(_)));
    assert!(store.conversations().await.is_empty());
    assert_eq!(store.active_conversation_id().await, None);
    let toasts = notifier.toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].description, "Failed to create conversation. Please try again.");
    assert!(toasts[0].is_destructive());
}

#[tokio::test]
async fn failed_initial_message_still_returns_the_conversation() {
    let (api, store, notifier) = setup();
    api.fail("send");

    let id = store.create_conversation(Some("hello")).await.unwrap();

    let conversation = store.conversation(&id).await.unwrap();
    assert!(conversation.messages.is_empty());
    assert!(!store.is_awaiting_response(&id).await);
    let toasts = notifier.toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].description, "Failed to send initial message. Please try again.");
}

#[tokio::test]
async fn failed_send_restores_the_pre_send_state() {
    let (api, store, notifier) = setup();
    let id = store.create_conversation(Some("first")).await.unwrap();
    let before = store.conversation(&id).await.unwrap();

    api.fail("send");
    let err = store.add_message(&id, "second").await.unwrap_err();

    assert!(matches!(err, StoreError::Api(ApiError::Status { .. })));
    let after = store.conversation(&id).await.unwrap();
    assert_eq!(after.messages, before.messages);
    assert_eq!(after.updated_at, before.updated_at);
    assert!(!store.is_loading_ai_response().await);

    let toasts = notifier.toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].title, "Error");
    assert_eq!(toasts[0].description, "send exploded");
}

#[tokio::test]
async fn provisional_entry_is_visible_while_waiting() {
    let gate = Arc::new(Semaphore::new(0));
    let api = Arc::new(FakeApi::gated(gate.clone()));
    let (store, _notifier) = store_with(api, StoreLimits::default());
    let store = Arc::new(store);

    gate.add_permits(1);
    let id = store.create_conversation(Some("first")).await.unwrap();

    let sender = {
        let store = store.clone();
        let id = id.clone();
        tokio::spawn(async move { store.add_message(&id, "second").await })
    };
    wait_until_pending(&store, &id).await;

    let pending = store.conversation(&id).await.unwrap();
    assert_eq!(pending.messages.len(), 3);
    let last = pending.messages.last().unwrap();
    assert!(last.is_provisional());
    assert_eq!(last.content, "second");
    assert!(store.is_loading_ai_response().await);

    let refused = store.add_message(&id, "third").await.unwrap_err();
    assert!(matches!(refused, StoreError::ResponsePending(ref pending_id) if pending_id == &id));

    gate.add_permits(1);
    let exchange = sender.await.unwrap().unwrap();

    let settled = store.conversation(&id).await.unwrap();
    assert_eq!(settled.messages.len(), 4);
    assert!(settled.messages.iter().all(|m| !m.is_provisional()));
    assert_eq!(settled.messages[2], exchange.user_message);
    assert_eq!(settled.messages[3], exchange.ai_message);
    assert!(!store.is_loading_ai_response().await);
}

#[tokio::test]
async fn select_during_a_send_keeps_the_provisional_entry() {
    let gate = Arc::new(Semaphore::new(0));
    let api = Arc::new(FakeApi::gated(gate.clone()));
    let (store, _notifier) = store_with(api, StoreLimits::default());
    let store = Arc::new(store);

    let id = store.create_conversation(None).await.unwrap();
    let sender = {
        let store = store.clone();
        let id = id.clone();
        tokio::spawn(async move { store.add_message(&id, "hello").await })
    };
    wait_until_pending(&store, &id).await;

    store.select_conversation(Some(&id)).await.unwrap();
    let pending = store.conversation(&id).await.unwrap();
    assert_eq!(pending.messages.len(), 1);
    assert!(pending.messages[0].is_provisional());

    gate.add_permits(1);
    let exchange = sender.await.unwrap().unwrap();

    let settled = store.conversation(&id).await.unwrap();
    assert_eq!(settled.messages, vec![exchange.user_message, exchange.ai_message]);
}

#[tokio::test]
async fn load_during_a_send_keeps_local_messages() {
    let gate = Arc::new(Semaphore::new(0));
    let api = Arc::new(FakeApi::gated(gate.clone()));
    let (store, _notifier) = store_with(api, StoreLimits::default());
    let store = Arc::new(store);

    let id = store.create_conversation(None).await.unwrap();
    let sender = {
        let store = store.clone();
        let id = id.clone();
        tokio::spawn(async move { store.add_message(&id, "hello").await })
    };
    wait_until_pending(&store, &id).await;

    store.load().await.unwrap();
    let pending = store.conversation(&id).await.unwrap();
    assert_eq!(pending.messages.len(), 1);
    assert!(pending.messages[0].id.starts_with("temp-"));

    gate.add_permits(1);
    let exchange = sender.await.unwrap().unwrap();

    let settled = store.conversation(&id).await.unwrap();
    assert_eq!(settled.messages, vec![exchange.user_message, exchange.ai_message]);
    assert!(!store.is_awaiting_response(&id).await);
}

#[tokio::test]
async fn reply_for_a_deleted_conversation_is_dropped() {
    let gate = Arc::new(Semaphore::new(0));
    let api = Arc::new(FakeApi::gated(gate.clone()));
    let (store, _notifier) = store_with(api.clone(), StoreLimits::default());
    let store = Arc::new(store);

    let id = store.create_conversation(None).await.unwrap();
    let sender = {
        let store = store.clone();
        let id = id.clone();
        tokio::spawn(async move { store.add_message(&id, "anyone there?").await })
    };
    wait_until_pending(&store, &id).await;

    store.delete_conversation(&id).await.unwrap();
    // Let the held request still find its conversation server-side.
    api.backend.lock().unwrap().conversations.push(Conversation::new(id.clone(), "ghost".into()));
    gate.add_permits(1);

    assert!(sender.await.unwrap().is_ok());
    assert!(store.conversation(&id).await.is_none());
    assert!(!store.is_awaiting_response(&id).await);
}

#[tokio::test]
async fn long_conversation_warning_does_not_block() {
    let api = Arc::new(FakeApi::default());
    let limits = StoreLimits { history_warning_threshold: 2, message_limit: 0 };
    let (store, notifier) = store_with(api, limits);

    let id = store.create_conversation(Some("one")).await.unwrap();
    assert!(notifier.toasts().is_empty());

    store.add_message(&id, "two").await.unwrap();

    let toasts = notifier.toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].title, "Long Conversation");
    assert_eq!(toasts[0].variant, ToastVariant::Default);
    assert_eq!(store.conversation(&id).await.unwrap().messages.len(), 4);
}

#[tokio::test]
async fn message_limit_refuses_further_sends() {
    let api = Arc::new(FakeApi::default());
    let limits = StoreLimits { history_warning_threshold: 100, message_limit: 4 };
    let (store, notifier) = store_with(api, limits);

    let id = store.create_conversation(Some("one")).await.unwrap();
    store.add_message(&id, "two").await.unwrap();
    let err = store.add_message(&id, "three").await.unwrap_err();

    assert!(matches!(err, StoreError::MessageLimitReached { limit: 4 }));
    assert_eq!(store.conversation(&id).await.unwrap().messages.len(), 4);
    assert_eq!(notifier.toasts().last().unwrap().title, "Conversation Limit");
}

#[tokio::test]
async fn local_refusals_do_not_toast() {
    let (_api, store, notifier) = setup();
    let id = store.create_conversation(None).await.unwrap();

    let missing = store.add_message("nope", "hello").await.unwrap_err();
    assert!(matches!(missing, StoreError::ConversationNotFound(ref m) if m == "nope"));

    let blank = store.add_message(&id, "   ").await.unwrap_err();
    assert!(matches!(blank, StoreError::EmptyMessage));

    assert!(store.conversation(&id).await.unwrap().messages.is_empty());
    assert!(notifier.toasts().is_empty());
}

#[tokio::test]
async fn deleting_the_active_conversation_clears_selection() {
    let (_api, store, _notifier) = setup();
    let older = store.create_conversation(None).await.unwrap();
    let active = store.create_conversation(None).await.unwrap();

    store.delete_conversation(&older).await.unwrap();
    assert_eq!(store.active_conversation_id().await.as_deref(), Some(active.as_str()));

    store.delete_conversation(&active).await.unwrap();
    assert_eq!(store.active_conversation_id().await, None);
    assert!(store.active_conversation().await.is_none());
    assert!(store.conversations().await.is_empty());
}

#[tokio::test]
async fn failed_delete_keeps_the_conversation() {
    let (api, store, notifier) = setup();
    let id = store.create_conversation(None).await.unwrap();
    api.fail("delete");

    assert!(store.delete_conversation(&id).await.is_err());
    assert!(store.conversation(&id).await.is_some());
    assert_eq!(store.active_conversation_id().await.as_deref(), Some(id.as_str()));
    assert_eq!(notifier.toasts()[0].description, "Failed to delete conversation. Please try again.");
}

#[tokio::test]
async fn renaming_touches_only_the_title() {
    let (api, store, _notifier) = setup();
    let id = store.create_conversation(Some("hello")).await.unwrap();
    let before = store.conversation(&id).await.unwrap();

    store.rename_conversation(&id, "  Work stress ").await.unwrap();

    let after = store.conversation(&id).await.unwrap();
    assert_eq!(after.title, "Work stress");
    assert_eq!(after.messages, before.messages);
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(after.last_message, before.last_message);
    assert_eq!(api.rename_calls(), 1);

    store.rename_conversation(&id, "Work stress").await.unwrap();
    assert_eq!(api.rename_calls(), 1);

    let blank = store.rename_conversation(&id, "   ").await.unwrap_err();
    assert!(matches!(blank, StoreError::InvalidTitle));
}

#[tokio::test]
async fn failed_rename_keeps_the_old_title() {
    let (api, store, notifier) = setup();
    let id = store.create_conversation(None).await.unwrap();
    let title = store.conversation(&id).await.unwrap().title;
    api.fail("rename");

    assert!(store.rename_conversation(&id, "New name").await.is_err());
    assert_eq!(store.conversation(&id).await.unwrap().title, title);
    assert_eq!(notifier.toasts().len(), 1);
}

#[tokio::test]
async fn load_and_select_mirror_the_server() {
    let (api, store, _notifier) = setup();
    let id = store.create_conversation(Some("hello")).await.unwrap();

    let (fresh_store, _) = store_with(api.clone(), StoreLimits::default());
    fresh_store.load().await.unwrap();
    let listed = fresh_store.conversation(&id).await.unwrap();
    assert!(listed.messages.is_empty());
    assert!(listed.last_message.is_some());
    assert_eq!(fresh_store.active_conversation_id().await, None);

    fresh_store.select_conversation(Some(&id)).await.unwrap();
    assert_eq!(fresh_store.active_conversation().await.unwrap().messages.len(), 2);

    fresh_store.select_conversation(None).await.unwrap();
    assert_eq!(fresh_store.active_conversation_id().await, None);
}

#[tokio::test]
async fn failed_select_keeps_the_selection() {
    let (api, store, notifier) = setup();
    let id = store.create_conversation(None).await.unwrap();
    store.select_conversation(None).await.unwrap();
    api.fail("get");

    assert!(store.select_conversation(Some(&id)).await.is_err());
    assert_eq!(store.active_conversation_id().await.as_deref(), Some(id.as_str()));
    assert_eq!(notifier.toasts()[0].description, "Failed to load conversation. Please try again.");
}

#[tokio::test]
async fn failed_load_is_reported() {
    let (api, store, notifier) = setup();
    api.fail("list");

    assert!(store.load().await.is_err());
    assert_eq!(notifier.toasts()[0].description, "Failed to load conversations. Please try again.");
}

#[tokio::test]
async fn suggested_topics_are_cached() {
    let (api, store, notifier) = setup();

    let topics = store.suggested_topics().await.unwrap();
    assert_eq!(topics.len(), 2);
    assert_eq!(store.cached_topics().await, topics);

    api.fail("topics");
    assert!(store.suggested_topics().await.is_err());
    assert_eq!(store.cached_topics().await, topics);
    assert_eq!(notifier.toasts().len(), 1);
}
