//! The conversation store: the canonical list of conversations, the
//! selected conversation and model, and the send/edit protocol that
//! keeps them consistent.
pub mod models;
pub mod storage;

pub use models::{Conversation, Message};
pub use storage::{MemoryStorage, SqliteStorage, Storage};

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::ai::title::fallback_title;
use crate::ai::{MessageExchangeService, TitleSummarizer};
use crate::openai::{self, Role};

/// Key the conversation list is persisted under.
pub const STORAGE_KEY: &str = "conversations";

pub const SEND_FAILED_MESSAGE: &str = "抱歉，发送消息时出现错误。请稍后重试。";
pub const RESEND_FAILED_MESSAGE: &str = "抱歉，重新发送消息时出现错误。请稍后重试。";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Sending,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("conversation {0} already has an exchange in flight")]
    Busy(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExchangeKind {
    Send,
    Edit,
}

/// Everything an exchange needs once the store lock is released.
struct PendingExchange {
    history: Vec<openai::Message>,
    model: String,
    user_content: String,
    first_exchange: bool,
}

struct StoreState {
    // Most recent first
    conversations: Arc<Vec<Conversation>>,
    selected_id: Option<String>,
    active_model: String,
    sending: HashSet<String>,
}

pub struct ConversationStore {
    state: RwLock<StoreState>,
    storage: Arc<dyn Storage>,
    exchange: MessageExchangeService,
    summarizer: TitleSummarizer,
    persist_lock: tokio::sync::Mutex<()>,
}

impl ConversationStore {
    /// Loads the persisted conversations and selects the most recent
    /// one. Missing or unreadable data yields an empty store.
    pub async fn open(
        storage: Arc<dyn Storage>,
        exchange: MessageExchangeService,
        summarizer: TitleSummarizer,
        default_model: &str,
    ) -> Self {
        let conversations = load_conversations(storage.as_ref()).await;
        let selected = conversations.first();
        let selected_id = selected.map(|c| c.id.clone());
        let active_model = selected
            .map(|c| c.model.clone())
            .unwrap_or_else(|| default_model.to_string());
        tracing::debug!("Loaded {} conversations", conversations.len());

        Self {
            state: RwLock::new(StoreState {
                conversations: Arc::new(conversations),
                selected_id,
                active_model,
                sending: HashSet::new(),
            }),
            storage,
            exchange,
            summarizer,
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// A snapshot of all conversations, most recent first. Later
    /// mutations never show through a snapshot.
    pub fn conversations(&self) -> Arc<Vec<Conversation>> {
        Arc::clone(&self.read().conversations)
    }

    pub fn conversation(&self, id: &str) -> Option<Conversation> {
        self.read().conversations.iter().find(|c| c.id == id).cloned()
    }

    pub fn current_conversation(&self) -> Option<Conversation> {
        let state = self.read();
        let id = state.selected_id.as_deref()?;
        state.conversations.iter().find(|c| c.id == id).cloned()
    }

    pub fn selected_id(&self) -> Option<String> {
        self.read().selected_id.clone()
    }

    pub fn active_model(&self) -> String {
        self.read().active_model.clone()
    }

    pub fn exchange_state(&self, conversation_id: &str) -> ExchangeState {
        if self.read().sending.contains(conversation_id) {
            ExchangeState::Sending
        } else {
            ExchangeState::Idle
        }
    }

    /// Creates an empty conversation bound to `model` at the head of
    /// the list and selects it.
    pub async fn create_conversation(&self, model: &str) -> Conversation {
        let conversation = Conversation::new(model);
        {
            let mut guard = self.write();
            let state = &mut *guard;
            Arc::make_mut(&mut state.conversations).insert(0, conversation.clone());
            state.selected_id = Some(conversation.id.clone());
            state.active_model = model.to_string();
        }
        tracing::debug!("Created conversation {} with model {}", conversation.id, model);

        self.persist().await;
        conversation
    }

    /// Selects `id` and makes its model the active one. Returns false
    /// and changes nothing if there is no such conversation.
    pub fn select_conversation(&self, id: &str) -> bool {
        let mut guard = self.write();
        let state = &mut *guard;
        let Some(conversation) = state.conversations.iter().find(|c| c.id == id) else {
            tracing::debug!("Ignoring selection of unknown conversation {}", id);
            return false;
        };
        state.active_model = conversation.model.clone();
        state.selected_id = Some(id.to_string());
        true
    }

    /// Removes `id`. When it was selected the selection moves to the
    /// head of the list, or to nothing if the list is now empty.
    pub async fn delete_conversation(&self, id: &str) -> bool {
        {
            let mut guard = self.write();
            let state = &mut *guard;
            if !state.conversations.iter().any(|c| c.id == id) {
                tracing::debug!("Ignoring deletion of unknown conversation {}", id);
                return false;
            }
            Arc::make_mut(&mut state.conversations).retain(|c| c.id != id);
            if state.selected_id.as_deref() == Some(id) {
                state.selected_id = state.conversations.first().map(|c| c.id.clone());
            }
        }
        tracing::debug!("Deleted conversation {}", id);

        self.persist().await;
        true
    }

    /// Changes the active model and rebinds the selected conversation
    /// to it. Messages already sent are left as they are.
    pub async fn set_active_model(&self, model_id: &str) {
        let rebound = {
            let mut guard = self.write();
            let state = &mut *guard;
            state.active_model = model_id.to_string();

            let index = state
                .selected_id
                .as_deref()
                .and_then(|id| state.conversations.iter().position(|c| c.id == id));
            match index {
                Some(index) => {
                    let conversation = &mut Arc::make_mut(&mut state.conversations)[index];
                    conversation.model = model_id.to_string();
                    conversation.touch();
                    true
                }
                None => false,
            }
        };

        if rebound {
            self.persist().await;
        }
    }

    /// Sends `content` in the selected conversation, creating one bound
    /// to the active model if nothing is selected.
    pub async fn send_message(&self, content: &str) -> Result<Option<Conversation>, StoreError> {
        let id = match self.current_conversation() {
            Some(conversation) => conversation.id,
            None => {
                let model = self.active_model();
                self.create_conversation(&model).await.id
            }
        };
        self.append_exchange(&id, content).await
    }

    /// Appends a user message to `conversation_id` and then exactly one
    /// assistant message: the reply, or an apology if the exchange
    /// failed. The first exchange of a conversation also sets its
    /// title.
    ///
    /// Returns the updated conversation, `Ok(None)` if the conversation
    /// does not exist (or was deleted while the exchange was in
    /// flight), and `StoreError::Busy` if it is already sending.
    pub async fn append_exchange(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> Result<Option<Conversation>, StoreError> {
        let user_message = Message::new(Role::User, content);
        let pending = self.begin_exchange(conversation_id, ExchangeKind::Send, |messages| {
            messages.push(user_message);
            true
        })?;
        match pending {
            Some(pending) => Ok(self.run_exchange(conversation_id, ExchangeKind::Send, pending).await),
            None => Ok(None),
        }
    }

    /// Replaces the content of `message_id`, drops every message after
    /// it and re-runs the exchange from there. The title is left
    /// alone. A missing conversation or message is a no-op.
    pub async fn edit_message(
        &self,
        conversation_id: &str,
        message_id: &str,
        new_content: &str,
    ) -> Result<Option<Conversation>, StoreError> {
        let pending = self.begin_exchange(conversation_id, ExchangeKind::Edit, |messages| {
            let Some(index) = messages.iter().position(|m| m.id == message_id) else {
                tracing::debug!("Ignoring edit of unknown message {}", message_id);
                return false;
            };
            let edited = messages[index].edited(new_content);
            messages.truncate(index);
            messages.push(edited);
            true
        })?;
        match pending {
            Some(pending) => Ok(self.run_exchange(conversation_id, ExchangeKind::Edit, pending).await),
            None => Ok(None),
        }
    }

    /// Applies `prepare` to the conversation's messages, marks it as
    /// sending and captures the round-trip context.
    fn begin_exchange<F>(
        &self,
        conversation_id: &str,
        kind: ExchangeKind,
        prepare: F,
    ) -> Result<Option<PendingExchange>, StoreError>
    where
        F: FnOnce(&mut Vec<Message>) -> bool,
    {
        let pending = {
            let mut guard = self.write();
            let state = &mut *guard;
            let Some(index) = state.conversations.iter().position(|c| c.id == conversation_id)
            else {
                tracing::debug!("Ignoring exchange for unknown conversation {}", conversation_id);
                return Ok(None);
            };
            if state.sending.contains(conversation_id) {
                return Err(StoreError::Busy(conversation_id.to_string()));
            }

            let mut messages = state.conversations[index].messages.clone();
            let first_exchange = kind == ExchangeKind::Send && messages.is_empty();
            if !prepare(&mut messages) {
                return Ok(None);
            }
            let user_content = messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();

            let conversation = &mut Arc::make_mut(&mut state.conversations)[index];
            conversation.messages = messages;
            conversation.touch();
            state.sending.insert(conversation_id.to_string());

            PendingExchange {
                history: conversation.history(),
                model: conversation.model.clone(),
                user_content,
                first_exchange,
            }
        };

        Ok(Some(pending))
    }

    async fn run_exchange(
        &self,
        conversation_id: &str,
        kind: ExchangeKind,
        pending: PendingExchange,
    ) -> Option<Conversation> {
        // The user message is already part of the conversation
        self.persist().await;

        let result = self.exchange.exchange(&pending.history, &pending.model).await;
        let (reply, title) = match result {
            Ok(content) => {
                let title = if pending.first_exchange {
                    Some(self.summarizer.summarize(&pending.user_content).await)
                } else {
                    None
                };
                (content, title)
            }
            Err(e) => {
                tracing::warn!(
                    "Exchange in conversation {} failed: {}",
                    conversation_id,
                    e
                );
                let apology = match kind {
                    ExchangeKind::Send => SEND_FAILED_MESSAGE,
                    ExchangeKind::Edit => RESEND_FAILED_MESSAGE,
                };
                let title = pending
                    .first_exchange
                    .then(|| fallback_title(&pending.user_content));
                (apology.to_string(), title)
            }
        };

        let reply = Message::new(Role::Assistant, &reply);
        let updated = self.finish_exchange(conversation_id, reply, title);
        self.persist().await;
        updated
    }

    /// Writes the assistant message into the conversation the exchange
    /// started on, regardless of what is selected now.
    fn finish_exchange(
        &self,
        conversation_id: &str,
        reply: Message,
        title: Option<String>,
    ) -> Option<Conversation> {
        let mut guard = self.write();
        let state = &mut *guard;
        state.sending.remove(conversation_id);

        let Some(index) = state.conversations.iter().position(|c| c.id == conversation_id) else {
            tracing::warn!(
                "Conversation {} was deleted before its reply arrived",
                conversation_id
            );
            return None;
        };

        let conversation = &mut Arc::make_mut(&mut state.conversations)[index];
        conversation.messages.push(reply);
        if let Some(title) = title {
            conversation.title = title;
        }
        conversation.touch();
        Some(conversation.clone())
    }

    /// Saves the whole list. Failures are logged and dropped.
    async fn persist(&self) {
        let _guard = self.persist_lock.lock().await;
        // Taken after the lock so the last save carries the newest list
        let snapshot = self.conversations();

        let json = match serde_json::to_string(snapshot.as_ref()) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize conversations: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.save(STORAGE_KEY, json).await {
            tracing::warn!("Failed to persist conversations: {}", e);
        }
    }
}

async fn load_conversations(storage: &dyn Storage) -> Vec<Conversation> {
    match storage.load(STORAGE_KEY).await {
        Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable stored conversations: {}", e);
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!("Failed to load stored conversations: {}", e);
            Vec::new()
        }
    }
}
