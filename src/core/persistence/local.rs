use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::conversation::{Conversation, ConversationPatch};
use crate::core::message::Message;
use crate::core::persistence::error::PersistenceError;
use crate::core::persistence::store::KeyValueStore;
use crate::core::settings::Settings;

pub const SETTINGS_KEY: &str = "ai-chat-settings";
pub const CONVERSATIONS_KEY: &str = "ai-chat-conversations";
pub const CURRENT_CONVERSATION_KEY: &str = "ai-chat-current";
pub const AUTH_TOKEN_KEY: &str = "ai-chat-auth-token";

/// Most recent conversations kept locally.
pub const MAX_LOCAL_CONVERSATIONS: usize = 50;

/// Typed view over the key-value store.
#[derive(Clone)]
pub struct LocalBackend {
    store: Arc<dyn KeyValueStore>,
}

impl LocalBackend {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PersistenceError> {
        match self.store.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| PersistenceError::Serialize {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(value).map_err(|source| PersistenceError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.store.set(key, &raw)
    }

    pub fn load_settings(&self) -> Result<Option<Settings>, PersistenceError> {
        self.read(SETTINGS_KEY)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), PersistenceError> {
        self.write(SETTINGS_KEY, settings)
    }

    /// Saved conversations, most recent first.
    pub fn load_conversations(&self) -> Result<Vec<Conversation>, PersistenceError> {
        Ok(self.read(CONVERSATIONS_KEY)?.unwrap_or_default())
    }

    pub fn save_conversations(&self, conversations: &[Conversation]) -> Result<(), PersistenceError> {
        let capped = &conversations[..conversations.len().min(MAX_LOCAL_CONVERSATIONS)];
        self.write(CONVERSATIONS_KEY, capped)
    }

    /// Replaces a conversation with the same id in place, or puts a new one
    /// at the front. Only the newest 50 are kept.
    pub fn upsert_conversation(&self, conversation: &Conversation) -> Result<(), PersistenceError> {
        let mut conversations = self.load_conversations()?;
        match conversations.iter_mut().find(|c| c.id == conversation.id) {
            Some(existing) => *existing = conversation.clone(),
            None => conversations.insert(0, conversation.clone()),
        }
        self.save_conversations(&conversations)
    }

    /// Returns false when no conversation has that id.
    pub fn update_conversation(
        &self,
        id: &str,
        patch: &ConversationPatch,
    ) -> Result<bool, PersistenceError> {
        let mut conversations = self.load_conversations()?;
        let Some(existing) = conversations.iter_mut().find(|c| c.id == id) else {
            return Ok(false);
        };
        existing.apply_patch(patch.clone());
        self.save_conversations(&conversations)?;
        Ok(true)
    }

    pub fn delete_conversation(&self, id: &str) -> Result<(), PersistenceError> {
        let mut conversations = self.load_conversations()?;
        conversations.retain(|c| c.id != id);
        self.save_conversations(&conversations)
    }

    pub fn load_current(&self) -> Result<Vec<Message>, PersistenceError> {
        Ok(self.read(CURRENT_CONVERSATION_KEY)?.unwrap_or_default())
    }

    /// An empty list clears the slot.
    pub fn save_current(&self, messages: &[Message]) -> Result<(), PersistenceError> {
        if messages.is_empty() {
            return self.clear_current();
        }
        self.write(CURRENT_CONVERSATION_KEY, messages)
    }

    pub fn clear_current(&self) -> Result<(), PersistenceError> {
        self.store.remove(CURRENT_CONVERSATION_KEY)
    }

    pub fn load_token(&self) -> Result<Option<String>, PersistenceError> {
        self.store.get(AUTH_TOKEN_KEY)
    }

    pub fn save_token(&self, token: &str) -> Result<(), PersistenceError> {
        self.store.set(AUTH_TOKEN_KEY, token)
    }

    pub fn clear_token(&self) -> Result<(), PersistenceError> {
        self.store.remove(AUTH_TOKEN_KEY)
    }

    /// Removes settings, saved conversations and the scratch slot.
    pub fn clear_all(&self) -> Result<(), PersistenceError> {
        self.store.remove(SETTINGS_KEY)?;
        self.store.remove(CONVERSATIONS_KEY)?;
        self.store.remove(CURRENT_CONVERSATION_KEY)
    }
}
