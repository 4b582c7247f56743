//! Where settings and conversation history live.
//!
//! Local storage is always written. When a user is signed in the remote
//! backend is also written and is the one loads are served from. Write
//! failures are logged and swallowed; a failed remote write leaves the local
//! copy as the latest state.

mod error;
mod local;
mod remote;
mod store;

pub use error::{PersistenceError, RemoteError};
pub use local::{
    LocalBackend, AUTH_TOKEN_KEY, CONVERSATIONS_KEY, CURRENT_CONVERSATION_KEY,
    MAX_LOCAL_CONVERSATIONS, SETTINGS_KEY,
};
pub use remote::{HttpRemoteBackend, RemoteBackend};
pub use store::{FileStore, KeyValueStore, MemoryStore};

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::auth::AuthState;
use crate::core::conversation::{Conversation, ConversationPatch};
use crate::core::message::Message;
use crate::core::settings::Settings;

/// Everything needed to resume: preferences, saved conversations and the
/// scratch conversation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Profile {
    pub settings: Settings,
    pub conversations: Vec<Conversation>,
    pub active_messages: Vec<Message>,
}

#[derive(Clone)]
pub struct PersistenceGateway {
    local: LocalBackend,
    remote: Option<Arc<dyn RemoteBackend>>,
    auth: AuthState,
}

impl PersistenceGateway {
    pub fn new(
        local: LocalBackend,
        remote: Option<Arc<dyn RemoteBackend>>,
        auth: AuthState,
    ) -> Self {
        Self {
            local,
            remote,
            auth,
        }
    }

    pub fn local(&self) -> &LocalBackend {
        &self.local
    }

    /// The remote backend and token when it is authoritative.
    fn remote_session(&self) -> Option<(&Arc<dyn RemoteBackend>, String)> {
        let remote = self.remote.as_ref()?;
        let identity = self.auth.current()?;
        Some((remote, identity.token))
    }

    pub fn is_remote_active(&self) -> bool {
        self.remote_session().is_some()
    }

    /// Loads from the remote backend when signed in, otherwise (or when the
    /// remote read fails) from local storage. Unreadable local data yields
    /// defaults so the caller can start a fresh conversation.
    pub async fn load_profile(&self) -> Profile {
        if let Some((remote, token)) = self.remote_session() {
            match load_remote_profile(remote.as_ref(), &token).await {
                Ok((settings, conversations, active_messages)) => {
                    let settings = settings.unwrap_or_else(|| self.load_local_settings());
                    let active_messages = if settings.persist_history {
                        active_messages
                    } else {
                        Vec::new()
                    };
                    return Profile {
                        settings,
                        conversations,
                        active_messages,
                    };
                }
                Err(err) => warn!("remote profile load failed, using local copy: {err}"),
            }
        }
        self.load_local_profile()
    }

    fn load_local_settings(&self) -> Settings {
        match self.local.load_settings() {
            Ok(settings) => settings.unwrap_or_default(),
            Err(err) => {
                warn!("failed to load settings: {err}");
                Settings::default()
            }
        }
    }

    fn load_local_profile(&self) -> Profile {
        let settings = self.load_local_settings();
        let conversations = self.local.load_conversations().unwrap_or_else(|err| {
            warn!("failed to load conversations: {err}");
            Vec::new()
        });
        let active_messages = if settings.persist_history {
            self.local.load_current().unwrap_or_else(|err| {
                warn!("failed to load current conversation: {err}");
                Vec::new()
            })
        } else {
            Vec::new()
        };
        Profile {
            settings,
            conversations,
            active_messages,
        }
    }

    /// Saved conversations from the authoritative backend.
    pub async fn list_conversations(&self) -> Vec<Conversation> {
        if let Some((remote, token)) = self.remote_session() {
            match remote.list_conversations(&token).await {
                Ok(conversations) => return conversations,
                Err(err) => warn!("remote conversation list failed, using local copy: {err}"),
            }
        }
        self.local.load_conversations().unwrap_or_else(|err| {
            warn!("failed to load conversations: {err}");
            Vec::new()
        })
    }

    pub async fn save_active_messages(&self, messages: &[Message]) {
        if let Err(err) = self.local.save_current(messages) {
            warn!("failed to save current conversation locally: {err}");
        }
        if let Some((remote, token)) = self.remote_session() {
            let result = if messages.is_empty() {
                remote.clear_current(&token).await
            } else {
                remote.save_current(&token, messages).await
            };
            if let Err(err) = result {
                warn!("failed to save current conversation remotely: {err}");
            }
        }
    }

    pub async fn clear_active_messages(&self) {
        self.save_active_messages(&[]).await;
    }

    /// Stores a new conversation and returns it as stored. When signed in
    /// the remote copy wins and may carry a server-assigned id; the local
    /// mirror uses the same id.
    pub async fn save_conversation(&self, conversation: Conversation) -> Conversation {
        let mut stored = conversation;
        if let Some((remote, token)) = self.remote_session() {
            match remote.create_conversation(&token, &stored).await {
                Ok(saved) => stored = saved,
                Err(err) => warn!("failed to save conversation remotely: {err}"),
            }
        }
        if let Err(err) = self.local.upsert_conversation(&stored) {
            warn!("failed to save conversation locally: {err}");
        }
        debug!(conversation = %stored.id, "conversation saved");
        stored
    }

    pub async fn update_conversation(&self, id: &str, patch: ConversationPatch) {
        if patch.is_empty() {
            return;
        }
        match self.local.update_conversation(id, &patch) {
            Ok(true) => {}
            Ok(false) => debug!(conversation = %id, "no local copy to update"),
            Err(err) => warn!("failed to update conversation locally: {err}"),
        }
        if let Some((remote, token)) = self.remote_session() {
            if let Err(err) = remote.update_conversation(&token, id, &patch).await {
                warn!("failed to update conversation remotely: {err}");
            }
        }
    }

    pub async fn delete_conversation(&self, id: &str) {
        if let Err(err) = self.local.delete_conversation(id) {
            warn!("failed to delete conversation locally: {err}");
        }
        if let Some((remote, token)) = self.remote_session() {
            if let Err(err) = remote.delete_conversation(&token, id).await {
                warn!("failed to delete conversation remotely: {err}");
            }
        }
    }

    pub async fn save_settings(&self, settings: &Settings) {
        if let Err(err) = self.local.save_settings(settings) {
            warn!("failed to save settings locally: {err}");
        }
        if let Some((remote, token)) = self.remote_session() {
            if let Err(err) = remote.save_settings(&token, settings).await {
                warn!("failed to save settings remotely: {err}");
            }
        }
    }

    /// Wipes local history and settings. Remote data is left alone.
    pub fn clear_local(&self) {
        if let Err(err) = self.local.clear_all() {
            warn!("failed to clear local data: {err}");
        }
    }
}

async fn load_remote_profile(
    remote: &dyn RemoteBackend,
    token: &str,
) -> Result<(Option<Settings>, Vec<Conversation>, Vec<Message>), RemoteError> {
    let settings = remote.load_settings(token).await?;
    let conversations = remote.list_conversations(token).await?;
    let active_messages = remote.load_current(token).await?;
    Ok((settings, conversations, active_messages))
}

#[cfg(test)]
mod tests;
