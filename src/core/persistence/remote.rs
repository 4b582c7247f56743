use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::conversation::{Conversation, ConversationPatch};
use crate::core::message::Message;
use crate::core::persistence::error::RemoteError;
use crate::core::providers::summarize_api_error;
use crate::core::settings::Settings;
use crate::utils::url::{append_path_segment, construct_api_url};

/// Account-scoped storage. Every call carries the bearer token of the
/// signed-in user.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    async fn list_conversations(&self, token: &str) -> Result<Vec<Conversation>, RemoteError>;
    /// Returns the conversation as stored, which may carry a server id.
    async fn create_conversation(
        &self,
        token: &str,
        conversation: &Conversation,
    ) -> Result<Conversation, RemoteError>;
    async fn update_conversation(
        &self,
        token: &str,
        id: &str,
        patch: &ConversationPatch,
    ) -> Result<(), RemoteError>;
    async fn delete_conversation(&self, token: &str, id: &str) -> Result<(), RemoteError>;
    async fn load_settings(&self, token: &str) -> Result<Option<Settings>, RemoteError>;
    async fn save_settings(&self, token: &str, settings: &Settings) -> Result<(), RemoteError>;
    async fn load_current(&self, token: &str) -> Result<Vec<Message>, RemoteError>;
    async fn save_current(&self, token: &str, messages: &[Message]) -> Result<(), RemoteError>;
    async fn clear_current(&self, token: &str) -> Result<(), RemoteError>;
}

/// Conversation row as the server returns it.
#[derive(Debug, Deserialize)]
struct ConversationRow {
    id: String,
    title: String,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(alias = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(alias = "updatedAt")]
    updated_at: DateTime<Utc>,
    #[serde(default, alias = "userId")]
    user_id: Option<String>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            title: row.title,
            messages: row.messages,
            created_at: row.created_at,
            updated_at: row.updated_at,
            owner_id: row.user_id,
        }
    }
}

#[derive(Serialize)]
struct NewConversationBody<'a> {
    id: &'a str,
    title: &'a str,
    messages: &'a [Message],
}

#[derive(Serialize)]
struct SettingsBody<'a> {
    settings: &'a Settings,
}

#[derive(Serialize)]
struct MessagesBody<'a> {
    messages: &'a [Message],
}

/// REST client for the account backend (`/api/conversations`,
/// `/api/settings`, `/api/current-conversation`).
#[derive(Clone)]
pub struct HttpRemoteBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRemoteBackend {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    fn request(&self, method: Method, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, construct_api_url(&self.base_url, path))
            .bearer_auth(token)
    }

    fn conversation_url(&self, id: &str) -> Result<reqwest::Url, RemoteError> {
        let base = construct_api_url(&self.base_url, "api/conversations");
        append_path_segment(&base, id).ok_or(RemoteError::InvalidUrl(base))
    }

    async fn send(request: reqwest::RequestBuilder) -> Result<String, RemoteError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        check_status(status, &body)?;
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(
        request: reqwest::RequestBuilder,
    ) -> Result<T, RemoteError> {
        let body = Self::send(request).await?;
        serde_json::from_str(&body).map_err(|err| RemoteError::Decode(err.to_string()))
    }
}

pub(crate) fn check_status(status: StatusCode, body: &str) -> Result<(), RemoteError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RemoteError::Unauthorized);
    }
    if !status.is_success() {
        debug!(status = status.as_u16(), "remote request failed");
        return Err(RemoteError::Status {
            status: status.as_u16(),
            message: summarize_api_error(body),
        });
    }
    Ok(())
}

#[async_trait]
impl RemoteBackend for HttpRemoteBackend {
    async fn list_conversations(&self, token: &str) -> Result<Vec<Conversation>, RemoteError> {
        let rows: Vec<ConversationRow> =
            Self::send_json(self.request(Method::GET, "api/conversations", token)).await?;
        Ok(rows.into_iter().map(Conversation::from).collect())
    }

    async fn create_conversation(
        &self,
        token: &str,
        conversation: &Conversation,
    ) -> Result<Conversation, RemoteError> {
        let body = NewConversationBody {
            id: &conversation.id,
            title: &conversation.title,
            messages: &conversation.messages,
        };
        let row: ConversationRow = Self::send_json(
            self.request(Method::POST, "api/conversations", token)
                .json(&body),
        )
        .await?;
        Ok(row.into())
    }

    async fn update_conversation(
        &self,
        token: &str,
        id: &str,
        patch: &ConversationPatch,
    ) -> Result<(), RemoteError> {
        let url = self.conversation_url(id)?;
        Self::send(self.http.put(url).bearer_auth(token).json(patch)).await?;
        Ok(())
    }

    async fn delete_conversation(&self, token: &str, id: &str) -> Result<(), RemoteError> {
        let url = self.conversation_url(id)?;
        Self::send(self.http.delete(url).bearer_auth(token)).await?;
        Ok(())
    }

    async fn load_settings(&self, token: &str) -> Result<Option<Settings>, RemoteError> {
        Self::send_json(self.request(Method::GET, "api/settings", token)).await
    }

    async fn save_settings(&self, token: &str, settings: &Settings) -> Result<(), RemoteError> {
        Self::send(
            self.request(Method::POST, "api/settings", token)
                .json(&SettingsBody { settings }),
        )
        .await?;
        Ok(())
    }

    async fn load_current(&self, token: &str) -> Result<Vec<Message>, RemoteError> {
        Self::send_json(self.request(Method::GET, "api/current-conversation", token)).await
    }

    async fn save_current(&self, token: &str, messages: &[Message]) -> Result<(), RemoteError> {
        Self::send(
            self.request(Method::POST, "api/current-conversation", token)
                .json(&MessagesBody { messages }),
        )
        .await?;
        Ok(())
    }

    async fn clear_current(&self, token: &str) -> Result<(), RemoteError> {
        Self::send(self.request(Method::DELETE, "api/current-conversation", token)).await?;
        Ok(())
    }
}
