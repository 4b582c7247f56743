use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::message::Message;

pub const DEFAULT_TITLE: &str = "New Conversation";
const TITLE_MAX_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, alias = "userId", skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

/// Partial update applied by `update_conversation`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
}

impl ConversationPatch {
    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            title: None,
            messages: Some(messages),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.messages.is_none()
    }
}

impl Conversation {
    /// Snapshot a message list as a new conversation. The title is fixed
    /// here and later patches only replace it when asked to explicitly.
    pub fn from_messages(id: String, messages: Vec<Message>, owner_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: derive_title(&messages),
            messages,
            created_at: now,
            updated_at: now,
            owner_id,
        }
    }

    pub fn apply_patch(&mut self, patch: ConversationPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(messages) = patch.messages {
            self.messages = messages;
        }
        self.updated_at = Utc::now();
    }
}

/// Title from the first user message, truncated to 30 characters.
pub fn derive_title(messages: &[Message]) -> String {
    match messages.iter().find(|m| m.is_user()) {
        Some(first) => {
            let text = first.text.trim();
            if text.chars().count() > TITLE_MAX_CHARS {
                let head: String = text.chars().take(TITLE_MAX_CHARS).collect();
                format!("{head}...")
            } else if text.is_empty() {
                DEFAULT_TITLE.to_string()
            } else {
                text.to_string()
            }
        }
        None => DEFAULT_TITLE.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub conversation_id: String,
    pub title: String,
    /// Message that matched, `None` when the title itself matched.
    pub message_id: Option<String>,
    pub snippet: String,
    relevance: usize,
}

/// Case-insensitive search across conversation titles and message text.
///
/// Title hits rank first; message hits are ordered by how early in the
/// message the query appears.
pub fn search_conversations(conversations: &[Conversation], query: &str) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut hits = Vec::new();
    for conversation in conversations {
        if conversation.title.to_lowercase().contains(&needle) {
            hits.push(SearchHit {
                conversation_id: conversation.id.clone(),
                title: conversation.title.clone(),
                message_id: None,
                snippet: conversation.title.clone(),
                relevance: 0,
            });
        }

        for message in &conversation.messages {
            let haystack = message.text.to_lowercase();
            if let Some(position) = haystack.find(&needle) {
                hits.push(SearchHit {
                    conversation_id: conversation.id.clone(),
                    title: conversation.title.clone(),
                    message_id: Some(message.id.clone()),
                    snippet: snippet_around(&message.text, &haystack, position, &needle),
                    relevance: position + 1,
                });
            }
        }
    }

    hits.sort_by_key(|hit| hit.relevance);
    hits
}

fn snippet_around(text: &str, lowered: &str, byte_position: usize, needle: &str) -> String {
    const CONTEXT: usize = 40;
    let char_start = lowered[..byte_position].chars().count();
    let chars: Vec<char> = text.chars().collect();
    let start = char_start.saturating_sub(CONTEXT).min(chars.len());
    let end = (char_start + needle.chars().count() + CONTEXT).min(chars.len());

    let mut snippet: String = chars[start..end].iter().collect();
    if start > 0 {
        snippet.insert_str(0, "...");
    }
    if end < chars.len() {
        snippet.push_str("...");
    }
    snippet
}
