use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::attachments::Attachment;
use crate::utils::ids::new_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }

    pub fn is_assistant(self) -> bool {
        self == Role::Assistant
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            // Older remote records tag assistant turns as "ai".
            "assistant" | "ai" => Ok(Role::Assistant),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
    Love,
    Laugh,
    Wow,
    Sad,
    Angry,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 7] = [
        ReactionKind::Like,
        ReactionKind::Dislike,
        ReactionKind::Love,
        ReactionKind::Laugh,
        ReactionKind::Wow,
        ReactionKind::Sad,
        ReactionKind::Angry,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
            ReactionKind::Love => "love",
            ReactionKind::Laugh => "laugh",
            ReactionKind::Wow => "wow",
            ReactionKind::Sad => "sad",
            ReactionKind::Angry => "angry",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    #[serde(rename = "type")]
    pub kind: ReactionKind,
    pub count: u32,
    #[serde(default)]
    pub user_reacted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(alias = "type")]
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, alias = "model", skip_serializing_if = "Option::is_none")]
    pub model_label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<Reaction>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
            model_label: None,
            attachments: Vec::new(),
            image_url: None,
            image_prompt: None,
            reactions: Vec::new(),
        }
    }

    pub fn user(text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            attachments,
            ..Self::new(Role::User, text)
        }
    }

    pub fn assistant(text: impl Into<String>, model_label: impl Into<String>) -> Self {
        Self {
            model_label: Some(model_label.into()),
            ..Self::new(Role::Assistant, text)
        }
    }

    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }

    pub fn is_assistant(&self) -> bool {
        self.role.is_assistant()
    }

    /// Flip the local user's reaction of `kind`, keeping the aggregate count
    /// in step. Reactions that drop to zero are removed.
    pub fn toggle_reaction(&mut self, kind: ReactionKind) {
        match self.reactions.iter().position(|r| r.kind == kind) {
            Some(index) => {
                let reaction = &mut self.reactions[index];
                if reaction.user_reacted {
                    reaction.count = reaction.count.saturating_sub(1);
                    reaction.user_reacted = false;
                    if reaction.count == 0 {
                        self.reactions.remove(index);
                    }
                } else {
                    reaction.count += 1;
                    reaction.user_reacted = true;
                }
            }
            None => self.reactions.push(Reaction {
                kind,
                count: 1,
                user_reacted: true,
            }),
        }
    }

    pub fn reaction_count(&self, kind: ReactionKind) -> u32 {
        self.reactions
            .iter()
            .find(|r| r.kind == kind)
            .map(|r| r.count)
            .unwrap_or(0)
    }
}
