//! Activity envelope exchanged with the connector
//!
//! The dialog runtime only needs the parts of an activity that identify the
//! conversation and carry user-visible content.

use crate::fiber::Resumable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    #[default]
    Message,
    ConversationUpdate,
    ContactRelationUpdate,
    Typing,
    EndOfConversation,
    DeleteUserData,
    Ping,
}

/// A user or bot on a channel
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// Attachment reference carried by a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// An inbound or outbound activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: ActivityType,
    pub channel_id: String,
    pub conversation_id: String,
    pub from: ChannelAccount,
    pub recipient: ChannelAccount,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
}

impl Resumable for Message {
    const KIND: &'static str = "message";
}

impl Message {
    /// A user message on `channel_id`, addressed to `bot_id`
    pub fn user(
        channel_id: impl Into<String>,
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
        bot_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(uuid::Uuid::new_v4().to_string()),
            kind: ActivityType::Message,
            channel_id: channel_id.into(),
            conversation_id: conversation_id.into(),
            from: ChannelAccount::new(user_id),
            recipient: ChannelAccount::new(bot_id),
            text: text.into(),
            attachments: Vec::new(),
            timestamp: Utc::now(),
            reply_to_id: None,
        }
    }

    pub fn with_kind(mut self, kind: ActivityType) -> Self {
        self.kind = kind;
        self
    }

    /// Build a reply: sender and recipient swapped, same conversation
    pub fn reply(&self, text: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: ActivityType::Message,
            channel_id: self.channel_id.clone(),
            conversation_id: self.conversation_id.clone(),
            from: self.recipient.clone(),
            recipient: self.from.clone(),
            text: text.into(),
            attachments: Vec::new(),
            timestamp: Utc::now(),
            reply_to_id: self.id.clone(),
        }
    }

    pub fn address(&self) -> Address {
        Address {
            channel_id: self.channel_id.clone(),
            bot_id: self.recipient.id.clone(),
            user_id: self.from.id.clone(),
            conversation_id: self.conversation_id.clone(),
        }
    }
}

/// Identifies a conversation from the bot's point of view
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub channel_id: String,
    pub bot_id: String,
    pub user_id: String,
    pub conversation_id: String,
}
