use super::user::check_segment;
use crate::domain_model::{IdError, UserId};
use crate::domain_port::Fields;
use chrono::{DateTime, Utc};
use serde::ser::Error as _;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for MessageId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        check_segment(s)?;
        Ok(MessageId(s.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageStatus {
    Sended,
    Looked,
    IncomingNew,
    Incoming,
}

/// Chat message, delivered into `users/{recipient}/messages/{id}`. Media is
/// referenced by URLs of already uploaded blobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(rename = "senderID")]
    pub sender: UserId,
    #[serde(rename = "adressID")]
    pub recipient: UserId,
    pub content: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    pub status: MessageStatus,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(rename = "imageRatio", default, skip_serializing_if = "Option::is_none")]
    pub image_ratio: Option<f64>,
    #[serde(rename = "audioURL", default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(rename = "audioDuration", default, skip_serializing_if = "Option::is_none")]
    pub audio_duration: Option<f32>,
}

impl Message {
    pub fn text(sender: UserId, recipient: UserId, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            sender,
            recipient,
            content: content.into(),
            date: Utc::now(),
            status: MessageStatus::Sended,
            photo_url: None,
            image_ratio: None,
            audio_url: None,
            audio_duration: None,
        }
    }

    pub fn to_fields(&self) -> Result<Fields, serde_json::Error> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(serde_json::Error::custom(format!(
                "message encoded as {other}, expected a map"
            ))),
        }
    }

    pub fn from_fields(fields: Fields) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(fields))
    }
}

/// Typing indicators that appeared and disappeared in one notification.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TypingChange {
    pub started: Vec<UserId>,
    pub finished: Vec<UserId>,
}

impl TypingChange {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.finished.is_empty()
    }
}

/// A friend opened the chat `chat_id` with the account.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ActiveChat {
    pub sender: UserId,
    pub chat_id: String,
}
