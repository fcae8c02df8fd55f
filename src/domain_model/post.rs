use super::user::check_segment;
use crate::domain_model::{IdError, Profile, UserId};
use crate::domain_port::Fields;
use chrono::{DateTime, Utc};
use serde::ser::Error as _;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn from_document_id(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PostId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        check_segment(s)?;
        Ok(PostId(s.to_owned()))
    }
}

/// Post document, stored twice: `posts/{id}` and `users/{owner}/posts/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    #[serde(rename = "userID")]
    pub owner: UserId,
    #[serde(rename = "textContent")]
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    #[serde(rename = "urlImage", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "imageHeight", default, skip_serializing_if = "Option::is_none")]
    pub image_height: Option<f64>,
    #[serde(rename = "imageWidth", default, skip_serializing_if = "Option::is_none")]
    pub image_width: Option<f64>,
    /// Filled in on fetch from the post's `likers` sub-collection.
    #[serde(skip)]
    pub likers: Vec<UserId>,
    #[serde(skip)]
    pub owner_profile: Option<Profile>,
}

impl Post {
    pub fn new(owner: UserId, text: impl Into<String>) -> Self {
        Self {
            id: PostId::generate(),
            owner,
            text: text.into(),
            date: Utc::now(),
            image_url: None,
            image_height: None,
            image_width: None,
            likers: Vec::new(),
            owner_profile: None,
        }
    }

    pub fn liked_by(&self, user: &UserId) -> bool {
        self.likers.contains(user)
    }

    pub fn to_fields(&self) -> Result<Fields, serde_json::Error> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(serde_json::Error::custom(format!(
                "post encoded as {other}, expected a map"
            ))),
        }
    }

    pub fn from_fields(fields: Fields) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(fields))
    }
}

/// Sort key of the last post of a page, newest first.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PostCursor {
    pub date: DateTime<Utc>,
    pub id: PostId,
}

#[derive(Debug, Clone)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub next: Option<PostCursor>,
}
