use crate::domain_model::UserId;
use crate::domain_port::Fields;
use chrono::{DateTime, TimeZone, Utc};
use serde::ser::Error as _;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account document stored at `users/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "uid")]
    pub id: UserId,
    pub username: String,
    pub info: String,
    pub sex: String,
    #[serde(rename = "imageURL")]
    pub image_url: String,
    pub birthday: String,
    pub country: String,
    pub city: String,
    pub removed: bool,
    pub online: bool,
    #[serde(
        rename = "lastActivity",
        default,
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub last_activity: Option<DateTime<Utc>>,
    /// Size of the `posts` sub-collection, filled in on fetch.
    #[serde(skip)]
    pub posts_count: u32,
}

impl Profile {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            info: String::new(),
            sex: String::new(),
            image_url: String::new(),
            birthday: String::new(),
            country: String::new(),
            city: String::new(),
            removed: false,
            online: true,
            last_activity: None,
            posts_count: 0,
        }
    }

    pub fn to_fields(&self) -> Result<Fields, serde_json::Error> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(serde_json::Error::custom(format!(
                "profile encoded as {other}, expected a map"
            ))),
        }
    }

    pub fn from_fields(fields: Fields) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(fields))
    }
}

/// Position after which the next page of profile ids starts: the sort key of
/// the last profile of the previous page, as it was when that page was read.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ProfileCursor {
    pub last_activity: DateTime<Utc>,
    pub id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed profile cursor: {0}")]
pub struct ProfileCursorError(String);

impl fmt::Display for ProfileCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.last_activity.timestamp_millis(), self.id)
    }
}

impl std::str::FromStr for ProfileCursor {
    type Err = ProfileCursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (millis, id) = s
            .split_once(':')
            .ok_or_else(|| ProfileCursorError(s.to_owned()))?;
        let last_activity = millis
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| ProfileCursorError(s.to_owned()))?;
        let id = id.parse().map_err(|_| ProfileCursorError(s.to_owned()))?;
        Ok(ProfileCursor { last_activity, id })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfilePage {
    pub ids: Vec<UserId>,
    #[serde(skip)]
    pub next: Option<ProfileCursor>,
}
