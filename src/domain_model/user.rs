use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

/// Rejection of a string used as a document id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("id is empty")]
    Empty,
    #[error("id contains a path separator: {0}")]
    PathSeparator(String),
}

/// Ids double as single path segments of the store.
pub(crate) fn check_segment(s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }
    if s.contains('/') {
        return Err(IdError::PathSeparator(s.to_owned()));
    }
    Ok(())
}

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wraps a document id handed back by the store. Such ids are path
    /// segments already, so no validation is repeated.
    pub(crate) fn from_document_id(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        check_segment(s)?;
        Ok(UserId(s.to_owned()))
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_empty_and_nested_ids() {
        assert_eq!("".parse::<UserId>(), Err(IdError::Empty));
        assert!(matches!(
            "a/b".parse::<UserId>(),
            Err(IdError::PathSeparator(_))
        ));
        assert_eq!("u1".parse::<UserId>().unwrap().as_str(), "u1");
    }
}
