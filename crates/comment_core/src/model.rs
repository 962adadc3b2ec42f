use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque key naming the item whose comments are harvested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ContentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Gender {
    /// Maps the upstream one-letter code; anything unrecognised is `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            c if c.eq_ignore_ascii_case("m") => Gender::Male,
            c if c.eq_ignore_ascii_case("f") => Gender::Female,
            _ => Gender::Unknown,
        }
    }
}

/// One normalized comment record as written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub content_id: ContentId,
    pub comment_id: String,
    pub created_at: String,
    pub like_count: u64,
    pub region: String,
    pub content: String,
    pub author_name: String,
    pub author_gender: Gender,
    pub author_location: String,
    pub author_avatar_url: String,
}
