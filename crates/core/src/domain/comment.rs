use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::status::AuthorType;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommentId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub author_id: String,
    pub author_type: AuthorType,
    pub content: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn visible_to_customer(&self) -> bool {
        !self.is_internal
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub author_id: String,
    pub author_type: AuthorType,
    pub content: String,
    #[serde(default)]
    pub is_internal: bool,
}

impl NewComment {
    pub fn customer(author_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            author_type: AuthorType::Customer,
            content: content.into(),
            is_internal: false,
        }
    }

    pub fn agent(author_id: impl Into<String>, content: impl Into<String>, internal: bool) -> Self {
        Self {
            author_id: author_id.into(),
            author_type: AuthorType::Agent,
            content: content.into(),
            is_internal: internal,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.author_id.trim().is_empty() {
            return Err(DomainError::invariant("comment author_id is required"));
        }
        if self.content.trim().is_empty() {
            return Err(DomainError::invariant("comment content must not be empty"));
        }
        if self.is_internal && self.author_type == AuthorType::Customer {
            return Err(DomainError::invariant("only agents can write internal notes"));
        }
        Ok(())
    }

    pub(crate) fn into_comment(self, created_at: DateTime<Utc>) -> Comment {
        Comment {
            id: CommentId(Uuid::new_v4().to_string()),
            author_id: self.author_id,
            author_type: self.author_type,
            content: self.content.trim().to_owned(),
            is_internal: self.is_internal,
            created_at,
        }
    }
}
