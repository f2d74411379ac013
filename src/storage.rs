//! Interfaces of the external stores the pipeline writes to.

use thiserror::Error;

use crate::normalize::EventRecord;

/// Errors from an object-store, database or auth call.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Network failure reaching the backend
    #[error("Storage transport error: {0}")]
    Transport(String),

    /// Backend rejected the request
    #[error("Storage request failed ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Backend answered with an unexpected body
    #[error("Unexpected storage response: {0}")]
    Decode(String),

    /// Bearer token did not resolve to a principal
    #[error("Unauthorized")]
    Unauthorized,
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StorageError::Decode(e.to_string())
        } else {
            StorageError::Transport(e.to_string())
        }
    }
}

/// How event rows are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// One row per (owner, event name); re-extraction replaces it
    Upsert,
    /// Every extraction adds a row
    Append,
}

impl WriteMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "upsert" => Some(Self::Upsert),
            "append" => Some(Self::Append),
            _ => None,
        }
    }
}

/// Bucket-style object storage.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        overwrite: bool,
    ) -> Result<(), StorageError>;

    fn public_url(&self, path: &str) -> String;
}

/// The relational `event` table.
#[async_trait::async_trait]
pub trait EventStore: Send + Sync {
    async fn insert(&self, record: &EventRecord) -> Result<EventRecord, StorageError>;

    /// Insert or replace the row keyed on (owner, event name).
    async fn upsert(&self, record: &EventRecord) -> Result<EventRecord, StorageError>;

    async fn list(&self, owner_id: &str) -> Result<Vec<EventRecord>, StorageError>;
}

/// Resolves a bearer token to the requesting principal's id.
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    async fn resolve_owner(&self, token: &str) -> Result<String, StorageError>;
}
