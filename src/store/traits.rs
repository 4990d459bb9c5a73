//! `Database` trait — single async interface for message persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

/// Label every freshly stored message carries until it is moved.
pub const INBOX_LABEL: &str = "INBOX";

/// A persisted email message.
///
/// Header-derived fields are optional: a record fetched from a damaged or
/// partial source is still stored, and the rule engine reports it as
/// malformed only when a condition needs the missing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub external_id: String,
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub is_read: bool,
    pub labels: Vec<String>,
}

impl MessageRecord {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// A message about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub external_id: String,
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
}

/// Backend-agnostic message store.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Insert a new message (unread, in INBOX). Returns the generated UUID string.
    async fn insert_message(&self, message: &NewMessage) -> Result<String, DatabaseError>;

    /// Get a message by ID.
    async fn get_message(&self, id: &str) -> Result<Option<MessageRecord>, DatabaseError>;

    /// Look up a message by its external (source-native) ID.
    async fn get_message_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<MessageRecord>, DatabaseError>;

    /// All stored messages, oldest first.
    async fn fetch_messages(&self) -> Result<Vec<MessageRecord>, DatabaseError>;

    /// Mark a message read or unread.
    async fn set_read_state(&self, id: &str, is_read: bool) -> Result<(), DatabaseError>;

    /// Add `label` to a message and take it out of the inbox.
    async fn move_to_label(&self, id: &str, label: &str) -> Result<(), DatabaseError>;
}
