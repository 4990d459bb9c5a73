//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{Database, INBOX_LABEL, MessageRecord, NewMessage};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_one(
        &self,
        context: &str,
        sql: &str,
        value: &str,
    ) -> Result<Option<MessageRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params![value])
            .await
            .map_err(|e| DatabaseError::Query(format!("{context}: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let msg = row_to_message(&row)
                    .map_err(|e| DatabaseError::Query(format!("{context} row parse: {e}")))?;
                Ok(Some(msg))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("{context}: {e}"))),
        }
    }

    async fn require_message(&self, id: &str) -> Result<MessageRecord, DatabaseError> {
        self.get_message(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "message".to_string(),
                id: id.to_string(),
            })
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ndt.and_utc());
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(ndt.and_utc());
    }
    None
}

fn parse_labels(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Unreadable labels column '{raw}': {e}");
        Vec::new()
    })
}

/// Map a libsql Row to a MessageRecord.
///
/// Column order matches MESSAGE_COLUMNS.
fn row_to_message(row: &libsql::Row) -> Result<MessageRecord, libsql::Error> {
    let received_str: Option<String> = row.get(5).ok();
    let is_read: i64 = row.get(6)?;
    let labels_str: String = row.get(7)?;

    Ok(MessageRecord {
        id: row.get(0)?,
        external_id: row.get(1)?,
        sender: row.get(2).ok(),
        subject: row.get(3).ok(),
        body: row.get(4).ok(),
        received_at: received_str.as_deref().and_then(parse_datetime),
        is_read: is_read != 0,
        labels: parse_labels(&labels_str),
    })
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

// ── Trait implementation ────────────────────────────────────────────

const MESSAGE_COLUMNS: &str =
    "id, external_id, sender, subject, body, received_at, is_read, labels";

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<String, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let received_at = message.received_at.map(|dt| dt.to_rfc3339());
        let labels = serde_json::to_string(&[INBOX_LABEL])
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "INSERT INTO messages (id, external_id, sender, subject, body, received_at,
                    is_read, labels, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?8)",
                params![
                    id.clone(),
                    message.external_id.as_str(),
                    opt_text(message.sender.as_deref()),
                    opt_text(message.subject.as_deref()),
                    opt_text(message.body.as_deref()),
                    opt_text(received_at.as_deref()),
                    labels,
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_message: {e}")))?;

        debug!(id = %id, external_id = %message.external_id, "Message inserted into DB");
        Ok(id)
    }

    async fn get_message(&self, id: &str) -> Result<Option<MessageRecord>, DatabaseError> {
        self.query_one(
            "get_message",
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
            id,
        )
        .await
    }

    async fn get_message_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<MessageRecord>, DatabaseError> {
        self.query_one(
            "get_message_by_external_id",
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE external_id = ?1"),
            external_id,
        )
        .await
    }

    async fn fetch_messages(&self) -> Result<Vec<MessageRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY received_at ASC, created_at ASC"
                ),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("fetch_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_message(&row) {
                Ok(msg) => messages.push(msg),
                Err(e) => {
                    warn!("Skipping message row: {e}");
                }
            }
        }
        debug!(count = messages.len(), "Fetched messages from DB");
        Ok(messages)
    }

    async fn set_read_state(&self, id: &str, is_read: bool) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let updated = self
            .conn()
            .execute(
                "UPDATE messages SET is_read = ?1, updated_at = ?2 WHERE id = ?3",
                params![i64::from(is_read), now, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_read_state: {e}")))?;

        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "message".to_string(),
                id: id.to_string(),
            });
        }
        debug!(id = id, is_read, "Message read state updated in DB");
        Ok(())
    }

    async fn move_to_label(&self, id: &str, label: &str) -> Result<(), DatabaseError> {
        let message = self.require_message(id).await?;

        let mut labels: Vec<String> = message
            .labels
            .into_iter()
            .filter(|l| l != INBOX_LABEL)
            .collect();
        if !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
        let labels_json = serde_json::to_string(&labels)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE messages SET labels = ?1, updated_at = ?2 WHERE id = ?3",
                params![labels_json, now, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("move_to_label: {e}")))?;

        debug!(id = id, label = label, "Message moved in DB");
        Ok(())
    }
}
