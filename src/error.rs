//! Error types for mail-rules.

use thiserror::Error;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Rule specification error: {0}")]
    RuleSpecification(#[from] RuleSpecificationError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A rule document that cannot be turned into a rule set.
///
/// Raised at load time only; the whole document is rejected.
#[derive(Debug, Error)]
pub enum RuleSpecificationError {
    #[error("failed to read rules from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rules from {origin}: {message}")]
    Parse { origin: String, message: String },

    #[error("rule {rule}: invalid {attribute}: {reason}")]
    InvalidRule {
        rule: String,
        attribute: String,
        reason: String,
    },

    #[error("duplicate rule name: {name}")]
    DuplicateRule { name: String },
}

impl RuleSpecificationError {
    pub(crate) fn invalid(
        rule: impl Into<String>,
        attribute: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRule {
            rule: rule.into(),
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }
}

/// The evaluator met a condition it cannot interpret.
///
/// Rules that passed the loader should never produce this; when it happens
/// the rule is skipped for the message at hand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot evaluate condition '{condition}': {reason}")]
pub struct ConfigurationError {
    pub condition: String,
    pub reason: String,
}

/// A message record lacks a field that a condition needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("message {message_id} has no {field}")]
pub struct MessageDataError {
    pub message_id: String,
    pub field: &'static str,
}

/// Failure while evaluating one condition against one message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    MessageData(#[from] MessageDataError),
}

/// Errors importing raw messages into the store.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unparseable message {0}")]
    Unparseable(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Errors applying a single action.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Dispatcher {dispatcher} failed to apply {action} to {message_id}: {reason}")]
    Failed {
        dispatcher: String,
        message_id: String,
        action: String,
        reason: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
