//! Error types for the persistence layer.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`sqlx`] error or describes a stored row that no longer decodes.

/// Errors that can occur in the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored row could not be turned back into rule state.
    #[error("Corrupt rule state for {scope}/{rule_id}: {reason}")]
    Corrupt {
        /// Stored scope key text.
        scope: String,
        /// Stored rule id.
        rule_id: String,
        /// What was wrong with it.
        reason: String,
    },
}
