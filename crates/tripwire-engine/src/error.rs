//! Error types for the trigger engine binary.
//!
//! [`AppError`] is the top-level error type that wraps all possible
//! failure modes during startup and shutdown.

/// Top-level error for the trigger engine binary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: tripwire_core::ConfigError,
    },

    /// The world fixture could not be built.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: tripwire_world::WorldError,
    },

    /// The trigger content directory could not be read.
    #[error("content error: {source}")]
    Content {
        /// The underlying content error.
        #[from]
        source: tripwire_core::ContentError,
    },

    /// Trigger state storage failed.
    #[error("database error: {source}")]
    Db {
        /// The underlying database error.
        #[from]
        source: tripwire_db::DbError,
    },

    /// The engine runner stopped unexpectedly.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: tripwire_core::RunnerError,
    },

    /// A background task panicked or was cancelled.
    #[error("task error: {source}")]
    Task {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },

    /// Console I/O failed.
    #[error("console I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
