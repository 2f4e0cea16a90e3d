//! Application-wide error types.
//!
//! Subsystems define their own `thiserror` enums ([`ProviderError`],
//! [`VersionError`], [`WebhookError`], ...). This module aggregates them so
//! code that crosses subsystem boundaries can use one [`Result`] type, while
//! the CLI and `main` use `anyhow`.
//!
//! # Example
//!
//! ```ignore
//! use trackforge::error::{Result, ResultExt};
//!
//! async fn load(pool: &SqlitePool, id: &str) -> Result<Track> {
//!     db::get_track_by_id(pool, id)
//!         .await
//!         .with_context(format!("loading track {id}"))?
//!         .ok_or_else(|| Error::not_found(id))
//! }
//! ```
//!
//! [`ProviderError`]: crate::providers::ProviderError
//! [`VersionError`]: crate::player::VersionError
//! [`WebhookError`]: crate::webhook::WebhookError

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Generation provider error
    #[error("Provider error: {0}")]
    Provider(#[from] crate::providers::ProviderError),

    /// Request failed validation
    #[error("Validation failed: {0}")]
    Validation(#[from] crate::providers::ValidationErrors),

    /// Audio playback error
    #[error("Playback error: {0}")]
    Playback(#[from] crate::player::PlaybackError),

    /// Track version lookup error
    #[error("Version error: {0}")]
    Version(#[from] crate::player::VersionError),

    /// Webhook verification or processing error
    #[error("Webhook error: {0}")]
    Webhook(#[from] crate::webhook::WebhookError),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Wrap with a description of what was being attempted.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// Whether repeating the operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Provider(e) => e.is_retryable(),
            Error::Playback(crate::player::PlaybackError::Media(e)) => e.is_transient(),
            Error::Database(sqlx::Error::PoolTimedOut) => true,
            Error::WithContext { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(ctx))
    }
}
