//! Provider callback handling.
//!
//! Suno and Mureka report generation progress by POSTing to our webhook
//! endpoints. A request is verified ([`signature`]), parsed into a
//! provider-neutral [`Callback`] ([`payload`]), applied to the library
//! ([`processor`]) and answered with JSON plus CORS headers ([`handler`]).
//! [`server`] exposes the endpoints over HTTP.

pub mod handler;
pub mod payload;
pub mod processor;
pub mod server;
pub mod signature;

pub use handler::{InboundRequest, WebhookHandler, WebhookResponse};
pub use payload::{Callback, CallbackEvent, parse_callback};
pub use processor::{ProcessOutcome, process_callback};
pub use server::WebhookServer;
pub use signature::{SignatureCheck, check_signature, sign, verify};

/// Errors raised while handling a callback.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Missing webhook signature")]
    MissingSignature,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("Invalid webhook payload: {}", .0.join("; "))]
    InvalidPayload(Vec<String>),

    #[error("Unusable signing key: {0}")]
    SigningKey(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl WebhookError {
    /// HTTP status the error is answered with.
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature => 401,
            WebhookError::InvalidJson(_) | WebhookError::InvalidPayload(_) => 400,
            WebhookError::SigningKey(_) | WebhookError::Database(_) => 500,
        }
    }
}
