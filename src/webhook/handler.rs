//! Request handling for provider callbacks.
//!
//! Independent of the HTTP server: takes an [`InboundRequest`] and always
//! produces a [`WebhookResponse`]. Every error is caught here and turned
//! into a JSON body with the matching status and CORS headers.

use serde_json::{Value, json};
use sqlx::SqlitePool;

use super::WebhookError;
use super::payload::parse_callback;
use super::processor::{ProcessOutcome, derived_delivery_id, process_callback};
use super::signature::{SignatureCheck, check_signature};
use crate::config::Credentials;
use crate::model::Provider;

/// Headers attached to every webhook response.
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    (
        "Access-Control-Allow-Headers",
        "authorization, x-client-info, apikey, content-type, x-suno-signature, x-mureka-signature, x-delivery-id, x-webhook-id",
    ),
    ("Access-Control-Allow-Methods", "POST, OPTIONS"),
];

/// A callback request as received.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl InboundRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response to send back to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
    pub status: u16,
    /// `None` for bodiless responses (preflight)
    pub body: Option<Value>,
    pub headers: Vec<(&'static str, String)>,
}

impl WebhookResponse {
    pub(crate) fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
            headers: cors_headers(),
        }
    }

    fn preflight() -> Self {
        Self {
            status: 204,
            body: None,
            headers: cors_headers(),
        }
    }

    fn from_error(error: &WebhookError) -> Self {
        let body = match error {
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                json!({ "success": false, "error": error.to_string() })
            }
            WebhookError::InvalidJson(detail) => {
                json!({ "error": "Invalid webhook payload", "details": [detail] })
            }
            WebhookError::InvalidPayload(details) => {
                json!({ "error": "Invalid webhook payload", "details": details })
            }
            WebhookError::SigningKey(_) | WebhookError::Database(_) => {
                json!({ "success": false, "error": "Internal error" })
            }
        };
        Self::json(error.status_code(), body)
    }
}

fn cors_headers() -> Vec<(&'static str, String)> {
    CORS_HEADERS
        .iter()
        .map(|(name, value)| (*name, value.to_string()))
        .collect()
}

fn signature_header(provider: Provider) -> &'static str {
    match provider {
        Provider::Suno => "x-suno-signature",
        Provider::Mureka => "x-mureka-signature",
    }
}

/// Verifies, parses and applies provider callbacks.
pub struct WebhookHandler {
    pool: SqlitePool,
    credentials: Credentials,
}

impl WebhookHandler {
    pub fn new(pool: SqlitePool, credentials: Credentials) -> Self {
        Self { pool, credentials }
    }

    /// Handle one request for `provider`.
    pub async fn handle(&self, provider: Provider, request: &InboundRequest) -> WebhookResponse {
        if request.method.eq_ignore_ascii_case("OPTIONS") {
            return WebhookResponse::preflight();
        }
        if !request.method.eq_ignore_ascii_case("POST") {
            return WebhookResponse::json(405, json!({ "error": "Method not allowed" }));
        }

        match self.process(provider, request).await {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    WebhookError::Database(_) => {
                        tracing::error!(%provider, error = %e, "Webhook processing failed")
                    }
                    _ => tracing::warn!(%provider, error = %e, "Webhook rejected"),
                }
                WebhookResponse::from_error(&e)
            }
        }
    }

    async fn process(
        &self,
        provider: Provider,
        request: &InboundRequest,
    ) -> Result<WebhookResponse, WebhookError> {
        let check = check_signature(
            &request.body,
            request.header(signature_header(provider)),
            self.credentials.webhook_secret(provider),
        );
        match check {
            SignatureCheck::Verified => {}
            SignatureCheck::Skipped => {
                tracing::warn!(%provider, "No webhook secret configured, skipping signature verification")
            }
            SignatureCheck::Missing => return Err(WebhookError::MissingSignature),
            SignatureCheck::Invalid => return Err(WebhookError::InvalidSignature),
        }

        let callback = parse_callback(provider, &request.body)?;
        tracing::debug!(%provider, task_id = %callback.task_id, stage = %callback.stage, "Callback received");

        let delivery_id = request
            .header("x-delivery-id")
            .or_else(|| request.header("x-webhook-id"))
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| derived_delivery_id(&callback));

        let response = match process_callback(&self.pool, &callback, &delivery_id).await? {
            ProcessOutcome::AlreadyProcessed => WebhookResponse::json(
                200,
                json!({ "success": true, "idempotent": true, "message": "Already processed" }),
            ),
            ProcessOutcome::TrackNotFound => WebhookResponse::json(
                202,
                json!({
                    "success": false,
                    "message": "Track not found but webhook acknowledged",
                    "retry": true
                }),
            ),
            ProcessOutcome::Applied {
                track_id,
                stage,
                versions,
            } => WebhookResponse::json(
                200,
                json!({
                    "success": true,
                    "trackId": track_id,
                    "stage": stage,
                    "versionsCreated": versions
                }),
            ),
        };
        Ok(response)
    }
}
