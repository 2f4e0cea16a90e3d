//! HTTP endpoint for provider callbacks.
//!
//! rouille serves requests on its own thread pool; each request is handed
//! to the async [`WebhookHandler`] through a tokio runtime handle.

use std::io::Read;
use std::sync::Arc;

use rouille::{Request, Response};
use tokio::runtime::Handle;

use super::handler::{InboundRequest, WebhookHandler, WebhookResponse};
use crate::config::ServerConfig;
use crate::model::Provider;

/// Callback bodies above this size are refused with 413.
pub const MAX_BODY_BYTES: u64 = 1024 * 1024;

pub struct WebhookServer {
    handler: Arc<WebhookHandler>,
    runtime: Handle,
    pub config: ServerConfig,
}

impl WebhookServer {
    pub fn new(handler: WebhookHandler, runtime: Handle, config: ServerConfig) -> Self {
        Self {
            handler: Arc::new(handler),
            runtime,
            config,
        }
    }

    /// Serve forever.
    pub fn run(self) {
        let addr = self.config.address();
        tracing::info!(%addr, "Webhook server listening");
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        let response = rouille::router!(request,
            (GET) (/health) => {
                Response::json(&serde_json::json!({ "status": "ok" }))
            },
            (POST) (/webhooks/{name: String}) => {
                self.handle_webhook(&name, request)
            },
            (OPTIONS) (/webhooks/{name: String}) => {
                self.handle_webhook(&name, request)
            },
            _ => Response::json(&serde_json::json!({ "error": "Not found" })).with_status_code(404)
        );

        tracing::info!(
            method = %request.method(),
            url = %request.url(),
            status = response.status_code,
            "Webhook request"
        );
        response
    }

    fn handle_webhook(&self, name: &str, request: &Request) -> Response {
        let Ok(provider) = name.parse::<Provider>() else {
            return error_response(404, "Unknown provider");
        };

        let mut body = Vec::new();
        if let Some(data) = request.data()
            && let Err(e) = data.take(MAX_BODY_BYTES + 1).read_to_end(&mut body)
        {
            tracing::warn!(error = %e, "Failed to read webhook body");
            return error_response(400, "Unreadable body");
        }
        if body.len() as u64 > MAX_BODY_BYTES {
            tracing::warn!(%provider, limit = MAX_BODY_BYTES, "Webhook body too large");
            return error_response(413, "Payload too large");
        }

        let inbound = InboundRequest {
            method: request.method().to_string(),
            headers: request
                .headers()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body,
        };

        let reply = self
            .runtime
            .block_on(self.handler.handle(provider, &inbound));
        to_rouille(reply)
    }
}

fn error_response(status: u16, message: &str) -> Response {
    to_rouille(WebhookResponse::json(
        status,
        serde_json::json!({ "error": message }),
    ))
}

fn to_rouille(reply: WebhookResponse) -> Response {
    let mut response = match &reply.body {
        Some(body) => Response::json(body),
        None => Response::text(""),
    }
    .with_status_code(reply.status);

    for (name, value) in reply.headers {
        response = response.with_additional_header(name, value);
    }
    response
}
