//! Suno HTTP client
//!
//! Talks to the Suno API at api.sunoapi.org with bearer auth. Generation,
//! extension and stem separation are asynchronous: the API answers with a
//! task ID and later posts the result to the configured callback URL.

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

use super::{adapter, dto};
use crate::providers::capabilities::config_for;
use crate::model::Provider;
use crate::providers::domain::{
    Balance, ExtendOptions, GenerationRequest, GenerationTask, ProviderError, StemOptions,
    StemResult, TaskInfo, network_error, status_error,
};

pub const DEFAULT_BASE_URL: &str = "https://api.sunoapi.org/api/v1";

/// Suno API client
pub struct SunoClient {
    api_key: String,
    http_client: reqwest::Client,
    base_url: String,
    callback_url: Option<String>,
}

impl SunoClient {
    /// Create a client against the public API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom base URL (proxies, test servers).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .gzip(true)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            api_key: api_key.into(),
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            callback_url: None,
        }
    }

    /// URL Suno posts task results to.
    pub fn with_callback_url(mut self, url: Option<String>) -> Self {
        self.callback_url = url;
        self
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationTask, ProviderError> {
        let body = adapter::to_generate_request(request, self.callback_url.as_deref());
        // Reference audio goes through the cover endpoint
        let path = if body.upload_url.is_some() {
            "generate/upload-cover"
        } else {
            "generate"
        };
        tracing::debug!(model = %body.model, custom_mode = body.custom_mode, path, "Suno generate");

        let created: dto::TaskCreated = self.send(self.post(path).json(&body)).await?;
        tracing::info!(task_id = %created.task_id, "Suno generation accepted");
        Ok(self.task(created))
    }

    pub async fn extend(&self, options: &ExtendOptions) -> Result<GenerationTask, ProviderError> {
        let body = adapter::to_extend_request(
            options,
            config_for(Provider::Suno).default_model,
            self.callback_url.as_deref(),
        );
        let created: dto::TaskCreated = self.send(self.post("generate/extend").json(&body)).await?;
        tracing::info!(task_id = %created.task_id, audio_id = %options.audio_id, "Suno extension accepted");
        Ok(self.task(created))
    }

    pub async fn separate_stems(&self, options: &StemOptions) -> Result<StemResult, ProviderError> {
        let body = adapter::to_stem_request(options, self.callback_url.as_deref())?;
        let created: dto::TaskCreated = self
            .send(self.post("vocal-removal/generate").json(&body))
            .await?;
        Ok(StemResult {
            task_id: Some(created.task_id),
            ..Default::default()
        })
    }

    pub async fn query_task(&self, task_id: &str) -> Result<TaskInfo, ProviderError> {
        let request = self
            .get("generate/record-info")
            .query(&[("taskId", task_id)]);
        let info: dto::RecordInfo = self.send(request).await?;
        Ok(adapter::to_task_info(info))
    }

    pub async fn balance(&self) -> Result<Balance, ProviderError> {
        let credits: f64 = self.send(self.get("generate/credit")).await?;
        Ok(adapter::to_balance(credits))
    }

    fn task(&self, created: dto::TaskCreated) -> GenerationTask {
        GenerationTask {
            provider: Provider::Suno,
            task_id: created.task_id,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http_client.get(self.url(path)).bearer_auth(&self.api_key)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http_client.post(self.url(path)).bearer_auth(&self.api_key)
    }

    /// Send a request and unwrap the `{ code, msg, data }` envelope.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ProviderError> {
        let response = request.send().await.map_err(network_error)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let envelope = response
            .json::<dto::Envelope<T>>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        adapter::unwrap_envelope(envelope)
    }
}
