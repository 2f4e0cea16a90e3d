//! Mureka HTTP client
//!
//! Talks to api.mureka.ai with bearer auth. Generation is asynchronous
//! (poll `song/query/{id}` or wait for the webhook); stem separation is
//! synchronous and answers with one ZIP of all stems.

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

use super::{adapter, dto};
use crate::model::Provider;
use crate::providers::domain::{
    Balance, GenerationRequest, GenerationTask, ProviderError, StemOptions, StemResult, TaskInfo,
    network_error, status_error,
};

pub const DEFAULT_BASE_URL: &str = "https://api.mureka.ai";

/// Mureka API client
pub struct MurekaClient {
    api_key: String,
    http_client: reqwest::Client,
    base_url: String,
}

impl MurekaClient {
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
        }
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationTask, ProviderError> {
        let body = adapter::to_generate_request(request);
        tracing::debug!(model = %body.model, instrumental = request.make_instrumental, "Mureka generate");

        let task: dto::Task = self.send(self.post("v1/song/generate").json(&body)).await?;
        if task.id.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "Mureka generation response did not include a task identifier".to_string(),
            ));
        }
        tracing::info!(task_id = %task.id, "Mureka generation accepted");
        Ok(GenerationTask {
            provider: Provider::Mureka,
            task_id: task.id,
        })
    }

    pub async fn separate_stems(&self, options: &StemOptions) -> Result<StemResult, ProviderError> {
        let body = adapter::to_stem_request(options)?;
        let response: dto::StemResponse = self.send(self.post("v1/song/stem").json(&body)).await?;
        adapter::to_stem_result(response)
    }

    pub async fn query_task(&self, task_id: &str) -> Result<TaskInfo, ProviderError> {
        let path = format!("v1/song/query/{}", urlencoding::encode(task_id));
        let task: dto::Task = self.send(self.get(&path)).await?;
        Ok(adapter::to_task_info(task))
    }

    pub async fn balance(&self) -> Result<Balance, ProviderError> {
        let billing: dto::Billing = self.send(self.get("v1/account/billing")).await?;
        Ok(adapter::to_balance(billing))
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

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ProviderError> {
        let response = request.send().await.map_err(network_error)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let parsed = response
            .json::<dto::MaybeEnvelope<T>>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        adapter::unwrap_response(parsed)
    }
}
