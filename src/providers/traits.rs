//! The common interface every provider client implements.
//!
//! The router and registry only ever see `dyn MusicProvider`, so tests can
//! substitute [`mocks::MockProvider`] for the real HTTP clients.

use async_trait::async_trait;

use super::domain::{
    Balance, ExtendOptions, GenerationRequest, GenerationTask, ProviderError, StemOptions,
    StemResult, TaskInfo,
};
use crate::model::Provider;

/// An AI music generation backend.
#[async_trait]
pub trait MusicProvider: Send + Sync {
    /// Which provider this client talks to.
    fn provider(&self) -> Provider;

    /// Submit a normalized generation request.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationTask, ProviderError>;

    /// Continue an existing clip.
    async fn extend(&self, options: &ExtendOptions) -> Result<GenerationTask, ProviderError>;

    /// Split a clip into stems.
    async fn separate_stems(&self, options: &StemOptions) -> Result<StemResult, ProviderError>;

    /// Poll a task's status.
    async fn query_task(&self, task_id: &str) -> Result<TaskInfo, ProviderError>;

    /// Remaining credits.
    async fn balance(&self) -> Result<Balance, ProviderError>;
}

#[async_trait]
impl MusicProvider for super::suno::SunoClient {
    fn provider(&self) -> Provider {
        Provider::Suno
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationTask, ProviderError> {
        self.generate(request).await
    }

    async fn extend(&self, options: &ExtendOptions) -> Result<GenerationTask, ProviderError> {
        self.extend(options).await
    }

    async fn separate_stems(&self, options: &StemOptions) -> Result<StemResult, ProviderError> {
        self.separate_stems(options).await
    }

    async fn query_task(&self, task_id: &str) -> Result<TaskInfo, ProviderError> {
        self.query_task(task_id).await
    }

    async fn balance(&self) -> Result<Balance, ProviderError> {
        self.balance().await
    }
}

#[async_trait]
impl MusicProvider for super::mureka::MurekaClient {
    fn provider(&self) -> Provider {
        Provider::Mureka
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationTask, ProviderError> {
        self.generate(request).await
    }

    async fn extend(&self, _options: &ExtendOptions) -> Result<GenerationTask, ProviderError> {
        Err(ProviderError::NotSupported {
            provider: Provider::Mureka,
            operation: "track extension",
        })
    }

    async fn separate_stems(&self, options: &StemOptions) -> Result<StemResult, ProviderError> {
        self.separate_stems(options).await
    }

    async fn query_task(&self, task_id: &str) -> Result<TaskInfo, ProviderError> {
        self.query_task(task_id).await
    }

    async fn balance(&self) -> Result<Balance, ProviderError> {
        self.balance().await
    }
}
