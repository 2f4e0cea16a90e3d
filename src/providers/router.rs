//! One entry point for every provider operation.
//!
//! The router turns the uniform [`GenerationOptions`] into a per-provider
//! [`GenerationRequest`], then calls the client from the registry with
//! retry and timeout. It never touches track status; that is driven by
//! webhook callbacks.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;

use super::capabilities::{ProviderFeatures, config_for};
use super::domain::{
    Balance, ExtendOptions, GenerationOptions, GenerationRequest, GenerationTask, ProviderError,
    StemOptions, StemResult, TaskInfo, VocalGender,
};
use super::registry::ProviderRegistry;
use super::retry::{
    GENERATION_TIMEOUT, QUERY_TIMEOUT, RetryPolicy, STEM_TIMEOUT, retry_with_backoff, with_timeout,
};
use super::traits::MusicProvider;
use crate::model::Provider;

/// An accepted generation: what was sent and the provider's task.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub request: GenerationRequest,
    pub task: GenerationTask,
}

pub struct GenerationRouter {
    registry: Arc<ProviderRegistry>,
    default_provider: String,
    generation_policy: RetryPolicy,
    standard_policy: RetryPolicy,
    query_policy: RetryPolicy,
    /// Last successful balance per provider, served when a refresh fails
    last_balance: Mutex<HashMap<Provider, Balance>>,
}

impl GenerationRouter {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            default_provider: Provider::Suno.as_str().to_string(),
            generation_policy: RetryPolicy::CRITICAL,
            standard_policy: RetryPolicy::STANDARD,
            query_policy: RetryPolicy::FAST,
            last_balance: Mutex::new(HashMap::new()),
        }
    }

    /// Provider used when a request names none.
    pub fn with_default_provider(mut self, name: impl Into<String>) -> Self {
        self.default_provider = name.into();
        self
    }

    /// Use one retry policy for every operation.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.generation_policy = policy;
        self.standard_policy = policy;
        self.query_policy = policy;
        self
    }

    fn resolve(&self, name: Option<&str>) -> Result<Provider, ProviderError> {
        let name = name.unwrap_or(&self.default_provider);
        Ok(name.parse::<Provider>()?)
    }

    /// Normalize and submit a generation request.
    pub async fn generate_music(
        &self,
        options: GenerationOptions,
    ) -> Result<Submission, ProviderError> {
        let provider = self.resolve(options.provider.as_deref())?;
        let request = match provider {
            Provider::Suno => normalize_suno(&options),
            Provider::Mureka => normalize_mureka(&options),
        };
        tracing::info!(
            %provider,
            model = %request.model,
            instrumental = request.make_instrumental,
            idempotency_key = %request.idempotency_key,
            "Submitting generation"
        );

        let client = self.registry.get(provider)?;
        let (client, req) = (&client, &request);
        let task = retry_with_backoff(&self.generation_policy, "generate", move || {
            with_timeout(GENERATION_TIMEOUT, client.generate(req))
        })
        .await?;

        Ok(Submission { request, task })
    }

    /// Remaining credits, falling back to the last known value on failure.
    pub async fn get_provider_balance(&self, name: &str) -> Result<Balance, ProviderError> {
        let provider = self.resolve(Some(name))?;
        let client = self.registry.get(provider)?;
        let client = &client;
        let result = retry_with_backoff(&self.query_policy, "balance", move || {
            with_timeout(QUERY_TIMEOUT, client.balance())
        })
        .await;

        match result {
            Ok(balance) => {
                self.last_balance.lock().insert(provider, balance.clone());
                Ok(balance)
            }
            Err(e) => match self.last_balance.lock().get(&provider) {
                Some(cached) => {
                    tracing::warn!(%provider, error = %e, "Balance refresh failed, serving cached value");
                    Ok(Balance {
                        stale: true,
                        ..cached.clone()
                    })
                }
                None => Err(e),
            },
        }
    }

    pub async fn extend_track(
        &self,
        name: &str,
        options: ExtendOptions,
    ) -> Result<GenerationTask, ProviderError> {
        let provider = self.resolve(Some(name))?;
        if !config_for(provider).supports(ProviderFeatures::EXTEND) {
            return Err(ProviderError::NotSupported {
                provider,
                operation: "track extension",
            });
        }
        let client = self.registry.get(provider)?;
        let (client, opts) = (&client, &options);
        retry_with_backoff(&self.standard_policy, "extend", move || {
            with_timeout(GENERATION_TIMEOUT, client.extend(opts))
        })
        .await
    }

    pub async fn separate_stems(
        &self,
        name: &str,
        options: StemOptions,
    ) -> Result<StemResult, ProviderError> {
        let provider = self.resolve(Some(name))?;
        if !config_for(provider).supports_stem_mode(options.mode) {
            return Err(ProviderError::NotSupported {
                provider,
                operation: "this stem separation mode",
            });
        }
        let client = self.registry.get(provider)?;
        let (client, opts) = (&client, &options);
        retry_with_backoff(&self.standard_policy, "separate_stems", move || {
            with_timeout(STEM_TIMEOUT, client.separate_stems(opts))
        })
        .await
    }

    pub async fn query_task(&self, name: &str, task_id: &str) -> Result<TaskInfo, ProviderError> {
        let provider = self.resolve(Some(name))?;
        let client = self.registry.get(provider)?;
        let client = &client;
        retry_with_backoff(&self.query_policy, "query_task", move || {
            with_timeout(QUERY_TIMEOUT, client.query_task(task_id))
        })
        .await
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Suno: an explicit `make_instrumental` wins, otherwise only an explicit
/// `hasVocals: false` makes the track instrumental. `isBGM` is ignored.
pub fn normalize_suno(options: &GenerationOptions) -> GenerationRequest {
    let make_instrumental = options
        .make_instrumental
        .unwrap_or(options.has_vocals == Some(false));
    let custom_mode = options.custom_mode.unwrap_or(false);

    let (prompt, lyrics) = if custom_mode {
        let lyrics = non_blank(options.lyrics.as_deref()).unwrap_or_else(|| options.prompt.clone());
        (None, Some(lyrics))
    } else {
        (Some(options.prompt.clone()), None)
    };

    GenerationRequest {
        prompt,
        lyrics,
        title: non_blank(options.title.as_deref()),
        style_tags: style_tags(options),
        make_instrumental,
        bg_music: false,
        model: options
            .model_version
            .clone()
            .unwrap_or_else(|| config_for(Provider::Suno).default_model.to_string()),
        custom_mode,
        idempotency_key: idempotency_key(options),
        reference_audio_url: non_blank(options.reference_audio_url.as_deref()),
        vocal_gender: options
            .vocal_gender
            .as_deref()
            .and_then(VocalGender::from_request),
        negative_tags: options
            .negative_tags
            .as_deref()
            .map(|t| sanitize_tags(t.split(',')))
            .unwrap_or_default(),
        style_weight: options.style_weight.map(clamp_unit),
        lyrics_weight: options.lyrics_weight.map(clamp_unit),
        audio_weight: options.audio_weight.map(clamp_unit),
        weirdness: options.weirdness.map(clamp_unit),
    }
}

/// Mureka: `isBGM` implies instrumental; otherwise `hasVocals: false` does.
/// The explicit `make_instrumental` flag is not consulted.
pub fn normalize_mureka(options: &GenerationOptions) -> GenerationRequest {
    let bg_music = options.is_bgm == Some(true);
    let make_instrumental = bg_music || options.has_vocals == Some(false);

    GenerationRequest {
        prompt: Some(options.prompt.clone()),
        lyrics: non_blank(options.lyrics.as_deref()),
        title: non_blank(options.title.as_deref()),
        style_tags: style_tags(options),
        make_instrumental,
        bg_music,
        model: options
            .model_version
            .clone()
            .unwrap_or_else(|| config_for(Provider::Mureka).default_model.to_string()),
        custom_mode: false,
        idempotency_key: idempotency_key(options),
        reference_audio_url: None,
        vocal_gender: None,
        negative_tags: Vec::new(),
        style_weight: None,
        lyrics_weight: None,
        audio_weight: None,
        weirdness: None,
    }
}

/// `styleTags`, or `tags` when `styleTags` has nothing usable.
fn style_tags(options: &GenerationOptions) -> Vec<String> {
    let tags = sanitize_tags(options.style_tags.iter().map(String::as_str));
    if tags.is_empty() {
        sanitize_tags(options.tags.iter().map(String::as_str))
    } else {
        tags
    }
}

fn sanitize_tags<'a>(tags: impl Iterator<Item = &'a str>) -> Vec<String> {
    tags.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn idempotency_key(options: &GenerationOptions) -> String {
    non_blank(options.idempotency_key.as_deref()).unwrap_or_else(new_idempotency_key)
}

/// Random 128-bit key, hex encoded.
pub fn new_idempotency_key() -> String {
    format!("{:032x}", rand::rng().random::<u128>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::traits::mocks::MockProvider;
    use std::time::Duration;

    const TINY: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        multiplier: 2.0,
    };

    fn opts(prompt: &str) -> GenerationOptions {
        GenerationOptions {
            prompt: prompt.to_string(),
            ..Default::default()
        }
    }

    /// Router over mocks; returns the mocks so tests can inspect them.
    fn router_with(
        suno: MockProvider,
        mureka: MockProvider,
    ) -> (GenerationRouter, Arc<MockProvider>, Arc<MockProvider>) {
        let suno = Arc::new(suno);
        let mureka = Arc::new(mureka);
        let (s, m) = (Arc::clone(&suno), Arc::clone(&mureka));
        let registry = ProviderRegistry::new()
            .with_factory(Provider::Suno, move || Ok(Arc::clone(&s) as Arc<dyn MusicProvider>))
            .with_factory(Provider::Mureka, move || Ok(Arc::clone(&m) as Arc<dyn MusicProvider>));
        let router = GenerationRouter::new(Arc::new(registry)).with_retry_policy(TINY);
        (router, suno, mureka)
    }

    fn mock_router() -> (GenerationRouter, Arc<MockProvider>, Arc<MockProvider>) {
        router_with(MockProvider::new(Provider::Suno), MockProvider::new(Provider::Mureka))
    }

    #[test]
    fn test_suno_has_vocals_omitted_is_not_instrumental() {
        assert!(!normalize_suno(&opts("x")).make_instrumental);
    }

    #[test]
    fn test_suno_has_vocals_false_is_instrumental() {
        let o = GenerationOptions {
            has_vocals: Some(false),
            ..opts("x")
        };
        assert!(normalize_suno(&o).make_instrumental);
    }

    #[test]
    fn test_suno_explicit_flag_wins_and_bgm_ignored() {
        let o = GenerationOptions {
            has_vocals: Some(false),
            make_instrumental: Some(false),
            is_bgm: Some(true),
            ..opts("x")
        };
        let req = normalize_suno(&o);
        assert!(!req.make_instrumental);
        assert!(!req.bg_music);
    }

    #[test]
    fn test_mureka_bgm_implies_instrumental() {
        let o = GenerationOptions {
            is_bgm: Some(true),
            has_vocals: Some(true),
            ..opts("x")
        };
        let req = normalize_mureka(&o);
        assert!(req.make_instrumental);
        assert!(req.bg_music);

        let vocal = normalize_mureka(&GenerationOptions {
            make_instrumental: Some(true),
            ..opts("x")
        });
        assert!(!vocal.make_instrumental, "explicit flag is Suno-only");
    }

    #[test]
    fn test_suno_custom_mode_moves_prompt_to_lyrics() {
        let o = GenerationOptions {
            custom_mode: Some(true),
            ..opts("my words")
        };
        let req = normalize_suno(&o);
        assert_eq!(req.prompt, None);
        assert_eq!(req.lyrics.as_deref(), Some("my words"));
    }

    #[test]
    fn test_defaults_and_sanitizing() {
        let o = GenerationOptions {
            tags: vec![" rock ".into(), "".into()],
            style_weight: Some(1.7),
            weirdness: Some(-0.3),
            vocal_gender: Some("any".into()),
            ..opts("x")
        };
        let suno = normalize_suno(&o);
        assert_eq!(suno.model, "V5");
        assert_eq!(suno.style_tags, vec!["rock"]);
        assert_eq!(suno.style_weight, Some(1.0));
        assert_eq!(suno.weirdness, Some(0.0));
        assert_eq!(suno.vocal_gender, None);
        assert_eq!(suno.idempotency_key.len(), 32);

        let mureka = normalize_mureka(&o);
        assert_eq!(mureka.model, "auto");
        assert_eq!(mureka.style_tags, vec!["rock"]);
    }

    #[test]
    fn test_explicit_idempotency_key_kept() {
        let o = GenerationOptions {
            idempotency_key: Some("abc".into()),
            ..opts("x")
        };
        assert_eq!(normalize_mureka(&o).idempotency_key, "abc");
    }

    #[tokio::test]
    async fn test_generate_routes_by_provider() {
        let (router, suno, mureka) = mock_router();
        let submission = router
            .generate_music(GenerationOptions {
                provider: Some("mureka".into()),
                ..opts("x")
            })
            .await
            .unwrap();
        assert_eq!(submission.task.provider, Provider::Mureka);
        assert!(suno.last_request().is_none());
        assert_eq!(mureka.last_request(), Some(submission.request));
    }

    #[tokio::test]
    async fn test_generate_unsupported_provider() {
        let (router, _, _) = mock_router();
        let err = router
            .generate_music(GenerationOptions {
                provider: Some("riffusion".into()),
                ..opts("x")
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("riffusion"));
    }

    #[tokio::test]
    async fn test_generate_retries_transient_failure() {
        let (router, suno, _) = router_with(
            MockProvider::failing_with(Provider::Suno, vec![ProviderError::Network("reset".into())]),
            MockProvider::new(Provider::Mureka),
        );
        let submission = router.generate_music(opts("x")).await.unwrap();
        assert_eq!(submission.task.task_id, "task-2");
        assert_eq!(suno.requests.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_balance_falls_back_to_last_known() {
        let (router, suno, _) = mock_router();
        let fresh = router.get_provider_balance("suno").await.unwrap();
        assert!(!fresh.stale);

        *suno.errors.lock() = vec![ProviderError::Network("down".into()); 3].into();
        let cached = router.get_provider_balance("suno").await.unwrap();
        assert!(cached.stale);
        assert_eq!(cached.credits, fresh.credits);
    }

    #[tokio::test]
    async fn test_balance_without_cache_fails() {
        let (router, _, _) = router_with(
            MockProvider::new(Provider::Suno),
            MockProvider::failing_with(Provider::Mureka, vec![ProviderError::RateLimited; 3]),
        );
        assert_eq!(
            router.get_provider_balance("mureka").await,
            Err(ProviderError::RateLimited)
        );
    }

    #[tokio::test]
    async fn test_capability_checks() {
        let (router, _, _) = mock_router();
        let err = router
            .extend_track(
                "mureka",
                ExtendOptions {
                    audio_id: "a".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotSupported { .. }));

        let stems = StemOptions {
            task_id: None,
            audio_id: None,
            audio_url: Some("https://cdn/x.mp3".into()),
            mode: crate::model::SeparationMode::SeparateVocal,
        };
        assert!(router.separate_stems("mureka", stems).await.is_err());
    }

    #[tokio::test]
    async fn test_query_task_through_router() {
        let (router, _, _) = mock_router();
        let info = router.query_task("suno", "t-1").await.unwrap();
        assert_eq!(info.task_id, "t-1");
    }
}
