//! Lazily built, cached provider clients.
//!
//! The registry is constructed with one factory per provider and passed to
//! whoever needs clients, so tests can register mocks.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::domain::ProviderError;
use super::mureka::MurekaClient;
use super::suno::SunoClient;
use super::traits::MusicProvider;
use crate::config::Config;
use crate::model::Provider;

/// Builds a client on first use.
pub type ProviderFactory =
    Box<dyn Fn() -> Result<Arc<dyn MusicProvider>, ProviderError> + Send + Sync>;

/// Provider name to client, built on demand.
pub struct ProviderRegistry {
    factories: HashMap<Provider, ProviderFactory>,
    cache: Mutex<HashMap<Provider, Arc<dyn MusicProvider>>>,
}

impl ProviderRegistry {
    /// Empty registry; add providers with [`with_factory`](Self::with_factory).
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_factory<F>(mut self, provider: Provider, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn MusicProvider>, ProviderError> + Send + Sync + 'static,
    {
        self.factories.insert(provider, Box::new(factory));
        self
    }

    /// Registry of the real HTTP clients.
    ///
    /// A provider without an API key is still registered; building it fails
    /// with [`ProviderError::MissingApiKey`] when first requested.
    pub fn from_config(config: &Config) -> Self {
        let suno_key = config.credentials.suno_api_key.clone();
        let suno_url = config.providers.suno_base_url.clone();
        let callback = config
            .providers
            .callback_url
            .as_ref()
            .map(|base| format!("{}/webhooks/suno", base.trim_end_matches('/')));

        let mureka_key = config.credentials.mureka_api_key.clone();
        let mureka_url = config.providers.mureka_base_url.clone();

        Self::new()
            .with_factory(Provider::Suno, move || {
                let key = suno_key.clone().ok_or(ProviderError::MissingApiKey(Provider::Suno))?;
                let client = SunoClient::with_base_url(key, suno_url.clone())
                    .with_callback_url(callback.clone());
                Ok(Arc::new(client) as Arc<dyn MusicProvider>)
            })
            .with_factory(Provider::Mureka, move || {
                let key = mureka_key
                    .clone()
                    .ok_or(ProviderError::MissingApiKey(Provider::Mureka))?;
                Ok(Arc::new(MurekaClient::with_base_url(key, mureka_url.clone()))
                    as Arc<dyn MusicProvider>)
            })
    }

    /// Client for a provider name. Names are case-sensitive.
    pub fn get_provider(&self, name: &str) -> Result<Arc<dyn MusicProvider>, ProviderError> {
        let provider: Provider = name.parse()?;
        self.get(provider)
    }

    /// Client for a provider, built on first call and cached afterwards.
    pub fn get(&self, provider: Provider) -> Result<Arc<dyn MusicProvider>, ProviderError> {
        let mut cache = self.cache.lock();
        if let Some(client) = cache.get(&provider) {
            return Ok(Arc::clone(client));
        }

        let factory = self
            .factories
            .get(&provider)
            .ok_or_else(|| ProviderError::UnsupportedProvider(provider.to_string()))?;
        let client = factory()?;
        tracing::debug!(%provider, "Created provider client");
        cache.insert(provider, Arc::clone(&client));
        Ok(client)
    }

    /// Drop all cached clients; the next request rebuilds them.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn supported_providers(&self) -> Vec<&'static str> {
        Provider::ALL.iter().map(|p| p.as_str()).collect()
    }

    pub fn is_provider_supported(&self, name: &str) -> bool {
        name.parse::<Provider>().is_ok()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
