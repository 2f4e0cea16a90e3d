//! Fetching remote audio for the media backends.

use std::collections::VecDeque;

use reqwest::header::{CONTENT_TYPE, RANGE};

use super::backend::{LoadRequest, MediaError};

/// HTTP client that attaches storage credentials when asked to.
pub struct SourceFetcher {
    http_client: reqwest::Client,
    storage_token: Option<String>,
}

impl SourceFetcher {
    pub fn new(storage_token: Option<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .gzip(false)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http_client,
            storage_token,
        }
    }

    /// Fetch the first `limit` bytes with a range request.
    pub async fn fetch_head(
        &self,
        request: &LoadRequest,
        limit: usize,
    ) -> Result<Vec<u8>, MediaError> {
        self.fetch(request, limit, true).await
    }

    /// Fetch the whole source; bodies over `limit` bytes are refused.
    pub async fn fetch_all(
        &self,
        request: &LoadRequest,
        limit: usize,
    ) -> Result<Vec<u8>, MediaError> {
        self.fetch(request, limit, false).await
    }

    async fn fetch(
        &self,
        request: &LoadRequest,
        limit: usize,
        head_only: bool,
    ) -> Result<Vec<u8>, MediaError> {
        let mut builder = self.http_client.get(&request.url);
        if head_only {
            builder = builder.header(RANGE, format!("bytes=0-{}", limit.saturating_sub(1)));
        }
        if request.with_credentials
            && let Some(token) = &self.storage_token
        {
            builder = builder.bearer_auth(token);
        }

        let mut response = builder.send().await.map_err(network_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::Http(status.as_u16()));
        }
        if let Some(content_type) = response.headers().get(CONTENT_TYPE)
            && let Ok(value) = content_type.to_str()
            && (value.starts_with("text/") || value.contains("json"))
        {
            return Err(MediaError::Unsupported(value.to_string()));
        }

        let mut body = Vec::with_capacity(limit.min(1024 * 1024));
        while let Some(chunk) = response.chunk().await.map_err(network_error)? {
            body.extend_from_slice(&chunk);
            if body.len() >= limit {
                if !head_only {
                    return Err(MediaError::Unsupported(format!(
                        "source larger than {} bytes",
                        limit
                    )));
                }
                body.truncate(limit);
                break;
            }
        }
        if body.is_empty() {
            return Err(MediaError::Decode("empty response body".to_string()));
        }
        Ok(body)
    }
}

fn network_error(e: reqwest::Error) -> MediaError {
    if e.is_timeout() {
        MediaError::Timeout
    } else {
        MediaError::Network(e.to_string())
    }
}

/// Lowercased file extension of a URL path, used as a format hint.
pub fn extension_of(url: &str) -> Option<String> {
    let path = reqwest::Url::parse(url).ok()?.path().to_string();
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

/// Sources fetched ahead of playback, keyed by URL. The oldest entry is
/// evicted once `capacity` is reached.
#[derive(Debug)]
pub struct PreloadCache<T> {
    entries: VecDeque<(String, T)>,
    capacity: usize,
}

impl<T> PreloadCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn insert(&mut self, url: &str, value: T) {
        self.entries.retain(|(u, _)| u != url);
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((url.to_string(), value));
    }

    pub fn take(&mut self, url: &str) -> Option<T> {
        let index = self.entries.iter().position(|(u, _)| u == url)?;
        self.entries.remove(index).map(|(_, value)| value)
    }

    pub fn get(&self, url: &str) -> Option<&T> {
        self.entries.iter().find(|(u, _)| u == url).map(|(_, value)| value)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.iter().any(|(u, _)| u == url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("https://x.io/a/b.MP3?t=1").as_deref(), Some("mp3"));
        assert_eq!(extension_of("https://x.io/stream"), None);
        assert_eq!(extension_of("not a url"), None);
    }

    #[test]
    fn test_preload_cache_evicts_oldest() {
        let mut cache = PreloadCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);
        assert!(!cache.contains("a"));
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.take("b"), Some(2));
        assert_eq!(cache.take("b"), None);
        assert_eq!(cache.take("c"), Some(3));
    }

    #[test]
    fn test_preload_cache_replaces_same_url() {
        let mut cache = PreloadCache::new(2);
        cache.insert("a", 1);
        cache.insert("a", 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.take("a"), Some(2));
    }
}
