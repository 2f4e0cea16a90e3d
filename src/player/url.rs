//! Audio URL checks applied before a load starts.

use reqwest::Url;

use super::PlaybackError;
use crate::config::PlaybackConfig;

/// Path suffixes accepted as audio.
pub const AUDIO_EXTENSIONS: &[&str] = &[
    ".mp3", ".wav", ".ogg", ".flac", ".m4a", ".aac", ".webm", ".opus",
];

/// Provider CDNs whose URLs stream audio without a file extension.
pub const DEFAULT_TRUSTED_DOMAINS: &[&str] = &[
    "suno.ai",
    "suno.com",
    "sunoapi.org",
    "erweima.ai",
    "mureka.ai",
    "supabase.co",
];

/// Hosts (substring match) that get storage credentials attached.
pub const DEFAULT_INTERNAL_HOSTS: &[&str] = &["supabase", "lovable"];

/// Whether the URL path ends in a known audio extension.
///
/// Falls back to the last path segment when the URL doesn't parse.
pub fn has_known_audio_extension(url: &str) -> bool {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        Err(_) => {
            let without_query = url.split('?').next().unwrap_or_default();
            without_query
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase()
        }
    };
    AUDIO_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Allowlist and credential rules for playback URLs.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    trusted_domains: Vec<String>,
    internal_hosts: Vec<String>,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self::from_config(&PlaybackConfig::default())
    }
}

impl UrlPolicy {
    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self {
            trusted_domains: config
                .trusted_domains
                .iter()
                .map(|d| d.to_ascii_lowercase())
                .collect(),
            internal_hosts: config
                .internal_storage_hosts
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Host equals a trusted domain or is a subdomain of one.
    pub fn is_trusted(&self, url: &str) -> bool {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        else {
            return false;
        };
        self.trusted_domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    }

    pub fn needs_credentials(&self, url: &str) -> bool {
        let lower = url.to_ascii_lowercase();
        self.internal_hosts.iter().any(|h| lower.contains(h.as_str()))
    }

    /// The trimmed URL if it may be played.
    pub fn check(&self, url: &str) -> Result<String, PlaybackError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(PlaybackError::MissingUrl);
        }
        if !self.is_trusted(url) && !has_known_audio_extension(url) {
            return Err(PlaybackError::UnknownFormat(url.to_string()));
        }
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert!(has_known_audio_extension("https://example.com/a/song.MP3?token=x"));
        assert!(has_known_audio_extension("https://example.com/a.opus"));
        assert!(!has_known_audio_extension("https://example.com/page.html"));
        assert!(!has_known_audio_extension("https://example.com/download?file=a.mp3"));
        assert!(has_known_audio_extension("relative/path/clip.wav?x=1"));
    }

    #[test]
    fn test_trusted_domains() {
        let policy = UrlPolicy::default();
        assert!(policy.is_trusted("https://cdn1.suno.ai/abc"));
        assert!(policy.is_trusted("https://mureka.ai/stream/1"));
        assert!(!policy.is_trusted("https://notsuno.ai/abc"));
        assert!(!policy.is_trusted("not a url"));
    }

    #[test]
    fn test_check() {
        let policy = UrlPolicy::default();
        assert_eq!(
            policy.check("  https://cdn1.suno.ai/abc  ").unwrap(),
            "https://cdn1.suno.ai/abc"
        );
        assert!(matches!(policy.check("   "), Err(PlaybackError::MissingUrl)));
        assert!(matches!(
            policy.check("https://example.com/page"),
            Err(PlaybackError::UnknownFormat(_))
        ));
        assert!(policy.check("https://example.com/a.flac").is_ok());
    }

    #[test]
    fn test_credentials_only_for_internal_hosts() {
        let policy = UrlPolicy::default();
        assert!(policy.needs_credentials("https://abc.supabase.co/storage/v1/object/a.mp3"));
        assert!(!policy.needs_credentials("https://cdn1.suno.ai/a.mp3"));
    }
}
