//! Cached alternate renders of the loaded base track.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::state::PlayableTrack;
use crate::db;

/// Version lookup errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VersionError {
    #[error("Version not found: {0}")]
    NotFound(String),

    #[error("Version {0} has no audio")]
    NoAudio(String),

    #[error("Failed to load versions: {0}")]
    Store(String),
}

/// Source of a track's versions.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// The base track followed by its stored versions.
    async fn fetch_versions(&self, base_track_id: &str) -> Result<Vec<PlayableTrack>, VersionError>;
}

#[async_trait]
impl VersionStore for SqlitePool {
    async fn fetch_versions(&self, base_track_id: &str) -> Result<Vec<PlayableTrack>, VersionError> {
        let store_error = |e: sqlx::Error| VersionError::Store(e.to_string());

        let Some(track) = db::get_track_by_id(self, base_track_id)
            .await
            .map_err(store_error)?
        else {
            return Ok(Vec::new());
        };
        let versions = db::get_versions_for_track(self, base_track_id)
            .await
            .map_err(store_error)?;

        let base = PlayableTrack::from(&track);
        let mut list = Vec::with_capacity(versions.len() + 1);
        for version in &versions {
            // Providers often store the original render as a version too
            if version.audio_url.is_some() && version.audio_url == track.audio_url {
                continue;
            }
            list.push(PlayableTrack::from_version(version, &track.title));
        }
        list.insert(0, base);
        Ok(list)
    }
}

/// Versions of recently played base tracks.
pub struct VersionCache {
    store: Arc<dyn VersionStore>,
    cache: HashMap<String, Vec<PlayableTrack>>,
    current_base: Option<String>,
    current_index: usize,
    preloaded: HashSet<String>,
}

impl VersionCache {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self {
            store,
            cache: HashMap::new(),
            current_base: None,
            current_index: 0,
            preloaded: HashSet::new(),
        }
    }

    /// Versions of `track_id`, from cache unless `force` or not cached yet.
    pub async fn load_versions(
        &mut self,
        track_id: &str,
        force: bool,
    ) -> Result<Vec<PlayableTrack>, VersionError> {
        if self.current_base.as_deref() != Some(track_id) {
            self.current_index = 0;
        }
        self.current_base = Some(track_id.to_string());

        if !force && let Some(cached) = self.cache.get(track_id) {
            return Ok(cached.clone());
        }

        tracing::debug!(track_id, force, "Loading versions");
        let versions = self.store.fetch_versions(track_id).await?;
        if !versions.is_empty() {
            self.cache.insert(track_id.to_string(), versions.clone());
        }
        tracing::info!(track_id, count = versions.len(), "Loaded versions");
        Ok(versions)
    }

    /// Forget cached versions of one track, e.g. after a webhook added some.
    pub fn invalidate(&mut self, track_id: &str) {
        self.cache.remove(track_id);
    }

    fn current_versions(&self) -> &[PlayableTrack] {
        self.current_base
            .as_ref()
            .and_then(|id| self.cache.get(id))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Resolve `version_id` for playback.
    ///
    /// An id missing from the cache triggers one forced reload of the
    /// current base track before giving up.
    pub async fn switch_to_version(
        &mut self,
        version_id: &str,
        current_track: Option<&PlayableTrack>,
    ) -> Result<PlayableTrack, VersionError> {
        let mut found = self
            .current_versions()
            .iter()
            .position(|v| v.id == version_id);

        if found.is_none()
            && let Some(current) = current_track
        {
            tracing::info!(version_id, "Version not cached, reloading");
            let base = current.base_track_id().to_string();
            let reloaded = self.load_versions(&base, true).await?;
            found = reloaded.iter().position(|v| v.id == version_id);
        }

        let Some(index) = found else {
            tracing::error!(version_id, "Version not found after reload");
            return Err(VersionError::NotFound(version_id.to_string()));
        };
        let version = self.current_versions()[index].clone();
        if version.audio_url.trim().is_empty() {
            return Err(VersionError::NoAudio(version_id.to_string()));
        }

        self.current_index = index;
        tracing::info!(
            version_id,
            position = index + 1,
            total = self.current_versions().len(),
            "Switching version"
        );
        Ok(version)
    }

    /// Playable versions of the current base track.
    pub fn available_versions(&self) -> Vec<PlayableTrack> {
        self.current_versions()
            .iter()
            .filter(|v| !v.audio_url.trim().is_empty())
            .cloned()
            .collect()
    }

    /// Index of the playing version within the cached list.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The version after the current one, once per audio URL.
    pub fn next_version_to_preload(&mut self) -> Option<PlayableTrack> {
        let versions = self.current_versions();
        if versions.len() < 2 {
            return None;
        }
        let next = &versions[(self.current_index + 1) % versions.len()];
        if next.audio_url.is_empty() || self.preloaded.contains(&next.audio_url) {
            return None;
        }
        let next = next.clone();
        self.preloaded.insert(next.audio_url.clone());
        Some(next)
    }
}
