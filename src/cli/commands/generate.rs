//! Generation, extension, stem separation and provider account commands.

use anyhow::Context;
use serde_json::{Map, Value, json};
use sqlx::SqlitePool;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use super::{open_db, provider_router};
use crate::config::Config;
use crate::db::{self, NewStem, NewTrack};
use crate::model::{Provider, SeparationMode, Track, TrackStatus};
use crate::providers::router::new_idempotency_key;
use crate::providers::{
    ExtendOptions, GenerationOptions, GenerationRouter, StemOptions, validate_options,
};

/// Validate, store and submit one generation request.
///
/// The track row is written before the provider call so a callback can
/// never arrive for a task with no track. A rejected submission marks the
/// track failed.
pub async fn submit_generation(
    pool: &SqlitePool,
    router: &GenerationRouter,
    mut options: GenerationOptions,
    default_provider: &str,
) -> anyhow::Result<String> {
    let provider: Provider = options
        .provider
        .get_or_insert_with(|| default_provider.to_string())
        .parse()?;
    validate_options(provider, &options)?;

    let key = options
        .idempotency_key
        .get_or_insert_with(new_idempotency_key)
        .clone();
    let style_tags = if options.style_tags.is_empty() {
        options.tags.clone()
    } else {
        options.style_tags.clone()
    };

    let mut metadata = Map::new();
    metadata.insert("prompt".into(), json!(options.prompt));
    if let Some(model) = &options.model_version {
        metadata.insert("model".into(), json!(model));
    }

    let (track_id, created) = db::insert_or_get_track(
        pool,
        &NewTrack {
            id: new_idempotency_key(),
            title: options
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            provider: Some(provider),
            task_id: None,
            lyrics: options.lyrics.clone(),
            style_tags,
            metadata,
            idempotency_key: Some(key),
        },
    )
    .await
    .context("Failed to store track")?;

    if !created
        && let Some(existing) = db::get_track_by_id(pool, &track_id).await?
        && (existing.task_id.is_some() || existing.status != TrackStatus::Pending)
    {
        info!(%track_id, status = ?existing.status, "Request already submitted, not resending");
        return Ok(track_id);
    }

    match router.generate_music(options).await {
        Ok(submission) => {
            db::mark_processing(pool, &track_id, &submission.task.task_id).await?;
            info!(%track_id, task_id = %submission.task.task_id, %provider, "Generation submitted");
            Ok(track_id)
        }
        Err(e) => {
            let mut patch = Map::new();
            patch.insert("submit_error".into(), Value::String(e.to_string()));
            db::fail_track(pool, &track_id, &e.to_string(), patch).await?;
            Err(e.into())
        }
    }
}

/// Submit a generation and print the new track ID.
pub fn cmd_generate(
    rt: &Runtime,
    config: &Config,
    options: GenerationOptions,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_db(config).await?;
        let router = provider_router(config);
        let track_id =
            submit_generation(&pool, &router, options, &config.providers.default_provider).await?;
        println!("Track {} is processing", track_id);
        println!("Check progress with: trackforge show {}", track_id);
        Ok(())
    })
}

/// Continue an existing clip.
pub fn cmd_extend(
    rt: &Runtime,
    config: &Config,
    provider: &str,
    options: ExtendOptions,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let router = provider_router(config);
        let task = router.extend_track(provider, options).await?;
        println!("Extension accepted: {} task {}", task.provider, task.task_id);
        Ok(())
    })
}

/// Separate a stored track into stems.
pub fn cmd_stems(
    rt: &Runtime,
    config: &Config,
    track_id: &str,
    mode: SeparationMode,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_db(config).await?;
        let track = db::get_track_by_id(&pool, track_id)
            .await?
            .with_context(|| format!("Track not found: {}", track_id))?;
        let provider = track
            .provider
            .clone()
            .context("Track has no provider")?;
        let options = stem_options_for(&pool, &track, mode).await?;

        let router = provider_router(config);
        let result = router.separate_stems(&provider, options).await?;

        if let Some(task_id) = &result.task_id {
            println!("Separation accepted, task {}", task_id);
        }
        if let Some(zip) = &result.zip_url {
            println!("Stems archive: {}", zip);
        }
        for (stem_type, url) in &result.stems {
            db::insert_stem(
                &pool,
                &NewStem {
                    track_id: track.id.clone(),
                    version_id: None,
                    stem_type: *stem_type,
                    separation_mode: mode,
                    audio_url: url.clone(),
                },
            )
            .await?;
            println!("  {:?}: {}", stem_type, url);
        }
        Ok(())
    })
}

/// Build separation options for a stored track.
///
/// The clip ID comes from the track metadata, then from the preferred
/// version, then from the first version that carries one.
pub async fn stem_options_for(
    pool: &SqlitePool,
    track: &Track,
    mode: SeparationMode,
) -> anyhow::Result<StemOptions> {
    let clip_of = |metadata: &Map<String, Value>| {
        metadata
            .get("clip_id")
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let mut audio_id = clip_of(&track.metadata_value());
    if audio_id.is_none() {
        let mut versions = db::get_versions_for_track(pool, &track.id).await?;
        versions.sort_by_key(|v| !v.is_preferred);
        audio_id = versions.iter().find_map(|v| {
            serde_json::from_str::<Map<String, Value>>(&v.metadata)
                .ok()
                .and_then(|m| clip_of(&m))
        });
    }

    Ok(StemOptions {
        task_id: track.task_id.clone(),
        audio_id,
        audio_url: track.audio_url.clone(),
        mode,
    })
}

/// Show the provider-side state of a task.
pub fn cmd_status(
    rt: &Runtime,
    config: &Config,
    provider: &str,
    task_id: &str,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let router = provider_router(config);
        let info = router.query_task(provider, task_id).await?;
        println!("Task {}: {:?}", info.task_id, info.status);
        if let Some(err) = &info.error {
            println!("Error: {}", err);
        }
        for clip in &info.clips {
            println!(
                "  {} {} ({})",
                clip.id,
                clip.title.as_deref().unwrap_or("-"),
                clip.playable_url().unwrap_or("no audio yet")
            );
        }
        Ok(())
    })
}

/// Print remaining credits for one provider, or all of them.
pub fn cmd_balance(rt: &Runtime, config: &Config, provider: Option<&str>) -> anyhow::Result<()> {
    rt.block_on(async {
        let router = provider_router(config);
        let names: Vec<&str> = match provider {
            Some(name) => vec![name],
            None => Provider::ALL.iter().map(|p| p.as_str()).collect(),
        };

        for name in names {
            match router.get_provider_balance(name).await {
                Ok(balance) => println!(
                    "{:8} {:>10.2} {}{}",
                    name,
                    balance.credits,
                    balance.currency.as_deref().unwrap_or("credits"),
                    if balance.stale { " (cached)" } else { "" }
                ),
                Err(e) if provider.is_none() => {
                    warn!(provider = name, error = %e, "Balance unavailable");
                    println!("{:8} unavailable: {}", name, e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::retry::RetryPolicy;
    use crate::providers::traits::mocks::MockProvider;
    use crate::providers::{MusicProvider, ProviderError, ProviderRegistry};
    use crate::test_utils::temp_db;
    use std::sync::Arc;
    use std::time::Duration;

    fn router_with(mock: Arc<MockProvider>) -> GenerationRouter {
        let provider = mock.provider;
        let registry = ProviderRegistry::new().with_factory(provider, move || {
            Ok(Arc::clone(&mock) as Arc<dyn MusicProvider>)
        });
        GenerationRouter::new(Arc::new(registry)).with_retry_policy(RetryPolicy {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        })
    }

    fn options(prompt: &str) -> GenerationOptions {
        GenerationOptions {
            prompt: prompt.into(),
            title: Some("Night Drive".into()),
            style_tags: vec!["synthwave".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_submit_marks_track_processing() {
        let (pool, _dir) = temp_db().await;
        let mock = Arc::new(MockProvider::new(Provider::Suno));
        let router = router_with(Arc::clone(&mock));

        let id = submit_generation(&pool, &router, options("neon rain"), "suno")
            .await
            .unwrap();

        let track = db::get_track_by_id(&pool, &id).await.unwrap().unwrap();
        assert_eq!(track.status, TrackStatus::Processing);
        assert_eq!(track.task_id.as_deref(), Some("task-1"));
        assert_eq!(track.title, "Night Drive");
        assert_eq!(track.tags(), vec!["synthwave".to_string()]);
        assert_eq!(
            mock.last_request().unwrap().idempotency_key,
            track.idempotency_key.unwrap()
        );
    }

    #[tokio::test]
    async fn test_same_key_reuses_track() {
        let (pool, _dir) = temp_db().await;
        let mock = Arc::new(MockProvider::new(Provider::Suno));
        let router = router_with(Arc::clone(&mock));
        let opts = GenerationOptions {
            idempotency_key: Some("k-1".into()),
            ..options("neon rain")
        };

        let first = submit_generation(&pool, &router, opts.clone(), "suno")
            .await
            .unwrap();
        let second = submit_generation(&pool, &router, opts, "suno").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(db::list_tracks(&pool, false).await.unwrap().len(), 1);
        assert_eq!(mock.requests.lock().len(), 1);

        let track = db::get_track_by_id(&pool, &first).await.unwrap().unwrap();
        assert_eq!(track.status, TrackStatus::Processing);
        assert_eq!(track.task_id.as_deref(), Some("task-1"));
    }

    #[tokio::test]
    async fn test_stem_options_fall_back_to_version_clip() {
        let (pool, _dir) = temp_db().await;
        let router = router_with(Arc::new(MockProvider::new(Provider::Suno)));
        let id = submit_generation(&pool, &router, options("neon rain"), "suno")
            .await
            .unwrap();

        let track = db::get_track_by_id(&pool, &id).await.unwrap().unwrap();
        let opts = stem_options_for(&pool, &track, SeparationMode::SeparateVocal)
            .await
            .unwrap();
        assert_eq!(opts.audio_id, None);
        assert_eq!(opts.task_id.as_deref(), Some("task-1"));

        let mut metadata = Map::new();
        metadata.insert("clip_id".into(), json!("clip-b"));
        db::upsert_version(
            &pool,
            &db::NewVersion {
                id: "v-1".into(),
                parent_track_id: id.clone(),
                version_number: 1,
                is_preferred: false,
                title: None,
                audio_url: Some("https://cdn.example/b.mp3".into()),
                cover_url: None,
                duration: Some(120.0),
                lyrics: None,
                metadata,
            },
        )
        .await
        .unwrap();

        let opts = stem_options_for(&pool, &track, SeparationMode::SplitStem)
            .await
            .unwrap();
        assert_eq!(opts.audio_id.as_deref(), Some("clip-b"));
        assert_eq!(opts.mode, SeparationMode::SplitStem);
    }

    #[tokio::test]
    async fn test_rejected_submission_fails_track() {
        let (pool, _dir) = temp_db().await;
        let mock = Arc::new(MockProvider::failing_with(
            Provider::Suno,
            vec![ProviderError::Api {
                status: 400,
                message: "bad prompt".into(),
            }],
        ));
        let router = router_with(mock);

        assert!(
            submit_generation(&pool, &router, options("neon rain"), "suno")
                .await
                .is_err()
        );
        let tracks = db::list_tracks(&pool, false).await.unwrap();
        assert_eq!(tracks[0].status, TrackStatus::Failed);
        assert!(tracks[0].error_message.as_deref().unwrap().contains("bad prompt"));
    }

    #[tokio::test]
    async fn test_invalid_request_stores_nothing() {
        let (pool, _dir) = temp_db().await;
        let mock = Arc::new(MockProvider::new(Provider::Suno));
        let router = router_with(Arc::clone(&mock));

        assert!(submit_generation(&pool, &router, options(""), "suno").await.is_err());
        assert!(db::list_tracks(&pool, false).await.unwrap().is_empty());
        assert!(mock.last_request().is_none());
    }
}
