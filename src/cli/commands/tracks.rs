//! Library commands: list, inspect, trash and master selection.

use std::time::Duration;

use anyhow::Context;
use tokio::runtime::Runtime;

use super::open_db;
use crate::config::Config;
use crate::db;
use crate::model::Track;
use crate::player::format_duration;

/// One-line summary of a track for listings.
pub(crate) fn track_line(track: &Track) -> String {
    let duration = track
        .duration
        .map(|secs| format_duration(Duration::from_secs_f64(secs.max(0.0))))
        .unwrap_or_else(|| "--:--".to_string());
    let trashed = if track.is_trashed() { " [trash]" } else { "" };
    format!(
        "{}  {:<10} {:>6}  {}{}",
        track.id,
        track.status.as_str(),
        duration,
        track.title,
        trashed
    )
}

/// List tracks, newest first
pub fn cmd_list(rt: &Runtime, config: &Config, include_trashed: bool) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_db(config).await?;
        let tracks = db::list_tracks(&pool, include_trashed).await?;
        if tracks.is_empty() {
            println!("No tracks yet. Create one with `trackforge generate`.");
        }
        for track in &tracks {
            println!("{}", track_line(track));
        }
        Ok(())
    })
}

/// Show one track with its versions and stems
pub fn cmd_show(rt: &Runtime, config: &Config, track_id: &str) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_db(config).await?;
        let track = db::get_track_by_id(&pool, track_id)
            .await?
            .with_context(|| format!("Track not found: {}", track_id))?;

        println!("{}", track.title);
        println!("  Status:   {}", track.status);
        println!("  Provider: {}", track.provider.as_deref().unwrap_or("-"));
        println!("  Task:     {}", track.task_id.as_deref().unwrap_or("-"));
        println!("  Audio:    {}", track.audio_url.as_deref().unwrap_or("-"));
        let tags = track.tags();
        if !tags.is_empty() {
            println!("  Tags:     {}", tags.join(", "));
        }
        if let Some(err) = &track.error_message {
            println!("  Error:    {}", err);
        }

        let versions = db::get_versions_for_track(&pool, track_id).await?;
        if !versions.is_empty() {
            println!("\nVersions:");
            for v in &versions {
                println!(
                    "  {} v{}{}{}  {}",
                    v.id,
                    v.version_number,
                    if v.is_master { " master" } else { "" },
                    if v.is_preferred { " preferred" } else { "" },
                    v.audio_url.as_deref().unwrap_or("no audio")
                );
            }
        }

        let stems = db::get_stems_for_track(&pool, track_id).await?;
        if !stems.is_empty() {
            println!("\nStems:");
            for s in &stems {
                println!("  {:?} ({}): {}", s.stem_type, s.separation_mode.as_str(), s.audio_url);
            }
        }
        Ok(())
    })
}

/// Move a track to trash, or back out of it
pub fn cmd_trash(rt: &Runtime, config: &Config, track_id: &str, restore: bool) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_db(config).await?;
        let changed = if restore {
            db::restore_track(&pool, track_id).await?
        } else {
            db::trash_track(&pool, track_id).await?
        };
        match (changed, restore) {
            (true, false) => println!("Moved {} to trash", track_id),
            (true, true) => println!("Restored {}", track_id),
            (false, false) => println!("{} not found or already in trash", track_id),
            (false, true) => println!("{} is not in trash", track_id),
        }
        Ok(())
    })
}

/// Flag a version as the track's master
pub fn cmd_set_master(
    rt: &Runtime,
    config: &Config,
    track_id: &str,
    version_id: &str,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_db(config).await?;
        match db::set_master_version(&pool, track_id, version_id).await {
            Ok(()) => {
                println!("{} is now the master of {}", version_id, track_id);
                Ok(())
            }
            Err(sqlx::Error::RowNotFound) => {
                anyhow::bail!("Version {} does not belong to track {}", version_id, track_id)
            }
            Err(e) => Err(e.into()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mock_new_track, temp_db};

    #[tokio::test]
    async fn test_track_line() {
        let (pool, _dir) = temp_db().await;
        db::insert_track(&pool, &mock_new_track("t1")).await.unwrap();
        let track = db::get_track_by_id(&pool, "t1").await.unwrap().unwrap();

        let line = track_line(&track);
        assert!(line.starts_with("t1  pending"));
        assert!(line.contains("--:--"));
        assert!(line.ends_with("Track t1"));

        db::trash_track(&pool, "t1").await.unwrap();
        let track = db::get_track_by_id(&pool, "t1").await.unwrap().unwrap();
        assert!(track_line(&track).ends_with("[trash]"));
    }
}
