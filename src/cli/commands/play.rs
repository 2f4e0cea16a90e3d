//! Playback from the library.
//!
//! Plays the track on the default audio device with the library queued
//! behind it, and prints player events until the queue runs out or Ctrl-C.

use std::time::Duration;

use anyhow::Context;
use tokio::runtime::Runtime;

use super::open_db;
use crate::config::Config;
use crate::db;
use crate::model::TrackStatus;
use crate::player::{AudioPlayer, NoticeLevel, PlayableTrack, PlaybackStatus, PlayerEvent};

const TICK: Duration = Duration::from_millis(250);

pub fn cmd_play(
    rt: &Runtime,
    config: &Config,
    track_id: &str,
    version: Option<&str>,
    no_queue: bool,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_db(config).await?;
        let track = db::get_track_by_id(&pool, track_id)
            .await?
            .with_context(|| format!("Track not found: {}", track_id))?;

        let queue: Vec<PlayableTrack> = if no_queue {
            Vec::new()
        } else {
            db::list_tracks(&pool, false)
                .await?
                .iter()
                .filter(|t| t.status == TrackStatus::Completed)
                .map(PlayableTrack::from)
                .collect()
        };

        let mut player = AudioPlayer::with_device_backend(
            pool,
            &config.playback,
            config.credentials.storage_token.clone(),
        );

        let start = PlayableTrack::from(&track);
        if queue.is_empty() {
            player.play_track(start).await?;
        } else {
            player.play_track_with_queue(start, queue).await?;
        }
        if let Some(version_id) = version {
            player.switch_to_version(version_id).await?;
        }

        let versions = player.available_versions();
        if versions.len() > 1 {
            println!("{} versions available:", versions.len());
            for v in &versions {
                println!("  {}  {}", v.id, v.title);
            }
        }

        run_until_done(&mut player).await
    })
}

async fn run_until_done(player: &mut AudioPlayer) -> anyhow::Result<()> {
    let mut last_second = u64::MAX;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                player.clear();
                println!();
                return Ok(());
            }
            _ = tokio::time::sleep(TICK) => {}
        }

        player.tick();
        let events: Vec<PlayerEvent> = player.events().try_iter().collect();
        let ended = events
            .iter()
            .any(|e| matches!(e, PlayerEvent::TrackEnded(_)));
        for event in &events {
            print_event(event);
        }

        if ended {
            println!();
            if !player.play_next().await? {
                player.clear();
                println!("End of queue");
                return Ok(());
            }
            continue;
        }

        player.preload_next().await;

        let state = player.state();
        if state.status == PlaybackStatus::Playing && state.position.as_secs() != last_second {
            last_second = state.position.as_secs();
            print!("\r{} / {}", state.position_str(), state.duration_str());
            use std::io::Write;
            std::io::stdout().flush()?;
        }
    }
}

fn print_event(event: &PlayerEvent) {
    match event {
        PlayerEvent::TrackChanged(Some(id)) => println!("\n▶ {}", id),
        PlayerEvent::Notice(notice) => {
            let marker = match notice.level {
                NoticeLevel::Info => "ℹ",
                NoticeLevel::Error => "✗",
            };
            println!("\n{} {}: {}", marker, notice.title, notice.message);
        }
        _ => {}
    }
}
