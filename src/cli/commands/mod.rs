//! CLI command definitions and dispatch.
//!
//! Each group of subcommands lives in its own submodule:
//! - `generate`: generation, extension, stems, task status and balance
//! - `tracks`: library listing, trash and master versions
//! - `webhook`: callback receiver and signature tools
//! - `play`: queue playback on the audio device

mod generate;
mod play;
mod tracks;
mod webhook;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::SqlitePool;
use tokio::runtime::Runtime;

use crate::config::{self, Config};
use crate::db;
use crate::model::SeparationMode;
use crate::providers::{ExtendOptions, GenerationOptions, GenerationRouter, ProviderRegistry};

pub use generate::{cmd_balance, cmd_extend, cmd_generate, cmd_status, cmd_stems};
pub use play::cmd_play;
pub use tracks::{cmd_list, cmd_set_master, cmd_show, cmd_trash};
pub use webhook::{cmd_serve, cmd_sign, cmd_verify};

/// trackforge CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database path (overrides the config file)
    #[arg(long, global = true, env = "TRACKFORGE_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit a generation request
    Generate {
        /// Style description, or the lyrics in custom mode
        prompt: String,
        /// Provider name (suno, mureka)
        #[arg(short, long)]
        provider: Option<String>,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(long)]
        lyrics: Option<String>,
        /// Comma-separated style tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Generate without vocals
        #[arg(long)]
        instrumental: bool,
        /// Background-music mode (mureka)
        #[arg(long)]
        bgm: bool,
        /// Model version
        #[arg(short, long)]
        model: Option<String>,
        /// Use the prompt as lyrics (suno)
        #[arg(long)]
        custom: bool,
        /// Reuse a key to make resubmission safe
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    /// Continue an existing clip
    Extend {
        /// Provider clip ID
        audio_id: String,
        #[arg(short, long, default_value = "suno")]
        provider: String,
        /// Position in seconds to continue from
        #[arg(long)]
        continue_at: Option<f64>,
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
    /// Separate a track into stems
    Stems {
        track_id: String,
        #[arg(long, value_enum, default_value = "vocal")]
        mode: StemMode,
    },
    /// Query a provider task
    Status {
        task_id: String,
        #[arg(short, long, default_value = "suno")]
        provider: String,
    },
    /// Show remaining provider credits
    Balance {
        /// Provider name; all providers if omitted
        provider: Option<String>,
    },
    /// List tracks
    List {
        /// Include tracks in trash
        #[arg(long)]
        all: bool,
    },
    /// Show a track with its versions and stems
    Show { track_id: String },
    /// Move a track to trash
    Trash { track_id: String },
    /// Restore a track from trash
    Restore { track_id: String },
    /// Flag a version as the track's master
    SetMaster { track_id: String, version_id: String },
    /// Run the webhook receiver
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Sign a payload file with a webhook secret
    Sign {
        body: PathBuf,
        #[arg(short, long, default_value = "suno")]
        provider: String,
        /// Secret (defaults to the configured one)
        #[arg(long, env = "TRACKFORGE_WEBHOOK_SECRET")]
        secret: Option<String>,
    },
    /// Verify a payload file against a signature
    Verify {
        body: PathBuf,
        signature: String,
        #[arg(short, long, default_value = "suno")]
        provider: String,
        #[arg(long, env = "TRACKFORGE_WEBHOOK_SECRET")]
        secret: Option<String>,
    },
    /// Play a track, with the library queued after it
    Play {
        track_id: String,
        /// Start on this version instead of the original
        #[arg(long)]
        version: Option<String>,
        /// Play only this track
        #[arg(long)]
        no_queue: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StemMode {
    /// Vocals and instrumental
    Vocal,
    /// Every instrument
    Full,
}

impl From<StemMode> for SeparationMode {
    fn from(mode: StemMode) -> Self {
        match mode {
            StemMode::Vocal => SeparationMode::SeparateVocal,
            StemMode::Full => SeparationMode::SplitStem,
        }
    }
}

/// Run the specified CLI command.
///
/// Returns `Ok(true)` if a command was run, `Ok(false)` if no command was
/// specified (the caller prints help).
pub fn run_command(cli: &Cli) -> anyhow::Result<bool> {
    let Some(command) = &cli.command else {
        return Ok(false);
    };

    let mut config = config::load();
    if let Some(db) = &cli.db {
        config.database.path = Some(db.clone());
    }
    let rt = Runtime::new()?;

    match command {
        Commands::Generate {
            prompt,
            provider,
            title,
            lyrics,
            tags,
            instrumental,
            bgm,
            model,
            custom,
            idempotency_key,
        } => {
            let options = GenerationOptions {
                provider: provider.clone(),
                prompt: prompt.clone(),
                title: title.clone(),
                lyrics: lyrics.clone(),
                style_tags: tags.clone(),
                has_vocals: instrumental.then_some(false),
                make_instrumental: instrumental.then_some(true),
                is_bgm: bgm.then_some(true),
                model_version: model.clone(),
                custom_mode: Some(*custom),
                idempotency_key: idempotency_key.clone(),
                ..Default::default()
            };
            cmd_generate(&rt, &config, options)?;
        }
        Commands::Extend {
            audio_id,
            provider,
            continue_at,
            prompt,
            model,
        } => {
            let options = ExtendOptions {
                audio_id: audio_id.clone(),
                prompt: prompt.clone(),
                continue_at: *continue_at,
                model_version: model.clone(),
                ..Default::default()
            };
            cmd_extend(&rt, &config, provider, options)?;
        }
        Commands::Stems { track_id, mode } => {
            cmd_stems(&rt, &config, track_id, (*mode).into())?;
        }
        Commands::Status { task_id, provider } => {
            cmd_status(&rt, &config, provider, task_id)?;
        }
        Commands::Balance { provider } => {
            cmd_balance(&rt, &config, provider.as_deref())?;
        }
        Commands::List { all } => cmd_list(&rt, &config, *all)?,
        Commands::Show { track_id } => cmd_show(&rt, &config, track_id)?,
        Commands::Trash { track_id } => cmd_trash(&rt, &config, track_id, false)?,
        Commands::Restore { track_id } => cmd_trash(&rt, &config, track_id, true)?,
        Commands::SetMaster {
            track_id,
            version_id,
        } => cmd_set_master(&rt, &config, track_id, version_id)?,
        Commands::Serve { bind, port } => cmd_serve(&rt, &config, bind.as_deref(), *port)?,
        Commands::Sign {
            body,
            provider,
            secret,
        } => cmd_sign(&config, provider, body, secret.as_deref())?,
        Commands::Verify {
            body,
            signature,
            provider,
            secret,
        } => cmd_verify(&config, provider, body, signature, secret.as_deref())?,
        Commands::Play {
            track_id,
            version,
            no_queue,
        } => cmd_play(&rt, &config, track_id, version.as_deref(), *no_queue)?,
    }
    Ok(true)
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Open the configured database, running migrations.
pub(crate) async fn open_db(config: &Config) -> anyhow::Result<SqlitePool> {
    let url = db::db_url(config.database.path.as_deref());
    db::init_db(&url)
        .await
        .with_context(|| format!("Failed to open database {}", url))
}

/// Router over the configured provider clients.
pub(crate) fn provider_router(config: &Config) -> GenerationRouter {
    let registry = Arc::new(ProviderRegistry::from_config(config));
    GenerationRouter::new(registry).with_default_provider(config.providers.default_provider.clone())
}
