//! Field-level validation of generation requests.
//!
//! The router is lenient (it trims tags and clamps weights); this is the
//! strict check run on user input before a request is accepted.

use std::fmt;

use super::capabilities::{MUREKA_MODELS, SUNO_MODELS, config_for};
use super::domain::GenerationOptions;
use crate::model::Provider;

const PROMPT_MAX: usize = 3000;
const LYRICS_MAX: usize = 3000;
const TITLE_MAX: usize = 200;
const STYLE_TAGS_MAX: usize = 20;
const STYLE_TAG_LEN_MAX: usize = 50;
const NEGATIVE_TAGS_MAX: usize = 200;

/// One failed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All fields that failed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Validate a request for `provider`.
pub fn validate_options(
    provider: Provider,
    opts: &GenerationOptions,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let prompt_len = opts.prompt.chars().count();
    if prompt_len == 0 {
        errors.push("prompt", "Prompt is required");
    } else if prompt_len > PROMPT_MAX {
        errors.push("prompt", "Prompt too long");
    }

    if let Some(lyrics) = &opts.lyrics
        && lyrics.chars().count() > LYRICS_MAX
    {
        errors.push("lyrics", format!("Lyrics must be at most {LYRICS_MAX} characters"));
    }

    if let Some(title) = &opts.title
        && title.chars().count() > TITLE_MAX
    {
        errors.push("title", format!("Title must be at most {TITLE_MAX} characters"));
    }

    if opts.style_tags.len() > STYLE_TAGS_MAX {
        errors.push("styleTags", format!("At most {STYLE_TAGS_MAX} style tags"));
    }
    if opts
        .style_tags
        .iter()
        .any(|t| t.chars().count() > STYLE_TAG_LEN_MAX)
    {
        errors.push(
            "styleTags",
            format!("Each style tag must be at most {STYLE_TAG_LEN_MAX} characters"),
        );
    }

    if let Some(model) = &opts.model_version
        && !config_for(provider).supports_model(model)
    {
        let (name, models) = match provider {
            Provider::Suno => ("Suno", SUNO_MODELS),
            Provider::Mureka => ("Mureka", MUREKA_MODELS),
        };
        errors.push(
            "modelVersion",
            format!("Invalid {name} model. Must be one of: {}", models.join(", ")),
        );
    }

    for (field, value) in [
        ("styleWeight", opts.style_weight),
        ("lyricsWeight", opts.lyrics_weight),
        ("audioWeight", opts.audio_weight),
        ("weirdness", opts.weirdness),
    ] {
        if let Some(v) = value
            && !(0.0..=1.0).contains(&v)
        {
            errors.push(field, "Must be between 0 and 1");
        }
    }

    if let Some(neg) = &opts.negative_tags
        && neg.chars().count() > NEGATIVE_TAGS_MAX
    {
        errors.push(
            "negativeTags",
            format!("Negative tags must be at most {NEGATIVE_TAGS_MAX} characters"),
        );
    }

    match provider {
        Provider::Suno => {
            if opts.custom_mode == Some(true) && opts.model_version.is_none() {
                errors.push("modelVersion", "Model version is required when using custom mode");
            }
        }
        Provider::Mureka => {
            if opts.custom_mode == Some(true) {
                errors.push("customMode", "Custom mode is not supported by Mureka");
            }
            if opts.vocal_gender.is_some() {
                errors.push("vocalGender", "Vocal gender selection is not supported by Mureka");
            }
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
