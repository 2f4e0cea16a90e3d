//! Static description of what each provider can do.
//!
//! Limits are character counts (prompt, lyrics, title, tags) and seconds
//! (duration). Features are bit flags so callers can check a whole set at
//! once, e.g. before showing extension controls.
//!
//! # Limits
//!
//! | | Suno | Mureka |
//! |---|---|---|
//! | prompt | 10..=500 (rec. 100) | 5..=500 (rec. 80) |
//! | lyrics | 3000 | 2000 |
//! | title | 80 | 60 |
//! | tags | 120 (rec. 50) | 100 (rec. 40) |
//! | duration | 30..=240 s | 20..=180 s |

use bitflags::bitflags;

use crate::model::{Provider, SeparationMode};

bitflags! {
    /// Optional capabilities a provider may support.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ProviderFeatures: u32 {
        const REFERENCE_AUDIO = 1 << 0;
        const EXTEND = 1 << 1;
        const COVER = 1 << 2;
        const CUSTOM_MODE = 1 << 3;
        const INSTRUMENTAL = 1 << 4;
        const VOCAL_GENDER = 1 << 5;
        const NEGATIVE_TAGS = 1 << 6;
        const STYLE_WEIGHT = 1 << 7;
        const LYRICS_WEIGHT = 1 << 8;
        const WEIRDNESS = 1 << 9;
        const BACKGROUND_MUSIC = 1 << 10;
        const STEM_SEPARATION = 1 << 11;

        /// All weight-style sliders
        const WEIGHTS = Self::STYLE_WEIGHT.bits()
            | Self::LYRICS_WEIGHT.bits()
            | Self::WEIRDNESS.bits();
    }
}

/// Inclusive range with a recommended minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthLimit {
    pub min: usize,
    pub max: usize,
    pub recommended: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderLimits {
    pub prompt: LengthLimit,
    pub lyrics_max: usize,
    pub title_max: usize,
    pub tags: LengthLimit,
    pub duration_secs: (u32, u32),
}

/// Everything static about one provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub display_name: &'static str,
    pub limits: ProviderLimits,
    pub features: ProviderFeatures,
    pub models: &'static [&'static str],
    pub default_model: &'static str,
    pub stem_modes: &'static [SeparationMode],
    /// Stems come back as one ZIP rather than one URL per stem
    pub stems_as_zip: bool,
}

impl ProviderConfig {
    pub fn supports(&self, feature: ProviderFeatures) -> bool {
        self.features.contains(feature)
    }

    pub fn supports_model(&self, model: &str) -> bool {
        self.models.contains(&model)
    }

    pub fn supports_stem_mode(&self, mode: SeparationMode) -> bool {
        self.stem_modes.contains(&mode)
    }
}

pub const SUNO_MODELS: &[&str] = &["V5", "V4_5PLUS", "V4_5", "V4", "V3_5"];
pub const MUREKA_MODELS: &[&str] = &["auto", "mureka-6", "mureka-7.5", "mureka-o1"];

static SUNO: ProviderConfig = ProviderConfig {
    provider: Provider::Suno,
    display_name: "Suno AI",
    limits: ProviderLimits {
        prompt: LengthLimit {
            min: 10,
            max: 500,
            recommended: 100,
        },
        lyrics_max: 3000,
        title_max: 80,
        tags: LengthLimit {
            min: 0,
            max: 120,
            recommended: 50,
        },
        duration_secs: (30, 240),
    },
    features: ProviderFeatures::REFERENCE_AUDIO
        .union(ProviderFeatures::EXTEND)
        .union(ProviderFeatures::COVER)
        .union(ProviderFeatures::CUSTOM_MODE)
        .union(ProviderFeatures::INSTRUMENTAL)
        .union(ProviderFeatures::VOCAL_GENDER)
        .union(ProviderFeatures::NEGATIVE_TAGS)
        .union(ProviderFeatures::WEIGHTS)
        .union(ProviderFeatures::STEM_SEPARATION),
    models: SUNO_MODELS,
    default_model: "V5",
    stem_modes: &[SeparationMode::SeparateVocal, SeparationMode::SplitStem],
    stems_as_zip: false,
};

static MUREKA: ProviderConfig = ProviderConfig {
    provider: Provider::Mureka,
    display_name: "Mureka AI",
    limits: ProviderLimits {
        prompt: LengthLimit {
            min: 5,
            max: 500,
            recommended: 80,
        },
        lyrics_max: 2000,
        title_max: 60,
        tags: LengthLimit {
            min: 0,
            max: 100,
            recommended: 40,
        },
        duration_secs: (20, 180),
    },
    features: ProviderFeatures::INSTRUMENTAL
        .union(ProviderFeatures::BACKGROUND_MUSIC)
        .union(ProviderFeatures::STEM_SEPARATION),
    models: MUREKA_MODELS,
    default_model: "auto",
    stem_modes: &[SeparationMode::SplitStem],
    stems_as_zip: true,
};

/// Static configuration for a provider.
pub fn config_for(provider: Provider) -> &'static ProviderConfig {
    match provider {
        Provider::Suno => &SUNO,
        Provider::Mureka => &MUREKA,
    }
}

/// Outcome of a soft length check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldCheck {
    Valid,
    /// Accepted, but the result will likely be worse
    Warning(String),
    Error(String),
}

impl FieldCheck {
    pub fn is_valid(&self) -> bool {
        !matches!(self, FieldCheck::Error(_))
    }
}

/// Check a prompt against the provider's length limits (trimmed, in characters).
pub fn validate_prompt(provider: Provider, prompt: &str) -> FieldCheck {
    let limit = config_for(provider).limits.prompt;
    let len = prompt.trim().chars().count();

    if len == 0 {
        return FieldCheck::Error("Prompt cannot be empty".to_string());
    }
    if len < limit.min {
        return FieldCheck::Error(format!("At least {} characters required", limit.min));
    }
    if len > limit.max {
        return FieldCheck::Error(format!(
            "Prompt is too long. Shorten it to {} characters",
            limit.max
        ));
    }
    if len < limit.recommended {
        return FieldCheck::Warning(format!(
            "Short prompt. Add more detail for better results ({}+ characters recommended)",
            limit.recommended
        ));
    }
    FieldCheck::Valid
}

/// Check lyrics against the provider's maximum. Empty lyrics are fine.
pub fn validate_lyrics(provider: Provider, lyrics: &str) -> FieldCheck {
    let max = config_for(provider).limits.lyrics_max;
    if lyrics.trim().chars().count() > max {
        return FieldCheck::Error(format!("Lyrics are too long. Maximum {max} characters"));
    }
    FieldCheck::Valid
}
