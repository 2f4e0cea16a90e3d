//! Adapter layer: convert between Suno DTOs and domain models
//!
//! This is the ONLY place where Suno DTO types meet domain types.

use super::dto;
use crate::model::Provider;
use crate::providers::domain::{
    Balance, ExtendOptions, GeneratedClip, GenerationRequest, ProviderError, StemOptions,
    TaskInfo, TaskStatus, VocalGender,
};

/// Build the `/generate` body from a normalized request.
pub fn to_generate_request(
    request: &GenerationRequest,
    callback_url: Option<&str>,
) -> dto::GenerateRequest {
    // Custom mode sends the lyrics as the prompt and the tags as the style
    let prompt = if request.custom_mode {
        request.lyrics.clone().unwrap_or_default()
    } else {
        request.prompt.clone().unwrap_or_default()
    };

    dto::GenerateRequest {
        prompt,
        style: join_tags(&request.style_tags),
        title: request.title.clone(),
        custom_mode: request.custom_mode,
        instrumental: request.make_instrumental,
        model: request.model.clone(),
        negative_tags: join_tags(&request.negative_tags),
        vocal_gender: request.vocal_gender.map(|g| match g {
            VocalGender::Male => "m".to_string(),
            VocalGender::Female => "f".to_string(),
        }),
        style_weight: request.style_weight,
        weirdness_constraint: request.weirdness,
        audio_weight: request.audio_weight,
        upload_url: request.reference_audio_url.clone(),
        call_back_url: callback_url.map(str::to_string),
    }
}

pub fn to_extend_request(
    options: &ExtendOptions,
    default_model: &str,
    callback_url: Option<&str>,
) -> dto::ExtendRequest {
    let style = join_tags(&options.style_tags);
    let custom = options.prompt.is_some()
        || style.is_some()
        || options.title.is_some()
        || options.continue_at.is_some();

    dto::ExtendRequest {
        audio_id: options.audio_id.clone(),
        default_param_flag: custom,
        prompt: options.prompt.clone(),
        style,
        title: options.title.clone(),
        continue_at: options.continue_at,
        instrumental: options.make_instrumental,
        model: options
            .model_version
            .clone()
            .unwrap_or_else(|| default_model.to_string()),
        call_back_url: callback_url.map(str::to_string),
    }
}

pub fn to_stem_request(
    options: &StemOptions,
    callback_url: Option<&str>,
) -> Result<dto::StemRequest, ProviderError> {
    let (Some(task_id), Some(audio_id)) = (&options.task_id, &options.audio_id) else {
        return Err(ProviderError::InvalidResponse(
            "Suno stem separation needs both a task ID and an audio ID".to_string(),
        ));
    };
    Ok(dto::StemRequest {
        task_id: task_id.clone(),
        audio_id: audio_id.clone(),
        separation_type: options.mode.as_str().to_string(),
        call_back_url: callback_url.map(str::to_string),
    })
}

/// Unwrap a response envelope, turning non-200 codes into API errors.
pub fn unwrap_envelope<T>(envelope: dto::Envelope<T>) -> Result<T, ProviderError> {
    if envelope.code != 200 {
        if envelope.code == 429 {
            return Err(ProviderError::RateLimited);
        }
        return Err(ProviderError::Api {
            status: u16::try_from(envelope.code).unwrap_or(500),
            message: if envelope.msg.is_empty() {
                "Suno API responded with an error".to_string()
            } else {
                envelope.msg
            },
        });
    }
    envelope
        .data
        .ok_or_else(|| ProviderError::InvalidResponse("response has no data".to_string()))
}

pub fn to_task_info(info: dto::RecordInfo) -> TaskInfo {
    let clips = info
        .response
        .map(|r| r.suno_data.into_iter().map(to_clip).collect())
        .unwrap_or_default();

    TaskInfo {
        task_id: info.task_id,
        status: map_status(&info.status),
        clips,
        error: info.error_message.filter(|m| !m.is_empty()),
    }
}

fn map_status(status: &str) -> TaskStatus {
    match status {
        "PENDING" => TaskStatus::Pending,
        "TEXT_SUCCESS" | "FIRST_SUCCESS" => TaskStatus::Processing,
        "SUCCESS" => TaskStatus::Completed,
        _ => TaskStatus::Failed,
    }
}

fn to_clip(track: dto::SunoTrack) -> GeneratedClip {
    GeneratedClip {
        id: track.id,
        audio_url: non_empty(track.audio_url),
        stream_audio_url: non_empty(track.stream_audio_url),
        image_url: non_empty(track.image_url),
        video_url: None,
        title: track.title,
        lyrics: track.prompt,
        tags: split_tags(track.tags.as_deref()),
        duration: track.duration,
    }
}

pub fn to_balance(credits: f64) -> Balance {
    Balance {
        provider: Provider::Suno,
        credits,
        currency: None,
        stale: false,
    }
}

fn join_tags(tags: &[String]) -> Option<String> {
    if tags.is_empty() {
        None
    } else {
        Some(tags.join(", "))
    }
}

/// Split a comma-separated tag string.
pub fn split_tags(tags: Option<&str>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
