//! Adapter layer: convert between Mureka DTOs and domain models
//!
//! This is the ONLY place where Mureka DTO types meet domain types.

use super::dto;
use crate::model::Provider;
use crate::providers::domain::{
    Balance, GeneratedClip, GenerationRequest, ProviderError, StemOptions, StemResult, TaskInfo,
    TaskStatus,
};

pub fn to_generate_request(request: &GenerationRequest) -> dto::GenerateRequest {
    let prompt = compose_prompt(request.prompt.as_deref(), &request.style_tags);

    // The API requires lyrics; instrumentals and lyric-less requests get a placeholder
    let lyrics = match request.lyrics.as_deref().map(str::trim) {
        Some(l) if !l.is_empty() && !request.make_instrumental => l.to_string(),
        _ => format!(
            "[Instrumental]\n{}",
            request.prompt.as_deref().unwrap_or("Music")
        ),
    };

    dto::GenerateRequest {
        lyrics,
        prompt,
        model: request.model.clone(),
        n: None,
    }
}

/// Join the description and style tags into one prompt.
fn compose_prompt(prompt: Option<&str>, tags: &[String]) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(p) = prompt.map(str::trim).filter(|p| !p.is_empty()) {
        parts.push(p);
    }
    parts.extend(tags.iter().map(String::as_str));
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

pub fn to_stem_request(options: &StemOptions) -> Result<dto::StemRequest, ProviderError> {
    let url = options
        .audio_url
        .clone()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            ProviderError::InvalidResponse("Mureka stem separation needs an audio URL".to_string())
        })?;
    Ok(dto::StemRequest { url })
}

/// Unwrap either response shape, turning non-200 codes into API errors.
pub fn unwrap_response<T>(response: dto::MaybeEnvelope<T>) -> Result<T, ProviderError> {
    match response {
        dto::MaybeEnvelope::Bare(value) => Ok(value),
        dto::MaybeEnvelope::Wrapped { code, msg, data } => {
            if code != 200 {
                if code == 429 {
                    return Err(ProviderError::RateLimited);
                }
                return Err(ProviderError::Api {
                    status: u16::try_from(code).unwrap_or(500),
                    message: msg,
                });
            }
            data.ok_or_else(|| ProviderError::InvalidResponse("response has no data".to_string()))
        }
    }
}

pub fn to_task_info(task: dto::Task) -> TaskInfo {
    TaskInfo {
        status: map_status(&task.status),
        clips: task.choices.into_iter().map(to_clip).collect(),
        error: task.failed_reason.filter(|r| !r.is_empty()),
        task_id: task.id,
    }
}

fn map_status(status: &str) -> TaskStatus {
    match status {
        "pending" | "preparing" | "queued" | "" => TaskStatus::Pending,
        "processing" | "running" | "streaming" => TaskStatus::Processing,
        "completed" | "succeeded" => TaskStatus::Completed,
        _ => TaskStatus::Failed,
    }
}

pub fn to_clip(clip: dto::Clip) -> GeneratedClip {
    GeneratedClip {
        id: clip.id,
        audio_url: clip.url.or(clip.flac_url).filter(|u| !u.is_empty()),
        stream_audio_url: None,
        image_url: clip.image_url,
        video_url: clip.video_url,
        title: clip.title,
        lyrics: clip.lyrics,
        tags: Vec::new(),
        duration: clip.duration.map(|ms| ms / 1000.0),
    }
}

pub fn to_stem_result(response: dto::StemResponse) -> Result<StemResult, ProviderError> {
    let zip_url = response
        .zip_url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ProviderError::InvalidResponse("stem response has no zip_url".to_string()))?;
    Ok(StemResult {
        task_id: None,
        zip_url: Some(zip_url),
        stems: Vec::new(),
    })
}

pub fn to_balance(billing: dto::Billing) -> Balance {
    Balance {
        provider: Provider::Mureka,
        credits: billing.balance,
        currency: billing.currency,
        stale: false,
    }
}
