use serde_json::Value;

use crate::error::{ErrorKind, GenerationError, Result, DEFAULT_DAILY_LIMIT};
use crate::gemini::classifier::{
    self, truncate_chars, NORMAL_FINISH_REASONS, SAFETY_FINISH_REASONS,
};
use crate::gemini::transport::{RawResponse, TargetKind};
use crate::models::{GenerateContentResponse, GenerationResponse, RateLimitInfo};

pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";

const NOT_DEPLOYED_HINT: &str = "The /api/generate endpoint was not found. Start the relay server or set GEMINI_GATEWAY_URL.";

/// Turns a raw response from any target into an image or exactly one
/// classified error.
pub fn normalize(kind: TargetKind, response: &RawResponse) -> Result<GenerationResponse> {
    let status = response.status;

    if !response.is_json() {
        log::error!(
            "Server returned non-JSON response ({}): {}",
            status,
            truncate_chars(&response.body, 200)
        );
        return Err(classifier::non_json(status, deployment_hint(kind, response)));
    }

    let body: Value = serde_json::from_str(&response.body).map_err(|e| {
        log::error!("Failed to parse JSON response: {}", e);
        classifier::invalid_json(status)
    })?;

    // A 429 is valid JSON but still a failure; it must not fall through to
    // the generic status handling below.
    if let Some(err) = rate_limit_error(response, &body) {
        return Err(err);
    }

    if let Some(err) = error_field(status, &body) {
        return Err(err);
    }

    if !response.is_success() {
        return Err(GenerationError::Unknown(format!("Server error: {}", status)));
    }

    let rate_limit = rate_limit_info(response, &body);
    let image_data = match kind {
        TargetKind::Relay => relay_image(&body)?,
        TargetKind::Gateway | TargetKind::Direct => candidate_image(body)?,
    };

    Ok(GenerationResponse {
        image_data,
        rate_limit,
    })
}

fn deployment_hint(kind: TargetKind, response: &RawResponse) -> Option<&'static str> {
    if kind != TargetKind::Relay || !matches!(response.status, 404 | 405) {
        return None;
    }
    let body = response.body.trim_start().to_ascii_lowercase();
    let looks_like_page =
        body.is_empty() || body.starts_with("<!doctype") || body.starts_with("<html");
    looks_like_page.then_some(NOT_DEPLOYED_HINT)
}

fn rate_limit_error(response: &RawResponse, body: &Value) -> Option<GenerationError> {
    let error = body.get("error");
    let error_status = error.and_then(|e| e.get("status")).and_then(Value::as_str);
    let error_code = body.get("errorCode").and_then(Value::as_str);

    let limited = response.status == 429
        || error_status == Some(RATE_LIMIT_EXCEEDED)
        || error_code == Some(RATE_LIMIT_EXCEEDED);
    if !limited {
        return None;
    }

    let daily_limit = [
        error.and_then(|e| e.get("dailyLimit")),
        body.get("dailyLimit"),
        error.and_then(|e| e.get("limit")),
    ]
    .into_iter()
    .flatten()
    .find_map(as_u32)
    .or_else(|| response.header("x-ratelimit-limit").and_then(|v| v.trim().parse().ok()))
    .unwrap_or(DEFAULT_DAILY_LIMIT);

    let reset_time = [
        error.and_then(|e| e.get("resetTime")),
        body.get("resetTime"),
    ]
    .into_iter()
    .flatten()
    .find_map(as_text)
    .or_else(|| response.header("x-ratelimit-reset").map(str::to_string));

    log::warn!(
        "Rate limit exceeded (limit {}, resets {:?})",
        daily_limit,
        reset_time
    );
    Some(classifier::rate_limited(daily_limit, reset_time))
}

fn error_field(status: u16, body: &Value) -> Option<GenerationError> {
    match body.get("error")? {
        Value::Null => None,
        Value::Object(obj) => {
            let message = obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(obj.clone()).to_string());
            Some(classifier::upstream_error(&message))
        }
        // Relay shape: `{ error, errorCode? }`.
        Value::String(message) => {
            let kind = body
                .get("errorCode")
                .and_then(Value::as_str)
                .and_then(ErrorKind::from_code);
            Some(match kind {
                Some(kind) => GenerationError::from_relay(
                    kind,
                    message.clone(),
                    status,
                    body.get("dailyLimit").and_then(as_u32),
                    body.get("resetTime").and_then(as_text),
                ),
                None => GenerationError::UpstreamRefusal(message.clone()),
            })
        }
        other => Some(classifier::upstream_error(&other.to_string())),
    }
}

fn relay_image(body: &Value) -> Result<String> {
    body.get("imageData")
        .and_then(Value::as_str)
        .filter(|data| !data.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            GenerationError::Unknown("Server returned success but no image data.".to_string())
        })
}

fn candidate_image(body: Value) -> Result<String> {
    let parsed: GenerateContentResponse = serde_json::from_value(body).map_err(|e| {
        GenerationError::Unknown(format!("Unexpected response shape: {}", e))
    })?;

    let candidate = parsed
        .candidates
        .first()
        .ok_or_else(classifier::no_candidates)?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if SAFETY_FINISH_REASONS.contains(&reason) {
            log::warn!("Generation blocked: {}", reason);
            return Err(classifier::safety_block(reason));
        }
        if !NORMAL_FINISH_REASONS.contains(&reason) {
            return Err(classifier::unexpected_finish(reason));
        }
    }

    let inline = candidate
        .parts()
        .iter()
        .filter_map(|part| part.inline_data.as_ref())
        .find(|data| !data.data.is_empty());
    if let Some(inline) = inline {
        let mime_type = if inline.mime_type.is_empty() {
            "image/png"
        } else {
            inline.mime_type.as_str()
        };
        return Ok(format!("data:{};base64,{}", mime_type, inline.data));
    }

    let text = candidate
        .parts()
        .iter()
        .filter_map(|part| part.text.as_deref())
        .find(|text| !text.trim().is_empty());
    match text {
        Some(text) => Err(classifier::text_refusal(text)),
        None => Err(classifier::no_image_data()),
    }
}

fn rate_limit_info(response: &RawResponse, body: &Value) -> Option<RateLimitInfo> {
    if let Some(info) = body
        .get("rateLimit")
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value::<RateLimitInfo>(v.clone()).ok())
    {
        return Some(info);
    }

    let header = |name: &str| -> Option<u32> {
        response.header(name).and_then(|v| v.trim().parse().ok())
    };
    let remaining = header("x-ratelimit-remaining");
    let limit = header("x-ratelimit-limit");
    let used = header("x-ratelimit-used");

    if remaining.is_none() && limit.is_none() && used.is_none() {
        return None;
    }

    let used = used.or_else(|| Some(limit?.saturating_sub(remaining?)));
    Some(RateLimitInfo {
        remaining: remaining.unwrap_or_default(),
        limit: limit.unwrap_or_default(),
        used: used.unwrap_or_default(),
    })
}

fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
