use std::time::Duration;

use crate::error::GenerationError;

pub const SAFETY_FINISH_REASONS: [&str; 3] = ["SAFETY", "IMAGE_SAFETY", "IMAGE_OTHER"];
pub const NORMAL_FINISH_REASONS: [&str; 2] = ["STOP", "FINISH_REASON_UNSPECIFIED"];

/// How much of a text-only reply is quoted back to the user.
pub const REFUSAL_QUOTE_CHARS: usize = 200;

/// Maps a reqwest failure onto the taxonomy. Applies to every target.
pub fn classify_transport_error(err: &reqwest::Error, timeout: Duration) -> GenerationError {
    if err.is_timeout() {
        return GenerationError::Timeout(format!(
            "The request timed out after {} seconds. Image generation can be slow, please try again.",
            timeout.as_secs()
        ));
    }

    if err.is_decode() {
        return non_json(err.status().map(|s| s.as_u16()).unwrap_or(0), None);
    }

    if err.is_connect() || err.is_request() {
        return GenerationError::NetworkFailure(
            "Network error: could not reach the image service. Please check your connection and try again."
                .to_string(),
        );
    }

    GenerationError::NetworkFailure(format!(
        "Network error: {}. Please check your connection and try again.",
        err
    ))
}

pub fn non_json(status: u16, hint: Option<&str>) -> GenerationError {
    let mut message = format!(
        "Server Error ({}): The server returned an unexpected response format. Please check if the backend is running.",
        status
    );
    if let Some(hint) = hint {
        message.push(' ');
        message.push_str(hint);
    }
    GenerationError::NonJsonResponse { status, message }
}

pub fn invalid_json(status: u16) -> GenerationError {
    GenerationError::NonJsonResponse {
        status,
        message: format!("Server returned invalid JSON. Status: {}", status),
    }
}

pub fn safety_block(reason: &str) -> GenerationError {
    GenerationError::SafetyBlock(format!(
        "Generation blocked by safety filters ({}). Try rephrasing the prompt or using different reference images.",
        reason
    ))
}

pub fn unexpected_finish(reason: &str) -> GenerationError {
    GenerationError::Unknown(format!("Generation stopped unexpectedly: {}", reason))
}

/// The model explained itself instead of drawing.
pub fn text_refusal(text: &str) -> GenerationError {
    GenerationError::UpstreamRefusal(format!(
        "Generation refused (text response): {}",
        truncate_chars(text.trim(), REFUSAL_QUOTE_CHARS)
    ))
}

pub fn upstream_error(message: &str) -> GenerationError {
    GenerationError::UpstreamRefusal(format!("Upstream API error: {}", message))
}

pub fn rate_limited(daily_limit: u32, reset_time: Option<String>) -> GenerationError {
    let message = match &reset_time {
        Some(reset) => format!(
            "Daily limit of {} generations reached. Try again after {}.",
            daily_limit, reset
        ),
        None => format!(
            "Daily limit of {} generations reached. Please try again later.",
            daily_limit
        ),
    };
    GenerationError::RateLimitExceeded {
        message,
        daily_limit,
        reset_time,
    }
}

pub fn no_candidates() -> GenerationError {
    GenerationError::Unknown("The model did not return any candidates.".to_string())
}

pub fn no_image_data() -> GenerationError {
    GenerationError::Unknown("No image data returned.".to_string())
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
