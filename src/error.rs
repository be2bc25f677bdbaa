use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Daily quota assumed when a rate-limited response does not say.
pub const DEFAULT_DAILY_LIMIT: u32 = 60;

/// Every failure a generate call can surface. Each variant carries the
/// user-facing message, so `to_string()` is what a UI should display.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("Please enter a prompt before generating.")]
    MissingPrompt,
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    NetworkFailure(String),
    #[error("{0}")]
    Timeout(String),
    #[error("{message}")]
    NonJsonResponse { status: u16, message: String },
    #[error("{0}")]
    UpstreamRefusal(String),
    #[error("{0}")]
    SafetyBlock(String),
    #[error("{message}")]
    RateLimitExceeded {
        message: String,
        daily_limit: u32,
        reset_time: Option<String>,
    },
    #[error("{0}")]
    Unknown(String),
}

/// Fieldless discriminant of [`GenerationError`], used on the relay wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    MissingPrompt,
    PayloadTooLarge,
    NetworkFailure,
    Timeout,
    NonJsonResponse,
    UpstreamRefusal,
    SafetyBlock,
    RateLimitExceeded,
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 9] = [
        ErrorKind::MissingPrompt,
        ErrorKind::PayloadTooLarge,
        ErrorKind::NetworkFailure,
        ErrorKind::Timeout,
        ErrorKind::NonJsonResponse,
        ErrorKind::UpstreamRefusal,
        ErrorKind::SafetyBlock,
        ErrorKind::RateLimitExceeded,
        ErrorKind::Unknown,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::MissingPrompt => "MISSING_PROMPT",
            ErrorKind::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorKind::NetworkFailure => "NETWORK_FAILURE",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::NonJsonResponse => "NON_JSON_RESPONSE",
            ErrorKind::UpstreamRefusal => "UPSTREAM_REFUSAL",
            ErrorKind::SafetyBlock => "SAFETY_BLOCK",
            ErrorKind::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Status the relay server answers with for this kind of failure.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::MissingPrompt => 400,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::RateLimitExceeded => 429,
            ErrorKind::NetworkFailure => 502,
            ErrorKind::Timeout => 504,
            ErrorKind::NonJsonResponse
            | ErrorKind::UpstreamRefusal
            | ErrorKind::SafetyBlock
            | ErrorKind::Unknown => 500,
        }
    }
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::MissingPrompt => ErrorKind::MissingPrompt,
            GenerationError::PayloadTooLarge(_) => ErrorKind::PayloadTooLarge,
            GenerationError::NetworkFailure(_) => ErrorKind::NetworkFailure,
            GenerationError::Timeout(_) => ErrorKind::Timeout,
            GenerationError::NonJsonResponse { .. } => ErrorKind::NonJsonResponse,
            GenerationError::UpstreamRefusal(_) => ErrorKind::UpstreamRefusal,
            GenerationError::SafetyBlock(_) => ErrorKind::SafetyBlock,
            GenerationError::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            GenerationError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Rebuilds an error that crossed the relay as `{ error, errorCode }`.
    /// `status` is the relay's HTTP status and only matters for non-JSON
    /// failures.
    pub fn from_relay(
        kind: ErrorKind,
        message: String,
        status: u16,
        daily_limit: Option<u32>,
        reset_time: Option<String>,
    ) -> Self {
        match kind {
            ErrorKind::MissingPrompt => GenerationError::MissingPrompt,
            ErrorKind::PayloadTooLarge => GenerationError::PayloadTooLarge(message),
            ErrorKind::NetworkFailure => GenerationError::NetworkFailure(message),
            ErrorKind::Timeout => GenerationError::Timeout(message),
            ErrorKind::NonJsonResponse => GenerationError::NonJsonResponse { status, message },
            ErrorKind::UpstreamRefusal => GenerationError::UpstreamRefusal(message),
            ErrorKind::SafetyBlock => GenerationError::SafetyBlock(message),
            ErrorKind::RateLimitExceeded => GenerationError::RateLimitExceeded {
                message,
                daily_limit: daily_limit.unwrap_or(DEFAULT_DAILY_LIMIT),
                reset_time,
            },
            ErrorKind::Unknown => GenerationError::Unknown(message),
        }
    }

    pub fn user_message(&self) -> String {
        self.to_string()
    }

    pub fn daily_limit(&self) -> Option<u32> {
        match self {
            GenerationError::RateLimitExceeded { daily_limit, .. } => Some(*daily_limit),
            _ => None,
        }
    }

    pub fn reset_time(&self) -> Option<&str> {
        match self {
            GenerationError::RateLimitExceeded { reset_time, .. } => reset_time.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;
