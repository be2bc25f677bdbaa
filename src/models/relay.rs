use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::models::GenerationSettings;

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub reference_images_base64: Vec<String>,
    #[serde(default)]
    pub settings: GenerationSettings,
}

/// Failure body returned by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<String>,
}

impl From<&GenerationError> for RelayErrorBody {
    fn from(err: &GenerationError) -> Self {
        RelayErrorBody {
            error: err.user_message(),
            error_code: Some(err.kind().code().to_string()),
            daily_limit: err.daily_limit(),
            reset_time: err.reset_time().map(str::to_string),
        }
    }
}
