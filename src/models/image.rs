use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static DATA_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:(.+);base64,(.+)$").expect("data URL pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    Auto,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "16:9")]
    Landscape16x9,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 6] = [
        AspectRatio::Auto,
        AspectRatio::Square,
        AspectRatio::Portrait3x4,
        AspectRatio::Landscape4x3,
        AspectRatio::Portrait9x16,
        AspectRatio::Landscape16x9,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Auto => "Auto",
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Landscape16x9 => "16:9",
        }
    }

    /// Value sent to the provider. `Auto` is expressed by leaving the field
    /// out, never by sending "Auto".
    pub fn provider_value(&self) -> Option<&'static str> {
        match self {
            AspectRatio::Auto => None,
            other => Some(other.as_str()),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.as_str().eq_ignore_ascii_case(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::OneK => "1K",
            Resolution::TwoK => "2K",
            Resolution::FourK => "4K",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "1K" => Some(Resolution::OneK),
            "2K" => Some(Resolution::TwoK),
            "4K" => Some(Resolution::FourK),
            _ => None,
        }
    }
}

pub const DEFAULT_TEMPERATURE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationSettings {
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        GenerationSettings {
            aspect_ratio: AspectRatio::Auto,
            resolution: Resolution::OneK,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl GenerationSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Temperature as sent on the wire: clamped to `0.0..=1.0`, with NaN and
    /// infinities replaced by the default.
    pub fn effective_temperature(&self) -> f32 {
        if self.temperature.is_finite() {
            self.temperature.clamp(0.0, 1.0)
        } else {
            DEFAULT_TEMPERATURE
        }
    }
}

/// Inline image block: a mime type plus its base64 payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: String,
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Parses `data:<mime>;base64,<payload>`. Anything else yields `None`.
    pub fn from_data_url(data_url: &str) -> Option<Self> {
        let captures = DATA_URL.captures(data_url)?;
        Some(Self::new(&captures[1], &captures[2]))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub reference_images: Vec<EncodedImage>,
    pub settings: GenerationSettings,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            reference_images: Vec::new(),
            settings: GenerationSettings::default(),
        }
    }

    pub fn with_images(mut self, images: Vec<EncodedImage>) -> Self {
        self.reference_images = images;
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitInfo {
    pub remaining: u32,
    pub limit: u32,
    pub used: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    /// `data:<mime>;base64,<payload>`
    pub image_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitInfo>,
}
