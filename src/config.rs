use std::env;
use std::time::Duration;

pub const DEFAULT_UPSTREAM_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_RELAY_PATH: &str = "/api/generate";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const GATEWAY_URL_VAR: &str = "GEMINI_GATEWAY_URL";
pub const GATEWAY_TOKEN_VAR: &str = "GEMINI_GATEWAY_TOKEN";

/// How the upstream API key travels with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStyle {
    /// `x-goog-api-key` header.
    #[default]
    Header,
    /// `?key=` query parameter.
    QueryKey,
}

impl AuthStyle {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "header" => Some(AuthStyle::Header),
            "query" | "query_key" | "querykey" => Some(AuthStyle::QueryKey),
            _ => None,
        }
    }
}

/// Where aspect ratio and image size land inside `generationConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageConfigPlacement {
    /// `generationConfig.imageConfig { aspectRatio, imageSize }`
    #[default]
    Nested,
    /// `generationConfig { aspectRatio, imageSize }`
    Flattened,
}

impl ImageConfigPlacement {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nested" => Some(ImageConfigPlacement::Nested),
            "flattened" | "flat" => Some(ImageConfigPlacement::Flattened),
            _ => None,
        }
    }
}

/// A gateway base URL and its optional bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gateway {
    pub base_url: String,
    pub token: Option<String>,
}

/// Where the gateway settings come from. `Env` is consulted on every call,
/// so a rotated token or a newly set gateway applies to the next request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GatewaySource {
    #[default]
    Disabled,
    Fixed(Gateway),
    Env { url_var: String, token_var: String },
}

impl GatewaySource {
    pub fn fixed(base_url: impl Into<String>, token: Option<String>) -> Self {
        GatewaySource::Fixed(Gateway {
            base_url: base_url.into(),
            token,
        })
    }

    /// `GEMINI_GATEWAY_URL` / `GEMINI_GATEWAY_TOKEN`.
    pub fn env() -> Self {
        Self::env_vars(GATEWAY_URL_VAR, GATEWAY_TOKEN_VAR)
    }

    pub fn env_vars(url_var: impl Into<String>, token_var: impl Into<String>) -> Self {
        GatewaySource::Env {
            url_var: url_var.into(),
            token_var: token_var.into(),
        }
    }

    pub fn resolve(&self) -> Option<Gateway> {
        match self {
            GatewaySource::Disabled => None,
            GatewaySource::Fixed(gateway) => Some(gateway.clone()),
            GatewaySource::Env { url_var, token_var } => {
                non_empty_var(url_var).map(|base_url| Gateway {
                    base_url,
                    token: non_empty_var(token_var),
                })
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub upstream_url: String,
    pub model: String,
    pub gateway: GatewaySource,
    pub relay_url: Option<String>,
    pub relay_path: String,
    pub auth_style: AuthStyle,
    pub image_config: ImageConfigPlacement,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            gateway: GatewaySource::Disabled,
            relay_url: None,
            relay_path: DEFAULT_RELAY_PATH.to_string(),
            auth_style: AuthStyle::default(),
            image_config: ImageConfigPlacement::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl GeminiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the upstream settings. The gateway and the API key are not read
    /// here; they are looked up at call time.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        GeminiConfig {
            upstream_url: non_empty_var("GEMINI_UPSTREAM_URL").unwrap_or(defaults.upstream_url),
            model: non_empty_var("GEMINI_MODEL").unwrap_or(defaults.model),
            gateway: GatewaySource::env(),
            relay_url: non_empty_var("RELAY_URL"),
            relay_path: non_empty_var("RELAY_PATH").unwrap_or(defaults.relay_path),
            auth_style: non_empty_var("GEMINI_AUTH_STYLE")
                .and_then(|s| AuthStyle::parse(&s))
                .unwrap_or_default(),
            image_config: non_empty_var("GEMINI_IMAGE_CONFIG")
                .and_then(|s| ImageConfigPlacement::parse(&s))
                .unwrap_or_default(),
            timeout_secs: non_empty_var("REQUEST_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_upstream(mut self, url: impl Into<String>) -> Self {
        self.upstream_url = url.into();
        self
    }

    pub fn with_gateway(mut self, url: impl Into<String>, token: Option<String>) -> Self {
        self.gateway = GatewaySource::fixed(url, token);
        self
    }

    pub fn with_gateway_source(mut self, source: GatewaySource) -> Self {
        self.gateway = source;
        self
    }

    pub fn with_relay(mut self, url: impl Into<String>) -> Self {
        self.relay_url = Some(url.into());
        self
    }

    pub fn with_auth_style(mut self, style: AuthStyle) -> Self {
        self.auth_style = style;
        self
    }

    pub fn with_image_config(mut self, placement: ImageConfigPlacement) -> Self {
        self.image_config = placement;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: Option<u16>,
    pub gemini: GeminiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: None,
            gemini: GeminiConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let port = env::var("PORT").ok().and_then(|port| port.parse().ok());
        let host = non_empty_var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        Config {
            host,
            port,
            gemini: GeminiConfig::from_env(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_gemini(mut self, config: GeminiConfig) -> Self {
        self.gemini = config;
        self
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
