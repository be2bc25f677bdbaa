use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::config::{AuthStyle, GeminiConfig};
use crate::error::{GenerationError, Result};
use crate::gemini::classifier::classify_transport_error;
use crate::gemini::credentials::Credential;
use crate::models::{GenerateContentRequest, RelayRequest};

/// Where a generate call is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Operator-run intermediary that forwards to the provider.
    Gateway { base_url: String, token: Option<String> },
    /// Relay endpoint speaking the `/api/generate` contract.
    Relay { endpoint: String },
    /// The provider itself.
    Direct { base_url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Gateway,
    Relay,
    Direct,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Gateway => write!(f, "gateway"),
            TargetKind::Relay => write!(f, "relay"),
            TargetKind::Direct => write!(f, "direct"),
        }
    }
}

impl Target {
    /// Gateway if configured, then the relay, then the provider.
    pub fn resolve(config: &GeminiConfig) -> Self {
        if let Some(gateway) = Self::gateway(config) {
            return gateway;
        }
        if let Some(relay_url) = &config.relay_url {
            let endpoint = format!(
                "{}/{}",
                relay_url.trim_end_matches('/'),
                config.relay_path.trim_start_matches('/')
            );
            return Target::Relay { endpoint };
        }
        Target::Direct {
            base_url: config.upstream_url.clone(),
        }
    }

    /// Resolution used by the relay server, which must never target itself.
    pub fn resolve_upstream(config: &GeminiConfig) -> Self {
        Self::gateway(config).unwrap_or_else(|| Target::Direct {
            base_url: config.upstream_url.clone(),
        })
    }

    fn gateway(config: &GeminiConfig) -> Option<Self> {
        config.gateway.resolve().map(|gateway| Target::Gateway {
            base_url: gateway.base_url,
            token: gateway.token,
        })
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Gateway { .. } => TargetKind::Gateway,
            Target::Relay { .. } => TargetKind::Relay,
            Target::Direct { .. } => TargetKind::Direct,
        }
    }

    pub fn url(&self, model: &str) -> String {
        match self {
            Target::Gateway { base_url, .. } | Target::Direct { base_url } => format!(
                "{}/v1beta/models/{}:generateContent",
                base_url.trim_end_matches('/'),
                model
            ),
            Target::Relay { endpoint } => endpoint.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Provider(GenerateContentRequest),
    Relay(RelayRequest),
}

/// A response read to completion, before any interpretation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| {
                let ct = ct.to_ascii_lowercase();
                ct.contains("application/json") || ct.contains("+json")
            })
            .unwrap_or(false)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One-shot HTTP sender. Never retries.
#[derive(Clone)]
pub struct Transport {
    client: Client,
    timeout: Duration,
    auth_style: AuthStyle,
}

impl Transport {
    pub fn new(timeout: Duration, auth_style: AuthStyle) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout,
            auth_style,
        })
    }

    pub fn from_config(config: &GeminiConfig) -> Result<Self> {
        Self::new(config.timeout(), config.auth_style)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn send(
        &self,
        target: &Target,
        model: &str,
        payload: &Payload,
        credential: Option<&Credential>,
    ) -> Result<RawResponse> {
        let url = target.url(model);
        let mut builder = self.client.post(&url).json(payload);

        match target {
            Target::Relay { .. } => {}
            Target::Gateway { token, .. } => {
                builder = self.attach_key(builder, credential);
                if let Some(token) = token {
                    builder = builder.bearer_auth(token);
                }
            }
            Target::Direct { .. } => {
                builder = self.attach_key(builder, credential);
            }
        }

        log::debug!("POST {} ({} target)", url, target.kind());

        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, self.timeout))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let content_type = headers.get("content-type").cloned();

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(&e, self.timeout))?;

        log::debug!("Response {} from {} ({} bytes)", status, target.kind(), body.len());

        Ok(RawResponse {
            status,
            content_type,
            headers,
            body,
        })
    }

    fn attach_key(
        &self,
        builder: reqwest::RequestBuilder,
        credential: Option<&Credential>,
    ) -> reqwest::RequestBuilder {
        match (credential, self.auth_style) {
            (Some(key), AuthStyle::Header) => builder.header("x-goog-api-key", key.expose()),
            (Some(key), AuthStyle::QueryKey) => builder.query(&[("key", key.expose())]),
            (None, _) => builder,
        }
    }
}
