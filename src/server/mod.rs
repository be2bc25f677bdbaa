//! Relay server: the same-origin `/api/generate` endpoint plus a CORS
//! passthrough to the provider for every other path.

pub mod cors;
pub mod handlers;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{http::Method, web, App, HttpServer};

use crate::config::{Config, GeminiConfig};
use crate::error::{GenerationError, Result};
use crate::gemini::{CredentialProvider, EnvCredentialProvider, GeminiClient};
use crate::media::{MAX_IMAGE_BYTES, MAX_REFERENCE_IMAGES};

/// Largest request body either route accepts: a full reference set as base64
/// data URLs plus 1 MB for the prompt, settings and JSON framing.
pub const MAX_RELAY_BODY_BYTES: usize =
    MAX_REFERENCE_IMAGES * ((MAX_IMAGE_BYTES + 2) / 3 * 4) + 1024 * 1024;

pub struct RelayState {
    pub client: GeminiClient,
    pub http: reqwest::Client,
    pub upstream_url: String,
}

impl RelayState {
    pub fn from_config(config: &GeminiConfig) -> Result<Self> {
        Self::with_credentials(config, Arc::new(EnvCredentialProvider::new()))
    }

    pub fn with_credentials(
        config: &GeminiConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let client = GeminiClient::with_credentials(config.clone(), credentials)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            http,
            upstream_url: config.upstream_url.clone(),
        })
    }
}

/// Registers `/api/generate` and the app-wide body limit. The CORS relay is
/// mounted separately as the app's default service.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_RELAY_BODY_BYTES));
    cfg.service(
        web::resource("/api/generate")
            .route(web::post().to(handlers::generate))
            .route(web::method(Method::OPTIONS).to(cors::preflight)),
    );
}

pub async fn run(config: Config) -> io::Result<()> {
    let port = config.port.unwrap_or(8080);
    let state = RelayState::from_config(&config.gemini)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let state = web::Data::new(state);

    crate::logger::log_startup_info(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        &config.host,
        port,
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(configure)
            .default_service(web::to(cors::relay))
    })
    .bind((config.host.as_str(), port))?
    .run()
    .await
}
