use std::sync::Arc;

use crate::{
    config::GeminiConfig,
    error::Result,
    gemini::{
        credentials::{missing_key_error, CredentialProvider},
        normalizer::normalize,
        request_builder::{build_provider_request, build_relay_request},
        transport::{Payload, Target, TargetKind, Transport},
    },
    logger::Timer,
    models::{GenerationRequest, GenerationResponse},
};

#[derive(Clone)]
pub struct ImageClient {
    transport: Transport,
    config: GeminiConfig,
    credentials: Arc<dyn CredentialProvider>,
}

impl ImageClient {
    pub fn new(
        transport: Transport,
        config: GeminiConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            transport,
            config,
            credentials,
        }
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Sends to whichever target the configuration resolves to.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let target = Target::resolve(&self.config);
        self.generate_via(&target, request).await
    }

    pub async fn generate_via(
        &self,
        target: &Target,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse> {
        let kind = target.kind();
        let result = self.run(target, request).await;

        match &result {
            Ok(response) => log::info!(
                "✅ Image generated via {} target ({} chars)",
                kind,
                response.image_data.len()
            ),
            Err(e) => log::error!(
                "Image generation via {} target failed [{}]: {}",
                kind,
                e.kind().code(),
                e
            ),
        }
        result
    }

    async fn run(&self, target: &Target, request: &GenerationRequest) -> Result<GenerationResponse> {
        let kind = target.kind();

        // Validation happens before any credential lookup or I/O.
        let payload = match kind {
            TargetKind::Relay => Payload::Relay(build_relay_request(request)?),
            TargetKind::Gateway | TargetKind::Direct => {
                Payload::Provider(build_provider_request(request, self.config.image_config)?)
            }
        };

        let credential = match kind {
            TargetKind::Relay => None,
            TargetKind::Gateway => self.credentials.ensure_credential().await?,
            TargetKind::Direct => Some(
                self.credentials
                    .ensure_credential()
                    .await?
                    .ok_or_else(missing_key_error)?,
            ),
        };

        log::info!(
            "🎨 Generating image with model {} via {} target",
            self.config.model,
            kind
        );
        let _timer = Timer::new("image generation");

        let raw = self
            .transport
            .send(target, &self.config.model, &payload, credential.as_ref())
            .await?;
        normalize(kind, &raw)
    }
}
