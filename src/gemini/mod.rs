pub mod classifier;
pub mod credentials;
pub mod image_client;
pub mod normalizer;
pub mod request_builder;
pub mod transport;

use crate::{
    config::GeminiConfig,
    error::Result,
    media::{save_image, ReferenceImageSet},
    models::{GenerationRequest, GenerationResponse, GenerationSettings},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use credentials::{
    Credential, CredentialProvider, EnvCredentialProvider, PromptingCredentialProvider,
    StaticCredentialProvider,
};
pub use image_client::ImageClient;
pub use transport::{Payload, RawResponse, Target, TargetKind, Transport};

#[derive(Clone)]
pub struct GeminiClient {
    image_client: ImageClient,
}

impl GeminiClient {
    /// Client that reads the API key from the environment on every call.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        Self::with_credentials(config, Arc::new(EnvCredentialProvider::new()))
    }

    pub fn with_credentials(
        config: GeminiConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let transport = Transport::from_config(&config)?;
        Ok(Self {
            image_client: ImageClient::new(transport, config, credentials),
        })
    }

    pub fn image(&self) -> &ImageClient {
        &self.image_client
    }

    /// Generates from a prompt and whatever reference images the session
    /// has accumulated.
    pub async fn generate(
        &self,
        prompt: &str,
        references: &ReferenceImageSet,
        settings: GenerationSettings,
    ) -> Result<GenerationResponse> {
        let request = GenerationRequest::new(prompt)
            .with_images(references.encoded())
            .with_settings(settings);
        self.image_client.generate(&request).await
    }

    pub async fn generate_and_save(
        &self,
        request: &GenerationRequest,
        dir: impl AsRef<Path>,
    ) -> Result<(GenerationResponse, PathBuf)> {
        let response = self.image_client.generate(request).await?;
        let path = save_image(&response.image_data, dir).await?;
        Ok((response, path))
    }
}
