pub mod config;
pub mod error;
pub mod gemini;
pub mod logger;
pub mod media;
pub mod models;
#[cfg(feature = "server")]
pub mod server;

pub use config::{AuthStyle, Config, Gateway, GatewaySource, GeminiConfig, ImageConfigPlacement};
pub use error::{ErrorKind, GenerationError, Result};
pub use gemini::{
    Credential, CredentialProvider, EnvCredentialProvider, GeminiClient, ImageClient,
    PromptingCredentialProvider, StaticCredentialProvider, Target, TargetKind,
};
pub use media::{ImageBlob, PayloadLimit, ReferenceImageSet};
pub use models::{
    AspectRatio, EncodedImage, GenerationRequest, GenerationResponse, GenerationSettings,
    RateLimitInfo, Resolution,
};
