use std::env;
use std::fmt;
use std::io::{self, BufRead, Write};

use async_trait::async_trait;

use crate::error::{GenerationError, Result};

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(***{} chars)", self.0.len())
    }
}

/// Supplies the upstream API key right before a call goes out.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns a usable credential, acquiring one interactively if the
    /// provider supports it. `Ok(None)` means none is available.
    async fn ensure_credential(&self) -> Result<Option<Credential>>;
}

/// Reads the key from the environment on every call.
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    var: String,
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self {
            var: API_KEY_VAR.to_string(),
        }
    }
}

impl EnvCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    fn read(&self) -> Option<Credential> {
        env::var(&self.var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(Credential)
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn ensure_credential(&self) -> Result<Option<Credential>> {
        Ok(self.read())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    key: Option<Credential>,
}

impl StaticCredentialProvider {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(Credential::new(key)),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn ensure_credential(&self) -> Result<Option<Credential>> {
        Ok(self.key.clone())
    }
}

/// Falls back to asking on the terminal when the environment has no key.
#[derive(Debug, Clone, Default)]
pub struct PromptingCredentialProvider {
    env: EnvCredentialProvider,
}

impl PromptingCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialProvider for PromptingCredentialProvider {
    async fn ensure_credential(&self) -> Result<Option<Credential>> {
        if let Some(credential) = self.env.read() {
            return Ok(Some(credential));
        }

        let var = self.env.var.clone();
        let entered = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let mut stderr = io::stderr();
            write!(stderr, "{} is not set. Enter an API key: ", var)?;
            stderr.flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .map_err(|e| GenerationError::Unknown(format!("Credential prompt failed: {}", e)))?
        .map_err(|e| GenerationError::Unknown(format!("Credential prompt failed: {}", e)))?;

        let entered = entered.trim();
        if entered.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Credential::new(entered)))
        }
    }
}

pub fn missing_key_error() -> GenerationError {
    GenerationError::Unknown("Configuration Error: Missing API Key".to_string())
}
