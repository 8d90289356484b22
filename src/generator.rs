//! The seam between a chat session and whatever produces text.
//!
//! [`Generator`] turns one prompt into one completion.
//! [`ServerGenerator`] forwards to a text-generation server; tests supply
//! their own implementations.

use crate::client::InferenceClient;
use crate::error::Result;
use crate::types::{GenerateRequest, GenerationParams};

/// Produces a raw completion for a fully formatted prompt.
#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    /// Generate text that continues `prompt`.
    ///
    /// The returned text excludes the prompt. Post-processing (marker
    /// truncation, end-of-turn stripping) is the caller's job.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// Generator backed by a text-generation-inference server.
#[derive(Debug, Clone)]
pub struct ServerGenerator {
    client: InferenceClient,
}

impl ServerGenerator {
    /// Wraps an inference client.
    pub fn new(client: InferenceClient) -> Self {
        Self { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &InferenceClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl Generator for ServerGenerator {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let request = GenerateRequest::new(prompt, params);
        let response = self.client.generate(&request).await?;
        Ok(response.generated_text)
    }
}
