//! [`OllamaClient`] – blocking client for the two Ollama endpoints we use.
//!
//! `GET /api/tags` doubles as the liveness check and the model listing;
//! `POST /api/generate` runs the smoke-test prompt.

use std::time::Duration;

use docsbot_types::{GenerateOptions, GenerateOutcome, GenerateRequest, ModelTag, TagsResponse};
use thiserror::Error;
use tracing::debug;

use crate::settings::Settings;

/// Timeout for liveness checks and model listing.
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors that can arise when talking to the Ollama HTTP API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The HTTP request could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("Ollama returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    /// The response body could not be parsed.
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
}

/// The HTTP surface of an Ollama server.
pub trait ServerApi {
    /// `true` when `/api/tags` answers with a success status.
    fn ping(&self) -> bool;

    /// Models currently available on the server.
    fn list_models(&self) -> Result<Vec<ModelTag>, ApiError>;

    /// Run a non-streaming completion with the configured model.
    fn generate(&self, prompt: &str) -> Result<GenerateOutcome, ApiError>;
}

pub struct OllamaClient {
    tags_url: String,
    generate_url: String,
    model: String,
    context_window: u32,
    quick: reqwest::blocking::Client,
    generation: reqwest::blocking::Client,
}

impl OllamaClient {
    pub fn new(settings: &Settings) -> Result<Self, ApiError> {
        let quick = reqwest::blocking::Client::builder()
            .timeout(CHECK_TIMEOUT)
            .build()?;
        let generation = reqwest::blocking::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;

        Ok(Self {
            tags_url: settings.api_url("/api/tags"),
            generate_url: settings.api_url("/api/generate"),
            model: settings.model.clone(),
            context_window: settings.context_window,
            quick,
            generation,
        })
    }
}

impl ServerApi for OllamaClient {
    fn ping(&self) -> bool {
        match self.quick.get(&self.tags_url).send() {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %self.tags_url, error = %e, "Ollama health check failed");
                false
            }
        }
    }

    fn list_models(&self) -> Result<Vec<ModelTag>, ApiError> {
        let response = self.quick.get(&self.tags_url).send()?;
        if !response.status().is_success() {
            return Err(ApiError::Status {
                url: self.tags_url.clone(),
                status: response.status().as_u16(),
            });
        }

        let tags: TagsResponse = response
            .json()
            .map_err(|e| ApiError::BadResponse(format!("failed to parse /api/tags: {e}")))?;
        debug!(count = tags.models.len(), "Listed Ollama models");
        Ok(tags.models)
    }

    fn generate(&self, prompt: &str) -> Result<GenerateOutcome, ApiError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_ctx: self.context_window,
            },
        };

        // Error statuses are not fatal here: their bodies carry Ollama's
        // own message, which is shown to the user as raw output.
        let response = self.generation.post(&self.generate_url).json(&body).send()?;
        let status = response.status();
        let text = response.text()?;
        debug!(status = status.as_u16(), bytes = text.len(), "Generation finished");

        Ok(GenerateOutcome::from_body(&text))
    }
}
