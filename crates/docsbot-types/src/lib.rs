//! Shared types for the docsbot Ollama tooling.
//!
//! Wire shapes for the two Ollama HTTP endpoints the tooling consumes
//! (`/api/tags` and `/api/generate`) and the status values produced by the
//! lifecycle checks.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Tag appended by Ollama when a model is pulled without an explicit tag.
pub const LATEST_TAG: &str = "latest";

// ─────────────────────────────────────────────────────────────────────────────
// /api/tags
// ─────────────────────────────────────────────────────────────────────────────

/// A single model entry returned by Ollama's `/api/tags` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTag {
    /// e.g. `"llama3.2:latest"`
    pub name: String,
    /// Size on disk in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

impl ModelTag {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            modified_at: None,
        }
    }

    /// Size rendered with a binary unit, e.g. `"1.9 GB"`.
    pub fn human_size(&self) -> Option<String> {
        const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
        let mut value = self.size? as f64;
        let mut unit = 0;
        while value >= 1024.0 && unit < UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }
        if unit == 0 {
            Some(format!("{} {}", value as u64, UNITS[0]))
        } else {
            Some(format!("{:.1} {}", value, UNITS[unit]))
        }
    }
}

/// Raw shape of the `/api/tags` JSON response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

// ─────────────────────────────────────────────────────────────────────────────
// /api/generate
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct GenerateOptions {
    pub num_ctx: u32,
}

/// Non-streaming completion request for `/api/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
    pub options: GenerateOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

/// What a generation request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// The `response` field extracted from the JSON body.
    Text(String),
    /// The body as received, when no response text could be extracted.
    Raw(String),
}

impl GenerateOutcome {
    /// Classify a `/api/generate` response body.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<GenerateResponse>(body) {
            Ok(parsed) if !parsed.response.trim().is_empty() => {
                GenerateOutcome::Text(parsed.response.trim().to_string())
            }
            _ => GenerateOutcome::Raw(body.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Model matching
// ─────────────────────────────────────────────────────────────────────────────

/// Returns `true` when the server tag `available` satisfies the configured
/// model name `wanted`.
///
/// An untagged name also matches its `:latest` tag, so `llama3.2` matches
/// `llama3.2:latest` but `llama3.2:1b` only matches itself.
pub fn model_matches(wanted: &str, available: &str) -> bool {
    if wanted == available {
        return true;
    }
    match available.strip_suffix(LATEST_TAG) {
        Some(rest) => rest.strip_suffix(':') == Some(wanted),
        None => false,
    }
}

/// Find the first tag in `tags` matching `wanted`.
pub fn find_model<'a>(wanted: &str, tags: &'a [ModelTag]) -> Option<&'a ModelTag> {
    tags.iter().find(|t| model_matches(wanted, &t.name))
}

// ─────────────────────────────────────────────────────────────────────────────
// Status values
// ─────────────────────────────────────────────────────────────────────────────

/// Result of checking whether the configured model is present on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelPresence {
    /// Carries the matching server tag.
    Available(String),
    Missing { available: Vec<String> },
}

impl ModelPresence {
    pub fn from_tags(wanted: &str, tags: &[ModelTag]) -> Self {
        match find_model(wanted, tags) {
            Some(tag) => ModelPresence::Available(tag.name.clone()),
            None => ModelPresence::Missing {
                available: tags.iter().map(|t| t.name.clone()).collect(),
            },
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ModelPresence::Available(_))
    }
}

/// Summary produced by a successful `status` run.
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// Resolved path of the `ollama` executable.
    pub binary: PathBuf,
    pub running: bool,
    pub model: ModelPresence,
    pub models: Vec<ModelTag>,
}
