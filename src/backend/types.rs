//! Inference server request/response types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when communicating with the inference server.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Voice clone prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Language tag used when the caller does not pick one.
pub const DEFAULT_LANGUAGE: &str = "Chinese";

/// Default bound on generated codec tokens.
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 2048;

/// Health and accelerator status reported by the inference server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub cuda_available: bool,
    pub gpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_memory_gb: Option<f32>,
    pub device: String,
    #[serde(default)]
    pub model_loaded: bool,
}

/// Request to load a pretrained model onto the accelerator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub model_id: String,
    pub device: String,
    pub dtype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hf_endpoint: Option<String>,
}

/// Opaque speaker-conditioning artifact held by the inference server.
///
/// Only the handle lives on this side; the embedding itself never leaves
/// the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClonePrompt {
    pub prompt_id: String,
    #[serde(default)]
    pub x_vector_only: bool,
}

/// Request for one voice-clone generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub text: String,
    pub prompt_id: String,
    pub language: String,
    pub max_new_tokens: u32,
}

impl GenerateRequest {
    /// Create a generation request against a prepared prompt.
    pub fn new(text: impl Into<String>, prompt: &ClonePrompt) -> Self {
        Self {
            text: text.into(),
            prompt_id: prompt.prompt_id.clone(),
            language: DEFAULT_LANGUAGE.to_string(),
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
        }
    }

    /// Set the language tag.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the generation length bound.
    pub fn with_max_new_tokens(mut self, max_new_tokens: u32) -> Self {
        self.max_new_tokens = max_new_tokens;
        self
    }
}

/// Waveforms produced by one generation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratedAudio {
    pub waveforms: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl GeneratedAudio {
    /// The first non-empty waveform, if the model produced one.
    pub fn first(&self) -> Option<&[f32]> {
        self.waveforms
            .first()
            .map(Vec::as_slice)
            .filter(|w| !w.is_empty())
    }
}
