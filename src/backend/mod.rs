//! Backend communication with the Qwen3-TTS inference server.
//!
//! Provides the trait the orchestrator drives and an HTTP implementation
//! for the server that hosts the pretrained model on the GPU.

mod client;
mod types;

pub use client::HttpBackend;
pub use types::{
    BackendError, ClonePrompt, DEFAULT_LANGUAGE, DEFAULT_MAX_NEW_TOKENS, GenerateRequest,
    GeneratedAudio, HealthResponse, LoadRequest,
};

/// Trait for the external model collaborator.
///
/// This trait abstracts the HTTP communication with the inference server,
/// allowing for mock implementations in tests.
#[cfg_attr(test, mockall::automock)]
pub trait Backend: Send + Sync {
    /// Check server health and accelerator availability.
    fn health(&self) -> Result<HealthResponse, BackendError>;

    /// Load a pretrained model. Loading an already-loaded model is a no-op
    /// on the server side.
    fn load_model(&self, request: &LoadRequest) -> Result<HealthResponse, BackendError>;

    /// Build a reusable speaker-conditioning prompt.
    ///
    /// # Arguments
    /// * `ref_audio` - Path to the reference audio file
    /// * `ref_text` - Transcript of the reference audio, if conditioning on it
    /// * `x_vector_only` - Use the speaker embedding only
    fn create_voice_clone_prompt(
        &self,
        ref_audio: &std::path::Path,
        ref_text: Option<String>,
        x_vector_only: bool,
    ) -> Result<ClonePrompt, BackendError>;

    /// Generate speech for one text against a prepared prompt.
    fn generate_voice_clone(&self, request: &GenerateRequest)
    -> Result<GeneratedAudio, BackendError>;

    /// Discard a prepared prompt.
    fn release_prompt(&self, prompt_id: &str) -> Result<(), BackendError>;

    /// Unload the model and free accelerator memory.
    fn unload_model(&self) -> Result<(), BackendError>;
}

/// Create a backend for the inference server at `host:port`.
pub fn create_backend(host: &str, port: u16) -> HttpBackend {
    HttpBackend::new(host, port)
}
