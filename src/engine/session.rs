//! Inference session: model lifecycle and clone-prompt preparation.

use tracing::{debug, info, warn};

use super::options::SynthesisOptions;
use super::tts::TTSError;
use crate::backend::{Backend, ClonePrompt, GeneratedAudio, HealthResponse, LoadRequest};
use crate::voice::ResolvedVoice;

/// Which model to load and how.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub model_id: String,
    pub device: String,
    pub dtype: String,
    pub hf_endpoint: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: "Qwen/Qwen3-TTS-12Hz-0.6B-Base".to_string(),
            device: "cuda".to_string(),
            dtype: "float32".to_string(),
            hf_endpoint: Some("https://hf-mirror.com".to_string()),
        }
    }
}

impl ModelConfig {
    fn load_request(&self) -> LoadRequest {
        LoadRequest {
            model_id: self.model_id.clone(),
            device: self.device.clone(),
            dtype: self.dtype.clone(),
            hf_endpoint: self.hf_endpoint.clone(),
        }
    }
}

/// One loaded model on the inference server, owned by the caller that
/// created it.
pub struct InferenceSession<B: Backend> {
    backend: B,
    config: ModelConfig,
    loaded: Option<HealthResponse>,
}

impl<B: Backend> InferenceSession<B> {
    /// Create a session. Nothing is loaded until [`ensure_ready`](Self::ensure_ready).
    pub fn new(backend: B, config: ModelConfig) -> Self {
        Self {
            backend,
            config,
            loaded: None,
        }
    }

    /// The model configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Whether the model has been loaded.
    pub fn is_ready(&self) -> bool {
        self.loaded.is_some()
    }

    /// Verify the accelerator and load the model. No-op once loaded.
    ///
    /// # Errors
    /// Returns `AcceleratorUnavailable` when the server has no CUDA device;
    /// there is no CPU fallback.
    pub fn ensure_ready(&mut self) -> Result<(), TTSError> {
        if self.loaded.is_some() {
            return Ok(());
        }

        let health = self.backend.health()?;
        if !health.cuda_available {
            return Err(TTSError::AcceleratorUnavailable(format!(
                "inference server reports device '{}'. Check that the NVIDIA driver is \
                 installed, CUDA is configured, and the server runs a CUDA build of PyTorch",
                health.device
            )));
        }

        info!("Loading model: {}", self.config.model_id);
        if let Some(gpu) = &health.gpu {
            info!("GPU: {gpu}");
        }
        if let Some(memory) = health.total_memory_gb {
            info!("GPU memory: {memory:.1} GB");
        }

        let loaded = self.backend.load_model(&self.config.load_request())?;
        info!("Model loaded on {}", loaded.device);

        self.loaded = Some(loaded);
        Ok(())
    }

    /// Build the clone prompt for a resolved voice.
    ///
    /// In x-vector-only mode the transcript is never forwarded, even when
    /// one was resolved.
    pub fn prepare(
        &self,
        voice: &ResolvedVoice,
        x_vector_only: bool,
    ) -> Result<ClonePrompt, TTSError> {
        if self.loaded.is_none() {
            return Err(TTSError::ModelNotLoaded);
        }

        let ref_text = if x_vector_only {
            None
        } else {
            voice.ref_text.clone()
        };

        info!(
            "Preparing voice clone prompt from {} (x_vector_only: {x_vector_only})",
            voice.audio_path.display()
        );

        let prompt =
            self.backend
                .create_voice_clone_prompt(&voice.audio_path, ref_text, x_vector_only)?;
        debug!("Clone prompt ready: {}", prompt.prompt_id);

        Ok(prompt)
    }

    /// Run one generation call against a prepared prompt.
    pub fn generate(
        &self,
        prompt: &ClonePrompt,
        text: &str,
        options: &SynthesisOptions,
    ) -> Result<GeneratedAudio, TTSError> {
        if self.loaded.is_none() {
            return Err(TTSError::ModelNotLoaded);
        }

        Ok(self.backend.generate_voice_clone(&options.request(text, prompt))?)
    }

    /// Discard a prompt on the server. Failures are only logged.
    pub fn release(&self, prompt: ClonePrompt) {
        if let Err(e) = self.backend.release_prompt(&prompt.prompt_id) {
            warn!("Failed to release clone prompt {}: {e}", prompt.prompt_id);
        }
    }

    /// Unload the model. Failures are only logged.
    pub fn close(&mut self) {
        if self.loaded.take().is_none() {
            return;
        }

        match self.backend.unload_model() {
            Ok(()) => info!("Model unloaded"),
            Err(e) => warn!("Failed to unload model: {e}"),
        }
    }
}
