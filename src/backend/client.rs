//! HTTP client for inference server communication.

use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Response;
use serde::Deserialize;
use tracing::debug;

use super::Backend;
use super::types::{
    BackendError, ClonePrompt, GenerateRequest, GeneratedAudio, HealthResponse, LoadRequest,
};

/// Model loading and long generations can run for minutes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Error body of a failed request.
#[derive(Deserialize)]
struct ErrorDetail {
    detail: String,
}

/// HTTP-based backend client.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpBackend {
    /// Create a new HTTP backend client.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            base_url: format!("http://{host}:{port}"),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Get the base URL for this backend.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn check_status(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        Err(request_failed(status, &body))
    }

    /// Like `check_status`, but a 404 naming `prompt_id` means the server
    /// no longer holds that prompt.
    fn check_prompt_status(
        response: Response,
        prompt_id: &str,
    ) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        if status == StatusCode::NOT_FOUND && names_prompt(&body, prompt_id) {
            return Err(BackendError::PromptNotFound(prompt_id.to_string()));
        }
        Err(request_failed(status, &body))
    }
}

fn request_failed(status: StatusCode, body: &str) -> BackendError {
    let detail = body.trim();
    if detail.is_empty() {
        BackendError::RequestFailed(format!("Status: {status}"))
    } else {
        BackendError::RequestFailed(format!("Status: {status}: {detail}"))
    }
}

/// Whether an error body refers to the given prompt.
///
/// A 404 for an unknown route carries a generic detail, so it is not
/// taken as a missing prompt.
fn names_prompt(body: &str, prompt_id: &str) -> bool {
    !prompt_id.is_empty()
        && serde_json::from_str::<ErrorDetail>(body)
            .map(|e| e.detail.contains(prompt_id))
            .unwrap_or(false)
}

impl Backend for HttpBackend {
    fn health(&self) -> Result<HealthResponse, BackendError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        Self::check_status(response)?
            .json()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    fn load_model(&self, request: &LoadRequest) -> Result<HealthResponse, BackendError> {
        let url = format!("{}/load", self.base_url);
        debug!(model_id = %request.model_id, device = %request.device, "POST {url}");

        let response = self
            .client
            .post(&url)
            .json(request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        Self::check_status(response)?
            .json()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    fn create_voice_clone_prompt(
        &self,
        ref_audio: &Path,
        ref_text: Option<String>,
        x_vector_only: bool,
    ) -> Result<ClonePrompt, BackendError> {
        let url = format!("{}/voice_clone_prompt", self.base_url);

        let audio_data = std::fs::read(ref_audio)
            .map_err(|_| BackendError::FileNotFound(ref_audio.display().to_string()))?;

        let file_name = ref_audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("reference.wav");

        let mime = match ref_audio.extension().and_then(|e| e.to_str()) {
            Some("mp3") => "audio/mpeg",
            _ => "audio/wav",
        };

        let file_part = reqwest::blocking::multipart::Part::bytes(audio_data)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|e| BackendError::RequestFailed(e.to_string()))?;

        let mut form = reqwest::blocking::multipart::Form::new()
            .part("audio", file_part)
            .text("x_vector_only_mode", x_vector_only.to_string());

        if let Some(text) = ref_text {
            form = form.text("ref_text", text);
        }

        debug!(x_vector_only, "POST {url} ({file_name})");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        #[derive(Deserialize)]
        struct PromptResponse {
            prompt_id: String,
        }

        let created: PromptResponse = Self::check_status(response)?
            .json()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        Ok(ClonePrompt {
            prompt_id: created.prompt_id,
            x_vector_only,
        })
    }

    fn generate_voice_clone(
        &self,
        request: &GenerateRequest,
    ) -> Result<GeneratedAudio, BackendError> {
        let url = format!("{}/generate_voice_clone", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        Self::check_prompt_status(response, &request.prompt_id)?
            .json()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    fn release_prompt(&self, prompt_id: &str) -> Result<(), BackendError> {
        let url = format!("{}/voice_clone_prompt/{prompt_id}", self.base_url);

        let response = self
            .client
            .delete(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        Self::check_prompt_status(response, prompt_id)?;
        Ok(())
    }

    fn unload_model(&self) -> Result<(), BackendError> {
        let url = format!("{}/unload", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        Self::check_status(response)?;
        Ok(())
    }
}
