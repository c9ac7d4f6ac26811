//! Per-call synthesis configuration.

use std::path::PathBuf;

use super::tts::TTSError;
use crate::backend::{ClonePrompt, DEFAULT_LANGUAGE, DEFAULT_MAX_NEW_TOKENS, GenerateRequest};

/// Upper bound accepted for `max_new_tokens`.
pub const MAX_NEW_TOKENS_LIMIT: u32 = 8192;

/// Output file prefix used when the caller does not pick one.
pub const DEFAULT_OUTPUT_PREFIX: &str = "tts";

/// Options shared by single and batch synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOptions {
    /// Target language tag passed to the model.
    pub language: String,
    /// Maximum number of generated codec tokens per item.
    pub max_new_tokens: u32,
    /// Condition on the speaker embedding only, ignoring any transcript.
    pub x_vector_only: bool,
    /// Reference transcript overriding the one stored next to the voice.
    pub ref_text: Option<String>,
    /// Single mode output file. A temporary `.wav` when unset.
    pub output_path: Option<PathBuf>,
    /// Batch mode output directory. A temporary directory when unset.
    pub output_dir: Option<PathBuf>,
    /// Batch mode file prefix, `{prefix}_{index:04}.wav`.
    pub output_prefix: Option<String>,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            x_vector_only: true,
            ref_text: None,
            output_path: None,
            output_dir: None,
            output_prefix: None,
        }
    }
}

impl SynthesisOptions {
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

    /// Condition on the full transcript instead of the embedding only.
    pub fn with_full_clone(mut self, full_clone: bool) -> Self {
        self.x_vector_only = !full_clone;
        self
    }

    /// Override the reference transcript.
    pub fn with_ref_text(mut self, ref_text: impl Into<String>) -> Self {
        self.ref_text = Some(ref_text.into());
        self
    }

    /// Set the single mode output file.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Set the batch output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set the batch output prefix.
    pub fn with_output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = Some(prefix.into());
        self
    }

    /// The effective batch prefix.
    pub fn prefix(&self) -> &str {
        self.output_prefix.as_deref().unwrap_or(DEFAULT_OUTPUT_PREFIX)
    }

    /// Check ranges and non-emptiness.
    pub fn validate(&self) -> Result<(), TTSError> {
        if self.language.trim().is_empty() {
            return Err(TTSError::InvalidArgument(
                "language cannot be empty".to_string(),
            ));
        }

        if !(1..=MAX_NEW_TOKENS_LIMIT).contains(&self.max_new_tokens) {
            return Err(TTSError::InvalidArgument(format!(
                "max_new_tokens must be between 1 and {MAX_NEW_TOKENS_LIMIT}, got {}",
                self.max_new_tokens
            )));
        }

        if let Some(prefix) = &self.output_prefix {
            if prefix.trim().is_empty() {
                return Err(TTSError::InvalidArgument(
                    "output prefix cannot be empty".to_string(),
                ));
            }
            if prefix.contains('/') || prefix.contains('\\') {
                return Err(TTSError::InvalidArgument(format!(
                    "output prefix cannot contain path separators: {prefix}"
                )));
            }
        }

        Ok(())
    }

    /// Build the generation request for one text.
    pub(crate) fn request(&self, text: &str, prompt: &ClonePrompt) -> GenerateRequest {
        GenerateRequest::new(text, prompt)
            .with_language(self.language.clone())
            .with_max_new_tokens(self.max_new_tokens)
    }
}
