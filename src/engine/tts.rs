//! TTS Engine implementation.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use super::batch::{BatchItem, BatchReport, ItemOutcome};
use super::options::SynthesisOptions;
use super::session::InferenceSession;
use crate::audio::{self, AudioError};
use crate::backend::{Backend, BackendError, ClonePrompt};
use crate::voice::{
    VoiceEntry, VoiceError, VoiceResolver, VoiceSpec, format_available, preview_text,
};

/// Log previews of input texts are cut at this many characters.
const TEXT_PREVIEW_CHARS: usize = 30;

/// Errors that can occur during TTS operations.
#[derive(Error, Debug)]
pub enum TTSError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Voice not found: {name} (available voices: {})", format_available(.available))]
    VoiceNotFound {
        name: String,
        available: Vec<String>,
    },

    #[error("Reference audio not found: {}", .0.display())]
    ReferenceAudioNotFound(PathBuf),

    #[error("Source file not found: {}", .0.display())]
    SourceFileNotFound(PathBuf),

    #[error("Source file has no non-blank lines: {}", .0.display())]
    EmptySourceFile(PathBuf),

    #[error("Generation produced no audio")]
    EmptyGeneration,

    #[error("GPU acceleration unavailable: {0}")]
    AcceleratorUnavailable(String),

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Generation failed for item {index}: {source}")]
    GenerationFailed {
        index: usize,
        source: Box<TTSError>,
    },

    #[error("Backend error: {0}")]
    BackendError(#[from] BackendError),

    #[error("Voice error: {0}")]
    VoiceError(VoiceError),

    #[error("Audio error: {0}")]
    AudioError(#[from] AudioError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<VoiceError> for TTSError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::InvalidArgument(msg) => TTSError::InvalidArgument(msg),
            VoiceError::NotFound { name, available } => TTSError::VoiceNotFound { name, available },
            VoiceError::ReferenceAudioNotFound(path) => TTSError::ReferenceAudioNotFound(path),
            other => TTSError::VoiceError(other),
        }
    }
}

/// The main TTS engine that orchestrates between components.
///
/// Every synthesis call prepares exactly one clone prompt and reuses it for
/// all of its texts. Generation is strictly sequential.
pub struct TTSEngine<B: Backend> {
    session: InferenceSession<B>,
    resolver: VoiceResolver,
}

impl<B: Backend> TTSEngine<B> {
    /// Create a new TTS engine.
    pub fn new(session: InferenceSession<B>, resolver: VoiceResolver) -> Self {
        Self { session, resolver }
    }

    /// The inference session.
    pub fn session(&self) -> &InferenceSession<B> {
        &self.session
    }

    /// List voice names in the assets directory.
    pub fn list_voices(&self) -> Result<Vec<String>, TTSError> {
        Ok(self.resolver.list_voices()?)
    }

    /// List voices with their transcripts.
    pub fn list_voice_entries(&self) -> Result<Vec<VoiceEntry>, TTSError> {
        Ok(self.resolver.list_entries()?)
    }

    /// Release the model. Best effort.
    pub fn close(&mut self) {
        self.session.close();
    }

    /// Synthesize one text to one file.
    ///
    /// Returns the written path: `options.output_path`, or a fresh
    /// temporary `.wav` file.
    pub fn synthesize_one(
        &mut self,
        text: &str,
        voice: &VoiceSpec,
        options: &SynthesisOptions,
    ) -> Result<PathBuf, TTSError> {
        options.validate()?;
        if text.trim().is_empty() {
            return Err(TTSError::InvalidArgument("text cannot be empty".to_string()));
        }

        self.session.ensure_ready()?;
        let prompt = self.prepare_prompt(voice, options)?;

        let result = self.write_single(&prompt, text, options);
        self.session.release(prompt);

        let output_path = result?;
        info!("Output file: {}", output_path.display());
        Ok(output_path)
    }

    /// Synthesize many texts with one shared clone prompt.
    ///
    /// Blank items are skipped in place: item `i` (1-based, blank items
    /// counted) is written to `{prefix}_{i:04}.wav`. A failing item is
    /// recorded in the report and does not stop the batch.
    pub fn synthesize_many<S: AsRef<str>>(
        &mut self,
        texts: &[S],
        voice: &VoiceSpec,
        options: &SynthesisOptions,
    ) -> Result<BatchReport, TTSError> {
        if texts.is_empty() {
            return Err(TTSError::InvalidArgument(
                "text list cannot be empty".to_string(),
            ));
        }
        options.validate()?;

        let output_dir = batch_output_dir(options)?;

        info!("Batch mode: {} texts", texts.len());
        self.session.ensure_ready()?;
        let prompt = self.prepare_prompt(voice, options)?;

        let report = self.run_batch(&prompt, texts, output_dir, options);
        self.session.release(prompt);

        info!(
            "Done: {}/{} generated, output directory: {}",
            report.success_count(),
            report.total(),
            report.output_dir.display()
        );
        Ok(report)
    }

    /// Synthesize every non-blank line of a text file.
    ///
    /// Blank lines are dropped before numbering, so outputs are numbered by
    /// non-blank line. Output directory defaults to the file's directory and
    /// the prefix to the file stem.
    pub fn synthesize_from_source_file(
        &mut self,
        file_path: &Path,
        voice: &VoiceSpec,
        options: &SynthesisOptions,
    ) -> Result<BatchReport, TTSError> {
        if !file_path.is_file() {
            return Err(TTSError::SourceFileNotFound(file_path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(file_path)?;
        let texts: Vec<&str> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        if texts.is_empty() {
            return Err(TTSError::EmptySourceFile(file_path.to_path_buf()));
        }

        info!("Read {} non-blank lines from {}", texts.len(), file_path.display());

        let mut options = options.clone();
        if options.output_dir.is_none() {
            let parent = file_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            options.output_dir = Some(parent.to_path_buf());
        }
        if options.output_prefix.is_none()
            && let Some(stem) = file_path.file_stem().and_then(|s| s.to_str())
        {
            options.output_prefix = Some(stem.to_string());
        }

        self.synthesize_many(&texts, voice, &options)
    }

    fn prepare_prompt(
        &mut self,
        voice: &VoiceSpec,
        options: &SynthesisOptions,
    ) -> Result<ClonePrompt, TTSError> {
        let resolved = self
            .resolver
            .resolve(voice)?
            .with_ref_text(options.ref_text.clone());

        info!("Reference audio for {voice}: {}", resolved.audio_path.display());
        self.session.prepare(&resolved, options.x_vector_only)
    }

    fn write_single(
        &self,
        prompt: &ClonePrompt,
        text: &str,
        options: &SynthesisOptions,
    ) -> Result<PathBuf, TTSError> {
        let (output_path, is_temp) = match &options.output_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                (path.clone(), false)
            }
            None => (temp_wav_path()?, true),
        };

        info!("Synthesizing: {}", preview_text(text, TEXT_PREVIEW_CHARS));
        if let Err(e) = self.generate_to(prompt, text, &output_path, options) {
            if is_temp {
                let _ = std::fs::remove_file(&output_path);
            }
            return Err(e);
        }
        Ok(output_path)
    }

    fn run_batch<S: AsRef<str>>(
        &self,
        prompt: &ClonePrompt,
        texts: &[S],
        output_dir: PathBuf,
        options: &SynthesisOptions,
    ) -> BatchReport {
        let total = texts.len();
        let prefix = options.prefix();
        let mut items = Vec::with_capacity(total);

        for (index, text) in texts.iter().enumerate().map(|(i, t)| (i + 1, t.as_ref().trim())) {
            if text.is_empty() {
                info!("[{index}/{total}] Skipping blank line");
                items.push(BatchItem {
                    index,
                    text: String::new(),
                    outcome: ItemOutcome::Skipped,
                });
                continue;
            }

            info!("[{index}/{total}] {}", preview_text(text, TEXT_PREVIEW_CHARS));
            let output_path = output_dir.join(format!("{prefix}_{index:04}.wav"));

            let outcome = match self.generate_to(prompt, text, &output_path, options) {
                Ok(()) => ItemOutcome::Written(output_path),
                Err(e) => {
                    warn!("[{index}/{total}] Generation failed: {e}");
                    ItemOutcome::Failed(TTSError::GenerationFailed {
                        index,
                        source: Box::new(e),
                    })
                }
            };

            items.push(BatchItem {
                index,
                text: text.to_string(),
                outcome,
            });
        }

        BatchReport { output_dir, items }
    }

    fn generate_to(
        &self,
        prompt: &ClonePrompt,
        text: &str,
        output_path: &Path,
        options: &SynthesisOptions,
    ) -> Result<(), TTSError> {
        let generated = self.session.generate(prompt, text, options)?;
        let samples = generated.first().ok_or(TTSError::EmptyGeneration)?;

        audio::write_wav(output_path, samples, generated.sample_rate)?;
        Ok(())
    }
}

/// Create the batch output directory, or a fresh temporary one.
fn batch_output_dir(options: &SynthesisOptions) -> Result<PathBuf, TTSError> {
    match &options.output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            Ok(dir.clone())
        }
        None => Ok(tempfile::Builder::new()
            .prefix("qwen3_tts_batch_")
            .tempdir()?
            .keep()),
    }
}

fn temp_wav_path() -> Result<PathBuf, TTSError> {
    let file = tempfile::Builder::new()
        .prefix("qwen3_tts_")
        .suffix(".wav")
        .tempfile()?;

    file.into_temp_path()
        .keep()
        .map_err(|e| TTSError::Io(e.error))
}
