//! Voice resolver for the local voice assets directory.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Audio extensions in lookup priority order.
const AUDIO_EXTENSIONS: [&str; 2] = ["wav", "mp3"];

/// Errors that can occur during voice resolution.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid voice name: {0}")]
    InvalidName(String),

    #[error("Voice not found: {name} (available voices: {})", format_available(.available))]
    NotFound {
        name: String,
        available: Vec<String>,
    },

    #[error("Reference audio not found: {}", .0.display())]
    ReferenceAudioNotFound(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub(crate) fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}

/// Which voice a synthesis call should clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceSpec {
    /// A voice from the assets directory.
    Named(String),
    /// An ad-hoc reference audio file.
    Reference(PathBuf),
}

impl VoiceSpec {
    /// Build a spec from the optional name / reference audio pair.
    ///
    /// Exactly one of the two must be given.
    pub fn from_parts(name: Option<String>, ref_audio: Option<PathBuf>) -> Result<Self, VoiceError> {
        match (name, ref_audio) {
            (Some(name), None) => Ok(Self::Named(name)),
            (None, Some(path)) => Ok(Self::Reference(path)),
            (Some(_), Some(_)) => Err(VoiceError::InvalidArgument(
                "voice and reference audio cannot both be specified".to_string(),
            )),
            (None, None) => Err(VoiceError::InvalidArgument(
                "either a voice or a reference audio must be specified".to_string(),
            )),
        }
    }
}

impl fmt::Display for VoiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "voice '{name}'"),
            Self::Reference(path) => write!(f, "reference audio {}", path.display()),
        }
    }
}

/// Reference audio and optional transcript for one voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVoice {
    pub audio_path: PathBuf,
    pub ref_text: Option<String>,
}

impl ResolvedVoice {
    /// Replace the transcript when the caller supplied one explicitly.
    pub fn with_ref_text(mut self, ref_text: Option<String>) -> Self {
        if ref_text.is_some() {
            self.ref_text = ref_text;
        }
        self
    }
}

/// A voice listed from the assets directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceEntry {
    pub name: String,
    pub transcript: Option<String>,
}

impl VoiceEntry {
    /// First `max_chars` characters of the transcript, with `...` when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        self.transcript
            .as_deref()
            .map(|text| preview_text(text, max_chars))
            .unwrap_or_default()
    }
}

/// First `max_chars` characters of `text`, with `...` when cut.
pub fn preview_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Resolves voice names against a directory of `{name}.wav|mp3` files with
/// optional `{name}.txt` transcripts.
pub struct VoiceResolver {
    voices_dir: PathBuf,
    cache: HashMap<String, ResolvedVoice>,
}

impl VoiceResolver {
    /// Create a new resolver over the default assets directory.
    pub fn new() -> Self {
        Self::with_dir(Self::default_dir())
    }

    /// Create a new resolver over a custom directory.
    pub fn with_dir(voices_dir: PathBuf) -> Self {
        Self {
            voices_dir,
            cache: HashMap::new(),
        }
    }

    /// `~/.qwen3-tts-rs/voices`, or `assets/voices` when there is no home.
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".qwen3-tts-rs").join("voices"))
            .unwrap_or_else(|| PathBuf::from("assets").join("voices"))
    }

    /// Get the voices directory path.
    pub fn voices_dir(&self) -> &Path {
        &self.voices_dir
    }

    /// Whether a name has already been resolved by this resolver.
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    /// Validate a voice name.
    fn validate_name(name: &str) -> Result<(), VoiceError> {
        if name.trim().is_empty() {
            return Err(VoiceError::InvalidName("Name cannot be empty".to_string()));
        }

        // Prevent path traversal
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(VoiceError::InvalidName(
                "Name cannot contain path separators".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve a spec to reference audio and transcript.
    pub fn resolve(&mut self, spec: &VoiceSpec) -> Result<ResolvedVoice, VoiceError> {
        match spec {
            VoiceSpec::Named(name) => self.resolve_name(name),
            VoiceSpec::Reference(path) => Self::resolve_reference(path),
        }
    }

    /// Resolve a named voice. Successful lookups are cached by name.
    pub fn resolve_name(&mut self, name: &str) -> Result<ResolvedVoice, VoiceError> {
        if let Some(cached) = self.cache.get(name) {
            return Ok(cached.clone());
        }

        Self::validate_name(name)?;

        let audio_path = AUDIO_EXTENSIONS
            .iter()
            .map(|ext| self.voices_dir.join(format!("{name}.{ext}")))
            .find(|path| path.is_file());

        let Some(audio_path) = audio_path else {
            return Err(VoiceError::NotFound {
                name: name.to_string(),
                available: self.list_voices()?,
            });
        };

        let ref_text = self.read_transcript(name)?;
        debug!(
            "Resolved voice '{name}' -> {} (transcript: {})",
            audio_path.display(),
            ref_text.is_some()
        );

        let resolved = ResolvedVoice {
            audio_path,
            ref_text,
        };
        self.cache.insert(name.to_string(), resolved.clone());

        Ok(resolved)
    }

    /// Resolve an ad-hoc reference audio path. Never cached.
    pub fn resolve_reference(path: &Path) -> Result<ResolvedVoice, VoiceError> {
        if !path.exists() {
            return Err(VoiceError::ReferenceAudioNotFound(path.to_path_buf()));
        }

        Ok(ResolvedVoice {
            audio_path: path.to_path_buf(),
            ref_text: None,
        })
    }

    fn read_transcript(&self, name: &str) -> Result<Option<String>, VoiceError> {
        let text_path = self.voices_dir.join(format!("{name}.txt"));
        if !text_path.is_file() {
            return Ok(None);
        }

        let text = std::fs::read_to_string(text_path)?;
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }

    /// List voice names with an audio file, sorted and de-duplicated.
    pub fn list_voices(&self) -> Result<Vec<String>, VoiceError> {
        if !self.voices_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = BTreeSet::new();

        for entry in std::fs::read_dir(&self.voices_dir)? {
            let path = entry?.path();

            let is_audio = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext));

            if is_audio
                && path.is_file()
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.insert(stem.to_string());
            }
        }

        Ok(names.into_iter().collect())
    }

    /// List voices together with their transcripts.
    pub fn list_entries(&self) -> Result<Vec<VoiceEntry>, VoiceError> {
        self.list_voices()?
            .into_iter()
            .map(|name| {
                let transcript = self.read_transcript(&name)?;
                Ok(VoiceEntry { name, transcript })
            })
            .collect()
    }
}

impl Default for VoiceResolver {
    fn default() -> Self {
        Self::new()
    }
}
