//! CLI argument definitions and parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::engine::{ModelConfig, SynthesisOptions};
use crate::voice::{VoiceError, VoiceResolver, VoiceSpec};

const EXAMPLES: &str = "\
Examples:
  # Built-in voice, single text
  qwen3-tts-rs --voice narrator --text \"你好\" --out /tmp/output.wav

  # Custom reference audio
  qwen3-tts-rs --ref-audio /path/to/ref.wav --text \"你好\" --out /tmp/output.wav

  # Batch from a text file, one line per output
  qwen3-tts-rs --voice narrator --batch-file /path/to/texts.txt --out-dir /tmp/outputs/

  # Batch from arguments
  qwen3-tts-rs --voice narrator --texts \"第一句话\" \"第二句话\" --out-dir /tmp/outputs/

  # List built-in voices
  qwen3-tts-rs --list-voices";

/// Qwen3-TTS voice cloning CLI with batch generation.
#[derive(Parser, Debug)]
#[command(name = "qwen3-tts-rs")]
#[command(about = "Voice cloning text-to-speech with Qwen3-TTS, single and batch")]
#[command(version)]
#[command(after_help = EXAMPLES)]
pub struct Args {
    /// Built-in voice name
    #[arg(
        short = 'v',
        long,
        conflicts_with = "ref_audio",
        required_unless_present_any = ["ref_audio", "list_voices"]
    )]
    pub voice: Option<String>,

    /// Custom reference audio file
    #[arg(short = 'r', long)]
    pub ref_audio: Option<PathBuf>,

    /// Transcript of the reference audio (used with --full-clone)
    #[arg(long)]
    pub ref_text: Option<String>,

    /// Text to synthesize (single mode)
    #[arg(
        short = 't',
        long,
        conflicts_with_all = ["texts", "batch_file"],
        required_unless_present_any = ["texts", "batch_file", "list_voices"]
    )]
    pub text: Option<String>,

    /// Texts to synthesize (batch mode)
    #[arg(long, num_args = 1.., conflicts_with = "batch_file")]
    pub texts: Option<Vec<String>>,

    /// Text file with one text per line (batch mode)
    #[arg(short = 'b', long)]
    pub batch_file: Option<PathBuf>,

    /// Output file (single mode) [default: temporary file]
    #[arg(short = 'o', long)]
    pub out: Option<PathBuf>,

    /// Output directory (batch mode) [default: batch file directory or a temporary directory]
    #[arg(short = 'd', long)]
    pub out_dir: Option<PathBuf>,

    /// Output file prefix (batch mode) [default: batch file name, or "tts"]
    #[arg(long)]
    pub out_prefix: Option<String>,

    /// Language of the text
    #[arg(short = 'l', long, default_value = "Chinese")]
    pub language: String,

    /// Maximum number of generated tokens
    #[arg(long, default_value_t = 2048)]
    pub max_tokens: u32,

    /// List all built-in voices
    #[arg(long)]
    pub list_voices: bool,

    /// Full clone mode, conditioned on the transcript (slower, more accurate)
    #[arg(long)]
    pub full_clone: bool,

    /// Directory holding built-in voices [default: ~/.qwen3-tts-rs/voices]
    #[arg(long, env = "QWEN_TTS_VOICES_DIR")]
    pub voices_dir: Option<PathBuf>,

    /// Inference server host address
    #[arg(long, env = "QWEN_TTS_HOST", default_value = "localhost")]
    pub host: String,

    /// Inference server port
    #[arg(long, env = "QWEN_TTS_PORT", default_value_t = 9290)]
    pub port: u16,

    /// Hugging Face model ID
    #[arg(long, env = "QWEN_TTS_MODEL", default_value = "Qwen/Qwen3-TTS-12Hz-0.6B-Base")]
    pub model_id: String,

    /// Hugging Face endpoint for weight downloads (empty for the default hub)
    #[arg(long, env = "HF_ENDPOINT", default_value = "https://hf-mirror.com")]
    pub hf_endpoint: String,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,
}

/// What the invocation asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    ListVoices,
    Single(String),
    BatchTexts(Vec<String>),
    BatchFile(PathBuf),
}

impl Args {
    /// Select the run mode. `--list-voices` wins over everything else.
    pub fn mode(&self) -> Mode {
        if self.list_voices {
            Mode::ListVoices
        } else if let Some(path) = &self.batch_file {
            Mode::BatchFile(path.clone())
        } else if let Some(texts) = &self.texts {
            Mode::BatchTexts(texts.clone())
        } else {
            Mode::Single(self.text.clone().unwrap_or_default())
        }
    }

    /// The voice to clone.
    pub fn voice_spec(&self) -> Result<VoiceSpec, VoiceError> {
        VoiceSpec::from_parts(self.voice.clone(), self.ref_audio.clone())
    }

    /// The voices directory, falling back to the default location.
    pub fn voices_dir(&self) -> PathBuf {
        self.voices_dir
            .clone()
            .unwrap_or_else(VoiceResolver::default_dir)
    }

    /// Synthesis options for the engine.
    pub fn synthesis_options(&self) -> SynthesisOptions {
        SynthesisOptions {
            language: self.language.clone(),
            max_new_tokens: self.max_tokens,
            x_vector_only: !self.full_clone,
            ref_text: self.ref_text.clone(),
            output_path: self.out.clone(),
            output_dir: self.out_dir.clone(),
            output_prefix: self.out_prefix.clone(),
        }
    }

    /// Model selection for the inference session.
    pub fn model_config(&self) -> ModelConfig {
        let hf_endpoint = self.hf_endpoint.trim();
        ModelConfig {
            model_id: self.model_id.clone(),
            hf_endpoint: (!hf_endpoint.is_empty()).then(|| hf_endpoint.to_string()),
            ..ModelConfig::default()
        }
    }
}
