//! qwen3-tts-rs CLI entry point.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use qwen3_tts_rs::backend::{Backend, create_backend};
use qwen3_tts_rs::cli::{Args, Mode};
use qwen3_tts_rs::engine::{BatchReport, InferenceSession, SynthesisOptions, TTSEngine};
use qwen3_tts_rs::voice::{VoiceResolver, VoiceSpec};
use tracing_subscriber::EnvFilter;

/// Transcript previews in the voice list are cut at this many characters.
const PREVIEW_CHARS: usize = 30;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let resolver = VoiceResolver::with_dir(args.voices_dir());

    let mode = args.mode();
    if mode == Mode::ListVoices {
        return list_voices(&resolver);
    }

    let voice = args.voice_spec()?;
    let options = args.synthesis_options();

    let backend = create_backend(&args.host, args.port);
    let session = InferenceSession::new(backend, args.model_config());
    let mut engine = TTSEngine::new(session, resolver);

    let result = match mode {
        Mode::Single(text) => generate_single(&mut engine, &text, &voice, &options),
        Mode::BatchTexts(texts) => engine
            .synthesize_many(&texts, &voice, &options)
            .context("Batch synthesis failed")
            .map(|report| print_report(&report)),
        Mode::BatchFile(path) => engine
            .synthesize_from_source_file(&path, &voice, &options)
            .with_context(|| format!("Batch synthesis from {} failed", path.display()))
            .map(|report| print_report(&report)),
        Mode::ListVoices => Ok(()),
    };

    engine.close();
    result
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn list_voices(resolver: &VoiceResolver) -> Result<()> {
    let entries = resolver
        .list_entries()
        .with_context(|| format!("Failed to list voices in {}", resolver.voices_dir().display()))?;

    if entries.is_empty() {
        println!("No voices found in {}", resolver.voices_dir().display());
        return Ok(());
    }

    println!("Built-in voices:");
    println!("{}", "-".repeat(40));
    for entry in entries {
        println!("  {}: {}", entry.name, entry.preview(PREVIEW_CHARS));
    }

    Ok(())
}

fn generate_single<B: Backend>(
    engine: &mut TTSEngine<B>,
    text: &str,
    voice: &VoiceSpec,
    options: &SynthesisOptions,
) -> Result<()> {
    let output = engine
        .synthesize_one(text, voice, options)
        .context("Failed to synthesize speech")?;

    println!("Done! Output file: {}", output.display());
    Ok(())
}

fn print_report(report: &BatchReport) {
    for (item, err) in report.failures() {
        eprintln!("  [!] item {}: {err}", item.index);
    }

    println!(
        "Done! Generated {}/{} audio files",
        report.success_count(),
        report.total()
    );
    println!("Output directory: {}", display_dir(&report.output_dir));
}

fn display_dir(dir: &Path) -> String {
    dir.canonicalize()
        .unwrap_or_else(|_| dir.to_path_buf())
        .display()
        .to_string()
}
