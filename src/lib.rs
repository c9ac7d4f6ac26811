//! qwen3-tts-rs: Voice cloning text-to-speech CLI.
//!
//! This crate drives a Qwen3-TTS inference server to clone a reference
//! voice and synthesize single texts or whole batches, preparing the
//! speaker prompt once per batch.

pub mod audio;
pub mod backend;
pub mod cli;
pub mod engine;
pub mod voice;
