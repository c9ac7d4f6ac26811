//! WAV output for generated waveforms.

use std::path::Path;

use thiserror::Error;

/// Errors that can occur while writing audio.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// Write mono samples as 16-bit PCM.
///
/// Samples are clamped to [-1.0, 1.0] before scaling.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), AudioError> {
    if sample_rate == 0 {
        return Err(AudioError::InvalidSampleRate(sample_rate));
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;

    Ok(())
}
