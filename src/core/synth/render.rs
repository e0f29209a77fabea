use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use super::ToneSynthesizer;
use crate::core::audio::{CHANNELS, SAMPLE_RATE};
use crate::core::notation::NoteSequence;

const RENDER_CHUNK_FRAMES: usize = 4096;

/// Render a sequence to a 16-bit stereo WAV file, returns frames written
pub fn render_to_wav(sequence: NoteSequence, volume: f32, path: &Path) -> Result<u64> {
    let mut writer = hound::WavWriter::create(path, wav_spec())
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut synth = ToneSynthesizer::new(SAMPLE_RATE, CHANNELS);
    synth.start(sequence, volume);

    let mut buffer = vec![0i16; RENDER_CHUNK_FRAMES * CHANNELS as usize];
    let mut frames = 0u64;
    loop {
        let pull = synth.pull(&mut buffer);
        for &sample in &buffer[..pull.frames * CHANNELS as usize] {
            writer.write_sample(sample)?;
        }
        frames += pull.frames as u64;
        if pull.finished || pull.frames == 0 {
            break;
        }
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    info!("Rendered {} frames to {}", frames, path.display());
    Ok(frames)
}

/// Write mono `f32` samples as a 16-bit stereo WAV with both channels equal
pub fn write_mono_wav(samples: &[f32], path: &Path) -> Result<u64> {
    let mut writer = hound::WavWriter::create(path, wav_spec())
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        for _ in 0..CHANNELS {
            writer.write_sample(value)?;
        }
    }
    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(samples.len() as u64)
}

fn wav_spec() -> hound::WavSpec {
    hound::WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}
