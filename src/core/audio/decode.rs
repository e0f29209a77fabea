use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use rodio::source::UniformSourceIterator;
use rodio::{Decoder, Source};

use super::{CHANNELS, SAMPLE_RATE};

/// Decode an mp3, ogg, flac or wav file into interleaved stereo `f32` at
/// `SAMPLE_RATE`. The format is detected from the file contents.
pub fn decode_file(path: &Path) -> Result<Vec<f32>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let decoder = Decoder::new(BufReader::new(file))
        .with_context(|| format!("Failed to decode {}", path.display()))?;

    let (source_rate, source_channels) = (decoder.sample_rate(), decoder.channels());
    let samples: Vec<f32> =
        UniformSourceIterator::<_, f32>::new(decoder, CHANNELS, SAMPLE_RATE).collect();

    debug!(
        "Decoded {} ({} Hz, {} ch, {} frames)",
        path.display(),
        source_rate,
        source_channels,
        samples.len() / CHANNELS as usize
    );
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn mono_is_spread_to_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, SAMPLE_RATE, &[16384, -16384, 0]);

        let decoded = decode_file(&path).unwrap();
        assert_eq!(decoded.len(), 6);
        assert_relative_eq!(decoded[0], 0.5, epsilon = 1e-3);
        assert_relative_eq!(decoded[2], -0.5, epsilon = 1e-3);
    }

    #[test]
    fn other_rates_are_resampled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slow.wav");
        write_wav(&path, 2, 22_050, &vec![1000i16; 2 * 2205]);

        let decoded = decode_file(&path).unwrap();
        let frames = decoded.len() / 2;
        assert!((4405..=4415).contains(&frames), "got {frames} frames");
        assert!(decoded.iter().all(|&s| (s - 1000.0 / 32768.0).abs() < 1e-4));
    }

    #[test]
    fn format_comes_from_contents_not_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("renamed.mp3");
        write_wav(&path, 2, SAMPLE_RATE, &[0i16; 8]);
        assert_eq!(decode_file(&path).unwrap().len(), 8);
    }

    #[test]
    fn garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strike.ogg");
        std::fs::write(&path, b"definitely not audio").unwrap();
        let err = decode_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to decode"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = decode_file(Path::new("/nonexistent/strike.mp3")).unwrap_err();
        assert!(err.to_string().contains("strike.mp3"));
    }
}
