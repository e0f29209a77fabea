use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat, Stream};
use crossbeam_channel::Sender;
use log::{error, info};
use parking_lot::Mutex;

use super::{DeviceBackend, DeviceToneOutput, Mixer, CHANNELS, SAMPLE_RATE};
use crate::messaging::ChimeMessage;

/// Default output device running the shared mixer.
///
/// The stream stops when the engine is dropped.
pub struct AudioEngine {
    mixer: Arc<Mutex<Mixer>>,
    _stream: Stream,
}

impl AudioEngine {
    pub fn open(notifier: Sender<ChimeMessage>) -> Result<Self> {
        let host = cpal::default_host();
        info!("Using audio host: {}", host.id().name());

        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;
        info!(
            "Using output device: {}",
            device.name().unwrap_or_else(|_| "<unnamed>".to_string())
        );

        let sample_format = device
            .default_output_config()
            .context("Failed to query output config")?
            .sample_format();
        let config = cpal::StreamConfig {
            channels: CHANNELS,
            sample_rate: cpal::SampleRate(SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };

        let mixer = Arc::new(Mutex::new(Mixer::new(notifier)));
        let stream = match sample_format {
            SampleFormat::F32 => create_stream::<f32>(&device, &config, Arc::clone(&mixer)),
            SampleFormat::I16 => create_stream::<i16>(&device, &config, Arc::clone(&mixer)),
            SampleFormat::U16 => create_stream::<u16>(&device, &config, Arc::clone(&mixer)),
            other => bail!("Unsupported sample format {:?}", other),
        }?;

        stream.play().context("Failed to start output stream")?;
        info!("Audio stream started at {} Hz, {} channels", SAMPLE_RATE, CHANNELS);

        Ok(Self {
            mixer,
            _stream: stream,
        })
    }

    pub fn backend(&self) -> DeviceBackend {
        DeviceBackend::new(Arc::clone(&self.mixer))
    }

    pub fn tone_output(&self) -> DeviceToneOutput {
        DeviceToneOutput::new(Arc::clone(&self.mixer))
    }
}

fn create_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<Mutex<Mixer>>,
) -> Result<Stream>
where
    T: Sample + Send + 'static + cpal::SizedSample + cpal::FromSample<f32>,
{
    let err_mixer = Arc::clone(&mixer);
    let err_fn = move |err: cpal::StreamError| {
        error!("an error occurred on the audio stream: {}", err);
        err_mixer.lock().fail_clips(&err.to_string());
    };
    let mut buffer: Vec<f32> = Vec::new();

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                buffer.resize(data.len(), 0.0);
                mixer.lock().render(&mut buffer);
                for (out, &sample) in data.iter_mut().zip(&buffer) {
                    *out = T::from_sample(sample);
                }
            },
            err_fn,
            None,
        )
        .context("Failed to build output stream")?;

    Ok(stream)
}
