use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use log::debug;
use parking_lot::Mutex;

use super::{decode_file, Mixer};
use crate::core::chime::ToneOutput;
use crate::core::notation::NoteSequence;
use crate::core::voice::{AudioBackend, VoiceHandle};

/// File playback through the shared mixer, decoded files are cached per path
pub struct DeviceBackend {
    mixer: Arc<Mutex<Mixer>>,
    cache: HashMap<PathBuf, Arc<[f32]>>,
}

impl DeviceBackend {
    pub fn new(mixer: Arc<Mutex<Mixer>>) -> Self {
        Self {
            mixer,
            cache: HashMap::new(),
        }
    }

    fn load(&mut self, path: &Path) -> Result<Arc<[f32]>> {
        if let Some(samples) = self.cache.get(path) {
            return Ok(Arc::clone(samples));
        }
        let samples: Arc<[f32]> = decode_file(path)?.into();
        self.cache.insert(path.to_path_buf(), Arc::clone(&samples));
        Ok(samples)
    }
}

impl AudioBackend for DeviceBackend {
    fn play(&mut self, voice: VoiceHandle, path: &Path, volume: f32) -> Result<()> {
        let samples = self.load(path)?;
        self.mixer.lock().start_clip(voice, samples, volume);
        Ok(())
    }

    fn stop(&mut self, voice: VoiceHandle) {
        self.mixer.lock().stop_clip(voice);
    }

    fn retain_cached(&mut self, paths: &[&Path]) {
        let before = self.cache.len();
        self.cache.retain(|cached, _| paths.contains(&cached.as_path()));
        if self.cache.len() < before {
            debug!("Evicted {} decoded files", before - self.cache.len());
        }
    }
}

/// Tone sink feeding the mixer's synthesizer
pub struct DeviceToneOutput {
    mixer: Arc<Mutex<Mixer>>,
}

impl DeviceToneOutput {
    pub fn new(mixer: Arc<Mutex<Mixer>>) -> Self {
        Self { mixer }
    }
}

impl ToneOutput for DeviceToneOutput {
    fn start(&mut self, sequence: NoteSequence, volume: f32) -> Result<u64> {
        Ok(self.mixer.lock().start_tone(sequence, volume))
    }

    fn stop(&mut self) {
        self.mixer.lock().stop_tone();
    }
}
