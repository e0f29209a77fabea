use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{debug, warn};

/// Voices available for overlapping file playback
pub const DEFAULT_VOICE_COUNT: usize = 10;

/// Identifies one allocation of a pool slot.
///
/// The generation changes every time the slot is handed out, so
/// notifications about a stolen or stopped voice can be told apart from the
/// voice's current occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceHandle {
    pub slot: usize,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Playing,
}

/// Plays decoded files on behalf of pool voices.
///
/// Implementations report natural completion asynchronously (see
/// `ChimeMessage::VoiceFinished`); `stop` must not produce a completion.
pub trait AudioBackend {
    fn play(&mut self, voice: VoiceHandle, path: &Path, volume: f32) -> Result<()>;
    fn stop(&mut self, voice: VoiceHandle);

    /// Forget any decoded data for files other than `paths`
    fn retain_cached(&mut self, _paths: &[&Path]) {}
}

struct Voice {
    state: VoiceState,
    generation: u64,
    path: Option<PathBuf>,
}

impl Voice {
    fn new() -> Self {
        Self {
            state: VoiceState::Idle,
            generation: 0,
            path: None,
        }
    }

    fn is_active(&self) -> bool {
        self.state == VoiceState::Playing
    }
}

/// Fixed set of playback voices over an `AudioBackend`
pub struct VoicePool<B> {
    voices: Vec<Voice>,
    backend: B,
    next_generation: u64,
}

impl<B: AudioBackend> VoicePool<B> {
    pub fn new(backend: B) -> Self {
        Self::with_capacity(backend, DEFAULT_VOICE_COUNT)
    }

    pub fn with_capacity(backend: B, voices: usize) -> Self {
        Self {
            voices: (0..voices.max(1)).map(|_| Voice::new()).collect(),
            backend,
            next_generation: 1,
        }
    }

    /// Claim the first idle voice, stealing slot 0 when every voice is busy
    pub fn acquire(&mut self) -> VoiceHandle {
        let slot = match self.voices.iter().position(|v| !v.is_active()) {
            Some(slot) => slot,
            None => {
                let stolen = self.handle(0);
                warn!("All {} voices busy, stealing voice 0", self.capacity());
                self.backend.stop(stolen);
                0
            }
        };

        let generation = self.next_generation;
        self.next_generation += 1;

        let voice = &mut self.voices[slot];
        voice.state = VoiceState::Playing;
        voice.generation = generation;
        voice.path = None;
        VoiceHandle { slot, generation }
    }

    /// Acquire a voice and start `path` on it.
    ///
    /// On failure the voice is returned to the pool before the error is
    /// handed back.
    pub fn play(&mut self, path: &Path, volume: f32) -> Result<VoiceHandle> {
        let handle = self.acquire();
        self.voices[handle.slot].path = Some(path.to_path_buf());
        if let Err(err) = self.backend.play(handle, path, volume) {
            self.voices[handle.slot].state = VoiceState::Idle;
            self.voices[handle.slot].path = None;
            return Err(err);
        }
        debug!("Voice {} playing {}", handle.slot, path.display());
        Ok(handle)
    }

    /// Mark a voice idle after it finished on its own.
    ///
    /// Returns false when the handle is stale.
    pub fn release(&mut self, handle: VoiceHandle) -> bool {
        if !self.is_current(handle) {
            return false;
        }
        let voice = &mut self.voices[handle.slot];
        voice.state = VoiceState::Idle;
        voice.path = None;
        true
    }

    /// True while `handle` still owns its slot and is playing
    pub fn is_current(&self, handle: VoiceHandle) -> bool {
        self.voices
            .get(handle.slot)
            .is_some_and(|v| v.is_active() && v.generation == handle.generation)
    }

    pub fn any_busy(&self) -> bool {
        self.voices.iter().any(Voice::is_active)
    }

    pub fn busy_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    #[cfg(test)]
    pub fn state(&self, slot: usize) -> Option<VoiceState> {
        self.voices.get(slot).map(|v| v.state)
    }

    #[cfg(test)]
    pub fn path(&self, slot: usize) -> Option<&Path> {
        self.voices.get(slot).and_then(|v| v.path.as_deref())
    }

    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    /// Force-stop every playing voice
    pub fn stop_all(&mut self) {
        for slot in 0..self.voices.len() {
            if self.voices[slot].is_active() {
                let handle = self.handle(slot);
                self.backend.stop(handle);
                self.voices[slot].state = VoiceState::Idle;
                self.voices[slot].path = None;
            }
        }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn handle(&self, slot: usize) -> VoiceHandle {
        VoiceHandle {
            slot,
            generation: self.voices[slot].generation,
        }
    }
}
