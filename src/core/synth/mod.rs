pub mod bell;
pub mod render;

use std::f32::consts::TAU;

use crate::core::audio::{CHANNELS, SAMPLE_RATE};
use crate::core::notation::NoteSequence;

/// Fraction of full scale used for tones, leaves headroom for mixing
pub const TONE_GAIN: f32 = 0.2;

/// Position of the synthesizer inside its sequence
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SynthesisCursor {
    pub instruction_index: usize,
    pub samples_emitted: u64,
    /// Always within `[0, 2π)`
    pub phase: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Idle,
    Playing,
    Finished,
}

/// Outcome of a single `pull`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pull {
    /// Frames written to the front of the buffer
    pub frames: usize,
    /// True on the one pull that exhausted the sequence
    pub finished: bool,
}

/// Pull-based sine generator producing interleaved 16-bit frames
pub struct ToneSynthesizer {
    sample_rate: u32,
    channels: usize,
    sequence: NoteSequence,
    cursor: SynthesisCursor,
    volume: f32,
    state: StreamState,
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        Self::new(SAMPLE_RATE, CHANNELS)
    }
}

impl ToneSynthesizer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1) as usize,
            sequence: NoteSequence::default(),
            cursor: SynthesisCursor::default(),
            volume: 1.0,
            state: StreamState::Idle,
        }
    }

    /// Replace the sequence and arm the stream from its first frame
    pub fn start(&mut self, sequence: NoteSequence, volume: f32) {
        self.sequence = sequence;
        self.volume = volume.clamp(0.0, 1.0);
        self.cursor = SynthesisCursor::default();
        self.state = StreamState::Playing;
    }

    /// Silence the stream without signalling completion
    pub fn stop(&mut self) {
        self.state = StreamState::Idle;
    }

    pub fn is_playing(&self) -> bool {
        self.state == StreamState::Playing
    }

    pub fn cursor(&self) -> SynthesisCursor {
        self.cursor
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Fill `out` with interleaved frames.
    ///
    /// Only whole frames are written; anything past `frames * channels` is
    /// left untouched.
    pub fn pull(&mut self, out: &mut [i16]) -> Pull {
        if self.state != StreamState::Playing {
            return Pull::default();
        }

        let capacity = out.len() / self.channels;
        let amplitude = TONE_GAIN * self.volume;
        let mut written = 0;

        while written < capacity {
            let Some(instr) = self.sequence.get(self.cursor.instruction_index).copied() else {
                break;
            };

            let remaining = instr.duration_samples - self.cursor.samples_emitted;
            let count = remaining.min((capacity - written) as u64) as usize;

            if instr.is_silence() {
                out[written * self.channels..(written + count) * self.channels].fill(0);
            } else {
                let step = TAU * instr.frequency / self.sample_rate as f32;
                for frame in out[written * self.channels..(written + count) * self.channels]
                    .chunks_exact_mut(self.channels)
                {
                    let value = (self.cursor.phase.sin() * amplitude * i16::MAX as f32) as i16;
                    frame.fill(value);

                    self.cursor.phase = (self.cursor.phase + step).rem_euclid(TAU);
                }
            }

            written += count;
            self.cursor.samples_emitted += count as u64;

            if self.cursor.samples_emitted >= instr.duration_samples {
                // Phase restarts with every instruction
                self.cursor.instruction_index += 1;
                self.cursor.samples_emitted = 0;
                self.cursor.phase = 0.0;
            }
        }

        let finished = self.cursor.instruction_index >= self.sequence.len();
        if finished {
            self.state = StreamState::Finished;
        }
        Pull { frames: written, finished }
    }
}
