//! Compact chime notation: whitespace separated note names, `-` holds,
//! `X`/`Z` rests and `?` random notes.

mod parser;
mod pitch;

pub use self::parser::NoteParser;
pub use self::pitch::{parse_note_freq, random_note_freq, RANDOM_SEMITONE_RANGE};

/// Length of one duration unit at speed 1.0
pub const BASE_UNIT_MS: f32 = 300.0;

/// Lowest accepted note speed; anything at or below zero is clamped here
pub const MIN_NOTE_SPEED: f32 = 0.01;

/// One tone (or rest, when `frequency` is zero) of fixed length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteInstruction {
    /// Pitch in Hz, 0 for silence
    pub frequency: f32,
    pub duration_samples: u64,
}

impl NoteInstruction {
    pub fn is_silence(&self) -> bool {
        self.frequency <= 0.0
    }
}

/// Ordered instructions produced by a single parse
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteSequence {
    instructions: Vec<NoteInstruction>,
}

impl NoteSequence {
    pub fn new(instructions: Vec<NoteInstruction>) -> Self {
        Self { instructions }
    }

    pub fn instructions(&self) -> &[NoteInstruction] {
        &self.instructions
    }

    pub fn get(&self, index: usize) -> Option<&NoteInstruction> {
        self.instructions.get(index)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Sum of every instruction's length in frames
    pub fn total_samples(&self) -> u64 {
        self.instructions.iter().map(|i| i.duration_samples).sum()
    }
}
