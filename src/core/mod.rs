pub mod audio;
pub mod chime;
pub mod notation;
pub mod synth;
pub mod voice;

pub use chime::ChimeSequencer;
