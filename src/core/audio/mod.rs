//! Audio device layer: one cpal output stream fed by a `Mixer` that combines
//! the tone synthesizer with decoded file clips.

mod backend;
mod decode;
mod mixer;
mod output;

pub use self::backend::{DeviceBackend, DeviceToneOutput};
pub use self::decode::decode_file;
pub use self::mixer::Mixer;
pub use self::output::AudioEngine;

/// Output rate shared by the synthesizer, decoded clips and the device stream
pub const SAMPLE_RATE: u32 = 44_100;

/// Interleaved stereo everywhere
pub const CHANNELS: u16 = 2;
