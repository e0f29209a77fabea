use std::time::Duration;

/// Reference pitch for A4 in Hz
pub const A4_FREQ: f32 = 440.0;

/// Convert a semitone offset relative to A4 into a frequency in Hz
pub fn semitone_to_freq(semitones: i32) -> f32 {
    A4_FREQ * 2.0f32.powf(semitones as f32 / 12.0)
}

/// Format a frequency value with appropriate unit suffix (Hz, kHz)
pub fn format_frequency(freq: f32) -> String {
    if freq >= 1000.0 {
        format!("{:.2} kHz", freq / 1000.0)
    } else {
        format!("{:.1} Hz", freq)
    }
}

/// Format a duration with appropriate unit suffix (ms, s)
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f32();
    if secs >= 1.0 {
        format!("{:.2} s", secs)
    } else {
        format!("{:.0} ms", secs * 1000.0)
    }
}

/// Number of whole frames covering `millis` at `sample_rate`, rounded to nearest
pub fn millis_to_samples(millis: f32, sample_rate: u32) -> u64 {
    ((millis / 1000.0) * sample_rate as f32).round().max(0.0) as u64
}

/// Convert an `i16` PCM sample into the `[-1.0, 1.0)` float range
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}
