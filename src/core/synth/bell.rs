//! Struck-bell synthesis for the bundled grandfather-clock sounds.

use std::f32::consts::TAU;

use crate::core::notation::parse_note_freq;

/// Partials of a tuned bell as (ratio to the nominal, gain)
const BELL_PARTIALS: [(f32, f32); 5] = [(0.5, 0.5), (1.0, 1.0), (1.2, 0.6), (1.5, 0.35), (2.0, 0.3)];

/// Time constant of the nominal partial; higher partials die away faster
const BELL_DECAY_SECS: f32 = 1.8;

/// A strike rings this long before it is faded out
const RING_SECS: f32 = 6.0;
const FADE_SECS: f32 = 0.25;

/// Loudest sample after normalising
const PEAK: f32 = 0.8;

const STRIKE_NOTE: &str = "E3";
const STRIKE_SECS: f32 = 5.0;

/// Westminster quarters, the four phrases rung before the hour
const PRELUDE_PHRASES: [[&str; 4]; 4] = [
    ["G#4", "F#4", "E4", "B3"],
    ["E4", "G#4", "F#4", "B3"],
    ["E4", "F#4", "G#4", "E4"],
    ["G#4", "E4", "F#4", "B3"],
];
const PRELUDE_NOTE_SECS: f32 = 0.75;
const PRELUDE_PHRASE_SECS: f32 = 3.75;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BellStrike {
    pub frequency: f32,
    pub onset_secs: f32,
}

/// Mix `strikes` into a mono buffer `length_secs` long, normalised to `PEAK`.
///
/// Each partial runs as a damped rotating phasor, so no per-sample
/// `sin`/`exp` is needed.
pub fn ring_bells(strikes: &[BellStrike], length_secs: f32, sample_rate: u32) -> Vec<f32> {
    let rate = sample_rate as f32;
    let len = (length_secs.max(0.0) * rate) as usize;
    let ring = (RING_SECS * rate) as usize;
    let fade = (FADE_SECS * rate).max(1.0);
    let mut out = vec![0.0f32; len];

    for strike in strikes {
        let start = ((strike.onset_secs.max(0.0) * rate) as usize).min(len);
        let end = (start + ring).min(len);

        for &(ratio, gain) in &BELL_PARTIALS {
            let omega = TAU * strike.frequency * ratio / rate;
            let damping = (-ratio / (BELL_DECAY_SECS * rate)).exp();
            let (step_re, step_im) = (damping * omega.cos(), damping * omega.sin());
            let (mut re, mut im) = (gain, 0.0f32);

            for (i, sample) in out[start..end].iter_mut().enumerate() {
                let left = (ring - i) as f32;
                *sample += im * (left / fade).min(1.0);
                (re, im) = (re * step_re - im * step_im, re * step_im + im * step_re);
            }
        }
    }

    let peak = out.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if peak > 0.0 {
        let scale = PEAK / peak;
        out.iter_mut().for_each(|s| *s *= scale);
    }
    out
}

/// A single low strike, the default hour sound
pub fn strike_sound(sample_rate: u32) -> Vec<f32> {
    let strike = BellStrike {
        frequency: parse_note_freq(STRIKE_NOTE),
        onset_secs: 0.0,
    };
    ring_bells(&[strike], STRIKE_SECS, sample_rate)
}

/// The four Westminster phrases, the default prelude
pub fn prelude_sound(sample_rate: u32) -> Vec<f32> {
    let strikes: Vec<BellStrike> = PRELUDE_PHRASES
        .iter()
        .enumerate()
        .flat_map(|(p, phrase)| {
            phrase.iter().enumerate().map(move |(n, note)| BellStrike {
                frequency: parse_note_freq(note),
                onset_secs: p as f32 * PRELUDE_PHRASE_SECS + n as f32 * PRELUDE_NOTE_SECS,
            })
        })
        .collect();
    let length = PRELUDE_PHRASES.len() as f32 * PRELUDE_PHRASE_SECS + STRIKE_SECS;
    ring_bells(&strikes, length, sample_rate)
}
