use log::debug;
use rand::Rng;

use super::pitch::{parse_note_freq, random_note_freq};
use super::{NoteInstruction, NoteSequence, BASE_UNIT_MS, MIN_NOTE_SPEED};
use crate::core::audio::SAMPLE_RATE;
use crate::utils::helpers::{format_frequency, millis_to_samples};

/// Compiles chime notation into a `NoteSequence`.
///
/// Parsing never fails: tokens that are not note names are dropped and
/// cancel whatever note was pending.
#[derive(Debug, Clone, Copy)]
pub struct NoteParser {
    sample_rate: u32,
}

/// Note or rest that may still be extended by `-`
#[derive(Debug, Clone, Copy)]
struct Pending {
    frequency: f32,
    units: u64,
}

impl Default for NoteParser {
    fn default() -> Self {
        Self::new(SAMPLE_RATE)
    }
}

impl NoteParser {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames in one duration unit at `speed`
    pub fn base_duration_samples(&self, speed: f32) -> u64 {
        let speed = if speed.is_finite() && speed > MIN_NOTE_SPEED {
            speed
        } else {
            MIN_NOTE_SPEED
        };
        millis_to_samples(BASE_UNIT_MS / speed, self.sample_rate)
    }

    /// Parse using the thread-local random source for `?` tokens
    pub fn parse(&self, text: &str, speed: f32) -> NoteSequence {
        self.parse_with_rng(text, speed, &mut rand::rng())
    }

    pub fn parse_with_rng<R: Rng + ?Sized>(
        &self,
        text: &str,
        speed: f32,
        rng: &mut R,
    ) -> NoteSequence {
        let base = self.base_duration_samples(speed);
        let mut instructions = Vec::new();
        let mut pending: Option<Pending> = None;

        let mut flush = |pending: Option<Pending>| {
            if let Some(p) = pending {
                instructions.push(NoteInstruction {
                    frequency: p.frequency,
                    duration_samples: base * p.units,
                });
            }
        };

        for token in text.split_whitespace() {
            if token == "-" {
                if let Some(p) = pending.as_mut() {
                    p.units += 1;
                }
                continue;
            }

            flush(pending.take());

            pending = if token.eq_ignore_ascii_case("x") || token.eq_ignore_ascii_case("z") {
                Some(Pending { frequency: 0.0, units: 1 })
            } else if token == "?" {
                Some(Pending { frequency: random_note_freq(rng), units: 1 })
            } else {
                let frequency = parse_note_freq(token);
                if frequency > 0.0 {
                    Some(Pending { frequency, units: 1 })
                } else {
                    debug!("Ignoring unknown note token {:?}", token);
                    None
                }
            };
        }
        flush(pending);

        for instr in &instructions {
            debug!(
                "note {} for {} samples",
                format_frequency(instr.frequency),
                instr.duration_samples
            );
        }
        NoteSequence::new(instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn parse(text: &str) -> NoteSequence {
        NoteParser::default().parse(text, 1.0)
    }

    #[test]
    fn base_unit_is_300ms_at_normal_speed() {
        let parser = NoteParser::default();
        assert_eq!(parser.base_duration_samples(1.0), 13_230);
        assert_eq!(parser.base_duration_samples(2.0), 6_615);
    }

    #[test]
    fn held_note_accumulates_units() {
        let base = NoteParser::default().base_duration_samples(1.0);
        let seq = parse("C - - D");
        assert_eq!(seq.len(), 2);

        let c = seq.instructions()[0];
        let d = seq.instructions()[1];
        assert_relative_eq!(c.frequency, parse_note_freq("C4"));
        assert_eq!(c.duration_samples, 3 * base);
        assert_relative_eq!(d.frequency, parse_note_freq("D4"));
        assert_eq!(d.duration_samples, base);
    }

    #[test]
    fn rests_are_silent_instructions() {
        let base = NoteParser::default().base_duration_samples(1.0);
        let seq = parse("x - Z C5");
        assert_eq!(seq.len(), 3);
        assert!(seq.instructions()[0].is_silence());
        assert_eq!(seq.instructions()[0].duration_samples, 2 * base);
        assert!(seq.instructions()[1].is_silence());
        assert_relative_eq!(seq.instructions()[2].frequency, 2.0 * parse_note_freq("C4"), epsilon = 1e-3);
    }

    #[test]
    fn empty_input_produces_nothing() {
        assert!(parse("").is_empty());
        assert!(parse("   \t\n ").is_empty());
    }

    #[test]
    fn leading_hold_is_ignored() {
        let seq = parse("- - A");
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.total_samples(), NoteParser::default().base_duration_samples(1.0));
    }

    #[test]
    fn garbage_token_cancels_pending_hold() {
        // "H" flushes the C, and the following hold has nothing to extend
        let base = NoteParser::default().base_duration_samples(1.0);
        let seq = parse("C H - E");
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.instructions()[0].duration_samples, base);
        assert_eq!(seq.total_samples(), 2 * base);
    }

    #[test]
    fn total_length_matches_unit_count() {
        let base = NoteParser::default().base_duration_samples(1.5);
        let seq = NoteParser::default().parse("C E - G - - X C5 -", 1.5);
        assert_eq!(seq.len(), 5);
        assert_eq!(seq.total_samples(), (1 + 2 + 3 + 1 + 2) * base);
    }

    #[test]
    fn parsing_is_repeatable() {
        let parser = NoteParser::default();
        let text = "C E G C5 - X Bb3 - F#";
        assert_eq!(parser.parse(text, 1.25), parser.parse(text, 1.25));
    }

    #[test]
    fn random_token_is_one_unit() {
        let parser = NoteParser::default();
        let mut rng = StdRng::seed_from_u64(42);
        let seq = parser.parse_with_rng("? - ?", 1.0, &mut rng);
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.instructions()[0].duration_samples, 2 * parser.base_duration_samples(1.0));
        assert!(seq.instructions().iter().all(|i| i.frequency > 0.0));
    }

    #[test]
    fn non_positive_speed_is_clamped() {
        let parser = NoteParser::default();
        let clamped = parser.base_duration_samples(MIN_NOTE_SPEED);
        assert_eq!(parser.base_duration_samples(0.0), clamped);
        assert_eq!(parser.base_duration_samples(-3.0), clamped);
        assert_eq!(parser.base_duration_samples(f32::NAN), clamped);
        assert!(clamped > 0);
    }
}
