use std::ops::RangeInclusive;

use rand::Rng;

use crate::utils::helpers::semitone_to_freq;

/// Semitones around A4 a `?` token may land on (C3 up to C6)
pub const RANDOM_SEMITONE_RANGE: RangeInclusive<i32> = -21..=15;

const DEFAULT_OCTAVE: i32 = 4;

/// Resolve a note name such as `C`, `A#5` or `Eb3` to its frequency.
///
/// Letters are case-insensitive. The octave defaults to 4 when the suffix is
/// missing or not an integer. Returns 0.0 when the first letter is not a
/// note name or the octave puts the pitch beyond a finite `f32`.
pub fn parse_note_freq(note: &str) -> f32 {
    let upper = note.to_uppercase();
    let mut chars = upper.chars();

    let mut semitones = match chars.next() {
        Some('C') => -9,
        Some('D') => -7,
        Some('E') => -5,
        Some('F') => -4,
        Some('G') => -2,
        Some('A') => 0,
        Some('B') => 2,
        _ => return 0.0,
    };

    let rest = chars.as_str();
    let octave_text = match rest.chars().next() {
        Some('#') => {
            semitones += 1;
            &rest[1..]
        }
        // 'b' after uppercasing
        Some('B') => {
            semitones -= 1;
            &rest[1..]
        }
        _ => rest,
    };

    let octave = octave_text.parse::<i32>().unwrap_or(DEFAULT_OCTAVE);
    let Some(total) = octave
        .checked_sub(DEFAULT_OCTAVE)
        .and_then(|diff| diff.checked_mul(12))
        .and_then(|shift| shift.checked_add(semitones))
    else {
        return 0.0;
    };

    let freq = semitone_to_freq(total);
    if freq.is_finite() {
        freq
    } else {
        0.0
    }
}

/// Pick a uniformly random pitch from `RANDOM_SEMITONE_RANGE`
pub fn random_note_freq<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    semitone_to_freq(rng.random_range(RANDOM_SEMITONE_RANGE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn a4_and_a5_are_exact() {
        assert_eq!(parse_note_freq("A4"), 440.0);
        assert_eq!(parse_note_freq("A5"), 880.0);
        assert_eq!(parse_note_freq("A"), 440.0);
    }

    #[test]
    fn c4_is_nine_semitones_below_a4() {
        let expected = 440.0 * 2.0f32.powf(-9.0 / 12.0);
        assert_relative_eq!(parse_note_freq("C4"), expected, epsilon = 1e-4);
        assert_relative_eq!(parse_note_freq("c"), expected, epsilon = 1e-4);
    }

    #[test]
    fn accidentals_shift_by_one_semitone() {
        assert_relative_eq!(parse_note_freq("A#4"), semitone_to_freq(1), epsilon = 1e-4);
        assert_relative_eq!(parse_note_freq("Bb4"), semitone_to_freq(1), epsilon = 1e-4);
        assert_relative_eq!(parse_note_freq("eb3"), semitone_to_freq(-6 - 12), epsilon = 1e-4);
    }

    #[test]
    fn unparsable_octave_falls_back_to_four() {
        assert_eq!(parse_note_freq("Axyz"), 440.0);
        assert_relative_eq!(parse_note_freq("C10"), semitone_to_freq(-9 + 72), epsilon = 1e-1);
    }

    #[test]
    fn huge_octaves_are_rejected_without_overflow() {
        assert_eq!(parse_note_freq("C999999999"), 0.0);
        assert_eq!(parse_note_freq("C-999999999"), 0.0);
        assert_eq!(parse_note_freq("A200"), 0.0);
        // Far below hearing but still a real pitch
        assert!(parse_note_freq("A-20") > 0.0);
    }

    #[test]
    fn unknown_letters_fail() {
        assert_eq!(parse_note_freq("H4"), 0.0);
        assert_eq!(parse_note_freq(""), 0.0);
        assert_eq!(parse_note_freq("#"), 0.0);
    }

    #[test]
    fn random_notes_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let low = semitone_to_freq(*RANDOM_SEMITONE_RANGE.start());
        let high = semitone_to_freq(*RANDOM_SEMITONE_RANGE.end());
        for _ in 0..500 {
            let freq = random_note_freq(&mut rng);
            assert!(freq >= low && freq <= high, "{freq} out of range");
        }
    }
}
