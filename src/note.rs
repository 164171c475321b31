//! Note names, MIDI numbers, and frequencies.
//!
//! MIDI is the canonical arithmetic space (transposition, inversion, fret
//! math); note-name strings like `"C#4"` are the external representation.
//! Output always uses sharp spelling; flat spellings are accepted on input.

use std::ops::RangeInclusive;

/// Musical note names (chromatic scale, sharp spelling)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteName {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl NoteName {
    /// Semitone offset within an octave (C=0, B=11)
    pub fn semitone(self) -> i32 {
        match self {
            NoteName::C => 0,
            NoteName::CSharp => 1,
            NoteName::D => 2,
            NoteName::DSharp => 3,
            NoteName::E => 4,
            NoteName::F => 5,
            NoteName::FSharp => 6,
            NoteName::G => 7,
            NoteName::GSharp => 8,
            NoteName::A => 9,
            NoteName::ASharp => 10,
            NoteName::B => 11,
        }
    }

    /// Inverse of `semitone`, for any integer (euclidean remainder)
    pub fn from_semitone(semitone: i32) -> Self {
        match semitone.rem_euclid(12) {
            0 => NoteName::C,
            1 => NoteName::CSharp,
            2 => NoteName::D,
            3 => NoteName::DSharp,
            4 => NoteName::E,
            5 => NoteName::F,
            6 => NoteName::FSharp,
            7 => NoteName::G,
            8 => NoteName::GSharp,
            9 => NoteName::A,
            10 => NoteName::ASharp,
            _ => NoteName::B,
        }
    }

    /// Display name, sharp spelling ("C#", not "Db")
    pub fn name(self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::CSharp => "C#",
            NoteName::D => "D",
            NoteName::DSharp => "D#",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::FSharp => "F#",
            NoteName::G => "G",
            NoteName::GSharp => "G#",
            NoteName::A => "A",
            NoteName::ASharp => "A#",
            NoteName::B => "B",
        }
    }

    /// Parse a pitch-class spelling. Accepts both sharp and flat forms
    /// ("C#" and "Db" are the same pitch class); anything else is None.
    pub fn parse(s: &str) -> Option<Self> {
        let note = match s {
            "C" => NoteName::C,
            "C#" | "Db" => NoteName::CSharp,
            "D" => NoteName::D,
            "D#" | "Eb" => NoteName::DSharp,
            "E" => NoteName::E,
            "F" => NoteName::F,
            "F#" | "Gb" => NoteName::FSharp,
            "G" => NoteName::G,
            "G#" | "Ab" => NoteName::GSharp,
            "A" => NoteName::A,
            "A#" | "Bb" => NoteName::ASharp,
            "B" => NoteName::B,
            _ => return None,
        };
        Some(note)
    }

    /// MIDI note number at a given octave. Middle C (C4) = MIDI 60.
    pub fn to_midi(self, octave: i32) -> i32 {
        (octave + 1) * 12 + self.semitone()
    }

    /// Frequency in Hz at a given octave (equal temperament, A4 = 440 Hz)
    pub fn to_freq(self, octave: i32) -> f64 {
        midi_freq(self.to_midi(octave))
    }
}

/// A note-name string split into pitch class and octave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedNote {
    pub name: NoteName,
    pub octave: i32,
}

/// Parse a note-name string like "C#4" or "Bb3" into pitch class + octave.
/// Malformed input yields None, never an error — callers treat a None as
/// "ignore this note".
pub fn parse_note(s: &str) -> Option<ParsedNote> {
    let split = s
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit() || *c == '-')
        .map(|(i, _)| i)?;
    let name = NoteName::parse(&s[..split])?;
    let octave = s[split..].parse::<i32>().ok()?;
    Some(ParsedNote { name, octave })
}

/// Note-name string to MIDI number. None for unparseable input.
pub fn note_to_midi(s: &str) -> Option<i32> {
    let parsed = parse_note(s)?;
    Some(parsed.name.to_midi(parsed.octave))
}

/// MIDI number to note-name string, sharp spelling. Total: every integer
/// maps to a name (MIDI 0 is "C-1").
pub fn midi_to_note(midi: i32) -> String {
    let name = NoteName::from_semitone(midi.rem_euclid(12));
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", name.name(), octave)
}

/// Frequency in Hz for a MIDI number (A4 = MIDI 69 = 440 Hz)
pub fn midi_freq(midi: i32) -> f64 {
    440.0 * 2.0_f64.powf((midi as f64 - 69.0) / 12.0)
}

/// Octaves the oscillator note table covers. Notes outside this range are
/// not playable through `play_note` and resolve to silence.
pub const PLAYABLE_OCTAVES: RangeInclusive<i32> = 3..=6;

/// Frequency for a playable note-name string. None when the note does not
/// parse or falls outside the playable octave range; both mean silence.
pub fn playable_freq(s: &str) -> Option<f64> {
    let parsed = parse_note(s)?;
    if !PLAYABLE_OCTAVES.contains(&parsed.octave) {
        return None;
    }
    Some(parsed.name.to_freq(parsed.octave))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_middle_c_midi() {
        assert_eq!(note_to_midi("C4"), Some(60));
        assert_eq!(NoteName::C.to_midi(4), 60);
    }

    #[test]
    fn test_a4_frequency() {
        assert_relative_eq!(NoteName::A.to_freq(4), 440.0, epsilon = 0.01);
    }

    #[test]
    fn test_semitones() {
        assert_eq!(NoteName::C.semitone(), 0);
        assert_eq!(NoteName::B.semitone(), 11);
    }

    #[test]
    fn test_parse_sharp_and_flat() {
        assert_eq!(
            parse_note("C#4"),
            Some(ParsedNote { name: NoteName::CSharp, octave: 4 })
        );
        assert_eq!(
            parse_note("Db4"),
            Some(ParsedNote { name: NoteName::CSharp, octave: 4 })
        );
        assert_eq!(parse_note("Bb2"), parse_note("A#2"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse_note("H4"), None);
        assert_eq!(parse_note("C"), None);
        assert_eq!(parse_note("4"), None);
        assert_eq!(parse_note(""), None);
        assert_eq!(parse_note("C#x"), None);
    }

    #[test]
    fn test_midi_round_trip_all_sharps() {
        let names = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];
        for octave in 0..=8 {
            for name in names {
                let note = format!("{}{}", name, octave);
                let midi = note_to_midi(&note).unwrap();
                assert_eq!(midi_to_note(midi), note);
            }
        }
    }

    #[test]
    fn test_midi_to_note_total_below_zero_octave() {
        assert_eq!(midi_to_note(0), "C-1");
        assert_eq!(midi_to_note(-1), "B-2");
    }

    #[test]
    fn test_playable_range_gate() {
        assert!(playable_freq("C3").is_some());
        assert!(playable_freq("B6").is_some());
        assert_eq!(playable_freq("B2"), None);
        assert_eq!(playable_freq("C7"), None);
        assert_eq!(playable_freq("not a note"), None);
    }

    #[test]
    fn test_playable_freq_matches_midi_freq() {
        assert_relative_eq!(playable_freq("A4").unwrap(), 440.0, epsilon = 1e-9);
        assert_relative_eq!(
            playable_freq("C4").unwrap(),
            midi_freq(60),
            epsilon = 1e-9
        );
    }
}
