//! Diatonic harmony and chord inversions.
//!
//! Pure functions over the note/MIDI conversions in [`crate::note`]. Unknown
//! keys and malformed notes fail soft (empty output, dropped notes) — these
//! are expected conditions driven by user input, not errors.

use crate::note::{NoteName, midi_to_note, note_to_midi};

/// Major-scale scale-degree intervals in semitones (I..vii)
const MAJOR_SCALE: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Chord quality suffix per scale degree of the harmonized major scale:
/// maj, min, min, maj, maj, min, dim
const DEGREE_QUALITIES: [&str; 7] = ["", "m", "m", "", "", "m", "dim"];

/// The seven diatonic chords of a major key, in scale-degree order, e.g.
/// `diatonic_chords("C")` → `["C", "Dm", "Em", "F", "G", "Am", "Bdim"]`.
/// Unrecognized key roots yield an empty list.
pub fn diatonic_chords(key_root: &str) -> Vec<String> {
    let Some(root) = NoteName::parse(key_root) else {
        return Vec::new();
    };
    MAJOR_SCALE
        .iter()
        .zip(DEGREE_QUALITIES)
        .map(|(interval, quality)| {
            let degree = NoteName::from_semitone(root.semitone() + interval);
            format!("{}{}", degree.name(), quality)
        })
        .collect()
}

/// Cyclically invert a chord: `inversion` times, the lowest note moves up
/// an octave. Inversion 0 returns the input untouched (original spellings
/// preserved, no MIDI round-trip). Notes that fail to parse are dropped
/// from the pitch computation.
pub fn invert_chord(notes: &[String], inversion: u8) -> Vec<String> {
    if inversion == 0 {
        return notes.to_vec();
    }

    let mut midis: Vec<i32> = notes
        .iter()
        .filter_map(|n| {
            let midi = note_to_midi(n);
            if midi.is_none() {
                tracing::debug!("[theory] dropping unparseable chord note {:?}", n);
            }
            midi
        })
        .collect();
    midis.sort_unstable();

    for _ in 0..inversion {
        if midis.is_empty() {
            break;
        }
        let lowest = midis.remove(0);
        midis.push(lowest + 12);
    }

    midis.into_iter().map(midi_to_note).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn chord(notes: &[&str]) -> Vec<String> {
        notes.iter().map(|n| n.to_string()).collect()
    }

    fn pitch_classes(notes: &[String]) -> BTreeSet<i32> {
        notes
            .iter()
            .filter_map(|n| note_to_midi(n))
            .map(|m| m.rem_euclid(12))
            .collect()
    }

    #[test]
    fn test_diatonic_c_major() {
        assert_eq!(
            diatonic_chords("C"),
            ["C", "Dm", "Em", "F", "G", "Am", "Bdim"]
        );
    }

    #[test]
    fn test_diatonic_g_major() {
        assert_eq!(
            diatonic_chords("G"),
            ["G", "Am", "Bm", "C", "D", "Em", "F#dim"]
        );
    }

    #[test]
    fn test_diatonic_flat_root_spelled_sharp() {
        // Flat key roots are accepted but output uses sharp spelling
        assert_eq!(
            diatonic_chords("Db"),
            ["C#", "D#m", "Fm", "F#", "G#", "A#m", "Cdim"]
        );
    }

    #[test]
    fn test_diatonic_unknown_root_is_empty() {
        assert!(diatonic_chords("H").is_empty());
        assert!(diatonic_chords("").is_empty());
    }

    #[test]
    fn test_inversion_zero_is_identity() {
        let c = chord(&["C4", "E4", "G4"]);
        assert_eq!(invert_chord(&c, 0), c);
        // Spellings survive untouched even when they would normalize
        let flat = chord(&["Db4", "F4", "Ab4"]);
        assert_eq!(invert_chord(&flat, 0), flat);
    }

    #[test]
    fn test_first_and_second_inversion() {
        let c = chord(&["C4", "E4", "G4"]);
        assert_eq!(invert_chord(&c, 1), chord(&["E4", "G4", "C5"]));
        assert_eq!(invert_chord(&c, 2), chord(&["G4", "C5", "E5"]));
    }

    #[test]
    fn test_inversion_cyclicality_preserves_pitch_classes() {
        let c = chord(&["C4", "E4", "G4"]);
        for i in 1u8..=2 {
            let there = invert_chord(&c, i);
            let back = invert_chord(&there, (3 - i) % 3);
            assert_eq!(pitch_classes(&back), pitch_classes(&c));
        }
    }

    #[test]
    fn test_inversion_sorts_unordered_input() {
        let jumbled = chord(&["G4", "C4", "E4"]);
        assert_eq!(invert_chord(&jumbled, 1), chord(&["E4", "G4", "C5"]));
    }

    #[test]
    fn test_inversion_drops_unparseable_notes() {
        let mixed = chord(&["C4", "??", "G4"]);
        assert_eq!(invert_chord(&mixed, 1), chord(&["G4", "C5"]));
        // All-bad input shrinks to nothing rather than failing
        assert!(invert_chord(&chord(&["??", "!!"]), 1).is_empty());
    }
}
