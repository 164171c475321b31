//! Chord-name lookup: resolve names like "F#m" or "Bdim" to playable
//! note lists, voiced from octave 4 upward.

use crate::note::{NoteName, midi_to_note};

/// Triad quality, parsed from a chord-name suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Major,
    Minor,
    Diminished,
}

impl Quality {
    /// Semitone intervals above the root
    fn intervals(self) -> [i32; 3] {
        match self {
            Quality::Major => [0, 4, 7],
            Quality::Minor => [0, 3, 7],
            Quality::Diminished => [0, 3, 6],
        }
    }
}

/// Split a chord name into root pitch class + quality. Suffixes are the
/// ones `diatonic_chords` produces: empty (major), "m", "dim".
pub fn parse_chord_name(name: &str) -> Option<(NoteName, Quality)> {
    let (root_str, quality) = if let Some(root) = name.strip_suffix("dim") {
        (root, Quality::Diminished)
    } else if let Some(root) = name.strip_suffix('m') {
        (root, Quality::Minor)
    } else {
        (name, Quality::Major)
    };
    Some((NoteName::parse(root_str)?, quality))
}

/// Note list for a chord name, root in octave 4, intervals stacked upward.
/// `chord_notes("C")` → `["C4", "E4", "G4"]`. Unknown names yield None.
pub fn chord_notes(name: &str) -> Option<Vec<String>> {
    let (root, quality) = parse_chord_name(name)?;
    let root_midi = root.to_midi(4);
    Some(
        quality
            .intervals()
            .iter()
            .map(|interval| midi_to_note(root_midi + interval))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_triad() {
        assert_eq!(chord_notes("C").unwrap(), ["C4", "E4", "G4"]);
        assert_eq!(chord_notes("G").unwrap(), ["G4", "B4", "D5"]);
    }

    #[test]
    fn test_minor_triad() {
        assert_eq!(chord_notes("Am").unwrap(), ["A4", "C5", "E5"]);
        assert_eq!(chord_notes("F#m").unwrap(), ["F#4", "A4", "C#5"]);
    }

    #[test]
    fn test_diminished_triad() {
        assert_eq!(chord_notes("Bdim").unwrap(), ["B4", "D5", "F5"]);
    }

    #[test]
    fn test_flat_root_normalizes_to_sharp() {
        assert_eq!(chord_notes("Bb").unwrap(), ["A#4", "D5", "F5"]);
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(chord_notes("H"), None);
        assert_eq!(chord_notes("Caug"), None);
        assert_eq!(chord_notes(""), None);
    }

    #[test]
    fn test_every_diatonic_chord_resolves() {
        for root in ["C", "G", "F#", "Db"] {
            for chord in crate::theory::diatonic_chords(root) {
                assert!(chord_notes(&chord).is_some(), "unresolved: {}", chord);
            }
        }
    }
}
