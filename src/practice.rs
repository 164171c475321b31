//! Interactive practice mode — play notes from the keyboard and drill the
//! diatonic chords of a key.
//!
//! Home-row keys sound held notes (released when the key is, where the
//! terminal reports releases). Digits 1-7 play the scale-degree chord of
//! the selected key at the current inversion, on piano or guitar.

use std::io::{self, Write};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use thiserror::Error;

use crate::chords::chord_notes;
use crate::note::NoteName;
use crate::session::{AudioSession, DEFAULT_CHORD_SECS, Instrument};
use crate::synth::Command;
use crate::theory::{diatonic_chords, invert_chord};

#[derive(Debug, Error)]
pub enum PracticeError {
    #[error("terminal error: {0}")]
    Terminal(#[from] io::Error),
    #[error("audio unavailable")]
    AudioUnavailable,
}

/// Key centers stepped by `[` and `]`, ordered around the circle of fifths
const KEY_CIRCLE: [&str; 12] = [
    "C", "G", "D", "A", "E", "B", "F#", "C#", "G#", "D#", "A#", "F",
];

/// Map a keyboard character to a (NoteName, octave_offset) pair.
/// The octave_offset marks notes that spill into the next octave on the
/// keyboard layout (k, l, ;, ', o, p).
fn char_to_note(c: char) -> Option<(NoteName, i32)> {
    match c {
        // Home row: natural notes
        'a' => Some((NoteName::C, 0)),
        's' => Some((NoteName::D, 0)),
        'd' => Some((NoteName::E, 0)),
        'f' => Some((NoteName::F, 0)),
        'g' => Some((NoteName::G, 0)),
        'h' => Some((NoteName::A, 0)),
        'j' => Some((NoteName::B, 0)),
        'k' => Some((NoteName::C, 1)),
        'l' => Some((NoteName::D, 1)),
        ';' => Some((NoteName::E, 1)),
        '\'' => Some((NoteName::F, 1)),

        // Top row: sharps/flats
        'w' => Some((NoteName::CSharp, 0)),
        'e' => Some((NoteName::DSharp, 0)),
        't' => Some((NoteName::FSharp, 0)),
        'y' => Some((NoteName::GSharp, 0)),
        'u' => Some((NoteName::ASharp, 0)),
        'o' => Some((NoteName::CSharp, 1)),
        'p' => Some((NoteName::DSharp, 1)),

        _ => None,
    }
}

struct PracticeState {
    key_index: usize,
    inversion: u8,
    instrument: Instrument,
    octave: i32,
}

impl PracticeState {
    fn key_root(&self) -> &'static str {
        KEY_CIRCLE[self.key_index]
    }
}

/// Run the interactive practice mode
pub fn run(session: &AudioSession, key_root: &str) -> Result<(), PracticeError> {
    if session.init().is_none() {
        return Err(PracticeError::AudioUnavailable);
    }

    let mut stdout = io::stdout();

    // Enter raw mode
    terminal::enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;

    // Enable keyboard enhancement for key release detection.
    // On macOS, the terminal may accept the enhancement flag but not
    // actually send release events, so we disable it and use the fallback
    // timer.
    let has_key_release = if cfg!(target_os = "macos") {
        false
    } else {
        queue!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )
        .is_ok()
            && stdout.flush().is_ok()
    };

    let mut state = PracticeState {
        key_index: KEY_CIRCLE
            .iter()
            .position(|k| {
                NoteName::parse(k) == NoteName::parse(key_root)
            })
            .unwrap_or(0),
        inversion: 0,
        instrument: Instrument::Piano,
        octave: 4,
    };

    print_banner(&mut stdout, session, &state);

    let result = event_loop(session, &mut stdout, &mut state, has_key_release);

    // Restore terminal
    if let Some(engine) = session.init() {
        engine.send(Command::AllNotesOff);
    }
    std::thread::sleep(Duration::from_millis(20));

    if has_key_release {
        let _ = execute!(
            stdout,
            crossterm::event::PopKeyboardEnhancementFlags,
            LeaveAlternateScreen
        );
    } else {
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
    let _ = terminal::disable_raw_mode();

    result
}

fn event_loop(
    session: &AudioSession,
    stdout: &mut io::Stdout,
    state: &mut PracticeState,
    has_key_release: bool,
) -> Result<(), PracticeError> {
    // For the fallback path: a channel that receives keys from timer
    // threads so the main loop can send NoteOff at the right time.
    let (fallback_tx, fallback_rx) = std_mpsc::channel::<char>();

    loop {
        // Drain any fallback NoteOff messages from timer threads
        if !has_key_release {
            while let Ok(key) = fallback_rx.try_recv() {
                note_off(session, key);
            }
        }

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }

        match event::read()? {
            Event::Key(KeyEvent {
                code: KeyCode::Esc,
                kind: KeyEventKind::Press,
                ..
            }) => {
                return Ok(());
            }

            Event::Key(KeyEvent {
                code: KeyCode::Char(c),
                kind: KeyEventKind::Press,
                ..
            }) => {
                // Scale-degree chords
                if let Some(digit) = c.to_digit(10) {
                    if (1..=7).contains(&digit) {
                        play_degree(session, state, digit as usize, stdout);
                        continue;
                    }
                }

                match c {
                    '[' => {
                        state.key_index = (state.key_index + KEY_CIRCLE.len() - 1)
                            % KEY_CIRCLE.len();
                        print_banner(stdout, session, state);
                    }
                    ']' => {
                        state.key_index = (state.key_index + 1) % KEY_CIRCLE.len();
                        print_banner(stdout, session, state);
                    }
                    'i' => {
                        state.inversion = (state.inversion + 1) % 3;
                        update_status(stdout, session, state, None);
                    }
                    'b' => {
                        state.instrument = match state.instrument {
                            Instrument::Piano => Instrument::Guitar,
                            Instrument::Guitar => Instrument::Piano,
                        };
                        update_status(stdout, session, state, None);
                    }
                    'z' => {
                        state.octave = (state.octave - 1).max(1);
                        update_status(stdout, session, state, None);
                    }
                    'x' => {
                        state.octave = (state.octave + 1).min(7);
                        update_status(stdout, session, state, None);
                    }
                    _ => {
                        // Note key
                        if let Some((note_name, oct_offset)) = char_to_note(c) {
                            let effective_octave = (state.octave + oct_offset).min(8);
                            let freq = note_name.to_freq(effective_octave);

                            // Fallback: no key release support — stop the
                            // note before starting a new one
                            if !has_key_release {
                                note_off(session, c);
                            }

                            if let Some(engine) = session.init() {
                                engine.send(Command::NoteOn { key: c, freq });
                            }
                            update_status(
                                stdout,
                                session,
                                state,
                                Some(format!("{}{}", note_name.name(), effective_octave)),
                            );

                            // Fallback: no key release support — auto-off
                            // after 300ms
                            if !has_key_release {
                                let tx = fallback_tx.clone();
                                std::thread::spawn(move || {
                                    std::thread::sleep(Duration::from_millis(300));
                                    let _ = tx.send(c);
                                });
                            }
                        }
                    }
                }
            }

            Event::Key(KeyEvent {
                code: KeyCode::Char(c),
                kind: KeyEventKind::Release,
                ..
            }) => {
                if char_to_note(c).is_some() {
                    note_off(session, c);
                    update_status(stdout, session, state, None);
                }
            }

            _ => {}
        }
    }
}

fn note_off(session: &AudioSession, key: char) {
    if let Some(engine) = session.init() {
        engine.send(Command::NoteOff { key });
    }
}

fn play_degree(
    session: &AudioSession,
    state: &PracticeState,
    degree: usize,
    stdout: &mut io::Stdout,
) {
    let chords = diatonic_chords(state.key_root());
    let Some(name) = chords.get(degree - 1) else {
        return;
    };
    let Some(notes) = chord_notes(name) else {
        return;
    };
    let voiced = invert_chord(&notes, state.inversion);
    session.play_chord(&voiced, DEFAULT_CHORD_SECS, state.instrument);
    update_status(stdout, session, state, Some(name.clone()));
}

fn print_banner(stdout: &mut io::Stdout, session: &AudioSession, state: &PracticeState) {
    let chords = diatonic_chords(state.key_root());
    let banner = format!(
        "\x1b[2J\x1b[H\
chordlab practice - keyboard + chord drills\r\n\
─────────────────────────────────────────────\r\n\
\r\n\
  Natural notes:  a s d f g h j k l ; '\r\n\
                  C D E F G A B C D E F\r\n\
\r\n\
  Sharps/flats:   w e   t y u   o p\r\n\
                  C# D#  F# G# A#  C# D#\r\n\
\r\n\
  Chords (1-7):   {}\r\n\
\r\n\
  Key: [ ]   Inversion: i   Instrument: b\r\n\
  Octave: z x   Quit: Esc\r\n\
\r\n",
        chords.join(" ")
    );
    let _ = write!(stdout, "{}", banner);
    update_status(stdout, session, state, None);
}

fn update_status(
    stdout: &mut io::Stdout,
    session: &AudioSession,
    state: &PracticeState,
    played: Option<String>,
) {
    let instrument = match state.instrument {
        Instrument::Piano => "piano",
        Instrument::Guitar if session.guitar_loaded() => "guitar",
        Instrument::Guitar => "guitar (loading...)",
    };
    let played_display = played.unwrap_or_else(|| "---".to_string());
    let _ = write!(
        stdout,
        "\x1b[16;1H\x1b[2K  Key: {}  |  Inv: {}  |  {}  |  Oct: {}  |  Playing: {}\r",
        state.key_root(),
        state.inversion,
        instrument,
        state.octave,
        played_display
    );
    let _ = stdout.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_map_covers_an_octave_and_a_fourth() {
        assert_eq!(char_to_note('a'), Some((NoteName::C, 0)));
        assert_eq!(char_to_note('j'), Some((NoteName::B, 0)));
        assert_eq!(char_to_note('k'), Some((NoteName::C, 1)));
        assert_eq!(char_to_note('\''), Some((NoteName::F, 1)));
        assert_eq!(char_to_note('w'), Some((NoteName::CSharp, 0)));
        assert_eq!(char_to_note('q'), None);
    }

    #[test]
    fn test_key_circle_is_all_twelve_keys() {
        for key in KEY_CIRCLE {
            assert!(NoteName::parse(key).is_some());
            assert_eq!(diatonic_chords(key).len(), 7);
        }
        // Adjacent entries are a fifth apart
        for pair in KEY_CIRCLE.windows(2) {
            let a = NoteName::parse(pair[0]).unwrap().semitone();
            let b = NoteName::parse(pair[1]).unwrap().semitone();
            assert_eq!((b - a).rem_euclid(12), 7);
        }
    }
}
