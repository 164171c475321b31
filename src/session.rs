//! The audio session: one lazily-initialized engine plus the guitar bank.
//!
//! Owned by the top level and passed by reference to whatever needs
//! playback — there is no hidden global. First use builds the cpal stream
//! and kicks off the guitar-bank render; if the platform has no output
//! device the slot stays empty and every playback call is a silent no-op.

use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::unsync::OnceCell;

use crate::guitar::{GuitarBank, fret_to_note};
use crate::note::{note_to_midi, playable_freq};
use crate::synth::{AudioEngine, Command};

/// Sound source for chord playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Instrument {
    #[default]
    Piano,
    Guitar,
}

pub const DEFAULT_NOTE_SECS: f64 = 0.5;
pub const DEFAULT_CHORD_SECS: f64 = 1.0;

pub struct AudioSession {
    engine: OnceCell<Option<AudioEngine>>,
    guitar: Arc<GuitarBank>,
}

impl AudioSession {
    pub fn new() -> Self {
        Self {
            engine: OnceCell::new(),
            guitar: Arc::new(GuitarBank::new()),
        }
    }

    /// Build the engine on first call; every later call hands back the same
    /// one. Platform without audio → None, once, with a single warning.
    pub fn init(&self) -> Option<&AudioEngine> {
        self.engine
            .get_or_init(|| match AudioEngine::new() {
                Ok(engine) => {
                    self.guitar.start_load(engine.sample_rate());
                    Some(engine)
                }
                Err(err) => {
                    tracing::warn!("[audio] output unavailable, playback disabled: {err}");
                    None
                }
            })
            .as_ref()
    }

    /// Whether the guitar sample bank has finished rendering
    pub fn guitar_loaded(&self) -> bool {
        self.guitar.is_loaded()
    }

    /// Poll the guitar bank until it is ready or the timeout passes
    pub fn wait_for_guitar(&self, timeout: Duration) -> bool {
        if self.init().is_none() {
            return false;
        }
        let deadline = Instant::now() + timeout;
        while !self.guitar.is_loaded() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        true
    }

    /// Schedule one oscillator note. Unparseable notes and notes outside
    /// the playable octave range produce silence, not errors.
    pub fn play_note(&self, note: &str, duration_secs: f64) {
        let Some(freq) = playable_freq(note) else {
            return;
        };
        if let Some(engine) = self.init() {
            engine.send(Command::PlayNote { freq, duration_secs });
        }
    }

    /// Schedule a chord. Piano voices ride in one command so they start on
    /// the same frame; guitar is a warned no-op until the bank is ready.
    pub fn play_chord(&self, notes: &[String], duration_secs: f64, instrument: Instrument) {
        let Some(engine) = self.init() else {
            return;
        };
        match instrument {
            Instrument::Piano => {
                let freqs: Vec<f64> = notes.iter().filter_map(|n| playable_freq(n)).collect();
                if freqs.is_empty() {
                    return;
                }
                engine.send(Command::PlayChord { freqs, duration_secs });
            }
            Instrument::Guitar => {
                if !self.guitar.is_loaded() {
                    tracing::warn!("[audio] guitar bank still loading, chord skipped");
                    return;
                }
                let samples: Vec<_> = notes
                    .iter()
                    .filter_map(|n| note_to_midi(n))
                    .filter_map(|midi| self.guitar.sample(midi))
                    .collect();
                if samples.is_empty() {
                    return;
                }
                engine.send(Command::PlaySamples { samples, duration_secs });
            }
        }
    }

    /// Schedule a single fretted guitar note. Out-of-range string numbers
    /// are ignored; loading bank is a warned no-op.
    pub fn play_guitar_note(&self, string_number: u8, fret: u8, duration_secs: f64) {
        let Some(note) = fret_to_note(string_number, fret) else {
            return;
        };
        let Some(engine) = self.init() else {
            return;
        };
        if !self.guitar.is_loaded() {
            tracing::warn!("[audio] guitar bank still loading, note skipped");
            return;
        }
        if let Some(sample) = note_to_midi(&note).and_then(|midi| self.guitar.sample(midi)) {
            engine.send(Command::PlaySamples {
                samples: vec![sample],
                duration_secs,
            });
        }
    }

    /// Metronome click
    pub fn tick(&self, accent: bool) {
        if let Some(engine) = self.init() {
            engine.send(Command::Tick { accent });
        }
    }

    /// Silence everything and stop the mixer. Later playback calls are
    /// harmless no-ops; the stream itself is released on drop.
    pub fn close(&self) {
        if let Some(Some(engine)) = self.engine.get() {
            engine.send(Command::AllNotesOff);
            engine.send(Command::Shutdown);
        }
    }
}

impl Default for AudioSession {
    fn default() -> Self {
        Self::new()
    }
}
