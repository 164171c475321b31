//! Guitar fretboard arithmetic and the sampled-guitar bank.
//!
//! Fret math goes strictly through the shared MIDI conversions in
//! [`crate::note`] — there is deliberately no second chromatic table here.
//! The bank renders one plucked-string buffer per note on a background
//! thread; until that finishes, guitar playback is a no-op.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::OnceCell;

use crate::note::{midi_freq, midi_to_note, note_to_midi};

/// Standard tuning, string 1 (low) to string 6 (high)
pub const OPEN_STRINGS: [&str; 6] = ["E2", "A2", "D3", "G3", "B3", "E4"];

/// Two octaves up the neck, past any real instrument
pub const MAX_FRET: u8 = 24;

/// Bank range: open low E up to E6 (high E string, 24th fret)
const BANK_LOW: i32 = 40;
const BANK_HIGH: i32 = 88;

/// The note sounded at a given string and fret. String numbers run 1..=6
/// low to high; out-of-range strings or frets yield None, never an error.
pub fn fret_to_note(string_number: u8, fret: u8) -> Option<String> {
    if !(1..=6).contains(&string_number) || fret > MAX_FRET {
        return None;
    }
    let open = OPEN_STRINGS[usize::from(string_number - 1)];
    let midi = note_to_midi(open)? + i32::from(fret);
    Some(midi_to_note(midi))
}

/// One-shot sampled-guitar bank shared between the session and its loader
/// thread. `start_load` spawns the render exactly once; `sample` returns
/// None until the whole bank is ready.
pub struct GuitarBank {
    samples: OnceCell<HashMap<i32, Arc<Vec<f32>>>>,
    load_started: AtomicBool,
}

impl GuitarBank {
    pub fn new() -> Self {
        Self {
            samples: OnceCell::new(),
            load_started: AtomicBool::new(false),
        }
    }

    /// Kick off the background render at the output stream's sample rate.
    /// Repeat calls are no-ops.
    pub fn start_load(self: &Arc<Self>, sample_rate: f64) {
        if self.load_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let bank = Arc::clone(self);
        let result = std::thread::Builder::new()
            .name("guitar-bank".into())
            .spawn(move || {
                let mut samples = HashMap::new();
                for midi in BANK_LOW..=BANK_HIGH {
                    let data = render_pluck(midi_freq(midi), sample_rate, 2.0);
                    samples.insert(midi, Arc::new(data));
                }
                let _ = bank.samples.set(samples);
                tracing::debug!("[guitar] sample bank ready");
            });
        if let Err(err) = result {
            tracing::error!("[guitar] failed to spawn bank loader: {err}");
        }
    }

    /// Readiness flag callers check before offering guitar playback
    pub fn is_loaded(&self) -> bool {
        self.samples.get().is_some()
    }

    /// Rendered buffer for a MIDI note, None while loading or out of range
    pub fn sample(&self, midi: i32) -> Option<Arc<Vec<f32>>> {
        self.samples.get()?.get(&midi).cloned()
    }
}

impl Default for GuitarBank {
    fn default() -> Self {
        Self::new()
    }
}

/// Karplus-Strong plucked string: a noise burst circulating through an
/// averaging delay line of one period, damped each pass.
fn render_pluck(freq: f64, sample_rate: f64, seconds: f64) -> Vec<f32> {
    let period = ((sample_rate / freq).round() as usize).max(2);
    let len = (seconds * sample_rate) as usize;

    // xorshift noise burst; deterministic so renders are reproducible
    let mut state: u32 = 0x2545_F491;
    let mut delay: Vec<f32> = (0..period)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state as f32 / u32::MAX as f32) - 0.5
        })
        .collect();

    let damping = 0.996_f32;
    let mut out = Vec::with_capacity(len);
    let mut i = 0;
    for _ in 0..len {
        let next = (i + 1) % period;
        out.push(delay[i]);
        delay[i] = damping * 0.5 * (delay[i] + delay[next]);
        i = next;
    }
    out
}
