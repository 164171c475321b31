//! Terminal metronome: accented click on beat one, driven off a wall-clock
//! beat grid so the tempo does not drift.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use thiserror::Error;

use crate::session::AudioSession;

pub const MIN_BPM: u32 = 20;
pub const MAX_BPM: u32 = 300;

#[derive(Debug, Error)]
pub enum MetronomeError {
    #[error("terminal error: {0}")]
    Terminal(#[from] io::Error),
}

/// Seconds per beat for a clamped tempo
pub fn beat_duration(bpm: u32) -> f64 {
    60.0 / f64::from(bpm.clamp(MIN_BPM, MAX_BPM))
}

/// Run the click loop until `q`, Esc, or Ctrl-C
pub fn run(session: &AudioSession, bpm: u32, beats_per_bar: u32) -> Result<(), MetronomeError> {
    let bpm = bpm.clamp(MIN_BPM, MAX_BPM);
    let beats_per_bar = beats_per_bar.max(1);

    println!("Metronome: {} BPM, {}/4 (q to stop)", bpm, beats_per_bar);

    terminal::enable_raw_mode()?;
    let result = beat_loop(session, beat_duration(bpm), beats_per_bar);
    terminal::disable_raw_mode()?;
    println!();
    result
}

fn beat_loop(
    session: &AudioSession,
    beat_secs: f64,
    beats_per_bar: u32,
) -> Result<(), MetronomeError> {
    let mut stdout = io::stdout();
    let start = Instant::now();
    let mut beat: u64 = 0;

    loop {
        let accent = beat % u64::from(beats_per_bar) == 0;
        session.tick(accent);
        if accent {
            write!(stdout, "\r\n| ")?;
        } else {
            write!(stdout, ". ")?;
        }
        stdout.flush()?;

        // Next beat on the grid from the start instant, not from "now"
        beat += 1;
        let target = start + Duration::from_secs_f64(beat_secs * beat as f64);
        loop {
            let now = Instant::now();
            if now >= target {
                break;
            }
            if event::poll(target - now)? && quit_requested()? {
                return Ok(());
            }
        }
    }
}

fn quit_requested() -> Result<bool, MetronomeError> {
    if let Event::Key(KeyEvent {
        code,
        kind: KeyEventKind::Press,
        modifiers,
        ..
    }) = event::read()?
    {
        let ctrl_c = code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL);
        return Ok(code == KeyCode::Char('q') || code == KeyCode::Esc || ctrl_c);
    }
    Ok(false)
}
