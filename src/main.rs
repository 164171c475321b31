mod chords;
mod guitar;
mod metronome;
mod note;
mod practice;
mod session;
mod synth;
mod theory;

use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use session::{AudioSession, DEFAULT_CHORD_SECS, DEFAULT_NOTE_SECS, Instrument};

#[derive(Parser)]
#[command(name = "chordlab", about = "Command-line chord practice tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the seven diatonic chords of a major key
    Keys {
        /// Key root, e.g. C, F#, Db
        root: String,
    },

    /// Play a single note, e.g. C4 or Bb3
    Note {
        name: String,

        /// Duration in seconds
        #[arg(long, default_value_t = DEFAULT_NOTE_SECS)]
        duration: f64,
    },

    /// Play a chord by name, e.g. C, F#m, Bdim
    Chord {
        name: String,

        /// Duration in seconds
        #[arg(long, default_value_t = DEFAULT_CHORD_SECS)]
        duration: f64,

        /// Inversion (0, 1 or 2)
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
        inversion: u8,

        /// Sound source
        #[arg(long, value_enum, default_value = "piano")]
        instrument: Instrument,
    },

    /// Show (and optionally play) the note at a string and fret
    Fret {
        /// String number, 1 (low E) to 6 (high E)
        string: u8,

        /// Fret number, 0 = open
        fret: u8,

        /// Also sound the note on the sampled guitar
        #[arg(long)]
        play: bool,
    },

    /// Run a metronome
    Metronome {
        /// Beats per minute
        bpm: u32,

        /// Beats per bar (beat 1 is accented)
        #[arg(long, default_value_t = 4)]
        beats: u32,
    },

    /// Interactive keyboard practice mode
    Practice {
        /// Starting key center
        #[arg(long, default_value = "C")]
        key: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let session = AudioSession::new();

    match cli.command {
        Command::Keys { root } => {
            for chord in theory::diatonic_chords(&root) {
                println!("{}", chord);
            }
        }
        Command::Note { name, duration } => {
            match note::playable_freq(&name) {
                Some(freq) => println!("Playing {} ({:.1} Hz)", name, freq),
                None => println!("{} is not playable (octaves 3-6)", name),
            }
            session.play_note(&name, duration);
            wait_out(duration);
        }
        Command::Chord {
            name,
            duration,
            inversion,
            instrument,
        } => {
            let Some(notes) = chords::chord_notes(&name) else {
                eprintln!("Unknown chord: {}", name);
                std::process::exit(1);
            };
            let voiced = theory::invert_chord(&notes, inversion);
            println!("Playing {} [{}]", name, voiced.join(" "));

            if instrument == Instrument::Guitar
                && !session.wait_for_guitar(Duration::from_secs(10))
            {
                eprintln!("Guitar samples unavailable");
                std::process::exit(1);
            }
            session.play_chord(&voiced, duration, instrument);
            wait_out(duration);
        }
        Command::Fret { string, fret, play } => {
            let Some(name) = guitar::fret_to_note(string, fret) else {
                eprintln!(
                    "No such position: string {} fret {} (strings 1-6, frets 0-{})",
                    string,
                    fret,
                    guitar::MAX_FRET
                );
                std::process::exit(1);
            };
            println!("String {} fret {} = {}", string, fret, name);
            if play {
                if !session.wait_for_guitar(Duration::from_secs(10)) {
                    eprintln!("Guitar samples unavailable");
                    std::process::exit(1);
                }
                session.play_guitar_note(string, fret, DEFAULT_NOTE_SECS);
                wait_out(DEFAULT_NOTE_SECS);
            }
        }
        Command::Metronome { bpm, beats } => {
            if let Err(e) = metronome::run(&session, bpm, beats) {
                eprintln!("Metronome error: {}", e);
                std::process::exit(1);
            }
        }
        Command::Practice { key } => {
            if let Err(e) = practice::run(&session, &key) {
                eprintln!("Practice mode error: {}", e);
                std::process::exit(1);
            }
        }
    }

    session.close();
}

/// Scheduling is fire-and-forget; the process has to outlive the sound.
fn wait_out(duration_secs: f64) {
    std::thread::sleep(Duration::from_secs_f64(duration_secs + 0.1));
}
