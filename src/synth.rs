//! Oscillator/sample mixing and the cpal output stream.
//!
//! The audio callback owns a [`Mixer`] and drains a command channel
//! non-blocking each buffer; everything else in the program only ever
//! submits [`Command`]s. All notes carried by a single command start on the
//! same output frame, which is what makes chords audibly simultaneous.

use std::sync::Arc;
use std::sync::mpsc::{self, Sender};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

/// A command sent to the audio callback
pub enum Command {
    /// Start a held oscillator voice, addressed by keyboard key
    NoteOn { key: char, freq: f64 },
    /// Release the held voice for this key
    NoteOff { key: char },
    /// One oscillator voice for a fixed duration in seconds
    PlayNote { freq: f64, duration_secs: f64 },
    /// Simultaneous oscillator voices for a fixed duration
    PlayChord { freqs: Vec<f64>, duration_secs: f64 },
    /// Simultaneous sampled voices, each faded out at the given duration
    PlaySamples {
        samples: Vec<Arc<Vec<f32>>>,
        duration_secs: f64,
    },
    /// Metronome click, pitched up on the accented beat
    Tick { accent: bool },
    /// Release every active voice
    AllNotesOff,
    /// Silence the output and stop processing commands
    Shutdown,
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no output audio device available")]
    NoOutputDevice,
    #[error("failed to get default output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// ADSR envelope parameters (times in seconds, sustain 0..=1)
#[derive(Debug, Clone, Copy)]
pub struct Adsr {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Default for Adsr {
    fn default() -> Self {
        // 10ms attack to peak, 100ms decay to the sustain plateau, 100ms
        // release; fixed-duration voices schedule the release so silence
        // lands exactly at the requested duration.
        Self {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.1,
        }
    }
}

impl Adsr {
    /// Near-flat envelope for sampled voices: the recording carries its own
    /// amplitude shape, the envelope only guards the edges against clicks.
    fn gate() -> Self {
        Self {
            attack: 0.002,
            decay: 0.0,
            sustain: 1.0,
            release: 0.01,
        }
    }

    /// Percussive click shape for metronome ticks
    fn click() -> Self {
        Self {
            attack: 0.001,
            decay: 0.04,
            sustain: 0.0,
            release: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvStage {
    Attack,
    Decay,
    Sustain,
    Release,
    Done,
}

/// Per-voice envelope state, stepped once per output frame
struct Envelope {
    adsr: Adsr,
    stage: EnvStage,
    level: f64,
    release_rate: f64,
}

impl Envelope {
    fn new(adsr: Adsr) -> Self {
        Self {
            adsr,
            stage: EnvStage::Attack,
            level: 0.0,
            release_rate: 0.0,
        }
    }

    /// Begin the release ramp from the current level
    fn release(&mut self) {
        if matches!(self.stage, EnvStage::Release | EnvStage::Done) {
            return;
        }
        self.release_rate = if self.adsr.release > 0.0 {
            self.level / self.adsr.release
        } else {
            f64::INFINITY
        };
        self.stage = EnvStage::Release;
    }

    fn is_done(&self) -> bool {
        self.stage == EnvStage::Done
    }

    /// Advance by one frame of `dt` seconds, returning the current gain
    fn next(&mut self, dt: f64) -> f64 {
        match self.stage {
            EnvStage::Attack => {
                self.level += if self.adsr.attack > 0.0 {
                    dt / self.adsr.attack
                } else {
                    1.0
                };
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvStage::Decay;
                }
            }
            EnvStage::Decay => {
                let fall = if self.adsr.decay > 0.0 {
                    dt * (1.0 - self.adsr.sustain) / self.adsr.decay
                } else {
                    f64::INFINITY
                };
                self.level -= fall;
                if self.level <= self.adsr.sustain {
                    self.level = self.adsr.sustain;
                    self.stage = EnvStage::Sustain;
                }
            }
            EnvStage::Sustain => {}
            EnvStage::Release => {
                self.level -= self.release_rate * dt;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = EnvStage::Done;
                }
            }
            EnvStage::Done => return 0.0,
        }
        self.level
    }
}

/// Sound source for one voice
enum Generator {
    Osc { freq: f64, phase: f64 },
    Sample { data: Arc<Vec<f32>>, pos: usize },
}

impl Generator {
    fn next(&mut self, sample_rate: f64) -> f64 {
        match self {
            Generator::Osc { freq, phase } => {
                let value = (*phase * 2.0 * std::f64::consts::PI).sin();
                *phase += *freq / sample_rate;
                if *phase >= 1.0 {
                    *phase -= 1.0;
                }
                value
            }
            Generator::Sample { data, pos } => {
                let value = data.get(*pos).copied().unwrap_or(0.0) as f64;
                *pos += 1;
                value
            }
        }
    }

    /// A sample voice with nothing left to read can be reaped early
    fn exhausted(&self) -> bool {
        match self {
            Generator::Osc { .. } => false,
            Generator::Sample { data, pos } => *pos >= data.len(),
        }
    }
}

/// One scheduled oscillator or sample-playback instance
struct Voice {
    key: Option<char>,
    r#gen: Generator,
    env: Envelope,
    /// Frames after `started_at` at which the release ramp begins
    /// (fixed-duration voices); None for held voices released by NoteOff.
    release_after: Option<u64>,
    started_at: u64,
}

impl Voice {
    fn is_done(&self) -> bool {
        self.env.is_done() || self.r#gen.exhausted()
    }
}

/// Pure mixing state machine driven by the audio callback. Keeping it
/// separate from the cpal stream lets the scheduling behavior be exercised
/// without an output device.
pub struct Mixer {
    sample_rate: f64,
    clock: u64,
    voices: Vec<Voice>,
    shut_down: bool,
}

impl Mixer {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            clock: 0,
            voices: Vec::new(),
            shut_down: false,
        }
    }

    fn frames(&self, secs: f64) -> u64 {
        (secs.max(0.0) * self.sample_rate) as u64
    }

    /// Release offset so the ramp reaches silence exactly at `duration_secs`
    fn release_after(&self, duration_secs: f64, adsr: &Adsr) -> u64 {
        self.frames(duration_secs)
            .saturating_sub(self.frames(adsr.release))
    }

    fn spawn_osc(&mut self, key: Option<char>, freq: f64, duration_secs: Option<f64>, adsr: Adsr) {
        let release_after = duration_secs.map(|d| self.release_after(d, &adsr));
        self.voices.push(Voice {
            key,
            r#gen: Generator::Osc { freq, phase: 0.0 },
            env: Envelope::new(adsr),
            release_after,
            started_at: self.clock,
        });
    }

    fn spawn_sample(&mut self, data: Arc<Vec<f32>>, duration_secs: f64) {
        let adsr = Adsr::gate();
        self.voices.push(Voice {
            key: None,
            r#gen: Generator::Sample { data, pos: 0 },
            env: Envelope::new(adsr),
            release_after: Some(self.release_after(duration_secs, &adsr)),
            started_at: self.clock,
        });
    }

    pub fn apply(&mut self, command: Command) {
        if self.shut_down {
            return;
        }
        match command {
            Command::NoteOn { key, freq } => {
                // Retrigger: release any voice already bound to this key
                for voice in self.voices.iter_mut().filter(|v| v.key == Some(key)) {
                    voice.env.release();
                    voice.key = None;
                }
                self.spawn_osc(Some(key), freq, None, Adsr::default());
            }
            Command::NoteOff { key } => {
                for voice in self.voices.iter_mut().filter(|v| v.key == Some(key)) {
                    voice.env.release();
                }
            }
            Command::PlayNote { freq, duration_secs } => {
                self.spawn_osc(None, freq, Some(duration_secs), Adsr::default());
            }
            Command::PlayChord { freqs, duration_secs } => {
                for freq in freqs {
                    self.spawn_osc(None, freq, Some(duration_secs), Adsr::default());
                }
            }
            Command::PlaySamples { samples, duration_secs } => {
                for data in samples {
                    self.spawn_sample(data, duration_secs);
                }
            }
            Command::Tick { accent } => {
                let freq = if accent { 1568.0 } else { 1046.5 };
                self.spawn_osc(None, freq, Some(0.08), Adsr::click());
            }
            Command::AllNotesOff => {
                for voice in &mut self.voices {
                    voice.env.release();
                }
            }
            Command::Shutdown => {
                self.voices.clear();
                self.shut_down = true;
            }
        }
    }

    /// Fill one interleaved output buffer
    pub fn render(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let dt = 1.0 / self.sample_rate;

        for frame in data.chunks_mut(channels) {
            let mut value = 0.0_f64;
            if !self.shut_down && !self.voices.is_empty() {
                for voice in &mut self.voices {
                    if let Some(after) = voice.release_after
                        && self.clock - voice.started_at >= after
                    {
                        voice.env.release();
                    }
                    value += voice.r#gen.next(self.sample_rate) * voice.env.next(dt);
                }
                // Normalize by number of voices and apply a gentle volume
                value = (value / self.voices.len() as f64 * 0.5).clamp(-1.0, 1.0);
            }
            for sample in frame {
                *sample = value as f32;
            }
            self.clock += 1;
        }

        self.voices.retain(|v| !v.is_done());
    }

    #[cfg(test)]
    fn voice_starts(&self) -> Vec<u64> {
        self.voices.iter().map(|v| v.started_at).collect()
    }

    #[cfg(test)]
    fn voice_count(&self) -> usize {
        self.voices.len()
    }

    #[cfg(test)]
    fn sample_voice_count(&self) -> usize {
        self.voices
            .iter()
            .filter(|v| matches!(v.r#gen, Generator::Sample { .. }))
            .count()
    }
}

/// Handle to the running output stream: submit commands, read the rate
pub struct AudioEngine {
    tx: Sender<Command>,
    sample_rate: f64,
    _stream: cpal::Stream,
}

impl AudioEngine {
    /// Open the default output device and start the mixing stream
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;
        let config = device.default_output_config()?;

        let sample_rate = config.sample_rate() as f64;
        let channels = config.channels() as usize;

        let (tx, rx) = mpsc::channel::<Command>();
        let mut mixer = Mixer::new(sample_rate);

        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                // Drain pending commands (non-blocking), then mix
                while let Ok(command) = rx.try_recv() {
                    mixer.apply(command);
                }
                mixer.render(data, channels);
            },
            move |err| {
                tracing::error!("[audio] stream error: {err}");
            },
            None,
        )?;
        stream.play()?;

        Ok(Self {
            tx,
            sample_rate,
            _stream: stream,
        })
    }

    /// Submit a command to the audio callback. Post-shutdown sends are
    /// swallowed; a scheduled sound that never plays is not an error here.
    pub fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            tracing::warn!("[audio] command dropped: stream thread is gone");
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: f64 = 44_100.0;

    fn render_secs(mixer: &mut Mixer, secs: f64) -> Vec<f32> {
        let mut buf = vec![0.0_f32; (secs * SR) as usize];
        mixer.render(&mut buf, 1);
        buf
    }

    #[test]
    fn test_chord_voices_start_on_same_frame() {
        let mut mixer = Mixer::new(SR);
        // Advance the clock first so "same frame" is not trivially zero
        render_secs(&mut mixer, 0.01);
        mixer.apply(Command::PlayChord {
            freqs: vec![261.63, 329.63, 392.0],
            duration_secs: 1.0,
        });
        let starts = mixer.voice_starts();
        assert_eq!(starts.len(), 3);
        assert!(starts.iter().all(|s| *s == starts[0]));
    }

    #[test]
    fn test_note_produces_sound_then_silence() {
        let mut mixer = Mixer::new(SR);
        mixer.apply(Command::PlayNote {
            freq: 440.0,
            duration_secs: 0.2,
        });
        let buf = render_secs(&mut mixer, 0.2);
        assert!(buf.iter().any(|s| s.abs() > 0.01));
        // Voice is reaped once the release ramp has reached silence
        render_secs(&mut mixer, 0.05);
        assert_eq!(mixer.voice_count(), 0);
        let tail = render_secs(&mut mixer, 0.01);
        assert!(tail.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_attack_ramps_up_from_silence() {
        let mut mixer = Mixer::new(SR);
        mixer.apply(Command::PlayNote {
            freq: 440.0,
            duration_secs: 0.5,
        });
        let buf = render_secs(&mut mixer, 0.005);
        let early: f32 = buf[..20].iter().map(|s| s.abs()).fold(0.0, f32::max);
        let late: f32 = buf[buf.len() - 40..].iter().map(|s| s.abs()).fold(0.0, f32::max);
        assert!(early < late, "attack should grow: {} vs {}", early, late);
    }

    #[test]
    fn test_envelope_stages() {
        let adsr = Adsr::default();
        let mut env = Envelope::new(adsr);
        let dt = 1.0 / SR;
        // Through the attack
        for _ in 0..(adsr.attack * SR) as usize + 2 {
            env.next(dt);
        }
        assert!(matches!(env.stage, EnvStage::Decay | EnvStage::Sustain));
        // Through the decay to the sustain plateau
        for _ in 0..(adsr.decay * SR) as usize + 2 {
            env.next(dt);
        }
        assert_eq!(env.stage, EnvStage::Sustain);
        assert_relative_eq!(env.level, adsr.sustain, epsilon = 1e-6);
        // Release ramps to zero and finishes
        env.release();
        for _ in 0..(adsr.release * SR) as usize + 2 {
            env.next(dt);
        }
        assert!(env.is_done());
        assert_eq!(env.next(dt), 0.0);
    }

    #[test]
    fn test_note_off_releases_held_voice() {
        let mut mixer = Mixer::new(SR);
        mixer.apply(Command::NoteOn { key: 'a', freq: 440.0 });
        render_secs(&mut mixer, 0.3);
        assert_eq!(mixer.voice_count(), 1, "held voice must outlive duration");
        mixer.apply(Command::NoteOff { key: 'a' });
        render_secs(&mut mixer, 0.2);
        assert_eq!(mixer.voice_count(), 0);
    }

    #[test]
    fn test_all_notes_off() {
        let mut mixer = Mixer::new(SR);
        mixer.apply(Command::NoteOn { key: 'a', freq: 440.0 });
        mixer.apply(Command::NoteOn { key: 's', freq: 494.0 });
        mixer.apply(Command::AllNotesOff);
        render_secs(&mut mixer, 0.2);
        assert_eq!(mixer.voice_count(), 0);
    }

    #[test]
    fn test_sample_voice_plays_and_ends() {
        let mut mixer = Mixer::new(SR);
        let data = Arc::new(vec![0.5_f32; (0.05 * SR) as usize]);
        mixer.apply(Command::PlaySamples {
            samples: vec![data],
            duration_secs: 1.0,
        });
        assert_eq!(mixer.sample_voice_count(), 1);
        let buf = render_secs(&mut mixer, 0.02);
        assert!(buf.iter().any(|s| s.abs() > 0.01));
        // Buffer exhausted well before the requested duration
        render_secs(&mut mixer, 0.05);
        assert_eq!(mixer.voice_count(), 0);
    }

    #[test]
    fn test_sample_voice_truncated_at_duration() {
        let mut mixer = Mixer::new(SR);
        let data = Arc::new(vec![0.5_f32; SR as usize]);
        mixer.apply(Command::PlaySamples {
            samples: vec![data],
            duration_secs: 0.1,
        });
        render_secs(&mut mixer, 0.15);
        assert_eq!(mixer.voice_count(), 0);
    }

    #[test]
    fn test_shutdown_silences_and_ignores_commands() {
        let mut mixer = Mixer::new(SR);
        mixer.apply(Command::PlayNote {
            freq: 440.0,
            duration_secs: 1.0,
        });
        mixer.apply(Command::Shutdown);
        let buf = render_secs(&mut mixer, 0.01);
        assert!(buf.iter().all(|s| *s == 0.0));
        mixer.apply(Command::PlayNote {
            freq: 440.0,
            duration_secs: 1.0,
        });
        assert_eq!(mixer.voice_count(), 0);
    }

    #[test]
    fn test_tick_is_short() {
        let mut mixer = Mixer::new(SR);
        mixer.apply(Command::Tick { accent: true });
        let buf = render_secs(&mut mixer, 0.02);
        assert!(buf.iter().any(|s| s.abs() > 0.001));
        render_secs(&mut mixer, 0.1);
        assert_eq!(mixer.voice_count(), 0);
    }
}
