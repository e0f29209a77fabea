//! Chime sequencing: picks the playback mode for a trigger, drives the
//! grandfather-clock prelude and strikes, and reports when all audio for the
//! trigger has settled.

pub mod clock;

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::Sender;
use log::{debug, info, warn};

pub use self::clock::{local_hour, strikes_for_hour, HourWatcher};
use crate::config::{ChimeConfig, ChimeMode, ConfigProvider};
use crate::core::notation::{NoteParser, NoteSequence};
use crate::core::voice::{AudioBackend, VoiceHandle, VoicePool};
use crate::messaging::ChimeEvent;
use crate::utils::helpers::format_duration;

/// Sink for synthesized note sequences.
///
/// `start` returns a generation number that the matching
/// `ChimeMessage::ToneFinished` will carry.
pub trait ToneOutput {
    fn start(&mut self, sequence: NoteSequence, volume: f32) -> Result<u64>;
    fn stop(&mut self);
}

/// Observable phase of the sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChimeState {
    Idle,
    PlayingNotes,
    PlayingFile,
    PlayingPrelude,
    PlayingStrikes(u32),
}

/// Bookkeeping for the chime in progress; `mode` is `None` while idle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceState {
    pub mode: Option<ChimeMode>,
    pub strikes_left: u32,
    pub is_playing_prelude: bool,
    pub prelude_voice: Option<VoiceHandle>,
}

pub struct ChimeSequencer<B, T> {
    pool: VoicePool<B>,
    tone: T,
    parser: NoteParser,
    events: Sender<ChimeEvent>,
    hours: HourWatcher,
    config: ChimeConfig,
    sequence: SequenceState,
    file_voice: Option<VoiceHandle>,
    strike_voice: Option<VoiceHandle>,
    tone_generation: Option<u64>,
    pending_strike: Option<Instant>,
}

impl<B: AudioBackend, T: ToneOutput> ChimeSequencer<B, T> {
    pub fn new(pool: VoicePool<B>, tone: T, events: Sender<ChimeEvent>) -> Self {
        Self {
            pool,
            tone,
            parser: NoteParser::default(),
            events,
            hours: HourWatcher::new(),
            config: ChimeConfig::default(),
            sequence: SequenceState::default(),
            file_voice: None,
            strike_voice: None,
            tone_generation: None,
            pending_strike: None,
        }
    }

    pub fn state(&self) -> ChimeState {
        match self.sequence.mode {
            None => ChimeState::Idle,
            Some(ChimeMode::Notes) => ChimeState::PlayingNotes,
            Some(ChimeMode::File) => ChimeState::PlayingFile,
            Some(ChimeMode::GrandfatherClock) if self.sequence.is_playing_prelude => {
                ChimeState::PlayingPrelude
            }
            Some(ChimeMode::GrandfatherClock) => {
                ChimeState::PlayingStrikes(self.sequence.strikes_left)
            }
        }
    }

    #[cfg(test)]
    pub fn sequence(&self) -> &SequenceState {
        &self.sequence
    }

    pub fn is_idle(&self) -> bool {
        self.sequence.mode.is_none()
    }

    /// When the armed strike delay runs out, if one is armed
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending_strike
    }

    /// Periodic wall-clock check; chimes with freshly loaded settings when
    /// the hour has changed since the previous tick.
    pub fn tick<P>(&mut self, hour: u32, provider: &P, now: Instant)
    where
        P: ConfigProvider + ?Sized,
    {
        if self.hours.observe(hour) {
            info!("Hour changed to {}, chiming", hour);
            let config = provider.load_or_default();
            self.trigger(config, hour, now);
        }
    }

    /// Start a chime for `hour` (24h clock), tearing down any chime in progress
    pub fn trigger(&mut self, config: ChimeConfig, hour: u32, now: Instant) {
        if !self.is_idle() {
            info!("Chime already playing, stopping it first");
            self.stop();
        }

        self.config = config.sanitized();
        let keep: Vec<&Path> = [
            self.config.audio_file(),
            self.config.strike_file(),
            self.config.prelude_file(),
        ]
        .into_iter()
        .flatten()
        .collect();
        self.pool.backend_mut().retain_cached(&keep);

        self.sequence = SequenceState {
            mode: Some(self.config.mode),
            ..SequenceState::default()
        };

        match self.config.mode {
            ChimeMode::Notes => self.start_notes(),
            ChimeMode::File => self.start_file(),
            ChimeMode::GrandfatherClock => self.start_grandfather(hour, now),
        }
    }

    /// Silence everything and report completion right away
    pub fn stop(&mut self) {
        info!("Stopping chime");
        self.pending_strike = None;
        self.pool.stop_all();
        self.tone.stop();
        self.finish();
    }

    /// Fire the strike delay once `now` has reached it
    pub fn poll(&mut self, now: Instant) {
        match self.pending_strike {
            Some(deadline) if now >= deadline => {
                self.pending_strike = None;
                if self.sequence.mode == Some(ChimeMode::GrandfatherClock) {
                    self.issue_strike(now);
                }
            }
            _ => {}
        }
    }

    pub fn on_voice_finished(&mut self, handle: VoiceHandle, now: Instant) {
        if !self.pool.release(handle) {
            debug!("Ignoring completion of stale voice {:?}", handle);
            return;
        }
        if self.is_idle() {
            return;
        }

        if self.file_voice == Some(handle) {
            self.file_voice = None;
            self.finish();
        } else if self.sequence.prelude_voice == Some(handle) {
            debug!("Prelude finished");
            self.sequence.prelude_voice = None;
            self.sequence.is_playing_prelude = false;
            self.issue_strike(now);
        } else if self.strike_voice == Some(handle) {
            self.strike_voice = None;
            if self.advance_strikes(now) {
                self.issue_strike(now);
            }
        } else {
            self.try_complete();
        }
    }

    /// Playback errors count as the voice ending
    pub fn on_voice_failed(&mut self, handle: VoiceHandle, reason: &str, now: Instant) {
        warn!("Voice {} failed: {}", handle.slot, reason);
        self.on_voice_finished(handle, now);
    }

    pub fn on_tone_finished(&mut self, generation: u64) {
        if self.sequence.mode == Some(ChimeMode::Notes) && self.tone_generation == Some(generation) {
            self.finish();
        } else {
            debug!("Ignoring completion of tone generation {}", generation);
        }
    }

    fn start_notes(&mut self) {
        let sequence = self.parser.parse(&self.config.notes, self.config.note_speed);
        let length = Duration::from_secs_f64(
            sequence.total_samples() as f64 / f64::from(self.parser.sample_rate()),
        );
        info!(
            "Playing {} notes ({}) at speed {}",
            sequence.len(),
            format_duration(length),
            self.config.note_speed
        );
        match self.tone.start(sequence, self.config.volume) {
            Ok(generation) => self.tone_generation = Some(generation),
            Err(err) => {
                warn!("Could not play notes: {:#}", err);
                self.finish();
            }
        }
    }

    fn start_file(&mut self) {
        let Some(path) = self.config.audio_file().map(Path::to_path_buf) else {
            info!("No audio file configured, nothing to play");
            self.finish();
            return;
        };
        info!("Playing {}", path.display());
        match self.pool.play(&path, self.config.volume) {
            Ok(handle) => self.file_voice = Some(handle),
            Err(err) => {
                warn!("Could not play {}: {:#}", path.display(), err);
                self.finish();
            }
        }
    }

    fn start_grandfather(&mut self, hour: u32, now: Instant) {
        self.sequence.strikes_left = strikes_for_hour(hour);
        info!(
            "Grandfather clock for hour {}: {} strikes",
            hour, self.sequence.strikes_left
        );

        if let Some(path) = self.config.prelude_file().map(Path::to_path_buf) {
            match self.pool.play(&path, self.config.volume) {
                Ok(handle) => {
                    self.sequence.is_playing_prelude = true;
                    self.sequence.prelude_voice = Some(handle);
                    return;
                }
                Err(err) => warn!("Skipping prelude {}: {:#}", path.display(), err),
            }
        }
        self.issue_strike(now);
    }

    /// Play the next strike. Strikes without a playable file pass silently
    /// but still count down.
    fn issue_strike(&mut self, now: Instant) {
        loop {
            if self.sequence.strikes_left == 0 {
                self.try_complete();
                return;
            }
            debug!("Strike, {} left", self.sequence.strikes_left);

            match self.config.strike_file().map(Path::to_path_buf) {
                Some(path) => match self.pool.play(&path, self.config.volume) {
                    Ok(handle) => {
                        self.strike_voice = Some(handle);
                        return;
                    }
                    Err(err) => warn!("Strike {} failed: {:#}", path.display(), err),
                },
                None => debug!("No strike sound configured, striking silently"),
            }

            if !self.advance_strikes(now) {
                return;
            }
        }
    }

    /// Count one strike as done. Returns true when the next strike is due
    /// immediately; otherwise the delay is armed or the sequence completes.
    fn advance_strikes(&mut self, now: Instant) -> bool {
        self.sequence.strikes_left = self.sequence.strikes_left.saturating_sub(1);
        if self.sequence.strikes_left == 0 {
            self.try_complete();
            return false;
        }
        match self.config.strike_delay() {
            None => true,
            Some(delay) => {
                debug!("Next strike in {}", format_duration(delay));
                self.pending_strike = Some(now + delay);
                false
            }
        }
    }

    /// Grandfather mode ends only after the last strike with no voice left
    fn try_complete(&mut self) {
        if self.sequence.mode != Some(ChimeMode::GrandfatherClock) {
            return;
        }
        if self.sequence.strikes_left > 0
            || self.sequence.is_playing_prelude
            || self.pending_strike.is_some()
        {
            return;
        }
        if self.pool.any_busy() {
            debug!("Last strike done, waiting on {} voices", self.pool.busy_count());
            return;
        }
        self.finish();
    }

    fn finish(&mut self) {
        self.sequence = SequenceState::default();
        self.file_voice = None;
        self.strike_voice = None;
        self.tone_generation = None;
        self.pending_strike = None;

        info!("Chime finished");
        if self.events.send(ChimeEvent::SequenceFinished).is_err() {
            debug!("No listener for chime events");
        }
    }

    #[cfg(test)]
    fn pool_mut(&mut self) -> &mut VoicePool<B> {
        &mut self.pool
    }
}
