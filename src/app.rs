use std::io::BufRead;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{select, tick, unbounded, Receiver, Sender};
use log::{debug, info};

use crate::config::{ChimeConfig, JsonConfigStore};
use crate::core::audio::{AudioEngine, DeviceBackend, DeviceToneOutput};
use crate::core::chime::{local_hour, ChimeSequencer};
use crate::core::voice::VoicePool;
use crate::messaging::{ChimeEvent, ChimeMessage, MessageBus};

const TICK_INTERVAL: Duration = Duration::from_secs(1);
const MAX_MESSAGES_PER_TURN: usize = 64;

/// Owns the audio device and runs the single-threaded chime loop
pub struct ChimeApp {
    sequencer: ChimeSequencer<DeviceBackend, DeviceToneOutput>,
    message_bus: MessageBus,
    events: Receiver<ChimeEvent>,
    store: JsonConfigStore,
    _engine: AudioEngine,
}

impl ChimeApp {
    pub fn new(store: JsonConfigStore) -> Result<Self> {
        let message_bus = MessageBus::new();
        let engine = AudioEngine::open(message_bus.sender())?;

        let (event_tx, events) = unbounded();
        let pool = VoicePool::new(engine.backend());
        let sequencer = ChimeSequencer::new(pool, engine.tone_output(), event_tx);

        Ok(Self {
            sequencer,
            message_bus,
            events,
            store,
            _engine: engine,
        })
    }

    /// Sender for test/stop requests from other components
    pub fn sender(&self) -> Sender<ChimeMessage> {
        self.message_bus.sender()
    }

    /// Stop the running chime whenever Enter is pressed on stdin
    pub fn stop_on_enter(&self) -> Result<()> {
        let sender = self.sender();
        thread::Builder::new()
            .name("stdin-stop".to_string())
            .spawn(move || {
                let count = forward_stop_requests(std::io::stdin().lock(), &sender);
                debug!("stdin closed after {} stop requests", count);
            })
            .context("Failed to spawn stdin listener")?;
        Ok(())
    }

    /// Chime on every hour change, forever
    pub fn run(&mut self) -> Result<()> {
        let ticker = tick(TICK_INTERVAL);
        // Prime the hour watcher so startup stays silent
        self.sequencer
            .tick(local_hour(), &self.store, Instant::now());
        info!("Waiting for the next hour");

        loop {
            self.turn(Some(&ticker));
        }
    }

    /// Play one chime now and return once it has finished
    pub fn play_once(&mut self, config: ChimeConfig, hour: Option<u32>) -> Result<()> {
        let hour = hour.unwrap_or_else(local_hour);
        self.sequencer.trigger(config, hour, Instant::now());
        while !self.turn(None) {}
        Ok(())
    }

    /// Wait for the next tick, message or strike deadline and react to it.
    ///
    /// Returns true when a chime finished during this turn.
    fn turn(&mut self, ticker: Option<&Receiver<Instant>>) -> bool {
        let timeout = self
            .sequencer
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(TICK_INTERVAL)
            .min(TICK_INTERVAL);
        let never = crossbeam_channel::never();
        let ticker = ticker.unwrap_or(&never);

        select! {
            recv(ticker) -> _ => {
                self.sequencer.tick(local_hour(), &self.store, Instant::now());
            }
            recv(self.message_bus.receiver()) -> msg => {
                if let Ok(msg) = msg {
                    MessageBus::handle_message(&mut self.sequencer, msg, local_hour(), Instant::now());
                }
                self.message_bus.process_messages(
                    &mut self.sequencer,
                    local_hour(),
                    Instant::now(),
                    MAX_MESSAGES_PER_TURN,
                );
            }
            default(timeout) => {}
        }
        self.sequencer.poll(Instant::now());

        let mut finished = false;
        for event in self.events.try_iter() {
            match event {
                ChimeEvent::SequenceFinished => finished = true,
            }
        }
        finished
    }
}

/// Send one `StopTest` per input line until the input or the bus closes
fn forward_stop_requests<R: BufRead>(input: R, sender: &Sender<ChimeMessage>) -> usize {
    let mut sent = 0;
    for line in input.lines() {
        if line.is_err() || sender.send(ChimeMessage::StopTest).is_err() {
            break;
        }
        sent += 1;
    }
    sent
}
