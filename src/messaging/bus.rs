use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;

use super::ChimeMessage;
use crate::core::chime::{ChimeSequencer, ToneOutput};
use crate::core::voice::AudioBackend;

/// MessageBus carries requests and audio notifications to the sequencer
pub struct MessageBus {
    sender: Sender<ChimeMessage>,
    receiver: Receiver<ChimeMessage>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        MessageBus { sender, receiver }
    }

    /// Get a sender that can be cloned and handed to audio callbacks or UI code
    pub fn sender(&self) -> Sender<ChimeMessage> {
        self.sender.clone()
    }

    pub fn receiver(&self) -> &Receiver<ChimeMessage> {
        &self.receiver
    }

    /// Apply up to `max_messages` pending messages, returns how many ran
    pub fn process_messages<B, T>(
        &self,
        sequencer: &mut ChimeSequencer<B, T>,
        hour: u32,
        now: Instant,
        max_messages: usize,
    ) -> usize
    where
        B: AudioBackend,
        T: ToneOutput,
    {
        let mut count = 0;
        while count < max_messages {
            let Ok(msg) = self.receiver.try_recv() else {
                break;
            };
            count += 1;
            Self::handle_message(sequencer, msg, hour, now);
        }
        count
    }

    /// Handle an individual message
    pub fn handle_message<B, T>(
        sequencer: &mut ChimeSequencer<B, T>,
        msg: ChimeMessage,
        hour: u32,
        now: Instant,
    ) where
        B: AudioBackend,
        T: ToneOutput,
    {
        debug!("Handling {:?} while {:?}", msg, sequencer.state());
        match msg {
            ChimeMessage::Test(config) => sequencer.trigger(*config, hour, now),
            ChimeMessage::StopTest => sequencer.stop(),
            ChimeMessage::VoiceFinished(handle) => sequencer.on_voice_finished(handle, now),
            ChimeMessage::VoiceFailed(handle, reason) => {
                sequencer.on_voice_failed(handle, &reason, now)
            }
            ChimeMessage::ToneFinished(generation) => sequencer.on_tone_finished(generation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChimeConfig, ChimeMode};
    use crate::core::chime::ChimeState;
    use crate::core::notation::NoteSequence;
    use crate::core::voice::testing::RecordingBackend;
    use crate::core::voice::VoicePool;
    use crate::messaging::ChimeEvent;

    #[derive(Default)]
    struct CountingTone(u64);

    impl ToneOutput for CountingTone {
        fn start(&mut self, _sequence: NoteSequence, _volume: f32) -> anyhow::Result<u64> {
            self.0 += 1;
            Ok(self.0)
        }

        fn stop(&mut self) {}
    }

    fn setup() -> (
        MessageBus,
        ChimeSequencer<RecordingBackend, CountingTone>,
        Receiver<ChimeEvent>,
    ) {
        let (tx, rx) = unbounded();
        let pool = VoicePool::new(RecordingBackend::default());
        (MessageBus::new(), ChimeSequencer::new(pool, CountingTone::default(), tx), rx)
    }

    #[test]
    fn test_request_then_tone_completion() {
        let (bus, mut seq, events) = setup();
        let now = Instant::now();
        bus.sender().send(ChimeMessage::Test(Box::new(ChimeConfig::default()))).unwrap();
        assert_eq!(bus.process_messages(&mut seq, 12, now, 16), 1);
        assert_eq!(seq.state(), ChimeState::PlayingNotes);

        bus.sender().send(ChimeMessage::ToneFinished(1)).unwrap();
        bus.process_messages(&mut seq, 12, now, 16);
        assert!(seq.is_idle());
        assert_eq!(events.try_recv(), Ok(ChimeEvent::SequenceFinished));
    }

    #[test]
    fn stop_request_ends_grandfather_clock() {
        let (bus, mut seq, events) = setup();
        let config = ChimeConfig {
            mode: ChimeMode::GrandfatherClock,
            prelude_file_path: Some("prelude.wav".into()),
            ..ChimeConfig::default()
        };
        let sender = bus.sender();
        sender.send(ChimeMessage::Test(Box::new(config))).unwrap();
        sender.send(ChimeMessage::StopTest).unwrap();

        bus.process_messages(&mut seq, 5, Instant::now(), 16);
        assert!(seq.is_idle());
        assert_eq!(events.try_iter().count(), 1);
    }

    #[test]
    fn message_budget_is_respected() {
        let (bus, mut seq, _events) = setup();
        for _ in 0..5 {
            bus.sender().send(ChimeMessage::StopTest).unwrap();
        }
        assert_eq!(bus.process_messages(&mut seq, 1, Instant::now(), 3), 3);
        assert_eq!(bus.receiver().len(), 2);
    }
}
