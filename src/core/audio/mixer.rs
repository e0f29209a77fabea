use std::sync::Arc;

use crossbeam_channel::Sender;
use log::debug;

use super::{CHANNELS, SAMPLE_RATE};
use crate::core::notation::NoteSequence;
use crate::core::synth::ToneSynthesizer;
use crate::core::voice::VoiceHandle;
use crate::messaging::ChimeMessage;
use crate::utils::helpers::i16_to_f32;

/// Decoded file playing on one voice
struct Clip {
    handle: VoiceHandle,
    samples: Arc<[f32]>,
    position: usize,
    gain: f32,
}

/// Sums the tone synthesizer and every active clip into one stereo buffer.
///
/// Lives behind a mutex shared with the device callback, which makes it the
/// only place the synthesis cursor is advanced.
pub struct Mixer {
    tone: ToneSynthesizer,
    tone_generation: u64,
    clips: Vec<Clip>,
    scratch: Vec<i16>,
    notifier: Sender<ChimeMessage>,
}

impl Mixer {
    pub fn new(notifier: Sender<ChimeMessage>) -> Self {
        Self {
            tone: ToneSynthesizer::new(SAMPLE_RATE, CHANNELS),
            tone_generation: 0,
            clips: Vec::new(),
            scratch: Vec::new(),
            notifier,
        }
    }

    /// Start a new tone sequence, superseding any running one
    pub fn start_tone(&mut self, sequence: NoteSequence, volume: f32) -> u64 {
        self.tone_generation += 1;
        self.tone.start(sequence, volume);
        self.tone_generation
    }

    pub fn stop_tone(&mut self) {
        if self.tone.is_playing() {
            let cursor = self.tone.cursor();
            debug!(
                "Tone stopped at instruction {} (+{} frames)",
                cursor.instruction_index, cursor.samples_emitted
            );
        }
        self.tone.stop();
    }

    #[cfg(test)]
    pub fn is_tone_playing(&self) -> bool {
        self.tone.is_playing()
    }

    pub fn start_clip(&mut self, handle: VoiceHandle, samples: Arc<[f32]>, gain: f32) {
        // A reused slot replaces whatever was left on it
        self.clips.retain(|c| c.handle.slot != handle.slot);
        self.clips.push(Clip {
            handle,
            samples,
            position: 0,
            gain: gain.clamp(0.0, 1.0),
        });
    }

    pub fn stop_clip(&mut self, handle: VoiceHandle) {
        self.clips.retain(|c| c.handle != handle);
    }

    /// Drop every clip and report each as failed, used when the device errors
    pub fn fail_clips(&mut self, reason: &str) {
        for clip in std::mem::take(&mut self.clips) {
            self.notify(ChimeMessage::VoiceFailed(clip.handle, reason.to_string()));
        }
    }

    #[cfg(test)]
    pub fn active_clips(&self) -> usize {
        self.clips.len()
    }

    /// Render interleaved stereo into `out`, overwriting it
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);

        if self.tone.is_playing() {
            self.scratch.resize(out.len(), 0);
            let pull = self.tone.pull(&mut self.scratch);
            let written = pull.frames * CHANNELS as usize;
            for (o, &s) in out.iter_mut().zip(&self.scratch[..written]) {
                *o += i16_to_f32(s);
            }
            if pull.finished {
                self.notify(ChimeMessage::ToneFinished(self.tone_generation));
            }
        }

        let mut finished = Vec::new();
        self.clips.retain_mut(|clip| {
            let remaining = clip.samples.len() - clip.position;
            let count = remaining.min(out.len());
            let source = &clip.samples[clip.position..clip.position + count];
            for (o, &s) in out.iter_mut().zip(source) {
                *o += s * clip.gain;
            }
            clip.position += count;

            if clip.position >= clip.samples.len() {
                finished.push(clip.handle);
                false
            } else {
                true
            }
        });

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }

        for handle in finished {
            self.notify(ChimeMessage::VoiceFinished(handle));
        }
    }

    fn notify(&self, message: ChimeMessage) {
        if self.notifier.send(message).is_err() {
            debug!("Chime message dropped, receiver is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::notation::NoteInstruction;
    use approx::assert_relative_eq;
    use crossbeam_channel::unbounded;

    fn handle(slot: usize, generation: u64) -> VoiceHandle {
        VoiceHandle { slot, generation }
    }

    #[test]
    fn tone_completion_is_reported_once() {
        let (tx, rx) = unbounded();
        let mut mixer = Mixer::new(tx);
        let seq = NoteSequence::new(vec![NoteInstruction { frequency: 440.0, duration_samples: 100 }]);
        let generation = mixer.start_tone(seq, 1.0);

        let mut buf = vec![0.0f32; 128];
        mixer.render(&mut buf);
        assert!(rx.try_recv().is_err());
        mixer.render(&mut buf);
        mixer.render(&mut buf);

        let messages: Vec<_> = rx.try_iter().collect();
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], ChimeMessage::ToneFinished(g) if g == generation));
        assert!(!mixer.is_tone_playing());
    }

    #[test]
    fn clips_are_mixed_with_gain_and_reported() {
        let (tx, rx) = unbounded();
        let mut mixer = Mixer::new(tx);
        let samples: Arc<[f32]> = vec![0.5f32; 6].into();
        mixer.start_clip(handle(0, 1), samples.clone(), 0.5);
        mixer.start_clip(handle(1, 2), samples, 1.0);

        let mut buf = vec![0.0f32; 4];
        mixer.render(&mut buf);
        assert!(buf.iter().all(|&s| (s - 0.75).abs() < 1e-6));
        assert!(rx.try_recv().is_err());

        mixer.render(&mut buf);
        assert_eq!(&buf[2..], &[0.0, 0.0]);
        let finished: Vec<_> = rx.try_iter().collect();
        assert_eq!(finished.len(), 2);
        assert_eq!(mixer.active_clips(), 0);
    }

    #[test]
    fn stopped_clips_stay_silent() {
        let (tx, rx) = unbounded();
        let mut mixer = Mixer::new(tx);
        let clip = handle(3, 9);
        mixer.start_clip(clip, vec![0.25f32; 100].into(), 1.0);
        mixer.stop_clip(clip);

        let mut buf = vec![1.0f32; 8];
        mixer.render(&mut buf);
        assert!(buf.iter().all(|&s| s == 0.0));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn overlapping_clips_are_clamped() {
        let (tx, _rx) = unbounded();
        let mut mixer = Mixer::new(tx);
        mixer.start_clip(handle(0, 1), vec![0.8f32; 4].into(), 1.0);
        mixer.start_clip(handle(1, 2), vec![0.8f32; 4].into(), 1.0);
        mixer.start_clip(handle(2, 3), vec![-0.9f32, -0.9].into(), 1.0);

        let mut buf = vec![0.0f32; 4];
        mixer.render(&mut buf);
        assert_relative_eq!(buf[0], 0.7, epsilon = 1e-5);
        assert_relative_eq!(buf[1], 0.7, epsilon = 1e-5);
        assert_eq!(&buf[2..], &[1.0, 1.0]);
    }

    #[test]
    fn device_errors_fail_active_clips() {
        let (tx, rx) = unbounded();
        let mut mixer = Mixer::new(tx);
        mixer.start_clip(handle(0, 1), vec![0.1f32; 100].into(), 1.0);
        mixer.start_clip(handle(4, 7), vec![0.1f32; 100].into(), 1.0);

        mixer.fail_clips("device unplugged");
        assert_eq!(mixer.active_clips(), 0);
        let failed: Vec<_> = rx
            .try_iter()
            .map(|msg| match msg {
                ChimeMessage::VoiceFailed(h, reason) => (h, reason),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            failed,
            vec![
                (handle(0, 1), "device unplugged".to_string()),
                (handle(4, 7), "device unplugged".to_string())
            ]
        );
    }

    #[test]
    fn stopped_tone_never_reports() {
        let (tx, rx) = unbounded();
        let mut mixer = Mixer::new(tx);
        let seq = NoteSequence::new(vec![NoteInstruction { frequency: 440.0, duration_samples: 10 }]);
        mixer.start_tone(seq, 1.0);
        mixer.stop_tone();

        let mut buf = vec![0.0f32; 64];
        mixer.render(&mut buf);
        assert!(rx.try_recv().is_err());
    }
}
