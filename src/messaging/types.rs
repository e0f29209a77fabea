use crate::config::ChimeConfig;
use crate::core::voice::VoiceHandle;

/// Messages flowing into the chime sequencer.
///
/// Audio callbacks and UI collaborators only send these; the event loop
/// owns the sequencer and applies them one at a time.
#[derive(Debug, Clone)]
pub enum ChimeMessage {
    /// Play one chime now using the given settings instead of the stored ones
    Test(Box<ChimeConfig>),
    StopTest,
    /// A voice reached the end of its file
    VoiceFinished(VoiceHandle),
    /// A voice could not play; handled like `VoiceFinished`
    VoiceFailed(VoiceHandle, String),
    /// The synthesizer exhausted the sequence started with this generation
    ToneFinished(u64),
}

/// Notifications published by the sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChimeEvent {
    SequenceFinished,
}
