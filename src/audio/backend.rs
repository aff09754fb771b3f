use super::format::AudioFormat;
use super::pcm::PlaybackBuffer;
use crate::error::AssistantError;
use tokio::sync::mpsc;

/// Identifies one scheduled playback buffer on an output context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

/// Source of audio contexts for a voice session.
///
/// Implementations hand out contexts that are exclusively owned by the
/// session that opened them.
pub trait AudioBackend {
    fn open_input(&self, format: AudioFormat) -> Result<Box<dyn InputContext>, AssistantError>;

    /// `ended_tx` receives the id of every buffer that finishes playing on its own.
    fn open_output(
        &self,
        format: AudioFormat,
        ended_tx: mpsc::UnboundedSender<SourceId>,
    ) -> Result<Box<dyn OutputContext>, AssistantError>;
}

/// Capture side: microphone plus the chunking stage behind it.
///
/// Every release method must tolerate being called when the matching
/// acquire never happened.
pub trait InputContext {
    /// Take exclusive hold of the microphone
    fn acquire_microphone(&mut self) -> Result<(), AssistantError>;

    /// Begin delivering fixed-size sample chunks on `chunk_tx`
    fn start_capture(&mut self, chunk_tx: mpsc::Sender<Vec<f32>>) -> Result<(), AssistantError>;

    /// Disconnect the chunking stage
    fn stop_capture(&mut self) -> Result<(), AssistantError>;

    /// Stop the microphone stream and give the device back
    fn release_microphone(&mut self) -> Result<(), AssistantError>;

    fn close(&mut self) -> Result<(), AssistantError>;
}

/// Playback side: a clock plus buffers scheduled against it.
pub trait OutputContext {
    /// Seconds of audio rendered since the context was opened
    fn current_time(&self) -> f64;

    /// Start `buffer` exactly at `at` seconds on this context's clock
    fn start_source(
        &mut self,
        id: SourceId,
        buffer: PlaybackBuffer,
        at: f64,
    ) -> Result<(), AssistantError>;

    fn stop_source(&mut self, id: SourceId) -> Result<(), AssistantError>;

    fn close(&mut self) -> Result<(), AssistantError>;
}
