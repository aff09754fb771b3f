pub mod backend;
pub mod capture;
pub mod feedback;
pub mod format;
pub mod output;
pub mod pcm;
pub mod playback;

pub use backend::{AudioBackend, InputContext, OutputContext, SourceId};
pub use capture::CpalInput;
pub use feedback::{AudioFeedback, FeedbackSoundType};
pub use format::AudioFormat;
pub use output::CpalOutput;
pub use playback::PlaybackQueue;

use crate::error::AssistantError;
use tokio::sync::mpsc;

/// Default host devices through cpal
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl AudioBackend for CpalBackend {
    fn open_input(&self, format: AudioFormat) -> Result<Box<dyn InputContext>, AssistantError> {
        Ok(Box::new(CpalInput::open(format)?))
    }

    fn open_output(
        &self,
        format: AudioFormat,
        ended_tx: mpsc::UnboundedSender<SourceId>,
    ) -> Result<Box<dyn OutputContext>, AssistantError> {
        Ok(Box::new(CpalOutput::open(format, ended_tx)?))
    }
}
