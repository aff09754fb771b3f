//! Narrow interface to the realtime speech backend.
//!
//! A session needs exactly three things from the backend: a way to send
//! captured audio, a way to close, and a stream of [`LiveEvent`]s standing in
//! for the open / message / close / error callbacks.

pub mod gemini;
pub mod messages;

pub use gemini::GeminiLive;

use crate::audio::pcm::EncodedChunk;
use crate::error::AssistantError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// What the remote side is asked to be
#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    pub model: String,
    pub system_prompt: String,
    pub voice_name: String,
}

impl LiveConfig {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            model: config.live_model.clone(),
            system_prompt: config.system_prompt.clone(),
            voice_name: config.voice_name.clone(),
        }
    }
}

/// One base64 audio payload from the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineAudio {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveMessage {
    pub audio: Vec<InlineAudio>,
    pub interrupted: bool,
    pub turn_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    Open,
    Message(LiveMessage),
    Closed(Option<String>),
    Error(String),
}

/// Handle to an established streaming connection
pub trait LiveSession {
    /// Fire and forget; an error only describes this one chunk
    fn send_realtime_input(&mut self, chunk: &EncodedChunk) -> Result<(), AssistantError>;

    fn close(&mut self) -> Result<(), AssistantError>;
}

#[async_trait(?Send)]
pub trait LiveConnector {
    /// Open a connection; every later event is delivered on `events`.
    async fn connect(
        &self,
        config: LiveConfig,
        events: mpsc::UnboundedSender<LiveEvent>,
    ) -> Result<Box<dyn LiveSession>, AssistantError>;
}
