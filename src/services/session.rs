use crate::audio::pcm::{self, EncodedChunk};
use crate::audio::{
    AudioBackend, AudioFormat, InputContext, OutputContext, PlaybackQueue, SourceId,
};
use crate::error::AssistantError;
use crate::live::{InlineAudio, LiveConfig, LiveConnector, LiveEvent, LiveMessage, LiveSession};
use crate::messages::AssistantStatus;
use std::rc::Rc;
use tokio::sync::mpsc;

const CAPTURE_QUEUE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// Something the session has to react to
#[derive(Debug)]
pub enum SessionInput {
    Live(LiveEvent),
    Captured(Vec<f32>),
    Ended(SourceId),
}

/// One voice conversation, from connect to teardown.
///
/// `Closed` is terminal: a new conversation needs a new `VoiceSession`.
/// All resources are held in `Option`s and released with `take()`, so
/// teardown can run any number of times and from any trigger.
pub struct VoiceSession {
    state: SessionState,
    status: AssistantStatus,
    backend: Rc<dyn AudioBackend>,
    connector: Rc<dyn LiveConnector>,
    live_config: LiveConfig,
    input: Option<Box<dyn InputContext>>,
    output: Option<Box<dyn OutputContext>>,
    handle: Option<Box<dyn LiveSession>>,
    playback: PlaybackQueue,
    events_tx: mpsc::UnboundedSender<LiveEvent>,
    events_rx: mpsc::UnboundedReceiver<LiveEvent>,
    chunk_tx: mpsc::Sender<Vec<f32>>,
    chunk_rx: mpsc::Receiver<Vec<f32>>,
    ended_tx: mpsc::UnboundedSender<SourceId>,
    ended_rx: mpsc::UnboundedReceiver<SourceId>,
}

impl VoiceSession {
    pub fn new(
        backend: Rc<dyn AudioBackend>,
        connector: Rc<dyn LiveConnector>,
        live_config: LiveConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (chunk_tx, chunk_rx) = mpsc::channel(CAPTURE_QUEUE_DEPTH);
        let (ended_tx, ended_rx) = mpsc::unbounded_channel();

        Self {
            state: SessionState::Idle,
            status: AssistantStatus::Idle,
            backend,
            connector,
            live_config,
            input: None,
            output: None,
            handle: None,
            playback: PlaybackQueue::new(),
            events_tx,
            events_rx,
            chunk_tx,
            chunk_rx,
            ended_tx,
            ended_rx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> &AssistantStatus {
        &self.status
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn playback(&self) -> &PlaybackQueue {
        &self.playback
    }

    /// Acquire audio contexts and the microphone, then connect.
    ///
    /// Any failure tears down whatever was acquired and leaves the session `Closed`.
    pub async fn start(&mut self) -> Result<(), AssistantError> {
        if self.state != SessionState::Idle {
            return Err(AssistantError::Connection(format!(
                "cannot start a session in state {:?}",
                self.state
            )));
        }

        tracing::info!("Starting voice session");
        self.state = SessionState::Connecting;
        self.status = AssistantStatus::Connecting;

        match self.acquire_and_connect().await {
            Ok(()) => {
                tracing::debug!("Voice session connected, waiting for open");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to start voice session: {}", e);
                self.close_with(AssistantStatus::Error(e.user_message().to_string()));
                Err(e)
            }
        }
    }

    async fn acquire_and_connect(&mut self) -> Result<(), AssistantError> {
        self.input = Some(self.backend.open_input(AudioFormat::input())?);
        self.output = Some(
            self.backend
                .open_output(AudioFormat::output(), self.ended_tx.clone())?,
        );

        if let Some(input) = self.input.as_mut() {
            input.acquire_microphone()?;
        }

        let handle = self
            .connector
            .connect(self.live_config.clone(), self.events_tx.clone())
            .await?;
        self.handle = Some(handle);

        Ok(())
    }

    /// End the conversation from our side
    pub fn stop(&mut self) {
        if self.is_closed() {
            return;
        }
        tracing::info!("Stopping voice session");
        self.close_with(AssistantStatus::Idle);
    }

    /// Wait for the next event, captured chunk, or playback completion
    pub async fn next_input(&mut self) -> Option<SessionInput> {
        tokio::select! {
            Some(event) = self.events_rx.recv() => Some(SessionInput::Live(event)),
            Some(chunk) = self.chunk_rx.recv() => Some(SessionInput::Captured(chunk)),
            Some(id) = self.ended_rx.recv() => Some(SessionInput::Ended(id)),
            else => None,
        }
    }

    pub fn handle_input(&mut self, input: SessionInput) -> Result<(), AssistantError> {
        match input {
            SessionInput::Live(event) => self.handle_live_event(event),
            SessionInput::Captured(samples) => {
                self.on_captured(&samples);
                Ok(())
            }
            SessionInput::Ended(id) => {
                self.on_playback_ended(id);
                Ok(())
            }
        }
    }

    /// Returns the connection error when the remote side failed
    pub fn handle_live_event(&mut self, event: LiveEvent) -> Result<(), AssistantError> {
        if self.is_closed() {
            tracing::debug!("Ignoring {:?} after close", event);
            return Ok(());
        }

        match event {
            LiveEvent::Open => {
                self.on_open();
                Ok(())
            }
            LiveEvent::Message(message) => {
                self.on_message(message);
                Ok(())
            }
            LiveEvent::Closed(reason) => {
                tracing::info!("Live session closed: {:?}", reason);
                self.close_with(AssistantStatus::Idle);
                Ok(())
            }
            LiveEvent::Error(reason) => {
                let err = AssistantError::Connection(reason);
                tracing::error!("Live session error: {}", err);
                self.close_with(AssistantStatus::Error(err.user_message().to_string()));
                Err(err)
            }
        }
    }

    fn on_open(&mut self) {
        if self.state != SessionState::Connecting {
            tracing::debug!("Ignoring open in state {:?}", self.state);
            return;
        }

        let started = match self.input.as_mut() {
            Some(input) => input.start_capture(self.chunk_tx.clone()),
            None => Err(AssistantError::Device("input context missing".into())),
        };

        match started {
            Ok(()) => {
                tracing::info!("Voice session open");
                self.state = SessionState::Open;
                self.status = AssistantStatus::Listening;
            }
            Err(e) => {
                tracing::error!("Failed to start capture: {}", e);
                self.close_with(AssistantStatus::Error(e.user_message().to_string()));
            }
        }
    }

    fn on_message(&mut self, message: LiveMessage) {
        for audio in &message.audio {
            if let Err(e) = self.play_inbound(audio) {
                tracing::warn!("Dropping inbound audio: {}", e);
                self.status = AssistantStatus::Error(e.user_message().to_string());
            }
        }

        if message.interrupted {
            tracing::debug!("Playback interrupted");
            self.stop_playback();
            self.status = AssistantStatus::Listening;
        }

        if message.turn_complete {
            tracing::debug!("Model turn complete, {} buffers in flight", self.playback.in_flight());
        }
    }

    fn play_inbound(&mut self, audio: &InlineAudio) -> Result<(), AssistantError> {
        let Some(output) = self.output.as_mut() else {
            return Ok(());
        };

        let bytes = pcm::decode(&audio.data)?;
        let format = AudioFormat::output();
        let rate = pcm::parse_pcm_rate(&audio.mime_type).unwrap_or(format.sample_rate);
        let buffer = pcm::decode_audio_data(&bytes, rate, format.channels)?;

        let scheduled = self
            .playback
            .schedule(buffer.duration(), output.current_time());
        tracing::trace!(
            "Scheduling {:?} at {:.3}s for {:.3}s",
            scheduled.id,
            scheduled.start,
            buffer.duration()
        );

        if let Err(e) = output.start_source(scheduled.id, buffer, scheduled.start) {
            self.playback.finish(scheduled.id);
            return Err(e);
        }

        self.status = AssistantStatus::Answering;
        Ok(())
    }

    fn on_captured(&mut self, samples: &[f32]) {
        if self.state != SessionState::Open {
            return;
        }

        let chunk: EncodedChunk = pcm::create_pcm_chunk(samples, AudioFormat::input());
        if let Some(handle) = self.handle.as_mut() {
            if let Err(e) = handle.send_realtime_input(&chunk) {
                tracing::debug!("Dropped one capture chunk: {}", e);
            }
        }
    }

    fn on_playback_ended(&mut self, id: SourceId) {
        if self.playback.finish(id) && self.state == SessionState::Open {
            self.status = AssistantStatus::Listening;
        }
    }

    /// Stop everything in flight and rewind the cursor
    fn stop_playback(&mut self) {
        let stopped = self.playback.interrupt();
        if let Some(output) = self.output.as_mut() {
            for id in stopped {
                if let Err(e) = output.stop_source(id) {
                    tracing::debug!("Ignoring failure stopping {:?}: {}", id, e);
                }
            }
        }
    }

    fn close_with(&mut self, status: AssistantStatus) {
        self.teardown();
        self.state = SessionState::Closed;
        self.status = status;
    }

    /// Release everything this session acquired. Each release is attempted
    /// even when an earlier one failed; failures are only logged.
    pub fn teardown(&mut self) {
        self.stop_playback();

        if let Some(mut input) = self.input.take() {
            if let Err(e) = input.stop_capture() {
                tracing::debug!("Ignoring capture disconnect failure: {}", e);
            }
            if let Err(e) = input.release_microphone() {
                tracing::debug!("Ignoring microphone release failure: {}", e);
            }
            if let Err(e) = input.close() {
                tracing::debug!("Ignoring input context close failure: {}", e);
            }
        }

        if let Some(mut output) = self.output.take() {
            if let Err(e) = output.close() {
                tracing::debug!("Ignoring output context close failure: {}", e);
            }
        }

        if let Some(mut handle) = self.handle.take() {
            if let Err(e) = handle.close() {
                tracing::debug!("Ignoring live session close failure: {}", e);
            }
        }
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
