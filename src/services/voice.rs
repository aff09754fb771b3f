use crate::audio::{AudioBackend, AudioFeedback, FeedbackSoundType};
use crate::error::AssistantError;
use crate::live::{LiveConfig, LiveConnector};
use crate::messages::{AssistantStatus, VoiceCommand};
use crate::services::session::{SessionInput, VoiceSession};
use anyhow::Result;
use std::rc::Rc;
use tokio::sync::{mpsc, oneshot, watch};

/// Owns the current voice session and drives it from one event loop
///
/// This service:
/// - Starts a fresh `VoiceSession` for every conversation
/// - Routes live events, captured audio and playback completions to it
/// - Publishes the screen status on a watch channel
/// - Tears the session down when the command channel closes
///
/// Note: sessions hold cpal streams which are !Send, so this service must be
/// spawned on a LocalSet using tokio::task::spawn_local.
pub struct VoiceService {
    backend: Rc<dyn AudioBackend>,
    connector: Rc<dyn LiveConnector>,
    live_config: LiveConfig,
    feedback: AudioFeedback,
    cmd_rx: mpsc::Receiver<VoiceCommand>,
    status_tx: watch::Sender<AssistantStatus>,
    session: Option<VoiceSession>,
}

impl VoiceService {
    pub fn new(
        backend: Rc<dyn AudioBackend>,
        connector: Rc<dyn LiveConnector>,
        live_config: LiveConfig,
        feedback: AudioFeedback,
        cmd_rx: mpsc::Receiver<VoiceCommand>,
        status_tx: watch::Sender<AssistantStatus>,
    ) -> Self {
        Self {
            backend,
            connector,
            live_config,
            feedback,
            cmd_rx,
            status_tx,
            session: None,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },

                Some(input) = next_session_input(&mut self.session) => {
                    self.handle_session_input(input);
                }
            }
        }

        self.stop_session();
        tracing::debug!("Voice service stopped");
    }

    fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.is_closed())
    }

    async fn handle_command(&mut self, cmd: VoiceCommand) {
        match cmd {
            VoiceCommand::Toggle => {
                if self.is_active() {
                    self.stop_session();
                } else if let Err(e) = self.start_session().await {
                    tracing::warn!("Voice session did not start: {}", e);
                }
            }
            VoiceCommand::Start(reply) => {
                let result = if self.is_active() {
                    Ok(())
                } else {
                    self.start_session().await
                };
                let _ = reply.send(result);
            }
            VoiceCommand::Stop(reply) => {
                self.stop_session();
                let _ = reply.send(());
            }
        }
    }

    async fn start_session(&mut self) -> Result<(), AssistantError> {
        // Drop any finished session first so its resources are gone
        self.session = None;
        self.publish(AssistantStatus::Connecting);

        let mut session = VoiceSession::new(
            self.backend.clone(),
            self.connector.clone(),
            self.live_config.clone(),
        );
        let result = session.start().await;
        self.publish(session.status().clone());

        if result.is_ok() {
            self.feedback.play(FeedbackSoundType::SessionStart);
            self.session = Some(session);
        }
        result
    }

    fn stop_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if !session.is_closed() {
                session.stop();
                self.feedback.play(FeedbackSoundType::SessionStop);
            }
            self.publish(session.status().clone());
        }
    }

    fn handle_session_input(&mut self, input: SessionInput) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if let Err(e) = session.handle_input(input) {
            tracing::warn!("Voice session ended: {}", e);
        }

        let status = session.status().clone();
        if session.is_closed() {
            self.session = None;
        }
        self.publish(status);
    }

    fn publish(&self, status: AssistantStatus) {
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

async fn next_session_input(session: &mut Option<VoiceSession>) -> Option<SessionInput> {
    match session {
        Some(session) => session.next_input().await,
        None => std::future::pending().await,
    }
}

/// Handle for communicating with the VoiceService
#[derive(Clone)]
pub struct VoiceHandle {
    tx: mpsc::Sender<VoiceCommand>,
}

impl VoiceHandle {
    pub fn new(tx: mpsc::Sender<VoiceCommand>) -> Self {
        Self { tx }
    }

    pub async fn toggle(&self) -> Result<()> {
        self.tx
            .send(VoiceCommand::Toggle)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send toggle command: {}", e))
    }

    pub async fn start(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(VoiceCommand::Start(reply))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send start command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive start response: {}", e))?
            .map_err(anyhow::Error::from)
    }

    pub async fn stop(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(VoiceCommand::Stop(reply))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send stop command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive stop response: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::pcm::{EncodedChunk, PlaybackBuffer};
    use crate::audio::{AudioFormat, InputContext, OutputContext, SourceId};
    use crate::live::{LiveEvent, LiveSession};
    use async_trait::async_trait;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[derive(Default)]
    struct Shared {
        events: Option<mpsc::UnboundedSender<LiveEvent>>,
        deny_microphone: bool,
        closed_sessions: usize,
    }

    struct Backend(Rc<RefCell<Shared>>);
    struct Input(Rc<RefCell<Shared>>);
    struct Output;
    struct Connector(Rc<RefCell<Shared>>);
    struct Live(Rc<RefCell<Shared>>);

    impl AudioBackend for Backend {
        fn open_input(&self, _: AudioFormat) -> Result<Box<dyn InputContext>, AssistantError> {
            Ok(Box::new(Input(self.0.clone())))
        }

        fn open_output(
            &self,
            _: AudioFormat,
            _: mpsc::UnboundedSender<SourceId>,
        ) -> Result<Box<dyn OutputContext>, AssistantError> {
            Ok(Box::new(Output))
        }
    }

    impl InputContext for Input {
        fn acquire_microphone(&mut self) -> Result<(), AssistantError> {
            if self.0.borrow().deny_microphone {
                Err(AssistantError::Permission("denied".into()))
            } else {
                Ok(())
            }
        }

        fn start_capture(&mut self, _: mpsc::Sender<Vec<f32>>) -> Result<(), AssistantError> {
            Ok(())
        }

        fn stop_capture(&mut self) -> Result<(), AssistantError> {
            Ok(())
        }

        fn release_microphone(&mut self) -> Result<(), AssistantError> {
            Ok(())
        }

        fn close(&mut self) -> Result<(), AssistantError> {
            Ok(())
        }
    }

    impl OutputContext for Output {
        fn current_time(&self) -> f64 {
            0.0
        }

        fn start_source(&mut self, _: SourceId, _: PlaybackBuffer, _: f64) -> Result<(), AssistantError> {
            Ok(())
        }

        fn stop_source(&mut self, _: SourceId) -> Result<(), AssistantError> {
            Ok(())
        }

        fn close(&mut self) -> Result<(), AssistantError> {
            Ok(())
        }
    }

    #[async_trait(?Send)]
    impl LiveConnector for Connector {
        async fn connect(
            &self,
            _: LiveConfig,
            events: mpsc::UnboundedSender<LiveEvent>,
        ) -> Result<Box<dyn LiveSession>, AssistantError> {
            self.0.borrow_mut().events = Some(events);
            Ok(Box::new(Live(self.0.clone())))
        }
    }

    impl LiveSession for Live {
        fn send_realtime_input(&mut self, _: &EncodedChunk) -> Result<(), AssistantError> {
            Ok(())
        }

        fn close(&mut self) -> Result<(), AssistantError> {
            self.0.borrow_mut().closed_sessions += 1;
            Ok(())
        }
    }

    fn service(
        shared: &Rc<RefCell<Shared>>,
        feedback: AudioFeedback,
    ) -> (
        VoiceService,
        mpsc::Sender<VoiceCommand>,
        watch::Receiver<AssistantStatus>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(10);
        let (status_tx, status_rx) = watch::channel(AssistantStatus::Idle);
        let service = VoiceService::new(
            Rc::new(Backend(shared.clone())),
            Rc::new(Connector(shared.clone())),
            LiveConfig {
                model: "m".into(),
                system_prompt: "p".into(),
                voice_name: "Kore".into(),
            },
            feedback,
            cmd_rx,
            status_tx,
        );
        (service, cmd_tx, status_rx)
    }

    fn spawn_service(
        shared: &Rc<RefCell<Shared>>,
    ) -> (VoiceHandle, watch::Receiver<AssistantStatus>) {
        let (service, cmd_tx, status_rx) = service(shared, AudioFeedback::disabled());
        tokio::task::spawn_local(service.run());
        (VoiceHandle::new(cmd_tx), status_rx)
    }

    /// Chime paths that do not exist, so nothing is audible
    fn silent_chimes() -> AudioFeedback {
        AudioFeedback::new(HashMap::from([
            (FeedbackSoundType::SessionStart, PathBuf::from("missing-start.opus")),
            (FeedbackSoundType::SessionStop, PathBuf::from("missing-stop.opus")),
        ]))
    }

    async fn wait_for(rx: &mut watch::Receiver<AssistantStatus>, expected: AssistantStatus) {
        rx.wait_for(|status| *status == expected).await.unwrap();
    }

    #[tokio::test]
    async fn test_toggle_opens_and_closes() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let shared = Rc::new(RefCell::new(Shared::default()));
                let (handle, mut status) = spawn_service(&shared);

                handle.start().await.unwrap();
                assert_eq!(*status.borrow(), AssistantStatus::Connecting);

                let events = shared.borrow().events.clone().unwrap();
                events.send(LiveEvent::Open).unwrap();
                wait_for(&mut status, AssistantStatus::Listening).await;

                handle.toggle().await.unwrap();
                wait_for(&mut status, AssistantStatus::Idle).await;
                assert_eq!(shared.borrow().closed_sessions, 1);
            })
            .await;
    }

    #[tokio::test]
    async fn test_denied_start_reports_error() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let shared = Rc::new(RefCell::new(Shared {
                    deny_microphone: true,
                    ..Shared::default()
                }));
                let (handle, status) = spawn_service(&shared);

                assert!(handle.start().await.is_err());
                assert!(matches!(*status.borrow(), AssistantStatus::Error(_)));
                assert!(shared.borrow().events.is_none());
            })
            .await;
    }

    #[tokio::test]
    async fn test_start_chime_only_after_successful_start() {
        let shared = Rc::new(RefCell::new(Shared {
            deny_microphone: true,
            ..Shared::default()
        }));
        let (mut service, _cmd_tx, _status) = service(&shared, silent_chimes());

        let (reply, rx) = oneshot::channel();
        service.handle_command(VoiceCommand::Start(reply)).await;
        assert!(rx.await.unwrap().is_err());
        assert_eq!(service.feedback.dispatched(), 0);

        shared.borrow_mut().deny_microphone = false;
        let (reply, rx) = oneshot::channel();
        service.handle_command(VoiceCommand::Start(reply)).await;
        assert!(rx.await.unwrap().is_ok());
        assert_eq!(service.feedback.dispatched(), 1);

        let (reply, rx) = oneshot::channel();
        service.handle_command(VoiceCommand::Stop(reply)).await;
        rx.await.unwrap();
        assert_eq!(service.feedback.dispatched(), 2);
    }

    #[tokio::test]
    async fn test_remote_close_allows_restart() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let shared = Rc::new(RefCell::new(Shared::default()));
                let (handle, mut status) = spawn_service(&shared);

                handle.start().await.unwrap();
                let events = shared.borrow_mut().events.take().unwrap();
                events.send(LiveEvent::Open).unwrap();
                wait_for(&mut status, AssistantStatus::Listening).await;
                events.send(LiveEvent::Closed(None)).unwrap();
                wait_for(&mut status, AssistantStatus::Idle).await;

                handle.start().await.unwrap();
                assert!(shared.borrow().events.is_some());
                handle.stop().await.unwrap();
                assert_eq!(shared.borrow().closed_sessions, 2);
            })
            .await;
    }
}
