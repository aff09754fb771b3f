use super::messages::{ClientMessage, ServerMessage};
use super::{LiveConfig, LiveConnector, LiveEvent, LiveSession};
use crate::audio::pcm::EncodedChunk;
use crate::error::AssistantError;
use async_trait::async_trait;
use futures::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};

/// Connects to the Gemini Live websocket
pub struct GeminiLive {
    url: String,
    api_key: String,
}

impl GeminiLive {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(&config.live_url, &config.api_key)
    }
}

#[async_trait(?Send)]
impl LiveConnector for GeminiLive {
    async fn connect(
        &self,
        config: LiveConfig,
        events: mpsc::UnboundedSender<LiveEvent>,
    ) -> Result<Box<dyn LiveSession>, AssistantError> {
        tracing::info!("Connecting live session with model {}", config.model);

        let url = format!("{}?key={}", self.url, self.api_key);
        let (ws, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| AssistantError::Connection(describe_ws_error(e)))?;

        let (mut write, read) = ws.split();

        let setup = serde_json::to_string(&ClientMessage::setup(&config))
            .map_err(|e| AssistantError::Connection(format!("Failed to encode setup: {}", e)))?;
        write
            .send(WsMessage::Text(setup))
            .await
            .map_err(|e| AssistantError::Connection(describe_ws_error(e)))?;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WsMessage>();

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, WsMessage::Close(_));
                if let Err(e) = write.send(msg).await {
                    tracing::debug!("Live writer stopped: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = write.close().await;
        });

        tokio::spawn(read_loop(read, events));

        Ok(Box::new(GeminiLiveSession {
            out_tx: Some(out_tx),
        }))
    }
}

struct GeminiLiveSession {
    out_tx: Option<mpsc::UnboundedSender<WsMessage>>,
}

impl LiveSession for GeminiLiveSession {
    fn send_realtime_input(&mut self, chunk: &EncodedChunk) -> Result<(), AssistantError> {
        let tx = self
            .out_tx
            .as_ref()
            .ok_or_else(|| AssistantError::Connection("session is closed".into()))?;

        let body = serde_json::to_string(&ClientMessage::audio(chunk))
            .map_err(|e| AssistantError::Connection(format!("Failed to encode audio: {}", e)))?;

        tx.send(WsMessage::Text(body))
            .map_err(|_| AssistantError::Connection("writer has stopped".into()))
    }

    fn close(&mut self) -> Result<(), AssistantError> {
        match self.out_tx.take() {
            Some(tx) => tx
                .send(WsMessage::Close(None))
                .map_err(|_| AssistantError::Connection("writer has stopped".into())),
            None => Ok(()),
        }
    }
}

async fn read_loop<S>(mut read: S, events: mpsc::UnboundedSender<LiveEvent>)
where
    S: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = read.next().await {
        let payload = match frame {
            Ok(WsMessage::Text(text)) => text.into_bytes(),
            Ok(WsMessage::Binary(bytes)) => bytes,
            Ok(WsMessage::Close(frame)) => {
                let reason = frame
                    .map(|f| f.reason.to_string())
                    .filter(|reason| !reason.is_empty());
                tracing::info!("Live session closed by server: {:?}", reason);
                let _ = events.send(LiveEvent::Closed(reason));
                return;
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::error!("Live session error: {}", e);
                let _ = events.send(LiveEvent::Error(describe_ws_error(e)));
                return;
            }
        };

        match serde_json::from_slice::<ServerMessage>(&payload) {
            Ok(message) => {
                for event in message.into_events() {
                    if events.send(event).is_err() {
                        return;
                    }
                }
            }
            Err(e) => tracing::debug!("Ignoring unparseable live frame: {}", e),
        }
    }

    let _ = events.send(LiveEvent::Closed(None));
}

/// Keep the API key out of anything we log or show
fn describe_ws_error(err: tungstenite::Error) -> String {
    match err {
        tungstenite::Error::Http(response) => {
            format!("handshake rejected with status {}", response.status())
        }
        other => other.to_string(),
    }
}
