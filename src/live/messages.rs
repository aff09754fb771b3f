//! JSON frames of the BidiGenerateContent websocket

use super::{InlineAudio, LiveConfig, LiveEvent, LiveMessage};
use crate::audio::pcm::EncodedChunk;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<&'static str>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct RealtimeInput {
    pub audio: Blob,
}

impl ClientMessage {
    pub fn setup(config: &LiveConfig) -> Self {
        ClientMessage::Setup(Setup {
            model: config.model.clone(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: config.voice_name.clone(),
                        },
                    },
                },
            },
            system_instruction: Content {
                parts: vec![Part {
                    text: Some(config.system_prompt.clone()),
                    inline_data: None,
                }],
            },
        })
    }

    pub fn audio(chunk: &EncodedChunk) -> Self {
        ClientMessage::RealtimeInput(RealtimeInput {
            audio: Blob {
                mime_type: chunk.mime_type.clone(),
                data: chunk.to_base64(),
            },
        })
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub go_away: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<Content>,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub turn_complete: bool,
}

impl ServerMessage {
    pub fn into_events(self) -> Vec<LiveEvent> {
        let mut events = Vec::new();

        if self.setup_complete.is_some() {
            events.push(LiveEvent::Open);
        }

        if let Some(content) = self.server_content {
            let audio = content
                .model_turn
                .map(|turn| turn.parts)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|part| part.inline_data)
                .filter(|blob| blob.mime_type.starts_with("audio/"))
                .map(|blob| InlineAudio {
                    mime_type: blob.mime_type,
                    data: blob.data,
                })
                .collect();

            events.push(LiveEvent::Message(LiveMessage {
                audio,
                interrupted: content.interrupted,
                turn_complete: content.turn_complete,
            }));
        }

        if self.go_away.is_some() {
            tracing::debug!("Server announced it will close the session soon");
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn live_config() -> LiveConfig {
        LiveConfig {
            model: "models/test".into(),
            system_prompt: "be kind".into(),
            voice_name: "Kore".into(),
        }
    }

    #[test]
    fn test_setup_shape() {
        let value = serde_json::to_value(ClientMessage::setup(&live_config())).unwrap();
        assert_eq!(
            value,
            json!({
                "setup": {
                    "model": "models/test",
                    "generationConfig": {
                        "responseModalities": ["AUDIO"],
                        "speechConfig": {
                            "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": "Kore" } }
                        }
                    },
                    "systemInstruction": { "parts": [{ "text": "be kind" }] }
                }
            })
        );
    }

    #[test]
    fn test_realtime_input_shape() {
        let chunk = EncodedChunk {
            data: vec![1, 2, 3],
            mime_type: "audio/pcm;rate=16000".into(),
        };
        let value = serde_json::to_value(ClientMessage::audio(&chunk)).unwrap();
        assert_eq!(
            value,
            json!({
                "realtimeInput": {
                    "audio": { "mimeType": "audio/pcm;rate=16000", "data": "AQID" }
                }
            })
        );
    }

    #[test]
    fn test_setup_complete_opens() {
        let msg: ServerMessage = serde_json::from_str(r#"{"setupComplete": {}}"#).unwrap();
        assert_eq!(msg.into_events(), vec![LiveEvent::Open]);
    }

    #[test]
    fn test_model_turn_audio_extracted() {
        let msg: ServerMessage = serde_json::from_value(json!({
            "serverContent": {
                "modelTurn": { "parts": [
                    { "text": "thinking" },
                    { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AAA=" } }
                ]}
            }
        }))
        .unwrap();

        let events = msg.into_events();
        assert_eq!(events.len(), 1);
        let LiveEvent::Message(message) = &events[0] else {
            panic!("expected message, got {:?}", events[0]);
        };
        assert_eq!(message.audio.len(), 1);
        assert_eq!(message.audio[0].data, "AAA=");
        assert!(!message.interrupted);
    }

    #[test]
    fn test_interruption_flag() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"serverContent": {"interrupted": true}}"#).unwrap();
        assert_eq!(
            msg.into_events(),
            vec![LiveEvent::Message(LiveMessage {
                audio: vec![],
                interrupted: true,
                turn_complete: false,
            })]
        );
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"usageMetadata": {"totalTokenCount": 3}}"#).unwrap();
        assert!(msg.into_events().is_empty());
    }
}
