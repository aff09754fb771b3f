use crate::error::AssistantError;
use tokio::sync::oneshot;

/// Commands for the voice service
pub enum VoiceCommand {
    Toggle,
    Start(oneshot::Sender<Result<(), AssistantError>>),
    Stop(oneshot::Sender<()>),
}

/// What the voice screen shows (observable via watch channel)
#[derive(Clone, Debug, PartialEq)]
pub enum AssistantStatus {
    Idle,
    Connecting,
    Listening,
    Answering,
    Error(String),
}

impl AssistantStatus {
    pub fn text(&self) -> &str {
        match self {
            AssistantStatus::Idle => "点击说话",
            AssistantStatus::Connecting => "连接中...",
            AssistantStatus::Listening => "我在听...",
            AssistantStatus::Answering => "正在回答...",
            AssistantStatus::Error(message) => message,
        }
    }

    /// Hint shown under the microphone button
    pub fn hint(&self) -> &'static str {
        match self {
            AssistantStatus::Listening | AssistantStatus::Answering => "轻点按钮结束对话",
            _ => "遇到困难？问问小夕吧",
        }
    }
}
