use thiserror::Error;

/// Failures surfaced to the person using the assistant.
///
/// Every variant is caught at the component that produced it and turned
/// into a short status line with [`AssistantError::user_message`].
#[derive(Debug, Error)]
pub enum AssistantError {
    /// Microphone or location access was refused
    #[error("permission denied: {0}")]
    Permission(String),

    /// Capture or playback device is missing or busy
    #[error("audio device unavailable: {0}")]
    Device(String),

    /// Streaming session failed to open or failed mid-flight
    #[error("connection failed: {0}")]
    Connection(String),

    /// Inbound payload was not valid base64
    #[error("malformed audio payload: {0}")]
    Format(String),

    /// Inbound PCM bytes did not frame into whole samples
    #[error("undecodable audio data: {0}")]
    Decode(String),

    /// One-shot text or search request failed
    #[error("network request failed: {0}")]
    Network(String),
}

impl AssistantError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AssistantError::Permission(_) => "请允许麦克风或定位权限后重试",
            AssistantError::Device(_) => "找不到可用的麦克风或扬声器",
            AssistantError::Connection(_) => "连接出错，请重试",
            AssistantError::Format(_) | AssistantError::Decode(_) => "声音数据有误，请重试",
            AssistantError::Network(_) => "网络连接失败，请检查网络。",
        }
    }
}

/// Startup configuration problems. The app does no further work when one
/// of these is returned.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no API key configured (set api_key in the config file or GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("API key contains whitespace or control characters")]
    InvalidApiKey,

    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    #[error("{field} {value} is out of range")]
    OutOfRange { field: &'static str, value: f64 },
}

impl ConfigError {
    /// Static text shown in place of every screen.
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::MissingApiKey | ConfigError::InvalidApiKey => {
                "配置错误：未检测到 API KEY。请确保环境变量中包含 API_KEY。"
            }
            _ => "配置错误：请检查配置文件。",
        }
    }
}
