use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_live_url")]
    pub live_url: String,

    #[serde(default = "default_live_model")]
    pub live_model: String,

    #[serde(default = "default_text_model")]
    pub text_model: String,

    #[serde(default = "default_search_model")]
    pub search_model: String,

    #[serde(default = "default_voice_name")]
    pub voice_name: String,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    #[serde(default = "default_audio_feedback")]
    pub audio_feedback: bool,

    #[serde(default = "default_start_sound")]
    pub start_sound_path: String,

    #[serde(default = "default_stop_sound")]
    pub stop_sound_path: String,
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_live_url() -> String {
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string()
}

fn default_live_model() -> String {
    "models/gemini-2.5-flash-native-audio-preview-09-2025".to_string()
}

fn default_text_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_search_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_voice_name() -> String {
    "Kore".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant for an elderly person. Speak clearly, slowly, and warmly in Chinese. Keep answers concise. Call yourself '小夕' (Xiao Xi).".to_string()
}

fn default_audio_feedback() -> bool {
    true
}

fn default_start_sound() -> String {
    "ping-up.opus".to_string()
}

fn default_stop_sound() -> String {
    "ping-down.opus".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_api_base(),
            live_url: default_live_url(),
            live_model: default_live_model(),
            text_model: default_text_model(),
            search_model: default_search_model(),
            voice_name: default_voice_name(),
            system_prompt: default_system_prompt(),
            latitude: None,
            longitude: None,
            audio_feedback: default_audio_feedback(),
            start_sound_path: default_start_sound(),
            stop_sound_path: default_stop_sound(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.config/xiaoxi/config.json)
    /// and apply credential overrides from the environment.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let config = Self::load_from(&config_path)?;
        Ok(config.with_env_credential(|name| std::env::var(name).ok()))
    }

    /// Load from an explicit path, writing the defaults there if the file is missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        tracing::info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        // The credential usually arrives through the environment; never persist it.
        let mut persisted = self.clone();
        persisted.api_key.clear();
        let contents =
            serde_json::to_string_pretty(&persisted).context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Environment credentials take precedence over the file.
    pub fn with_env_credential(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = API_KEY_VARS
            .iter()
            .filter_map(|name| lookup(*name))
            .find(|value| !value.is_empty())
        {
            self.api_key = key;
        }
        self
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(dir)
        } else {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("xiaoxi").join("config.json"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        if self
            .api_key
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ConfigError::InvalidApiKey);
        }

        for (field, value) in [
            ("api_base", &self.api_base),
            ("live_url", &self.live_url),
            ("live_model", &self.live_model),
            ("text_model", &self.text_model),
            ("search_model", &self.search_model),
            ("voice_name", &self.voice_name),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyField(field));
            }
        }

        if let Some(lat) = self.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(ConfigError::OutOfRange {
                    field: "latitude",
                    value: lat,
                });
            }
        }

        if let Some(lng) = self.longitude {
            if !(-180.0..=180.0).contains(&lng) {
                return Err(ConfigError::OutOfRange {
                    field: "longitude",
                    value: lng,
                });
            }
        }

        Ok(())
    }
}
