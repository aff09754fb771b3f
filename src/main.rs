mod app;
mod audio;
mod config;
mod error;
mod genai;
mod live;
mod messages;
mod places;
mod services;
mod ui;

use app::App;
use config::Config;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting xiaoxi assistant");

    // Load configuration
    let config = Config::load()?;
    if let Err(e) = config.validate() {
        eprintln!("{}", e.user_message());
        tracing::error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    // Create LocalSet for !Send futures (needed for VoiceService which holds cpal::Stream)
    let local = tokio::task::LocalSet::new();

    local
        .run_until(async move { App::new(&config).run().await })
        .await
}
