use crate::audio::{AudioFeedback, CpalBackend};
use crate::config::Config;
use crate::genai::{ChatGenerator, TextGenerator};
use crate::live::{GeminiLive, LiveConfig};
use crate::messages::AssistantStatus;
use crate::places::{ConfiguredLocation, GroundedSearch, PlaceSearch};
use crate::services::{VoiceHandle, VoiceService};
use crate::ui::{Command, Dashboard, HELP, ServicesScreen, Tab, TipScreen, resolve_callee};

use anyhow::Result;
use std::rc::Rc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

/// Terminal front end: one screen at a time, driven by typed commands
pub struct App {
    tab: Tab,
    voice: VoiceHandle,
    status_rx: watch::Receiver<AssistantStatus>,
    generator: Box<dyn TextGenerator>,
    search: Box<dyn PlaceSearch>,
    location: ConfiguredLocation,
    dashboard: Dashboard,
    services: ServicesScreen,
    tips: TipScreen,
    located: bool,
    tip_loaded: bool,
}

impl App {
    /// Must be called inside a LocalSet
    pub fn new(config: &Config) -> Self {
        let (voice, status_rx) = Self::setup_voice_service(config);

        Self {
            tab: Tab::Home,
            voice,
            status_rx,
            generator: Box::new(ChatGenerator::from_config(config)),
            search: Box::new(GroundedSearch::from_config(config)),
            location: ConfiguredLocation::new(config.latitude, config.longitude),
            dashboard: Dashboard::default(),
            services: ServicesScreen::default(),
            tips: TipScreen::default(),
            located: false,
            tip_loaded: false,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        self.show();

        loop {
            tracing::debug!("Main loop: waiting for event");
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        tracing::info!("stdin closed");
                        break;
                    };
                    match Command::parse(&line) {
                        Ok(Command::Quit) => break,
                        Ok(command) => {
                            if let Err(e) = self.handle_command(command).await {
                                tracing::error!("Error handling command: {}", e);
                            }
                        }
                        Err(message) => println!("{}", message),
                    }
                }

                changed = self.status_rx.changed() => {
                    if changed.is_err() {
                        tracing::error!("Voice service exited");
                        break;
                    }
                    if self.tab == Tab::Voice {
                        self.show_voice();
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        if let Err(e) = self.voice.stop().await {
            tracing::warn!("Voice service did not stop cleanly: {}", e);
        }
        tracing::info!("Assistant shutdown complete");
        Ok(())
    }

    async fn handle_command(&mut self, command: Command) -> Result<()> {
        if let Some(tab) = command.tab() {
            self.navigate(tab).await;
        }

        match command {
            Command::Home | Command::Services(None) => {}
            Command::Tips { next } => {
                if next {
                    self.tips.fetch(self.generator.as_ref()).await;
                }
            }
            Command::Voice => {
                self.voice.toggle().await?;
                // Status updates arrive through the watch channel
                return Ok(());
            }
            Command::Services(Some(kind)) => {
                self.services.search(kind, self.search.as_ref()).await;
            }
            Command::Remind(id) => match self.dashboard.toggle_reminder(&id) {
                Some(active) => tracing::info!("Reminder {} is now {}", id, active),
                None => println!("没有编号为 {} 的提醒", id),
            },
            Command::Call(id) => match resolve_callee(&self.dashboard, &id) {
                Some(contact) => println!("正在呼叫 {} ({})", contact.name, Dashboard::call_link(&contact)),
                None => println!("没有编号为 {} 的联系人", id),
            },
            Command::Help => println!("{}", HELP),
            Command::Quit => {}
        }

        self.show();
        Ok(())
    }

    /// Switch screens, running the first-visit work each screen does on mount
    async fn navigate(&mut self, tab: Tab) {
        if self.tab == Tab::Voice && tab != Tab::Voice {
            // Leaving the voice screen ends the conversation
            if let Err(e) = self.voice.stop().await {
                tracing::warn!("Failed to stop voice session: {}", e);
            }
        }
        self.tab = tab;
        tracing::debug!("Navigated to {}", tab.path());

        match tab {
            Tab::Services if !self.located => {
                self.services.locate(&self.location);
                self.located = true;
            }
            Tab::Education if !self.tip_loaded => {
                self.tips.fetch(self.generator.as_ref()).await;
                self.tip_loaded = true;
            }
            _ => {}
        }
    }

    fn show(&self) {
        println!("\n===== {} =====", self.tab.title());
        match self.tab {
            Tab::Home => print!("{}", self.dashboard.render()),
            Tab::Voice => self.show_voice(),
            Tab::Services => print!("{}", self.services.render()),
            Tab::Education => print!("{}", self.tips.render()),
        }
    }

    fn show_voice(&self) {
        let status = self.status_rx.borrow();
        println!("{}\n{}", status.text(), status.hint());
    }

    fn setup_voice_service(config: &Config) -> (VoiceHandle, watch::Receiver<AssistantStatus>) {
        let (status_tx, status_rx) = watch::channel(AssistantStatus::Idle);
        let (voice_tx, voice_rx) = mpsc::channel(10);

        // Using spawn_local because sessions hold !Send cpal streams
        let service = VoiceService::new(
            Rc::new(CpalBackend),
            Rc::new(GeminiLive::from_config(config)),
            LiveConfig::from_config(config),
            AudioFeedback::from_config(config),
            voice_rx,
            status_tx,
        );
        tokio::task::spawn_local(service.run());

        (VoiceHandle::new(voice_tx), status_rx)
    }
}
