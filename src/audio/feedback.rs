use rodio::OutputStreamBuilder;
use std::cell::Cell;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedbackSoundType {
    SessionStart,
    SessionStop,
}

/// Short chimes played when the voice session opens or closes
pub struct AudioFeedback {
    paths: HashMap<FeedbackSoundType, PathBuf>,
    dispatched: Cell<usize>,
}

impl AudioFeedback {
    pub fn new(paths: HashMap<FeedbackSoundType, PathBuf>) -> Self {
        Self {
            paths,
            dispatched: Cell::new(0),
        }
    }

    /// No chimes at all
    pub fn disabled() -> Self {
        Self::new(HashMap::new())
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        if !config.audio_feedback {
            return Self::disabled();
        }
        Self::new(HashMap::from([
            (
                FeedbackSoundType::SessionStart,
                PathBuf::from(&config.start_sound_path),
            ),
            (
                FeedbackSoundType::SessionStop,
                PathBuf::from(&config.stop_sound_path),
            ),
        ]))
    }

    pub fn is_enabled(&self) -> bool {
        !self.paths.is_empty()
    }

    /// Chimes handed to the player so far
    pub fn dispatched(&self) -> usize {
        self.dispatched.get()
    }

    /// Fire and forget; never delays the caller on playback
    pub fn play(&self, sound_type: FeedbackSoundType) {
        if let Some(path) = self.paths.get(&sound_type) {
            let path = path.clone();
            self.dispatched.set(self.dispatched.get() + 1);
            tokio::task::spawn_blocking(move || {
                if let Err(e) = play_sound_blocking(&path) {
                    tracing::warn!("Failed to play sound {}: {}", path.display(), e);
                }
            });
        }
    }
}

fn play_sound_blocking(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::open(path)
        .or_else(|_| File::open(PathBuf::from("assets").join(path)))
        .or_else(|_| File::open(PathBuf::from("/usr/share/xiaoxi/assets").join(path)))?;

    let stream_handle = OutputStreamBuilder::open_default_stream()?;
    let sink = rodio::play(stream_handle.mixer(), BufReader::new(file))?;
    sink.sleep_until_end();

    Ok(())
}
