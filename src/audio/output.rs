// Audio output using cpal
// Renders scheduled buffers against a frame-counting clock

use super::backend::{OutputContext, SourceId};
use super::format::AudioFormat;
use super::pcm::PlaybackBuffer;
use crate::error::AssistantError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

struct MixSource {
    id: SourceId,
    start_frame: u64,
    buffer: PlaybackBuffer,
    /// Read position in source frames
    position: f64,
    /// Source frames consumed per device frame
    step: f64,
}

/// Sums every scheduled buffer into the device's output frames.
///
/// The clock is the number of frames rendered so far, so a buffer scheduled
/// at `t` seconds begins on frame `t * sample_rate` exactly.
pub struct Mixer {
    sample_rate: u32,
    frames_rendered: u64,
    sources: Vec<MixSource>,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frames_rendered: 0,
            sources: Vec::new(),
        }
    }

    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    pub fn active_sources(&self) -> usize {
        self.sources.len()
    }

    pub fn add(&mut self, id: SourceId, buffer: PlaybackBuffer, at: f64) {
        let start_frame = (at.max(0.0) * self.sample_rate as f64).round() as u64;
        let step = buffer.sample_rate() as f64 / self.sample_rate as f64;
        self.sources.push(MixSource {
            id,
            start_frame,
            buffer,
            position: 0.0,
            step,
        });
    }

    pub fn remove(&mut self, id: SourceId) -> bool {
        let before = self.sources.len();
        self.sources.retain(|s| s.id != id);
        self.sources.len() != before
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }

    /// Fill `out` (interleaved, `channels` wide) and push ids of buffers that ran out onto `ended`.
    pub fn render(&mut self, out: &mut [f32], channels: usize, ended: &mut Vec<SourceId>) {
        let channels = channels.max(1);
        for frame in out.chunks_mut(channels) {
            let now = self.frames_rendered;
            let mut mixed = 0.0f32;

            for source in self.sources.iter_mut() {
                if now < source.start_frame {
                    continue;
                }
                let index = source.position as usize;
                if index < source.buffer.frames() {
                    mixed += source_frame(&source.buffer, index);
                }
                source.position += source.step;
            }

            frame.fill(mixed.clamp(-1.0, 1.0));
            self.frames_rendered += 1;
        }

        self.sources.retain(|source| {
            let done = source.position as usize >= source.buffer.frames();
            if done {
                ended.push(source.id);
            }
            !done
        });
    }
}

/// Mono value of one frame, averaging channels
fn source_frame(buffer: &PlaybackBuffer, index: usize) -> f32 {
    let channels = buffer.channels().max(1) as usize;
    let frame = &buffer.samples()[index * channels..(index + 1) * channels];
    frame.iter().sum::<f32>() / channels as f32
}

pub struct CpalOutput {
    stream: Option<Stream>,
    mixer: Arc<Mutex<Mixer>>,
}

impl CpalOutput {
    /// Open the default output device, preferring the session's output rate
    pub fn open(
        format: AudioFormat,
        ended_tx: mpsc::UnboundedSender<SourceId>,
    ) -> Result<Self, AssistantError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AssistantError::Device("No output audio device available".into()))?;

        let default_config = device
            .default_output_config()
            .map_err(|e| AssistantError::Device(format!("Failed to get output config: {}", e)))?;

        let preferred = StreamConfig {
            channels: default_config.channels(),
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match Self::build_stream(&device, &preferred, ended_tx.clone()) {
            Ok(built) => built,
            Err(e) => {
                tracing::debug!(
                    "Output device rejected {} Hz ({}), using its default rate",
                    format.sample_rate,
                    e
                );
                Self::build_stream(&device, &default_config.config(), ended_tx)?
            }
        };

        let (stream, mixer) = stream;
        stream
            .play()
            .map_err(|e| AssistantError::Device(format!("Failed to start output stream: {}", e)))?;

        tracing::info!("Audio output opened");
        Ok(Self {
            stream: Some(stream),
            mixer,
        })
    }

    fn build_stream(
        device: &cpal::Device,
        config: &StreamConfig,
        ended_tx: mpsc::UnboundedSender<SourceId>,
    ) -> Result<(Stream, Arc<Mutex<Mixer>>), AssistantError> {
        let mixer = Arc::new(Mutex::new(Mixer::new(config.sample_rate.0)));
        let callback_mixer = mixer.clone();
        let channels = config.channels as usize;
        let mut ended = Vec::new();

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback_mixer.lock().render(data, channels, &mut ended);
                    for id in ended.drain(..) {
                        // Receiver is gone once the session has been torn down
                        let _ = ended_tx.send(id);
                    }
                },
                move |err| {
                    tracing::warn!("Audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| AssistantError::Device(format!("Failed to build output stream: {}", e)))?;

        Ok((stream, mixer))
    }
}

impl OutputContext for CpalOutput {
    fn current_time(&self) -> f64 {
        self.mixer.lock().current_time()
    }

    fn start_source(
        &mut self,
        id: SourceId,
        buffer: PlaybackBuffer,
        at: f64,
    ) -> Result<(), AssistantError> {
        if self.stream.is_none() {
            return Err(AssistantError::Device("output context is closed".into()));
        }
        self.mixer.lock().add(id, buffer, at);
        Ok(())
    }

    fn stop_source(&mut self, id: SourceId) -> Result<(), AssistantError> {
        if self.mixer.lock().remove(id) {
            Ok(())
        } else {
            Err(AssistantError::Device(format!("source {:?} is not playing", id)))
        }
    }

    fn close(&mut self) -> Result<(), AssistantError> {
        self.mixer.lock().clear();
        // Dropping the stream releases the device
        match self.stream.take() {
            Some(_) => Ok(()),
            None => Err(AssistantError::Device("output context already closed".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(value: f32, frames: usize, rate: u32) -> PlaybackBuffer {
        PlaybackBuffer::new(vec![value; frames], rate, 1)
    }

    #[test]
    fn test_clock_advances_per_frame() {
        let mut mixer = Mixer::new(100);
        let mut out = vec![0.0; 50];
        mixer.render(&mut out, 1, &mut Vec::new());
        assert!((mixer.current_time() - 0.5).abs() < 1e-12);

        // Stereo output consumes two samples per frame
        let mut stereo = vec![0.0; 50];
        mixer.render(&mut stereo, 2, &mut Vec::new());
        assert!((mixer.current_time() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_source_starts_on_scheduled_frame() {
        let mut mixer = Mixer::new(10);
        mixer.add(SourceId(1), tone(0.5, 3, 10), 0.2);

        let mut out = vec![0.0; 6];
        let mut ended = Vec::new();
        mixer.render(&mut out, 1, &mut ended);

        assert_eq!(out, vec![0.0, 0.0, 0.5, 0.5, 0.5, 0.0]);
        assert_eq!(ended, vec![SourceId(1)]);
        assert_eq!(mixer.active_sources(), 0);
    }

    #[test]
    fn test_back_to_back_sources_leave_no_gap() {
        let mut mixer = Mixer::new(10);
        mixer.add(SourceId(1), tone(0.25, 2, 10), 0.0);
        mixer.add(SourceId(2), tone(0.75, 2, 10), 0.2);

        let mut out = vec![0.0; 4];
        let mut ended = Vec::new();
        mixer.render(&mut out, 1, &mut ended);

        assert_eq!(out, vec![0.25, 0.25, 0.75, 0.75]);
        assert_eq!(ended, vec![SourceId(1), SourceId(2)]);
    }

    #[test]
    fn test_rate_conversion_stretches_source() {
        // 24kHz audio on a 48kHz device lasts twice as many device frames
        let mut mixer = Mixer::new(48);
        mixer.add(SourceId(7), tone(0.1, 24, 24), 0.0);

        let mut out = vec![0.0; 47];
        let mut ended = Vec::new();
        mixer.render(&mut out, 1, &mut ended);
        assert!(ended.is_empty());

        let mut tail = vec![0.0; 1];
        mixer.render(&mut tail, 1, &mut ended);
        assert_eq!(ended, vec![SourceId(7)]);
    }

    #[test]
    fn test_removed_source_does_not_end() {
        let mut mixer = Mixer::new(10);
        mixer.add(SourceId(3), tone(0.5, 5, 10), 0.0);
        assert!(mixer.remove(SourceId(3)));
        assert!(!mixer.remove(SourceId(3)));

        let mut out = vec![0.0; 10];
        let mut ended = Vec::new();
        mixer.render(&mut out, 1, &mut ended);
        assert!(ended.is_empty());
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
