use super::backend::InputContext;
use super::format::{AudioFormat, CAPTURE_CHUNK_SAMPLES};
use crate::error::AssistantError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use ringbuf::{HeapCons, HeapRb, traits::*};
use std::sync::Arc;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

/// Microphone capture through cpal.
///
/// Holds a `cpal::Stream`, which is !Send, so this lives on the session's
/// LocalSet and its bridge task is spawned with `spawn_local`.
pub struct CpalInput {
    format: AudioFormat,
    device: Option<cpal::Device>,
    stream: Option<cpal::Stream>,
    consumer: Option<HeapCons<f32>>,
    notify: Arc<Notify>,
    bridge: Option<JoinHandle<()>>,
}

impl CpalInput {
    /// Open the default input device without touching the microphone yet
    pub fn open(format: AudioFormat) -> Result<Self, AssistantError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AssistantError::Device("No input audio device available".into()))?;

        Ok(Self {
            format,
            device: Some(device),
            stream: None,
            consumer: None,
            notify: Arc::new(Notify::new()),
            bridge: None,
        })
    }

    async fn bridge_task(
        mut consumer: HeapCons<f32>,
        tx: mpsc::Sender<Vec<f32>>,
        notify: Arc<Notify>,
    ) {
        loop {
            notify.notified().await;

            while consumer.occupied_len() >= CAPTURE_CHUNK_SAMPLES {
                let mut chunk = vec![0.0f32; CAPTURE_CHUNK_SAMPLES];
                let n = consumer.pop_slice(&mut chunk);
                chunk.truncate(n);

                // A full queue drops this chunk; capture keeps going
                match tx.try_send(chunk) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::debug!("Capture queue full, dropping chunk");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => return,
                }
            }
        }
    }
}

impl InputContext for CpalInput {
    fn acquire_microphone(&mut self) -> Result<(), AssistantError> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| AssistantError::Device("input context is closed".into()))?;

        let ring = HeapRb::<f32>::new(self.format.samples_for_duration(10.0));
        let (mut producer, consumer) = ring.split();

        let config = StreamConfig {
            channels: self.format.channels,
            sample_rate: SampleRate(self.format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let notify_callback = self.notify.clone();
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    producer.push_slice(data);
                    notify_callback.notify_one();
                },
                move |err| {
                    tracing::warn!("Audio input error: {}", err);
                },
                None,
            )
            .map_err(classify_build_error)?;

        stream
            .play()
            .map_err(|e| classify_backend_message(e.to_string()))?;

        self.stream = Some(stream);
        self.consumer = Some(consumer);
        tracing::info!("Microphone acquired");
        Ok(())
    }

    fn start_capture(&mut self, chunk_tx: mpsc::Sender<Vec<f32>>) -> Result<(), AssistantError> {
        let mut consumer = self
            .consumer
            .take()
            .ok_or_else(|| AssistantError::Device("microphone not acquired".into()))?;

        let stale = discard_buffered(&mut consumer);
        if stale > 0 {
            tracing::debug!("Discarded {} samples captured while connecting", stale);
        }

        self.bridge = Some(tokio::task::spawn_local(Self::bridge_task(
            consumer,
            chunk_tx,
            self.notify.clone(),
        )));

        tracing::info!("Audio capture started");
        Ok(())
    }

    fn stop_capture(&mut self) -> Result<(), AssistantError> {
        if let Some(bridge) = self.bridge.take() {
            bridge.abort();
        }
        Ok(())
    }

    fn release_microphone(&mut self) -> Result<(), AssistantError> {
        self.consumer = None;
        if let Some(stream) = self.stream.take() {
            stream
                .pause()
                .map_err(|e| AssistantError::Device(format!("Failed to pause input stream: {}", e)))?;
            tracing::info!("Microphone released");
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), AssistantError> {
        self.stop_capture()?;
        self.stream = None;
        self.device = None;
        Ok(())
    }
}

/// Drop whatever the microphone recorded before capture was switched on
fn discard_buffered(consumer: &mut HeapCons<f32>) -> usize {
    consumer.clear()
}

fn classify_build_error(err: cpal::BuildStreamError) -> AssistantError {
    match err {
        cpal::BuildStreamError::BackendSpecific { err } => classify_backend_message(err.description),
        other => AssistantError::Device(format!("Failed to build input stream: {}", other)),
    }
}

/// Backends only report denial through their own message text
fn classify_backend_message(message: String) -> AssistantError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        AssistantError::Permission(message)
    } else {
        AssistantError::Device(message)
    }
}
