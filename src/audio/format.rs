// NOTE: Everything exchanged with the live session is 16-bit signed little-endian PCM.
// Capture and playback run at different rates because the remote service
// accepts 16kHz input and produces 24kHz output.

/// Samples per capture chunk handed to the encoder.
pub const CAPTURE_CHUNK_SAMPLES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub const BITS_PER_SAMPLE: u16 = 16;
    pub const BYTES_PER_SAMPLE: usize = (Self::BITS_PER_SAMPLE / 8) as usize;

    /// Microphone format sent to the session
    pub const fn input() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
        }
    }

    /// Format of audio produced by the session
    pub const fn output() -> Self {
        Self {
            sample_rate: 24000,
            channels: 1,
        }
    }

    /// Calculate number of samples for a given duration in seconds
    pub fn samples_for_duration(&self, seconds: f32) -> usize {
        (self.sample_rate as f32 * seconds) as usize
    }

    /// Bytes in one frame (one sample per channel)
    pub fn frame_bytes(&self) -> usize {
        Self::BYTES_PER_SAMPLE * self.channels as usize
    }

    pub fn mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.sample_rate)
    }
}
