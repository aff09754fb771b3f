use super::format::AudioFormat;
use crate::error::AssistantError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use std::sync::OnceLock;

const FULL_SCALE: f32 = 32768.0;

/// Raw PCM bytes ready to send, tagged with their MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl EncodedChunk {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

/// Decoded audio ready to be scheduled on an output context
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackBuffer {
    /// Interleaved samples in [-1, 1]
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl PlaybackBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Convert f32 samples (-1.0 to 1.0) to 16-bit little-endian PCM
pub fn encode(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * AudioFormat::BYTES_PER_SAMPLE);
    for &sample in samples {
        let scaled = (sample.clamp(-1.0, 1.0) * FULL_SCALE)
            .round()
            .clamp(i16::MIN as f32, i16::MAX as f32);
        bytes.extend_from_slice(&(scaled as i16).to_le_bytes());
    }
    bytes
}

/// Encode a captured chunk and tag it with the capture format
pub fn create_pcm_chunk(samples: &[f32], format: AudioFormat) -> EncodedChunk {
    EncodedChunk {
        data: encode(samples),
        mime_type: format.mime_type(),
    }
}

pub fn decode(data: &str) -> Result<Vec<u8>, AssistantError> {
    STANDARD
        .decode(data)
        .map_err(|e| AssistantError::Format(e.to_string()))
}

/// Interpret 16-bit little-endian PCM as a playable buffer
pub fn decode_audio_data(
    bytes: &[u8],
    sample_rate: u32,
    channels: u16,
) -> Result<PlaybackBuffer, AssistantError> {
    if channels == 0 {
        return Err(AssistantError::Decode("channel count must be positive".into()));
    }
    if sample_rate == 0 {
        return Err(AssistantError::Decode("sample rate must be positive".into()));
    }

    let frame_bytes = AudioFormat {
        sample_rate,
        channels,
    }
    .frame_bytes();

    if bytes.len() % frame_bytes != 0 {
        return Err(AssistantError::Decode(format!(
            "{} bytes is not a multiple of the {}-byte frame",
            bytes.len(),
            frame_bytes
        )));
    }

    let samples = bytes
        .chunks_exact(AudioFormat::BYTES_PER_SAMPLE)
        .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / FULL_SCALE)
        .collect();

    Ok(PlaybackBuffer::new(samples, sample_rate, channels))
}

/// Sample rate declared in a MIME tag such as `audio/pcm;rate=24000`
pub fn parse_pcm_rate(mime_type: &str) -> Option<u32> {
    static RATE: OnceLock<Regex> = OnceLock::new();
    let re = RATE.get_or_init(|| Regex::new(r"(?i)\brate=(\d+)").unwrap());
    re.captures(mime_type)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
        .filter(|&rate| rate > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_little_endian() {
        let bytes = encode(&[0.0, 1.0, -1.0, 0.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[0..2], &[0x00, 0x00]);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([bytes[4], bytes[5]]), i16::MIN);
        assert_eq!(i16::from_le_bytes([bytes[6], bytes[7]]), 16384);
    }

    #[test]
    fn test_encode_clamps_out_of_range() {
        assert_eq!(encode(&[3.0]), encode(&[1.0]));
        assert_eq!(encode(&[-7.5]), encode(&[-1.0]));
    }

    #[test]
    fn test_round_trip_within_one_step() {
        let samples: Vec<f32> = (0..=400).map(|i| -1.0 + i as f32 / 200.0).collect();
        let encoded = create_pcm_chunk(&samples, AudioFormat::input());
        let decoded = decode(&encoded.to_base64()).unwrap();
        let buffer = decode_audio_data(&decoded, 16000, 1).unwrap();

        assert_eq!(buffer.samples().len(), samples.len());
        for (original, restored) in samples.iter().zip(buffer.samples()) {
            assert!(
                (original - restored).abs() <= 1.0 / FULL_SCALE,
                "{} vs {}",
                original,
                restored
            );
        }
    }

    #[test]
    fn test_encode_deterministic() {
        let samples = [0.1, -0.2, 0.3];
        assert_eq!(encode(&samples), encode(&samples));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(matches!(decode("not base64!!"), Err(AssistantError::Format(_))));
    }

    #[test]
    fn test_decode_audio_rejects_partial_frame() {
        assert!(matches!(
            decode_audio_data(&[0, 0, 0], 24000, 1),
            Err(AssistantError::Decode(_))
        ));
        // Six bytes is three mono samples but one and a half stereo frames
        assert!(matches!(
            decode_audio_data(&[0; 6], 24000, 2),
            Err(AssistantError::Decode(_))
        ));
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = decode_audio_data(&vec![0; 48000], 24000, 1).unwrap();
        assert_eq!(buffer.frames(), 24000);
        assert!((buffer.duration() - 1.0).abs() < 1e-9);

        let stereo = decode_audio_data(&vec![0; 48000], 24000, 2).unwrap();
        assert!((stereo.duration() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_chunk_mime_type() {
        let chunk = create_pcm_chunk(&[0.0; 4], AudioFormat::input());
        assert_eq!(chunk.mime_type, "audio/pcm;rate=16000");
    }

    #[test]
    fn test_parse_pcm_rate() {
        assert_eq!(parse_pcm_rate("audio/pcm;rate=24000"), Some(24000));
        assert_eq!(parse_pcm_rate("audio/L16; Rate=16000"), Some(16000));
        assert_eq!(parse_pcm_rate("audio/pcm"), None);
    }

    #[test]
    fn test_zero_rate_tag_ignored() {
        assert_eq!(parse_pcm_rate("audio/pcm;rate=0"), None);
        assert_eq!(parse_pcm_rate("audio/pcm;rate=000"), None);
    }

    #[test]
    fn test_decode_audio_rejects_zero_rate() {
        assert!(matches!(
            decode_audio_data(&[0, 0x40, 0, 0x40], 0, 1),
            Err(AssistantError::Decode(_))
        ));
    }
}
