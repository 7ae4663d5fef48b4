//! PCM decoding for synthesised speech.

use serde::{Deserialize, Serialize};

use crate::backend::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self { sample_rate: 24_000, channels: 1 }
    }
}

/// Decoded audio, samples interleaved by channel in [-1.0, 1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    pub format: AudioFormat,
    pub samples: Vec<f32>,
}

impl AudioClip {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels.max(1) as usize
    }

    pub fn duration_ms(&self) -> u64 {
        if self.format.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1_000 / self.format.sample_rate as u64
    }

    /// Samples for one channel.
    pub fn channel(&self, index: u16) -> impl Iterator<Item = f32> + '_ {
        let stride = self.format.channels.max(1) as usize;
        self.samples.iter().skip(index as usize).step_by(stride).copied()
    }
}

/// Decode signed 16-bit little-endian PCM.
pub fn decode_pcm16(bytes: &[u8], format: AudioFormat) -> Result<AudioClip, LlmError> {
    if format.channels == 0 {
        return Err(LlmError::Decode("channel count must be non-zero".to_string()));
    }
    let frame_bytes = 2 * format.channels as usize;
    if bytes.len() % frame_bytes != 0 {
        return Err(LlmError::Decode(format!(
            "{} bytes is not a whole number of {}-channel frames",
            bytes.len(),
            format.channels
        )));
    }
    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32_768.0)
        .collect();
    Ok(AudioClip { format, samples })
}
