use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Synthesized speech. `duration` is never reported by the upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioResult {
    pub buffer: Bytes,
    pub format: AudioFormat,
    pub duration: Option<f64>,
}

impl AudioResult {
    pub fn wav(buffer: Bytes) -> Self {
        Self {
            buffer,
            format: AudioFormat::Wav,
            duration: None,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_result() {
        let result = AudioResult::wav(Bytes::from_static(b"RIFF"));
        assert_eq!(result.format.to_string(), "wav");
        assert_eq!(result.len(), 4);
        assert!(result.duration.is_none());
        assert_eq!(serde_json::to_value(result.format).unwrap(), "wav");
    }
}
