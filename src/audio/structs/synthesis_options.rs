use serde::{Deserialize, Serialize};

use crate::errors::constants::{
    DEFAULT_PITCH, DEFAULT_SAMPLE_RATE, DEFAULT_SPEED, DEFAULT_VOICE_ID,
};

/// Voice parameters forwarded as request headers.
///
/// Example:
/// ```rust
/// use reel_gen::audio::structs::synthesis_options::SynthesisOptions;
///
/// let options = SynthesisOptions {
///     voice_id: String::from("FEMALE3v2"),
///     ..Default::default()
/// };
/// assert_eq!(options.sample_rate, 22050);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisOptions {
    pub voice_id: String,
    pub speed: f32,
    pub pitch: f32,
    pub sample_rate: u32,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            voice_id: DEFAULT_VOICE_ID.to_string(),
            speed: DEFAULT_SPEED,
            pitch: DEFAULT_PITCH,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}
