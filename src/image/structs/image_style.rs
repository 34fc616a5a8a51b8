use serde::{Deserialize, Serialize};

use crate::{
    errors::constants::{DEFAULT_STYLE_INTENSITY, DEFAULT_STYLE_TYPE},
    script::structs::background_image::StyleOverride,
};

/// Fully resolved style sent with every image request. The upstream rejects
/// requests whose style has no prompt.
///
/// Example:
/// ```ignore
/// ImageStyle {
///     prompt: String::from("foggy pier"),
///     kind: String::from("cinematic"),
///     intensity: 0.8f32
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageStyle {
    pub prompt: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub intensity: f32,
}

impl ImageStyle {
    /// Fill the gaps of `custom` with defaults; the style prompt falls back to
    /// the image prompt.
    pub fn resolve(custom: Option<&StyleOverride>, image_prompt: &str) -> Self {
        let prompt = custom
            .and_then(|style| style.prompt.as_deref())
            .filter(|prompt| !prompt.trim().is_empty())
            .unwrap_or(image_prompt);
        let kind = custom
            .and_then(|style| style.kind.as_deref())
            .filter(|kind| !kind.trim().is_empty())
            .unwrap_or(DEFAULT_STYLE_TYPE);
        let intensity = custom
            .and_then(|style| style.intensity)
            .unwrap_or(DEFAULT_STYLE_INTENSITY);

        Self {
            prompt: prompt.to_string(),
            kind: kind.to_string(),
            intensity,
        }
    }
}
