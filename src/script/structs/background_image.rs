use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::{GenError, Result};

/// Caller- or model-supplied style hints. Every field is optional; the image
/// generator fills in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f32>,
}

/// An image prompt meant to back several consecutive scenes.
///
/// Example:
/// ```rust
/// use reel_gen::script::structs::background_image::BackgroundImagePrompt;
///
/// let background = BackgroundImagePrompt::new(1, "Abandoned pier at dusk, volumetric fog");
/// assert!(background.style.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundImagePrompt {
    pub id: u32,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleOverride>,
}

impl BackgroundImagePrompt {
    pub fn new(id: u32, prompt: impl Into<String>) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            style: None,
        }
    }

    pub fn with_style(mut self, style: StyleOverride) -> Self {
        self.style = Some(style);
        self
    }

    /// Lenient decode of the `index`-th element of a model's
    /// `backgroundImages` list. Only `prompt` is required. A missing or
    /// non-numeric `id` becomes the 1-based position and a malformed `style`
    /// is dropped.
    pub fn from_value(value: &Value, index: usize) -> Result<Self> {
        let position = index + 1;

        let prompt = value
            .get("prompt")
            .and_then(Value::as_str)
            .filter(|prompt| !prompt.trim().is_empty())
            .ok_or_else(|| {
                GenError::validation(format!(
                    "Background image {} is missing required field 'prompt'",
                    position
                ))
            })?;

        let id = value
            .get("id")
            .and_then(id_from_value)
            .unwrap_or_else(|| u32::try_from(position).unwrap_or(u32::MAX));

        let style = match value.get("style") {
            None | Some(Value::Null) => None,
            Some(style) => match serde_json::from_value::<StyleOverride>(style.clone()) {
                Ok(style) => Some(style),
                Err(e) => {
                    warn!(background = position, error = %e, "Ignoring malformed background style");
                    None
                }
            },
        };

        Ok(Self {
            id,
            prompt: prompt.to_string(),
            style,
        })
    }
}

fn id_from_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|id| u32::try_from(id).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
