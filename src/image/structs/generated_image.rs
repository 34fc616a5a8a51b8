use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::script::structs::{background_image::BackgroundImagePrompt, scene::Scene};

/// Outcome of one scene's image generation. An empty `image_url` marks a
/// failed scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub scene_time: String,
    pub image_url: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image_id: Option<u32>,
    pub generated_at: DateTime<Utc>,
}

impl GeneratedImage {
    pub fn success(
        scene: &Scene,
        image_url: String,
        background: Option<&BackgroundImagePrompt>,
    ) -> Self {
        Self {
            scene_time: scene.time.clone(),
            image_url,
            prompt: background
                .map(|background| background.prompt.clone())
                .unwrap_or_else(|| scene.description.clone()),
            background_image_id: background.map(|background| background.id),
            generated_at: Utc::now(),
        }
    }

    pub fn placeholder(scene: &Scene) -> Self {
        Self {
            scene_time: scene.time.clone(),
            image_url: String::new(),
            prompt: scene.description.clone(),
            background_image_id: None,
            generated_at: Utc::now(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.image_url.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

impl BatchStats {
    /// `total` is the number of scenes submitted, which can exceed
    /// `results.len()` when failures were dropped.
    pub fn from_results(total: usize, results: &[GeneratedImage]) -> Self {
        let successful = results.iter().filter(|image| !image.is_placeholder()).count();
        Self {
            total,
            successful,
            failed: total.saturating_sub(successful),
        }
    }
}
