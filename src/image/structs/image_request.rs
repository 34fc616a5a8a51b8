use serde::{Deserialize, Serialize};

use super::image_style::ImageStyle;
use crate::errors::constants::{IMAGE_COUNT, IMAGE_QUALITY, IMAGE_SIZE};

/// Example:
/// ```ignore
/// ImageRequest {
///     prompt: String::from("foggy pier"),
///     image_count: 1,
///     size: String::from("1024x1024"),
///     style: ImageStyle { .. },
///     quality: String::from("standard")
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub image_count: u32,
    pub size: String,
    pub style: ImageStyle,
    pub quality: String,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, style: ImageStyle) -> Self {
        Self {
            prompt: prompt.into(),
            image_count: IMAGE_COUNT,
            size: IMAGE_SIZE.to_string(),
            style,
            quality: IMAGE_QUALITY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageResponse {
    #[serde(default)]
    pub data: Vec<ImageData>,
}

impl ImageResponse {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            data: vec![ImageData {
                url: Some(url.into()),
            }],
        }
    }

    /// URL at the fixed result position, if the upstream produced one.
    pub fn first_url(&self) -> Option<&str> {
        self.data
            .first()
            .and_then(|image| image.url.as_deref())
            .filter(|url| !url.is_empty())
    }
}
