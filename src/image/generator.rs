use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::{
    magic_hour::ImageBackend,
    structs::{
        generated_image::GeneratedImage,
        image_request::{ImageRequest, ImageResponse},
        image_style::ImageStyle,
    },
};
use crate::{
    errors::{constants::*, validation, GenError, Result},
    script::structs::{
        background_image::{BackgroundImagePrompt, StyleOverride},
        scene::Scene,
    },
    utils::{pause, units, RetryPolicy, RetryVerdict},
};

const SERVICE: &str = "magic-hour";

static SENSITIVE_WORDS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})\b", SENSITIVE_WORDS.join("|"))).expect("valid regex")
});

/// How a parallel batch reports a scene whose image could not be produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchFailurePolicy {
    /// Leave the scene out; the result list shrinks.
    #[default]
    Drop,
    /// Keep an empty-URL entry so indexes line up with the input.
    Placeholder,
}

/// Caller-chosen parameters for a free-form image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageOptions {
    pub size: Option<String>,
    pub style: Option<StyleOverride>,
    pub quality: Option<String>,
}

/// Pick the background prompt covering a scene: one prompt per 10 seconds,
/// clamped to the last prompt, first prompt when the window is unreadable.
pub fn find_matching_background<'a>(
    scene: &Scene,
    backgrounds: &'a [BackgroundImagePrompt],
) -> Option<&'a BackgroundImagePrompt> {
    let last = backgrounds.last()?;

    match scene.start_seconds() {
        Some(start) => {
            let index = usize::try_from(start / u64::from(SECONDS_PER_BACKGROUND))
                .unwrap_or(usize::MAX);
            Some(backgrounds.get(index).unwrap_or(last))
        }
        None => backgrounds.first(),
    }
}

/// Remove the words that commonly trip the upstream safety filter and mark
/// the prompt as safe.
pub fn sanitize_prompt(prompt: &str) -> String {
    let mut sanitized = SENSITIVE_WORDS_PATTERN.replace_all(prompt, "").into_owned();
    sanitized.push_str(SAFE_PROMPT_SUFFIX);
    sanitized
}

pub struct ImageGenerator {
    backend: Arc<dyn ImageBackend>,
    retry_policy: RetryPolicy,
    time_unit: Duration,
    failure_policy: BatchFailurePolicy,
}

impl ImageGenerator {
    pub fn new(backend: Arc<dyn ImageBackend>) -> Self {
        let time_unit = Duration::from_millis(DEFAULT_TIME_UNIT_MS);
        Self {
            backend,
            retry_policy: RetryPolicy::new(IMAGE_MAX_ATTEMPTS, time_unit),
            time_unit,
            failure_policy: BatchFailurePolicy::default(),
        }
    }

    pub fn with_time_unit(mut self, time_unit: Duration) -> Self {
        self.time_unit = time_unit;
        self.retry_policy.base_delay = time_unit;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: BatchFailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn build_prompt(scene: &Scene) -> String {
        format!(
            "{}. {}. {}",
            scene.summary, scene.description, CINEMATIC_SUFFIX
        )
    }

    async fn request_url(&self, request: &ImageRequest) -> Result<String> {
        let response: ImageResponse = self.backend.generate(request).await?;
        response
            .first_url()
            .map(str::to_string)
            .ok_or_else(|| GenError::invalid_response(SERVICE, "Invalid response from Magic Hour API"))
    }

    fn classify(error: &GenError) -> RetryVerdict {
        if error.is_rate_limited() {
            RetryVerdict::Backoff
        } else if error.is_content_policy() || error.is_precondition() {
            RetryVerdict::Abort
        } else {
            RetryVerdict::Pause
        }
    }

    /// Generate one image for `scene` and return its URL.
    ///
    /// Rate limiting backs off exponentially; a content-policy rejection
    /// gets one extra call with a sanitized prompt.
    #[tracing::instrument(skip(self, scene, custom_prompt, custom_style), fields(window = %scene.time))]
    pub async fn generate_single(
        &self,
        scene: &Scene,
        custom_prompt: Option<&str>,
        custom_style: Option<&StyleOverride>,
    ) -> Result<String> {
        let prompt = custom_prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Self::build_prompt(scene));
        let request = ImageRequest::new(prompt.clone(), ImageStyle::resolve(custom_style, &prompt));
        let preview: String = prompt.chars().take(50).collect();

        let outcome = self
            .retry_policy
            .attempt(
                "image generation",
                |attempt| {
                    info!(
                        attempt = attempt,
                        max_attempts = self.retry_policy.max_attempts,
                        prompt = %preview,
                        "Requesting image"
                    );
                    self.request_url(&request)
                },
                Self::classify,
            )
            .await;

        match outcome {
            Err(error) if error.is_content_policy() => {
                warn!(error = %error, "Content policy violation, trying safer prompt");
                self.content_policy_fallback(&prompt, custom_style).await
            }
            other => other,
        }
    }

    async fn content_policy_fallback(
        &self,
        prompt: &str,
        custom_style: Option<&StyleOverride>,
    ) -> Result<String> {
        let safe_prompt = sanitize_prompt(prompt);
        let style = ImageStyle {
            prompt: safe_prompt.clone(),
            ..ImageStyle::resolve(custom_style, &safe_prompt)
        };

        self.request_url(&ImageRequest::new(safe_prompt, style)).await
    }

    /// One image from a free-form prompt. No retries.
    #[tracing::instrument(skip(self, prompt, options))]
    pub async fn generate_custom(&self, prompt: &str, options: &ImageOptions) -> Result<String> {
        validation::validate_prompt(prompt)?;

        let mut request = ImageRequest::new(prompt, ImageStyle::resolve(options.style.as_ref(), prompt));
        if let Some(size) = options.size.as_deref().filter(|size| !size.is_empty()) {
            request.size = size.to_string();
        }
        if let Some(quality) = options.quality.as_deref().filter(|quality| !quality.is_empty()) {
            request.quality = quality.to_string();
        }

        self.request_url(&request).await
    }

    /// Fresh image for a single scene, recorded against `custom_prompt` when
    /// one was given.
    pub async fn regenerate(&self, scene: &Scene, custom_prompt: Option<&str>) -> Result<GeneratedImage> {
        let image_url = self.generate_single(scene, custom_prompt, None).await?;
        let mut image = GeneratedImage::success(scene, image_url, None);
        if let Some(prompt) = custom_prompt {
            image.prompt = prompt.to_string();
        }
        Ok(image)
    }

    async fn generate_for_scene(
        &self,
        scene: &Scene,
        backgrounds: &[BackgroundImagePrompt],
    ) -> Result<GeneratedImage> {
        let background = find_matching_background(scene, backgrounds);
        let image_url = self
            .generate_single(
                scene,
                background.map(|background| background.prompt.as_str()),
                background.and_then(|background| background.style.as_ref()),
            )
            .await?;

        Ok(GeneratedImage::success(scene, image_url, background))
    }

    /// Images for every scene, one at a time. Failed scenes become
    /// placeholders, so the output always has one entry per scene.
    #[tracing::instrument(skip_all, fields(scenes = scenes.len()))]
    pub async fn generate_from_script(
        &self,
        scenes: &[Scene],
        backgrounds: &[BackgroundImagePrompt],
    ) -> Vec<GeneratedImage> {
        info!("Starting generation for {} scenes", scenes.len());
        let mut results = Vec::with_capacity(scenes.len());

        for (index, scene) in scenes.iter().enumerate() {
            info!("[{}/{}] Generating image for scene {}", index + 1, scenes.len(), scene.time);

            match self.generate_for_scene(scene, backgrounds).await {
                Ok(image) => results.push(image),
                Err(error) => {
                    error!(scene = %scene.time, error = %error, "Failed to generate image");
                    results.push(GeneratedImage::placeholder(scene));
                }
            }

            if index + 1 < scenes.len() {
                pause(units(self.time_unit, SCENE_PAUSE_UNITS)).await;
            }
        }

        let successful = results.iter().filter(|image| !image.is_placeholder()).count();
        info!("Generation complete: {}/{} successful", successful, scenes.len());
        results
    }

    /// Images for every scene, `batch_size` at a time in parallel. Each group
    /// is awaited as a whole before the next one starts.
    #[tracing::instrument(skip_all, fields(scenes = scenes.len(), batch_size = batch_size))]
    pub async fn generate_batch(
        &self,
        scenes: &[Scene],
        backgrounds: &[BackgroundImagePrompt],
        batch_size: usize,
    ) -> Result<Vec<GeneratedImage>> {
        validation::validate_batch_size(batch_size)?;

        let mut results = Vec::with_capacity(scenes.len());
        let group_count = scenes.len().div_ceil(batch_size);

        for (group_index, group) in scenes.chunks(batch_size).enumerate() {
            info!("Processing batch {}/{}", group_index + 1, group_count);

            let outcomes = join_all(
                group
                    .iter()
                    .map(|scene| self.generate_for_scene(scene, backgrounds)),
            )
            .await;

            for (scene, outcome) in group.iter().zip(outcomes) {
                match outcome {
                    Ok(image) => results.push(image),
                    Err(error) => {
                        error!(scene = %scene.time, error = %error, "Batch generation failed");
                        if self.failure_policy == BatchFailurePolicy::Placeholder {
                            results.push(GeneratedImage::placeholder(scene));
                        }
                    }
                }
            }

            if group_index + 1 < group_count {
                pause(units(self.time_unit, BATCH_PAUSE_UNITS)).await;
            }
        }

        Ok(results)
    }
}
