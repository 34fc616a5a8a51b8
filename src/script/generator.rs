use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::{
    groq::{CompletionRequest, TextCompletion},
    structs::{
        scene::{time_window, Scene},
        scene_response::SceneResponse,
        script_document::ScriptDocument,
    },
};
use crate::errors::{constants::*, validation, GenError, Result};

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```(?:json)?\n?").expect("valid regex"));

/// Knobs for a script request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptOptions {
    pub duration_seconds: u32,
    pub genre: String,
    pub language: String,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            duration_seconds: DEFAULT_DURATION_SECONDS,
            genre: DEFAULT_GENRE.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// Turns a topic into a [`ScriptDocument`] and rewrites single scenes.
///
/// Exactly one upstream call per operation; transport failures surface as-is.
pub struct ScriptGenerator {
    client: Arc<dyn TextCompletion>,
}

impl ScriptGenerator {
    pub fn new(client: Arc<dyn TextCompletion>) -> Self {
        Self { client }
    }

    pub fn scene_count(duration_seconds: u32) -> u32 {
        duration_seconds.div_ceil(SECONDS_PER_SCENE)
    }

    pub fn background_count(scene_count: u32) -> u32 {
        scene_count.div_ceil(SCENES_PER_BACKGROUND)
    }

    pub fn build_prompt(topic: &str, options: &ScriptOptions) -> String {
        let scene_count = Self::scene_count(options.duration_seconds);
        let background_count = Self::background_count(scene_count);
        let windows = (0..scene_count)
            .map(time_window)
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"Generate a {genre} reel script.

Return ONLY valid JSON in this exact format:

{{
  "title": "Creative title here",
  "duration": "{duration}",
  "script": [
    {{
      "time": "0-5",
      "scene": "Brief scene description",
      "description": "Detailed description for this scene"
    }}
  ],
  "backgroundImages": [
    {{
      "id": 1,
      "prompt": "Detailed image generation prompt in English"
    }}
  ]
}}

RULES:
- Do NOT add any explanation or markdown
- Output ONLY the JSON object
- Create exactly {scene_count} scenes (each 5 seconds)
- Use these time ranges, in order: {windows}
- Create exactly {background_count} background image prompts
- Image prompts must be VERY detailed for AI image generation
- Include lighting, atmosphere, camera angle, colors
- Language for narration: {language}
- Image prompts: Always in English

Topic: {topic}"#,
            genre = options.genre,
            duration = options.duration_seconds,
            scene_count = scene_count,
            windows = windows,
            background_count = background_count,
            language = options.language,
            topic = topic.trim(),
        )
    }

    /// Generate a complete script for `topic`.
    ///
    /// Example:
    /// ```rust,no_run
    /// # async fn run(generator: reel_gen::script::generator::ScriptGenerator) -> reel_gen::Result<()> {
    /// use reel_gen::script::generator::ScriptOptions;
    ///
    /// let script = generator
    ///     .generate("the last lighthouse keeper", &ScriptOptions::default())
    ///     .await?;
    /// println!("{} scenes", script.scenes.len());
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self, options), fields(duration = options.duration_seconds))]
    pub async fn generate(&self, topic: &str, options: &ScriptOptions) -> Result<ScriptDocument> {
        validation::validate_topic(topic)?;
        validation::validate_duration(options.duration_seconds)?;

        let prompt = Self::build_prompt(topic, options);
        info!(genre = %options.genre, language = %options.language, "Generating script");

        let response = self
            .client
            .complete(&CompletionRequest::json_only(prompt))
            .await?;

        let value = Self::parse_response(&response)?;
        let document = ScriptDocument::from_value_with_duration(value, options.duration_seconds)?;

        let expected = Self::scene_count(options.duration_seconds) as usize;
        if document.scenes.len() != expected {
            warn!(
                expected = expected,
                actual = document.scenes.len(),
                "Model returned a different number of scenes than requested"
            );
        }

        info!(
            title = %document.title,
            scenes = document.scenes.len(),
            backgrounds = document.background_images.len(),
            "Script generated"
        );
        Ok(document)
    }

    /// Strip code fences and keep the outermost `{ ... }` span.
    pub fn extract_json_object(response: &str) -> Result<String> {
        let cleaned = CODE_FENCE.replace_all(response.trim(), "");

        match (cleaned.find('{'), cleaned.rfind('}')) {
            (Some(first), Some(last)) if first < last => Ok(cleaned[first..=last].to_string()),
            _ => Err(GenError::parse("No valid JSON found in response")),
        }
    }

    pub fn parse_response(response: &str) -> Result<Value> {
        let json = Self::extract_json_object(response)?;
        serde_json::from_str(&json).map_err(|e| {
            error!(error = %e, response = %response, "Failed to parse AI response");
            GenError::parse(e.to_string())
        })
    }

    pub fn build_rewrite_prompt(scene: &Scene) -> String {
        format!(
            r#"Rewrite this scene in a different way:

Time: {time}
Original Scene: {summary}
Original Description: {description}

Return ONLY valid JSON with this exact structure:
{{
  "time": "{time}",
  "scene": "New scene description here",
  "description": "New detailed description here"
}}

IMPORTANT: Return ONLY the JSON object, no other text."#,
            time = scene.time,
            summary = scene.summary,
            description = scene.description,
        )
    }

    /// Produce a replacement for `document.scenes[index]`.
    ///
    /// `custom_prompt` replaces the built-in rewrite prompt verbatim.
    #[tracing::instrument(skip(self, document, custom_prompt))]
    pub async fn regenerate_scene(
        &self,
        document: &ScriptDocument,
        index: usize,
        custom_prompt: Option<&str>,
    ) -> Result<Scene> {
        let scene = document
            .scenes
            .get(index)
            .ok_or(GenError::NotFound { index })?;

        let prompt = match custom_prompt {
            Some(prompt) => prompt.to_string(),
            None => Self::build_rewrite_prompt(scene),
        };

        let response = self
            .client
            .complete(&CompletionRequest::json_only(prompt))
            .await?;
        debug!(response = %response, "Scene rewrite response");

        let rewritten = Self::parse_scene_response(&response)?;
        if rewritten.time != scene.time {
            warn!(
                original = %scene.time,
                returned = %rewritten.time,
                "Rewritten scene changed its time window"
            );
        }

        Ok(rewritten)
    }

    pub fn parse_scene_response(response: &str) -> Result<Scene> {
        let value = match serde_json::from_str::<Value>(response.trim()) {
            Ok(value) => value,
            Err(_) => Self::parse_response(response)?,
        };

        let decoded = SceneResponse::decode(&value).ok_or_else(|| {
            GenError::unexpected_shape("Unexpected response structure from API")
        })?;
        debug!(shape = decoded.shape(), "Decoded scene rewrite");

        Ok(decoded.into_scene())
    }
}
