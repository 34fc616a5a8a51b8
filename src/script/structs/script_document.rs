use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use super::{background_image::BackgroundImagePrompt, scene::Scene};
use crate::errors::{constants::SECONDS_PER_SCENE, GenError, Result};

static LEADING_INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)").expect("valid regex"));

/// A generated multi-scene script. Produced by one call and handed to the
/// caller; nothing in this crate keeps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptDocument {
    pub title: String,
    #[serde(deserialize_with = "deserialize_duration")]
    pub duration: u32,
    #[serde(rename = "script")]
    pub scenes: Vec<Scene>,
    #[serde(rename = "backgroundImages", default)]
    pub background_images: Vec<BackgroundImagePrompt>,
}

impl ScriptDocument {
    /// Validate an untyped script and lift it into a document. A duration
    /// without a leading number is replaced by the scene count times five.
    pub fn from_value(value: Value) -> Result<Self> {
        Self::decode(value, None)
    }

    /// Like [`ScriptDocument::from_value`], but a duration without a leading
    /// number is replaced by `requested_seconds`.
    pub fn from_value_with_duration(value: Value, requested_seconds: u32) -> Result<Self> {
        Self::decode(value, Some(requested_seconds))
    }

    fn decode(value: Value, requested_seconds: Option<u32>) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| GenError::validation("Script must be a JSON object"))?;

        let title = object
            .get("title")
            .and_then(Value::as_str)
            .filter(|title| !title.is_empty())
            .ok_or_else(|| GenError::validation("Script must have a valid title"))?;

        let raw_duration = object
            .get("duration")
            .filter(|duration| duration_is_present(duration))
            .ok_or_else(|| GenError::validation("Script must have duration"))?;

        let scenes = object
            .get("script")
            .and_then(Value::as_array)
            .ok_or_else(|| GenError::validation("Script.script must be an array"))?;

        if scenes.is_empty() {
            return Err(GenError::validation("Script must have at least one scene"));
        }

        let background_images = object
            .get("backgroundImages")
            .and_then(Value::as_array)
            .ok_or_else(|| GenError::validation("Script.backgroundImages must be an array"))?;

        let scenes = scenes
            .iter()
            .enumerate()
            .map(|(index, scene)| match Scene::missing_field(scene) {
                Some(field) => Err(GenError::validation(format!(
                    "Scene {} is missing required field '{}'",
                    index + 1,
                    field
                ))),
                None => serde_json::from_value(scene.clone()).map_err(|e| {
                    GenError::validation(format!("Scene {} is malformed: {}", index + 1, e))
                }),
            })
            .collect::<Result<Vec<Scene>>>()?;

        let background_images = background_images
            .iter()
            .enumerate()
            .map(|(index, background)| BackgroundImagePrompt::from_value(background, index))
            .collect::<Result<Vec<BackgroundImagePrompt>>>()?;

        let duration = match duration_from_value(raw_duration) {
            Some(duration) => duration,
            None => {
                let fallback = requested_seconds.unwrap_or_else(|| {
                    u32::try_from(scenes.len())
                        .unwrap_or(u32::MAX)
                        .saturating_mul(SECONDS_PER_SCENE)
                });
                warn!(
                    duration = %raw_duration,
                    fallback = fallback,
                    "Script duration has no leading number, using fallback"
                );
                fallback
            }
        };

        Ok(Self {
            title: title.to_string(),
            duration,
            scenes,
            background_images,
        })
    }

    /// Full narration: scene descriptions in order.
    pub fn narration(&self) -> String {
        self.scenes
            .iter()
            .map(|scene| scene.description.trim())
            .filter(|description| !description.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// `null`, `false` and blank strings count as absent.
fn duration_is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(text) => !text.trim().is_empty(),
        _ => true,
    }
}

// Numbers, numeric strings and strings like "60 seconds". Saturates at
// `u32::MAX`.
fn duration_from_value(value: &Value) -> Option<u32> {
    let seconds = match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|f| *f >= 0.0).map(|f| f.ceil() as u64))?,
        Value::String(text) => LEADING_INTEGER
            .captures(text)
            .and_then(|captures| captures.get(1))
            .map(|digits| digits.as_str().parse().unwrap_or(u64::MAX))?,
        _ => return None,
    };
    Some(u32::try_from(seconds).unwrap_or(u32::MAX))
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    duration_from_value(&value)
        .ok_or_else(|| de::Error::custom("duration must be a number of seconds"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_value() -> Value {
        json!({
            "title": "The Keeper",
            "duration": "10",
            "script": [
                {"time": "0-5", "scene": "Fog", "description": "Fog rolls over the sea."},
                {"time": "5-10", "scene": "Light", "description": "The lamp flickers."}
            ],
            "backgroundImages": [
                {"id": 1, "prompt": "Lighthouse at night", "style": {"type": "noir"}}
            ]
        })
    }

    #[test]
    fn test_from_value_accepts_valid_script() {
        let document = ScriptDocument::from_value(valid_value()).unwrap();
        assert_eq!(document.title, "The Keeper");
        assert_eq!(document.duration, 10);
        assert_eq!(document.scenes.len(), 2);
        assert_eq!(
            document.background_images[0]
                .style
                .as_ref()
                .and_then(|style| style.kind.as_deref()),
            Some("noir")
        );
    }

    #[test]
    fn test_from_value_names_scene_and_field() {
        let mut value = valid_value();
        value["script"][1]["description"] = json!("");

        let error = ScriptDocument::from_value(value).unwrap_err();
        assert!(matches!(error, GenError::Validation(_)));
        assert_eq!(
            error.to_string(),
            "Validation error: Scene 2 is missing required field 'description'"
        );
    }

    #[test]
    fn test_from_value_rejects_missing_pieces() {
        let mut no_title = valid_value();
        no_title["title"] = json!("");
        assert!(ScriptDocument::from_value(no_title).is_err());

        let mut no_duration = valid_value();
        no_duration.as_object_mut().unwrap().remove("duration");
        assert!(ScriptDocument::from_value(no_duration).is_err());

        let mut no_scenes = valid_value();
        no_scenes["script"] = json!([]);
        assert!(ScriptDocument::from_value(no_scenes).is_err());

        let mut bad_backgrounds = valid_value();
        bad_backgrounds["backgroundImages"] = json!({"id": 1});
        assert!(ScriptDocument::from_value(bad_backgrounds).is_err());
    }

    #[test]
    fn test_from_value_reads_leading_number_of_duration_text() {
        let mut value = valid_value();
        value["duration"] = json!("60 seconds");
        assert_eq!(ScriptDocument::from_value(value).unwrap().duration, 60);

        let mut value = valid_value();
        value["duration"] = json!("1 minute");
        assert_eq!(ScriptDocument::from_value(value).unwrap().duration, 1);
    }

    #[test]
    fn test_from_value_falls_back_when_duration_has_no_number() {
        let mut value = valid_value();
        value["duration"] = json!("about a minute");
        assert_eq!(ScriptDocument::from_value(value.clone()).unwrap().duration, 10);
        assert_eq!(
            ScriptDocument::from_value_with_duration(value, 62)
                .unwrap()
                .duration,
            62
        );
    }

    #[test]
    fn test_from_value_rejects_blank_duration() {
        for blank in [json!(null), json!(""), json!("  "), json!(false)] {
            let mut value = valid_value();
            value["duration"] = blank;
            assert_eq!(
                ScriptDocument::from_value(value).unwrap_err().to_string(),
                "Validation error: Script must have duration"
            );
        }
    }

    #[test]
    fn test_from_value_decodes_loose_background_images() {
        let mut value = valid_value();
        value["backgroundImages"] = json!([
            {"id": "1", "prompt": "fog"},
            {"prompt": "pier"},
            {"id": 3, "prompt": "lamp", "style": {"intensity": "0.8"}}
        ]);

        let document = ScriptDocument::from_value(value).unwrap();
        let ids: Vec<u32> = document.background_images.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(document.background_images[2].style.is_none());
    }

    #[test]
    fn test_empty_background_list_is_allowed() {
        let mut value = valid_value();
        value["backgroundImages"] = json!([]);
        let document = ScriptDocument::from_value(value).unwrap();
        assert!(document.background_images.is_empty());
    }

    #[test]
    fn test_deserialize_accepts_numeric_or_string_duration() {
        let document: ScriptDocument = serde_json::from_value(valid_value()).unwrap();
        assert_eq!(document.duration, 10);

        let mut numeric = valid_value();
        numeric["duration"] = json!(25);
        let document: ScriptDocument = serde_json::from_value(numeric).unwrap();
        assert_eq!(document.duration, 25);
    }

    #[test]
    fn test_narration_joins_descriptions_in_order() {
        let document = ScriptDocument::from_value(valid_value()).unwrap();
        assert_eq!(
            document.narration(),
            "Fog rolls over the sea. The lamp flickers."
        );
    }
}
