use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::constants::SECONDS_PER_SCENE;

static WINDOW_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)-").expect("valid regex"));

/// One 5-second unit of a script.
///
/// Example:
/// ```rust
/// use reel_gen::script::structs::scene::Scene;
///
/// let scene = Scene::new("0-5", "Fog rolls in", "A lighthouse beam cuts through fog");
/// assert_eq!(scene.start_seconds(), Some(0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub time: String,
    #[serde(rename = "scene")]
    pub summary: String,
    pub description: String,
}

impl Scene {
    pub const REQUIRED_FIELDS: [&'static str; 3] = ["time", "scene", "description"];

    pub fn new(
        time: impl Into<String>,
        summary: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            time: time.into(),
            summary: summary.into(),
            description: description.into(),
        }
    }

    /// Leading integer of a `"<start>-<end>"` window. Starts too large for
    /// `u64` saturate instead of failing.
    pub fn start_seconds(&self) -> Option<u64> {
        WINDOW_START
            .captures(&self.time)
            .and_then(|captures| captures.get(1))
            .map(|start| start.as_str().parse().unwrap_or(u64::MAX))
    }

    /// Decode a scene from a JSON value, requiring every field to be a
    /// non-empty string.
    pub fn from_value(value: &Value) -> Option<Self> {
        if Self::missing_field(value).is_some() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// First required field that is absent, empty, or not a string.
    pub fn missing_field(value: &Value) -> Option<&'static str> {
        Self::REQUIRED_FIELDS.into_iter().find(|field| {
            !value
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|text| !text.is_empty())
        })
    }
}

/// Window string for the scene at `index`: `"0-5"`, `"5-10"`, ...
pub fn time_window(index: u32) -> String {
    let start = index * SECONDS_PER_SCENE;
    format!("{}-{}", start, start + SECONDS_PER_SCENE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_seconds() {
        assert_eq!(Scene::new("30-35", "a", "b").start_seconds(), Some(30));
        assert_eq!(Scene::new("0-5", "a", "b").start_seconds(), Some(0));
        assert_eq!(Scene::new("intro", "a", "b").start_seconds(), None);
        assert_eq!(Scene::new("-5", "a", "b").start_seconds(), None);
    }

    #[test]
    fn test_start_seconds_saturates_on_overflow() {
        assert_eq!(
            Scene::new("99999999999-100000000004", "a", "b").start_seconds(),
            Some(99_999_999_999)
        );
        assert_eq!(
            Scene::new("999999999999999999999999-5", "a", "b").start_seconds(),
            Some(u64::MAX)
        );
    }

    #[test]
    fn test_time_window() {
        assert_eq!(time_window(0), "0-5");
        assert_eq!(time_window(11), "55-60");
    }

    #[test]
    fn test_from_value_requires_all_fields() {
        let complete = json!({"time": "0-5", "scene": "s", "description": "d"});
        assert_eq!(
            Scene::from_value(&complete),
            Some(Scene::new("0-5", "s", "d"))
        );

        let empty_summary = json!({"time": "0-5", "scene": "", "description": "d"});
        assert_eq!(Scene::from_value(&empty_summary), None);
        assert_eq!(Scene::missing_field(&empty_summary), Some("scene"));

        let numeric_time = json!({"time": 5, "scene": "s", "description": "d"});
        assert_eq!(Scene::missing_field(&numeric_time), Some("time"));
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let value = serde_json::to_value(Scene::new("0-5", "s", "d")).unwrap();
        assert_eq!(value, json!({"time": "0-5", "scene": "s", "description": "d"}));
    }
}
