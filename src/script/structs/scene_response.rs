use serde_json::Value;

use super::scene::Scene;

/// The response shapes a scene rewrite is known to come back in.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneResponse {
    /// `{"time", "scene", "description"}`
    Bare(Scene),
    /// `{"script": [{...}, ...]}`, first element
    ScriptEnvelope(Scene),
    /// `{"data": {...}}`
    DataEnvelope(Scene),
}

impl SceneResponse {
    /// Try each known shape once, in priority order.
    pub fn decode(value: &Value) -> Option<Self> {
        if let Some(scene) = Scene::from_value(value) {
            return Some(Self::Bare(scene));
        }

        if let Some(scene) = value
            .get("script")
            .and_then(Value::as_array)
            .and_then(|scenes| scenes.first())
            .and_then(Scene::from_value)
        {
            return Some(Self::ScriptEnvelope(scene));
        }

        value
            .get("data")
            .and_then(Scene::from_value)
            .map(Self::DataEnvelope)
    }

    pub fn shape(&self) -> &'static str {
        match self {
            Self::Bare(_) => "bare",
            Self::ScriptEnvelope(_) => "script envelope",
            Self::DataEnvelope(_) => "data envelope",
        }
    }

    pub fn into_scene(self) -> Scene {
        match self {
            Self::Bare(scene) | Self::ScriptEnvelope(scene) | Self::DataEnvelope(scene) => scene,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_bare() {
        let value = json!({"time": "5-10", "scene": "s", "description": "d"});
        assert_eq!(
            SceneResponse::decode(&value),
            Some(SceneResponse::Bare(Scene::new("5-10", "s", "d")))
        );
    }

    #[test]
    fn test_decode_script_envelope_takes_first() {
        let value = json!({"script": [
            {"time": "5-10", "scene": "first", "description": "d"},
            {"time": "10-15", "scene": "second", "description": "d"}
        ]});
        let decoded = SceneResponse::decode(&value).unwrap();
        assert_eq!(decoded.shape(), "script envelope");
        assert_eq!(decoded.into_scene().summary, "first");
    }

    #[test]
    fn test_decode_data_envelope() {
        let value = json!({"data": {"time": "5-10", "scene": "s", "description": "d"}});
        let decoded = SceneResponse::decode(&value).unwrap();
        assert!(matches!(decoded, SceneResponse::DataEnvelope(_)));
    }

    #[test]
    fn test_bare_wins_over_envelopes() {
        let value = json!({
            "time": "5-10", "scene": "bare", "description": "d",
            "data": {"time": "5-10", "scene": "data", "description": "d"}
        });
        assert_eq!(SceneResponse::decode(&value).unwrap().into_scene().summary, "bare");
    }

    #[test]
    fn test_incomplete_shapes_fall_through() {
        let value = json!({
            "time": "5-10", "scene": "",
            "data": {"time": "5-10", "scene": "data", "description": "d"}
        });
        assert_eq!(SceneResponse::decode(&value).unwrap().shape(), "data envelope");

        assert_eq!(SceneResponse::decode(&json!({"script": []})), None);
        assert_eq!(SceneResponse::decode(&json!({"result": "nope"})), None);
        assert_eq!(SceneResponse::decode(&json!([1, 2])), None);
    }
}
