/// Error taxonomy for the generation pipeline
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to parse AI response: {0}")]
    Parse(String),

    #[error("Unexpected response structure: {0}")]
    UnexpectedShape(String),

    #[error("Text contains forbidden characters: {chars:?}")]
    InvalidCharacters { chars: Vec<char> },

    #[error("Scene {index} not found")]
    NotFound { index: usize },

    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid response from {service}: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("{operation} failed after {attempts} attempts: {source}")]
    GenerationExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: Box<GenError>,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl GenError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn unexpected_shape(message: impl Into<String>) -> Self {
        Self::UnexpectedShape(message.into())
    }

    pub fn transport(service: &'static str, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            service,
            status,
            message: message.into(),
        }
    }

    pub fn invalid_response(service: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service,
            message: message.into(),
        }
    }

    /// Wrap a reqwest failure that happened before any status was received.
    pub fn http(service: &'static str, error: reqwest::Error) -> Self {
        Self::Transport {
            service,
            status: error.status().map(|status| status.as_u16()),
            message: error.to_string(),
        }
    }

    pub fn missing_env_var(var_name: &str) -> Self {
        Self::Config(format!("Missing environment variable: {}", var_name))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// The upstream asked us to slow down (HTTP 429).
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// The upstream refused the prompt on safety grounds.
    pub fn is_content_policy(&self) -> bool {
        match self {
            Self::Transport {
                status: Some(400),
                message,
                ..
            } => message.to_lowercase().contains("content policy"),
            _ => false,
        }
    }

    /// Failures caused by the caller's input. These never go back to the wire.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Parse(_)
                | Self::UnexpectedShape(_)
                | Self::InvalidCharacters { .. }
                | Self::NotFound { .. }
        )
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, GenError>;

/// Input validation functions
pub mod validation {
    use super::*;

    pub fn validate_topic(topic: &str) -> Result<()> {
        if topic.trim().is_empty() {
            return Err(GenError::validation("Topic is required"));
        }

        if topic.chars().count() > constants::MAX_TOPIC_LENGTH {
            return Err(GenError::validation(format!(
                "Topic too long (max {} characters)",
                constants::MAX_TOPIC_LENGTH
            )));
        }

        Ok(())
    }

    pub fn validate_duration(duration_seconds: u32) -> Result<()> {
        if duration_seconds == 0 {
            return Err(GenError::validation("Duration must be at least 1 second"));
        }

        Ok(())
    }

    pub fn validate_batch_size(batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(GenError::validation("Batch size must be at least 1"));
        }

        Ok(())
    }

    pub fn validate_narration(text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(GenError::validation("Text is required"));
        }

        Ok(())
    }

    pub fn validate_prompt(prompt: &str) -> Result<()> {
        if prompt.trim().is_empty() {
            return Err(GenError::validation("Prompt is required"));
        }

        Ok(())
    }
}

/// Constants used throughout the application
pub mod constants {
    // Configuration constants
    pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
    pub const DEFAULT_TIME_UNIT_MS: u64 = 1000;

    // Script constants
    pub const SECONDS_PER_SCENE: u32 = 5;
    pub const SCENES_PER_BACKGROUND: u32 = 3;
    pub const DEFAULT_DURATION_SECONDS: u32 = 60;
    pub const MAX_TOPIC_LENGTH: usize = 1000;
    pub const DEFAULT_GENRE: &str = "horror";
    pub const DEFAULT_LANGUAGE: &str = "English";
    pub const DEFAULT_TEXT_MODEL: &str = "llama-3.1-8b-instant";
    pub const TEXT_TEMPERATURE: f32 = 0.7;
    pub const TEXT_MAX_TOKENS: u32 = 2000;
    pub const SCRIPT_SYSTEM_PROMPT: &str = "You are a professional script writer. Output ONLY valid JSON, no markdown, no explanations, no code blocks.";

    // Image constants
    pub const IMAGE_MAX_ATTEMPTS: u32 = 3;
    pub const IMAGE_SIZE: &str = "1024x1024";
    pub const IMAGE_QUALITY: &str = "standard";
    pub const IMAGE_COUNT: u32 = 1;
    pub const DEFAULT_STYLE_TYPE: &str = "cinematic";
    pub const DEFAULT_STYLE_INTENSITY: f32 = 0.8;
    pub const DEFAULT_BATCH_SIZE: usize = 3;
    pub const SECONDS_PER_BACKGROUND: u32 = 10;
    pub const SCENE_PAUSE_UNITS: u32 = 1;
    pub const BATCH_PAUSE_UNITS: u32 = 2;
    pub const CINEMATIC_SUFFIX: &str =
        "Cinematic lighting, high quality, detailed, atmospheric, professional photography.";
    pub const SAFE_PROMPT_SUFFIX: &str = " Safe for work, appropriate, artistic";
    pub const SENSITIVE_WORDS: [&str; 10] = [
        "blood", "gore", "violent", "explicit", "nude", "sexual", "weapon", "death", "kill",
        "murder",
    ];

    // Speech constants
    pub const DEFAULT_VOICE_ID: &str = "MALE1";
    pub const DEFAULT_SPEED: f32 = 1.0;
    pub const DEFAULT_PITCH: f32 = 1.0;
    pub const DEFAULT_SAMPLE_RATE: u32 = 22050;
    pub const SPEECH_TIMEOUT_UNITS: u32 = 60;
    pub const MIN_AUDIO_BYTES: usize = 100;
    pub const MAX_CHUNK_CHARS: usize = 500;
    pub const CHUNK_PAUSE_UNITS: u32 = 1;
    pub const SPEECH_MAX_ATTEMPTS: u32 = 3;
    pub const AUDIO_FOLDER: &str = "audio";
    pub const EMPTY_TEXT_FALLBACK: &str = "Текст хоосон байна";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_error_creation() {
        let config_error = GenError::config("Test config error");
        assert!(matches!(config_error, GenError::Config(_)));
        assert_eq!(
            config_error.to_string(),
            "Configuration error: Test config error"
        );

        let parse_error = GenError::parse("No valid JSON found in response");
        assert_eq!(
            parse_error.to_string(),
            "Failed to parse AI response: No valid JSON found in response"
        );
    }

    #[test]
    fn test_not_found_error() {
        let error = GenError::NotFound { index: 7 };
        assert_eq!(error.to_string(), "Scene 7 not found");
        assert!(error.is_precondition());
    }

    #[test]
    fn test_rate_limit_signal() {
        let error = GenError::transport("magic-hour", Some(429), "Too Many Requests");
        assert!(error.is_rate_limited());
        assert!(!error.is_content_policy());
        assert!(!error.is_precondition());

        let error = GenError::transport("magic-hour", Some(503), "unavailable");
        assert!(!error.is_rate_limited());
    }

    #[test]
    fn test_content_policy_signal() {
        let error = GenError::transport(
            "magic-hour",
            Some(400),
            "Prompt rejected: violates Content Policy",
        );
        assert!(error.is_content_policy());

        let plain_bad_request = GenError::transport("magic-hour", Some(400), "bad size");
        assert!(!plain_bad_request.is_content_policy());
    }

    #[test]
    fn test_exhausted_keeps_last_cause() {
        let cause = GenError::transport("chimege", Some(429), "slow down");
        let error = GenError::GenerationExhausted {
            operation: "speech synthesis",
            attempts: 3,
            source: Box::new(cause),
        };
        assert_eq!(
            error.to_string(),
            "speech synthesis failed after 3 attempts: chimege request failed: slow down"
        );
        let source = std::error::Error::source(&error).map(|e| e.to_string());
        assert_eq!(source.as_deref(), Some("chimege request failed: slow down"));
    }

    #[test]
    fn test_invalid_characters_message() {
        let error = GenError::InvalidCharacters {
            chars: vec!['a', '1'],
        };
        assert_eq!(
            error.to_string(),
            "Text contains forbidden characters: ['a', '1']"
        );
    }

    mod validation_tests {
        use super::super::constants;
        use super::super::validation::*;

        #[test]
        fn test_validate_topic() {
            assert!(validate_topic("haunted lighthouse").is_ok());
            assert!(validate_topic("").is_err());
            assert!(validate_topic("   ").is_err());
            assert!(validate_topic(&"a".repeat(constants::MAX_TOPIC_LENGTH + 1)).is_err());
        }

        #[test]
        fn test_validate_duration() {
            assert!(validate_duration(1).is_ok());
            assert!(validate_duration(60).is_ok());
            assert!(validate_duration(0).is_err());
            assert!(validate_duration(601).is_ok());
            assert!(validate_duration(u32::MAX).is_ok());
        }

        #[test]
        fn test_validate_batch_size() {
            assert!(validate_batch_size(3).is_ok());
            assert!(validate_batch_size(0).is_err());
        }

        #[test]
        fn test_validate_narration_and_prompt() {
            assert!(validate_narration("Сайн байна уу").is_ok());
            assert!(validate_narration(" ").is_err());
            assert!(validate_prompt("a foggy pier").is_ok());
            assert!(validate_prompt("").is_err());
        }
    }
}
