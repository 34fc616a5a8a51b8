use std::{env, path::Path, time::Duration};

use serde::Deserialize;
use tracing::info;

use crate::errors::{constants::*, GenError, Result};

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub groq_api_key: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    pub magic_hour_api_key: String,
    pub chimege_token: String,
    pub cloudinary: Option<CloudinaryConfig>,
    pub otel_http_url: Option<String>,
    pub time_unit_ms: Option<u64>,
}

fn default_groq_model() -> String {
    DEFAULT_TEXT_MODEL.to_string()
}

fn required_var(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| GenError::missing_env_var(name))
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

impl Config {
    /// `./config.toml` when it exists, the environment otherwise.
    pub fn load() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        if path.exists() {
            info!(path = %path.display(), "Loading config file");
            Self::from_file(path)
        } else {
            let _ = dotenvy::dotenv();
            Self::from_env()
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn from_env() -> Result<Self> {
        let cloudinary = match (
            optional_var("CLOUDNAME"),
            optional_var("CLOUD_API_KEY"),
            optional_var("CLOUD_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        let time_unit_ms = optional_var("REEL_TIME_UNIT_MS")
            .map(|value| {
                value.parse::<u64>().map_err(|_| {
                    GenError::config(format!("REEL_TIME_UNIT_MS is not a number: {}", value))
                })
            })
            .transpose()?;

        Ok(Self {
            groq_api_key: required_var("GROQ_API")?,
            groq_model: optional_var("GROQ_MODEL").unwrap_or_else(default_groq_model),
            magic_hour_api_key: required_var("MAGICHOUR_API")?,
            chimege_token: required_var("CHIMEGE_VOICE_API")?,
            cloudinary,
            otel_http_url: optional_var("OTEL_HTTP_URL"),
            time_unit_ms,
        })
    }

    /// Base pacing unit for every delay and timeout in the pipeline.
    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms.unwrap_or(DEFAULT_TIME_UNIT_MS))
    }
}
