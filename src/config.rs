use std::env;
use std::path::PathBuf;

use tokio::time::Duration;
use url::Url;

pub const DEFAULT_GEMINI_API_ROOT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_STABILITY_API_HOST: &str = "https://api.stability.ai";
pub const DEFAULT_PLACEHOLDER_BASE_URL: &str = "https://picsum.photos";

const DEFAULT_TEXT_COOLDOWN_SECS: u64 = 60;
const DEFAULT_IMAGE_COOLDOWN_SECS: u64 = 3;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct TextProviderConfig {
    pub api_key: Option<String>,
    pub api_root: String,
    /// Fixed model name such as `gemini-1.5-flash` or `models/gemini-1.5-flash`; picked at probe time when unset.
    pub model: Option<String>,
    pub cooldown: Duration,
}

#[derive(Debug, Clone)]
pub struct ImageProviderConfig {
    pub api_key: Option<String>,
    pub api_host: String,
    pub cooldown: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub text: TextProviderConfig,
    pub image: ImageProviderConfig,
    pub probe_interval: Duration,
    pub placeholder_base_url: String,
    pub data_dir: PathBuf,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads configuration through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let secs = |key: &str, default: u64| {
            get(key)
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(default)
        };

        Self {
            text: TextProviderConfig {
                api_key: get("GEMINI_API_KEY"),
                api_root: get("GEMINI_API_ROOT")
                    .unwrap_or_else(|| DEFAULT_GEMINI_API_ROOT.to_string()),
                model: get("GEMINI_MODEL"),
                cooldown: Duration::from_secs(secs(
                    "TEXT_REQUEST_COOLDOWN_SECS",
                    DEFAULT_TEXT_COOLDOWN_SECS,
                )),
            },
            image: ImageProviderConfig {
                api_key: get("STABILITY_API_KEY"),
                api_host: get("STABILITY_API_HOST")
                    .unwrap_or_else(|| DEFAULT_STABILITY_API_HOST.to_string()),
                cooldown: Duration::from_secs(secs(
                    "IMAGE_REQUEST_COOLDOWN_SECS",
                    DEFAULT_IMAGE_COOLDOWN_SECS,
                )),
            },
            probe_interval: Duration::from_secs(secs(
                "PROBE_INTERVAL_SECS",
                DEFAULT_PROBE_INTERVAL_SECS,
            )),
            placeholder_base_url: get("PLACEHOLDER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PLACEHOLDER_BASE_URL.to_string()),
            data_dir: get("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.text.cooldown.is_zero() || self.image.cooldown.is_zero() {
            return Err("request cooldowns must be greater than 0".to_string());
        }
        if self.probe_interval.is_zero() {
            return Err("probe interval must be greater than 0".to_string());
        }
        validate_http_url(&self.text.api_root)?;
        validate_http_url(&self.image.api_host)?;
        validate_http_url(&self.placeholder_base_url)?;
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    let mut base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push("prompt-canvas");
    base
}

pub fn validate_http_url(raw: &str) -> Result<Url, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("url must not be empty".to_string());
    }
    let parsed = Url::parse(trimmed).map_err(|err| format!("invalid url '{trimmed}': {err}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(format!("only http or https urls are allowed, got {scheme}")),
    }
}
