use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::availability::ServiceAvailability;
use crate::config::TextProviderConfig;
use crate::enhance::fallback;
use crate::error::ServiceError;
use crate::models::{ImprovedPrompt, Source};
use crate::monitor::ExternalService;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_OUTPUT_TOKENS: u32 = 30;
const TEMPERATURE: f32 = 0.3;
const GENERATE_METHOD: &str = "generateContent";

fn build_instruction(prompt: &str) -> String {
    format!(
        "Rewrite this image description as a vivid visual prompt of 5-10 words. \
Reply with the prompt only: {prompt}"
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntry {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Strips wrapping quotes and markdown bold markers from model output.
pub fn clean_model_text(raw: &str) -> String {
    let without_bold = raw.replace("**", "");
    without_bold
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”' | '`'))
        .trim()
        .to_string()
}

const MODEL_PREFIX: &str = "models/";

/// Model names as the API lists them, e.g. `gemini-pro` becomes `models/gemini-pro`.
pub fn qualified_model_name(name: &str) -> String {
    let name = name.trim();
    if name.starts_with(MODEL_PREFIX) {
        name.to_string()
    } else {
        format!("{MODEL_PREFIX}{name}")
    }
}

/// Rewrites prompts through the Gemini `generateContent` API.
pub struct TextEnhancementClient {
    client: Client,
    api_root: String,
    api_key: Option<String>,
    model: RwLock<Option<String>>,
    availability: ServiceAvailability,
}

impl TextEnhancementClient {
    pub fn new(config: &TextProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_root: config.api_root.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: RwLock::new(config.model.as_deref().map(qualified_model_name)),
            availability: ServiceAvailability::new("gemini-text", config.cooldown),
        })
    }

    pub fn with_availability(mut self, availability: ServiceAvailability) -> Self {
        self.availability = availability;
        self
    }

    pub fn model_name(&self) -> Option<String> {
        self.model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn fallback(prompt: &str) -> ImprovedPrompt {
        ImprovedPrompt {
            text: fallback::enhance(prompt),
            source: Source::Fallback,
        }
    }

    /// Rewrites `prompt`, falling back to the local enhancer whenever the
    /// provider is unavailable, cooling down, or fails.
    pub async fn improve(&self, prompt: &str) -> ImprovedPrompt {
        if !self.is_configured() || !self.availability.try_acquire() {
            debug!(
                "text provider skipped ({:?}); using fallback enhancer",
                self.availability.state()
            );
            return Self::fallback(prompt);
        }

        match self.request_improvement(prompt).await {
            Ok(raw) => {
                let cleaned = clean_model_text(&raw);
                let text = if cleaned.is_empty() {
                    prompt.to_string()
                } else {
                    cleaned
                };
                info!("text provider improved '{}' -> '{}'", prompt, text);
                ImprovedPrompt {
                    text,
                    source: Source::External,
                }
            }
            Err(err) => {
                self.record_failure(&err);
                Self::fallback(prompt)
            }
        }
    }

    fn record_failure(&self, err: &ServiceError) {
        match err {
            ServiceError::RateLimited(_) => {
                warn!("text provider rate limited, disabling: {}", err);
                self.availability.record_rate_limited();
            }
            ServiceError::Transient(_) => {
                warn!("text provider busy, backing off: {}", err);
                self.availability.record_transient();
            }
            ServiceError::Other(_) => warn!("text provider error: {}", err),
        }
    }

    async fn request_improvement(&self, prompt: &str) -> Result<String, ServiceError> {
        let api_key = self.api_key.as_deref().unwrap_or_default();
        let model = self
            .model_name()
            .ok_or_else(|| ServiceError::Other("no text model selected".to_string()))?;
        let url = format!("{}/v1beta/{}:{GENERATE_METHOD}", self.api_root, model);
        debug!("text provider POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&json!({
                "contents": [{"parts": [{"text": build_instruction(prompt)}]}],
                "generationConfig": {
                    "maxOutputTokens": MAX_OUTPUT_TOKENS,
                    "temperature": TEMPERATURE,
                }
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::classify(status, &body));
        }
        let payload: GenerateContentResponse = response.json().await?;
        Ok(payload.into_text())
    }
}

#[async_trait]
impl ExternalService for TextEnhancementClient {
    fn availability(&self) -> &ServiceAvailability {
        &self.availability
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn check_capabilities(&self) -> Result<bool, ServiceError> {
        let api_key = self.api_key.as_deref().unwrap_or_default();
        let response = self
            .client
            .get(format!("{}/v1beta/models", self.api_root))
            .header("x-goog-api-key", api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::classify(status, &body));
        }
        let list: ModelList = response.json().await?;
        let usable: Vec<String> = list
            .models
            .into_iter()
            .filter(|model| {
                model
                    .supported_generation_methods
                    .iter()
                    .any(|method| method == GENERATE_METHOD)
            })
            .map(|model| model.name)
            .collect();

        let mut selected = self.model.write().unwrap_or_else(PoisonError::into_inner);
        match selected.as_deref() {
            Some(configured) => Ok(usable.iter().any(|name| name == configured)),
            None => match usable.into_iter().next() {
                Some(first) => {
                    info!("text provider using model {}", first);
                    *selected = Some(first);
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }
}
