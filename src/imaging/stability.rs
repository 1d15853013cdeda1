//! Stability REST API: engine listing and text-to-image generation.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::time::Duration;
use tracing::{debug, info};

use crate::error::ServiceError;
use crate::imaging::engine::{EngineError, ImageEngine, ImagePayload, SamplingParams};

const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Engines tried in order, with the output size each one requires.
pub const DEFAULT_ENGINES: &[(&str, u32, u32)] = &[
    ("stable-diffusion-v1-6", 512, 512),
    ("stable-diffusion-512-v2-1", 512, 512),
    ("stable-diffusion-xl-1024-v1-0", 1024, 1024),
];

#[derive(Debug, Deserialize)]
struct EngineInfo {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    base64: Option<String>,
}

impl GenerationResponse {
    fn into_payload(self) -> Result<ImagePayload, EngineError> {
        let encoded = self
            .artifacts
            .into_iter()
            .find_map(|artifact| artifact.base64)
            .ok_or(EngineError::NoPayload)?;
        ImagePayload::from_base64(&encoded, None)
    }
}

/// Shared HTTP client and credentials for every Stability engine.
#[derive(Debug)]
pub struct StabilityApi {
    client: Client,
    api_host: String,
    api_key: String,
}

impl StabilityApi {
    pub fn new(api_host: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder().timeout(GENERATION_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_host: api_host.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Ids of the engines this key can use.
    pub async fn list_engines(&self) -> Result<Vec<String>, ServiceError> {
        let response = self
            .client
            .get(format!("{}/v1/engines/list", self.api_host))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::classify(status, &body));
        }
        let engines: Vec<EngineInfo> = response.json().await?;
        let ids: Vec<String> = engines.into_iter().map(|engine| engine.id).collect();
        info!("image provider engines: {:?}", ids);
        Ok(ids)
    }

    async fn text_to_image(
        &self,
        engine_id: &str,
        width: u32,
        height: u32,
        prompt: &str,
        params: &SamplingParams,
    ) -> Result<ImagePayload, EngineError> {
        let url = format!(
            "{}/v1/generation/{engine_id}/text-to-image",
            self.api_host
        );
        debug!("image provider POST {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&json!({
                "text_prompts": [{"text": prompt}],
                "cfg_scale": params.cfg_scale,
                "height": height,
                "width": width,
                "samples": params.samples,
                "steps": params.steps,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = if status == StatusCode::NOT_FOUND {
                String::new()
            } else {
                response.text().await.unwrap_or_default()
            };
            return Err(EngineError::Status { status, body });
        }
        let payload: GenerationResponse = response.json().await?;
        payload.into_payload()
    }
}

pub struct StabilityEngine {
    api: Arc<StabilityApi>,
    engine_id: String,
    width: u32,
    height: u32,
}

impl StabilityEngine {
    pub fn new(api: Arc<StabilityApi>, engine_id: &str, width: u32, height: u32) -> Self {
        Self {
            api,
            engine_id: engine_id.to_string(),
            width,
            height,
        }
    }

    /// The default engine chain sharing one API handle.
    pub fn default_chain(api: Arc<StabilityApi>) -> Vec<Arc<dyn ImageEngine>> {
        DEFAULT_ENGINES
            .iter()
            .map(|(id, width, height)| {
                Arc::new(StabilityEngine::new(api.clone(), id, *width, *height))
                    as Arc<dyn ImageEngine>
            })
            .collect()
    }
}

#[async_trait]
impl ImageEngine for StabilityEngine {
    fn id(&self) -> &str {
        &self.engine_id
    }

    async fn attempt(
        &self,
        prompt: &str,
        params: &SamplingParams,
    ) -> Result<ImagePayload, EngineError> {
        self.api
            .text_to_image(&self.engine_id, self.width, self.height, prompt, params)
            .await
    }
}
