use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::availability::ServiceAvailability;
use crate::config::ImageProviderConfig;
use crate::error::ServiceError;
use crate::imaging::engine::{ImageEngine, SamplingParams};
use crate::imaging::fallback::FallbackImageSelector;
use crate::imaging::stability::{StabilityApi, StabilityEngine};
use crate::models::{ImageResult, Source, Style};
use crate::monitor::ExternalService;

/// Acquires an image for a prompt: engines first, placeholder otherwise.
pub struct ImageGenerationClient {
    api: Option<Arc<StabilityApi>>,
    engines: Vec<Arc<dyn ImageEngine>>,
    params: SamplingParams,
    availability: ServiceAvailability,
    fallback: FallbackImageSelector,
}

impl ImageGenerationClient {
    pub fn new(config: &ImageProviderConfig, fallback: FallbackImageSelector) -> Result<Self> {
        let availability = ServiceAvailability::new("stability-image", config.cooldown);
        let (api, engines) = match config.api_key.as_deref() {
            Some(key) => {
                let api = Arc::new(StabilityApi::new(&config.api_host, key)?);
                let engines = StabilityEngine::default_chain(api.clone());
                (Some(api), engines)
            }
            None => (None, Vec::new()),
        };
        Ok(Self {
            api,
            engines,
            params: SamplingParams::default(),
            availability,
            fallback,
        })
    }

    /// Builds a client around an explicit engine chain. With no API handle
    /// the capability check only asks whether the chain is non-empty.
    pub fn with_engines(
        engines: Vec<Arc<dyn ImageEngine>>,
        availability: ServiceAvailability,
        fallback: FallbackImageSelector,
    ) -> Self {
        Self {
            api: None,
            engines,
            params: SamplingParams::default(),
            availability,
            fallback,
        }
    }

    pub fn fallback_selector(&self) -> &FallbackImageSelector {
        &self.fallback
    }

    fn fallback(&self, prompt: &str) -> ImageResult {
        ImageResult {
            url_or_data_uri: self.fallback.select(prompt),
            source: Source::Fallback,
        }
    }

    pub async fn acquire(&self, prompt: &str, style: Style) -> ImageResult {
        if !self.is_configured() || !self.availability.try_acquire() {
            debug!(
                "image provider skipped ({:?}); using placeholder",
                self.availability.state()
            );
            return self.fallback(prompt);
        }

        let styled = style.apply(prompt);
        info!("generating image: {}", styled);
        let mut rate_limited = false;

        for engine in &self.engines {
            match engine.attempt(&styled, &self.params).await {
                Ok(payload) => {
                    info!("engine {} produced an image", engine.id());
                    return ImageResult {
                        url_or_data_uri: payload.to_data_uri(),
                        source: Source::External,
                    };
                }
                Err(err) if err.is_terminal() => {
                    warn!("engine {} answered without an image: {}", engine.id(), err);
                    break;
                }
                Err(err) => {
                    rate_limited |= err.is_rate_limited();
                    if err.status() == Some(StatusCode::NOT_FOUND) {
                        debug!("engine {} not found", engine.id());
                    } else {
                        warn!("engine {} failed: {}", engine.id(), err);
                    }
                }
            }
        }

        if rate_limited {
            warn!("image provider rate limited, disabling");
            self.availability.record_rate_limited();
        }
        info!("no engine produced an image; using placeholder");
        self.fallback(prompt)
    }
}

#[async_trait]
impl ExternalService for ImageGenerationClient {
    fn availability(&self) -> &ServiceAvailability {
        &self.availability
    }

    fn is_configured(&self) -> bool {
        !self.engines.is_empty()
    }

    async fn check_capabilities(&self) -> Result<bool, ServiceError> {
        match &self.api {
            Some(api) => {
                let listed = api.list_engines().await?;
                Ok(self
                    .engines
                    .iter()
                    .any(|engine| listed.iter().any(|id| id == engine.id())))
            }
            None => Ok(!self.engines.is_empty()),
        }
    }
}
