use std::sync::Arc;

use anyhow::Result;
use tokio::fs;
use tracing::info;

use crate::config::AppConfig;
use crate::enhance::TextEnhancementClient;
use crate::generator::ImageGenerator;
use crate::imaging::{FallbackImageSelector, ImageGenerationClient};
use crate::monitor::{AvailabilityMonitor, ExternalService};
use crate::store::{LocalFileStorage, Repository};

/// Process-wide services wired from one `AppConfig`.
pub struct App {
    pub config: AppConfig,
    pub text: Arc<TextEnhancementClient>,
    pub images: Arc<ImageGenerationClient>,
    pub repository: Arc<Repository>,
    pub generator: ImageGenerator,
}

impl App {
    pub async fn build(config: AppConfig) -> Result<Self> {
        config.validate().map_err(anyhow::Error::msg)?;
        fs::create_dir_all(&config.data_dir).await?;
        info!("data directory: {}", config.data_dir.display());

        let text = Arc::new(TextEnhancementClient::new(&config.text)?);
        let fallback = FallbackImageSelector::new(&config.placeholder_base_url);
        let images = Arc::new(ImageGenerationClient::new(&config.image, fallback)?);
        let repository = Arc::new(Repository::new(LocalFileStorage::new(config.data_dir.clone())));
        let generator = ImageGenerator::new(text.clone(), images.clone(), repository.clone());

        Ok(Self {
            config,
            text,
            images,
            repository,
            generator,
        })
    }

    pub fn monitor(&self) -> AvailabilityMonitor {
        let services: Vec<Arc<dyn ExternalService>> = vec![self.text.clone(), self.images.clone()];
        AvailabilityMonitor::new(services, self.config.probe_interval)
    }
}
