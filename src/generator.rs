use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::enhance::TextEnhancementClient;
use crate::error::{AppError, AppResult};
use crate::imaging::ImageGenerationClient;
use crate::models::{GeneratedImageRecord, Source, Style};
use crate::store::Repository;

/// Runs prompt improvement, image acquisition and persistence in sequence.
#[derive(Clone)]
pub struct ImageGenerator {
    text: Arc<TextEnhancementClient>,
    images: Arc<ImageGenerationClient>,
    repository: Arc<Repository>,
}

impl ImageGenerator {
    pub fn new(
        text: Arc<TextEnhancementClient>,
        images: Arc<ImageGenerationClient>,
        repository: Arc<Repository>,
    ) -> Self {
        Self {
            text,
            images,
            repository,
        }
    }

    /// Trimmed prompt, or a validation error when nothing is left.
    pub fn validate_prompt(raw_prompt: &str) -> AppResult<&str> {
        let prompt = raw_prompt.trim();
        if prompt.is_empty() {
            return Err(AppError::validation("Missing prompt"));
        }
        Ok(prompt)
    }

    /// Provider outages never fail this call; they only show up as
    /// `ai_enhanced == false` or a placeholder URL. Blank prompts are rejected
    /// before any provider is contacted.
    pub async fn generate(
        &self,
        user_id: Uuid,
        raw_prompt: &str,
        style: Style,
    ) -> AppResult<GeneratedImageRecord> {
        let prompt = Self::validate_prompt(raw_prompt)?;

        let improved = self.text.improve(prompt).await;
        let image = self.images.acquire(&improved.text, style).await;
        info!(
            "generated for {}: text={:?} image={:?}",
            user_id, improved.source, image.source
        );

        let record = self
            .repository
            .create_image(
                user_id,
                prompt,
                &improved.text,
                &image.url_or_data_uri,
                improved.source == Source::External,
                style,
            )
            .await?;
        Ok(record)
    }
}
