use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which strategy produced a prompt or an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    External,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Realistic,
    Anime,
    Painting,
    Cartoon,
    Minimalist,
}

impl Style {
    pub const ALL: [Style; 5] = [
        Style::Realistic,
        Style::Anime,
        Style::Painting,
        Style::Cartoon,
        Style::Minimalist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Realistic => "realistic",
            Style::Anime => "anime",
            Style::Painting => "painting",
            Style::Cartoon => "cartoon",
            Style::Minimalist => "minimalist",
        }
    }

    /// Clause appended to a prompt before it is sent to an image engine.
    pub fn descriptor(&self) -> &'static str {
        match self {
            Style::Realistic => {
                "photorealistic, highly detailed, professional photography, 8K resolution, sharp focus"
            }
            Style::Anime => {
                "anime style, Japanese animation, vibrant colors, manga art style, cel shading"
            }
            Style::Painting => {
                "oil painting, artistic, brush strokes, masterpiece, gallery quality, textured"
            }
            Style::Cartoon => {
                "cartoon style, animated, bright colors, simple lines, family friendly, fun"
            }
            Style::Minimalist => {
                "minimalist, simple, clean lines, modern art, geometric, abstract"
            }
        }
    }

    pub fn apply(&self, prompt: &str) -> String {
        format!("{}, {}", prompt, self.descriptor())
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Style::ALL
            .into_iter()
            .find(|style| style.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown style '{}'; expected one of realistic, anime, painting, cartoon, minimalist",
                    s.trim()
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImprovedPrompt {
    pub text: String,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    pub url_or_data_uri: String,
    pub source: Source,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImageRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub original_prompt: String,
    pub improved_prompt: String,
    pub image_url: String,
    pub ai_enhanced: bool,
    pub style: Style,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A favorite joined with the image it points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteEntry {
    pub id: Uuid,
    pub image: GeneratedImageRecord,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub image_id: Uuid,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_images: usize,
    pub total_favorites: usize,
    pub total_collections: usize,
}

pub const DEFAULT_PER_PAGE: usize = 10;
pub const MAX_PER_PAGE: usize = 100;

/// One page of a newest-first listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub pages: usize,
    pub current_page: usize,
}

impl<T> Page<T> {
    /// Slices an already ordered list. Out-of-range pages come back empty.
    pub fn paginate(all: Vec<T>, page: usize, per_page: usize) -> Self {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        let total = all.len();
        let pages = total.div_ceil(per_page);
        let items = all
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();
        Self {
            items,
            total,
            pages,
            current_page: page,
        }
    }
}
