use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use thiserror::Error;

use crate::error::ServiceError;

const DEFAULT_MIME_TYPE: &str = "image/png";

/// Sampling parameters sent with every engine attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub cfg_scale: f32,
    pub steps: u32,
    pub samples: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            cfg_scale: 7.0,
            steps: 30,
            samples: 1,
        }
    }
}

/// A decoded image as returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    /// Decodes a base64 image. The MIME type is sniffed from the bytes when
    /// the provider does not state one.
    pub fn from_base64(encoded: &str, mime_type: Option<&str>) -> Result<Self, EngineError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|err| EngineError::Decode(err.to_string()))?;
        if bytes.is_empty() {
            return Err(EngineError::NoPayload);
        }
        let mime_type = match mime_type {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => detect_mime_type(&bytes).to_string(),
        };
        Ok(Self { bytes, mime_type })
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

pub fn detect_mime_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or(DEFAULT_MIME_TYPE)
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("engine response carried no image")]
    NoPayload,

    #[error("image payload could not be decoded: {0}")]
    Decode(String),

    #[error("engine request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl EngineError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            EngineError::Status { status, .. } => Some(*status),
            EngineError::Request(err) => err.status(),
            _ => None,
        }
    }

    /// The engine accepted the request but its answer held no usable image.
    /// Later engines are not tried for the same request.
    pub fn is_terminal(&self) -> bool {
        match self {
            EngineError::NoPayload | EngineError::Decode(_) => true,
            EngineError::Request(err) => err.is_decode(),
            EngineError::Status { .. } => false,
        }
    }

    /// Quota or 429 responses; these take the whole provider offline.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            EngineError::Status { status, body } => {
                matches!(ServiceError::classify(*status, body), ServiceError::RateLimited(_))
            }
            _ => false,
        }
    }
}

/// One remote text-to-image target, tried in a fixed order by the client.
#[async_trait]
pub trait ImageEngine: Send + Sync {
    fn id(&self) -> &str;

    async fn attempt(
        &self,
        prompt: &str,
        params: &SamplingParams,
    ) -> Result<ImagePayload, EngineError>;
}
