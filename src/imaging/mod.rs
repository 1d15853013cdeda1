pub mod client;
pub mod engine;
pub mod fallback;
pub mod stability;

pub use client::ImageGenerationClient;
pub use engine::{EngineError, ImageEngine, ImagePayload, SamplingParams};
pub use fallback::FallbackImageSelector;
pub use stability::{StabilityApi, StabilityEngine};
