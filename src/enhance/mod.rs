pub mod fallback;
pub mod gemini;

pub use gemini::{TextEnhancementClient, clean_model_text, qualified_model_name};
