pub mod app;
pub mod availability;
pub mod cli;
pub mod config;
pub mod enhance;
pub mod error;
pub mod generator;
pub mod imaging;
pub mod models;
pub mod monitor;
pub mod store;

pub use app::App;
pub use availability::{AvailabilitySnapshot, AvailabilityState, ServiceAvailability};
pub use config::AppConfig;
pub use error::{AppError, AppResult, ServiceError, StoreError};
pub use generator::ImageGenerator;
