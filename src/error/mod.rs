mod app;
mod client;
mod config;
mod request;
mod transport;
mod validation;

pub use app::{AppError, AppResult};
pub use client::ClientError;
pub use config::ConfigError;
pub use request::{Failure, FinalizeError, RequestError};
pub use transport::TransportError;
pub use validation::ValidationError;
