pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Args;
pub use error::ApiError;
pub use routes::{router, HealthResponse, ModelsResponse, TryOnResponse};
pub use state::{AppState, ModelSlot};
