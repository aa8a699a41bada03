//! chat2anyllm server: REST/SSE front for a LiteLLM aggregator with
//! persisted chat sessions and role presets.

pub mod auth;
pub mod check;
pub mod error;
pub mod middleware;
pub mod relay;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
