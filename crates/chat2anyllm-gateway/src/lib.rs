//! Client for an OpenAI-compatible LLM aggregator (LiteLLM).
//!
//! Forwards model-info and chat-completion requests, relays streamed
//! responses as raw bytes and parses SSE deltas so callers can keep a copy
//! of the streamed reply.

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod sse;
pub mod types;

pub use client::{ByteStream, LiteLlmClient};
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use models::{fallback_models, normalize_models, ModelInfo};
pub use sse::{SseDeltaParser, SseEvent};
pub use types::*;
